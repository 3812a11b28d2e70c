//! Process entrypoint: load configuration, initialize tracing, build the
//! gateway, start its background prober, and serve.

use crate::config::Config;
use crate::core::Gateway;
use crate::utils::error::Result;
use crate::utils::logging;

pub async fn run_server(cli: &crate::Cli) -> Result<()> {
    let config = Config::load(cli)?;
    logging::init_tracing(&config.logging);

    let gateway = Gateway::new(config.clone()).await?;
    let _prober = gateway.spawn_prober();

    super::server::run(config, gateway).await
}
