//! SeaORM entities, one module per table.

pub mod logical_model;
pub mod model_binding;
pub mod provider;
pub mod provider_health;
pub mod request_log;

pub use logical_model::Entity as LogicalModel;
pub use model_binding::Entity as ModelBinding;
pub use provider::Entity as Provider;
pub use provider_health::Entity as ProviderHealth;
pub use request_log::Entity as RequestLog;
