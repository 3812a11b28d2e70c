use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Persisted snapshot of a provider's liveness, mirroring
/// [`crate::core::health::ProviderHealth`]. Lazily created on first probe.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "provider_health")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub provider_id: i32,

    pub is_healthy: bool,

    pub consecutive_failures: i32,

    pub total_checks: i64,

    pub total_failures: i64,

    pub response_time_ms: Option<i64>,

    pub last_check: Option<DateTimeWithTimeZone>,

    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id",
        on_delete = "Cascade"
    )]
    Provider,
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Convert the persisted row into the in-memory record the Health Store
    /// works with, keyed by the provider's display name rather than its id.
    pub fn to_domain(&self, provider_name: &str) -> crate::core::health::ProviderHealth {
        crate::core::health::ProviderHealth::from_parts(
            provider_name,
            self.is_healthy,
            self.consecutive_failures as u32,
            self.total_checks as u64,
            self.total_failures as u64,
            self.last_check.map(|t| t.with_timezone(&chrono::Utc)),
            self.error_message.clone(),
            self.response_time_ms.map(|v| v as u64),
        )
    }
}
