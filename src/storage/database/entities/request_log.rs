use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only row written once per terminal request outcome (success or
/// definitive failure). Purged by an external retention job, not by this crate.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "request_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Nullable: a failed request that never reached a provider has none.
    pub provider_id: Option<i32>,

    /// Logical model name as requested, not the upstream-native id.
    pub model: String,

    pub endpoint: String,

    pub method: String,

    pub status_code: i32,

    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub total_tokens: Option<i32>,

    pub latency_ms: i64,

    pub error_message: Option<String>,

    pub user_id: Option<String>,

    pub ip_address: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id",
        on_delete = "SetNull"
    )]
    Provider,
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
