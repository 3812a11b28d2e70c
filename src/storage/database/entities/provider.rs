use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Provider database model: one configured credential/endpoint for one vendor
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique provider instance name, referenced by routing hints and logs
    #[sea_orm(unique)]
    pub name: String,

    /// Vendor kind: "openai", "anthropic", or "gemini"
    pub kind: String,

    pub api_key: String,

    pub base_url: Option<String>,

    pub enabled: bool,

    /// Lower value = tried first within the load balancer
    pub priority: i32,

    /// Relative weight within a priority tier
    pub weight: i32,

    pub max_retries: i32,

    pub timeout_seconds: i32,

    pub rate_limit: Option<i32>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::model_binding::Entity")]
    ModelBindings,
    #[sea_orm(has_one = "super::provider_health::Entity")]
    Health,
    #[sea_orm(has_many = "super::request_log::Entity")]
    RequestLogs,
}

impl Related<super::model_binding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelBindings.def()
    }
}

impl Related<super::provider_health::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Health.def()
    }
}

impl Related<super::request_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RequestLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
