use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// N:M join between [`super::logical_model`] and [`super::provider`]: which
/// provider instances may serve a logical model, and under what upstream
/// model id.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "model_bindings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub logical_model_id: i32,

    pub provider_id: i32,

    /// Upstream-native model id to send (e.g. "gpt-4o-2024-08-06")
    pub provider_model: String,

    /// Overrides the provider's own weight for this specific binding
    pub weight: i32,

    pub supports_tool_call: bool,
    pub supports_structured_output: bool,
    pub supports_image: bool,

    pub enabled: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::logical_model::Entity",
        from = "Column::LogicalModelId",
        to = "super::logical_model::Column::Id",
        on_delete = "Cascade"
    )]
    LogicalModel,
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id",
        on_delete = "Cascade"
    )]
    Provider,
}

impl Related<super::logical_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LogicalModel.def()
    }
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
