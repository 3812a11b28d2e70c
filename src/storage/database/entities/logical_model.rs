use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A logical model name callers request (e.g. "gpt-4o"), bound to one or
/// more provider instances via [`super::model_binding`].
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "logical_models")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub remark: Option<String>,

    pub default_max_retry: i32,

    pub default_timeout_seconds: i32,

    pub enabled: bool,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::model_binding::Entity")]
    ModelBindings,
}

impl Related<super::model_binding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelBindings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
