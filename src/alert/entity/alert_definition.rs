use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_definition")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub alert_definition_id: Uuid,
    pub name: String,
    pub severity: String,
    pub is_active: bool,
    /// AlertCondition JSON
    #[sea_orm(column_type = "Json")]
    pub condition: Json,
    pub trigger_count: i64,
    pub last_triggered: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::alert_trigger::Entity")]
    AlertTrigger,
}

impl Related<super::alert_trigger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertTrigger.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
