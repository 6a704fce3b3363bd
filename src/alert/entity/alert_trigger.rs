use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 알림 정의와 이벤트의 매칭 기록 (alert_definition_id, event_id 유니크)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_trigger")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub alert_trigger_id: i64,
    pub alert_definition_id: Uuid,
    pub event_id: Uuid,
    pub triggered_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::alert_definition::Entity",
        from = "Column::AlertDefinitionId",
        to = "super::alert_definition::Column::AlertDefinitionId",
        on_delete = "Cascade"
    )]
    AlertDefinition,
}

impl Related<super::alert_definition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertDefinition.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
