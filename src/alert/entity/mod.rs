pub mod alert_definition;
pub mod alert_trigger;
