use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::alert::{AlertCondition, AlertDefinition, Severity};

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    #[validate(length(min = 1, max = 100, message = "알림 이름은 1~100자여야 합니다."))]
    pub name: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub condition: AlertCondition,
}

impl From<CreateAlertRequest> for AlertDefinition {
    fn from(req: CreateAlertRequest) -> Self {
        let mut definition = AlertDefinition::new(req.name, req.severity, req.condition);
        definition.is_active = req.is_active;
        definition
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessAlertResponse {
    pub is_success: bool,
    pub code: String,
    pub message: String,
    pub result: AlertDefinition,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessAlertListResponse {
    pub is_success: bool,
    pub code: String,
    pub message: String,
    pub result: Vec<AlertDefinition>,
}
