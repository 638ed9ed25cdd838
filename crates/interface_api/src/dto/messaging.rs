//! WhatsApp messages and investment simulations

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_investment::{Simulation, SimulationInput};
use domain_messaging::WebhookEvent;

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 8, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 4096))]
    pub text: String,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: WebhookEvent,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SimulateRequest {
    #[validate(length(min = 1, max = 10))]
    pub scenarios: Vec<SimulationInput>,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub simulations: Vec<Simulation>,
}
