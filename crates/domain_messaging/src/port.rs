//! Outbound messaging port

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, HealthCheckable, PortError};
use crate::phone::PhoneNumber;

/// What the gateway reports after accepting a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Gateway message id, when returned
    pub external_id: Option<String>,
    /// Gateway delivery status, e.g. `PENDING`
    pub status: Option<String>,
}

/// Port to a WhatsApp gateway
///
/// Health checks come from [`HealthCheckable`].
#[async_trait]
pub trait MessagingPort: DomainPort + HealthCheckable {
    /// Sends a text message from the given gateway instance
    async fn send_text(
        &self,
        instance: &str,
        to: &PhoneNumber,
        text: &str,
    ) -> Result<SendReceipt, PortError>;
}
