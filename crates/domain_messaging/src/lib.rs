//! Messaging Domain - WhatsApp notifications
//!
//! Customers are notified over WhatsApp through a self-hosted Evolution API
//! gateway. The domain owns:
//!
//! - Brazilian phone number normalization
//! - The [`MessagingPort`] and its HTTP adapter with retries and a circuit breaker
//! - pt-BR message templates rendered with Fluent
//! - Quiet hours for outbound notifications
//! - Parsing of inbound gateway webhooks
//! - The outbound message log
//!
//! ```text
//!   finance / orders ──► Templates ──► QuietHours ──► MessagingPort ──► Evolution API
//!                                                        │
//!                                                OutboundMessage log
//! ```

pub mod phone;
pub mod port;
pub mod evolution;
pub mod templates;
pub mod quiet_hours;
pub mod webhook;
pub mod outbound;
pub mod notifier;
pub mod error;

pub use phone::PhoneNumber;
pub use port::{MessagingPort, SendReceipt};
pub use evolution::{EvolutionApiAdapter, EvolutionConfig};
pub use templates::{MessageTemplate, Templates};
pub use quiet_hours::QuietHours;
pub use webhook::{InboundMessage, WebhookEvent};
pub use outbound::{MessageStatus, OutboundMessage};
pub use notifier::Notifier;
pub use error::MessagingError;
