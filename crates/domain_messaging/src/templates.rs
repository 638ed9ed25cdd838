//! pt-BR message templates

use chrono::NaiveDate;
use fluent::concurrent::FluentBundle;
use fluent::{FluentArgs, FluentResource, FluentValue};
use serde::{Deserialize, Serialize};
use unic_langid::{langid, LanguageIdentifier};

use core_kernel::Money;
use crate::error::MessagingError;

const MESSAGES: &str = include_str!("../locales/pt-BR/messages.ftl");

/// A notification and the values it needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum MessageTemplate {
    OrderConfirmation {
        customer_name: String,
        order_number: String,
        total: Money,
        delivery_date: Option<NaiveDate>,
    },
    BoletoIssued {
        customer_name: String,
        amount: Money,
        due_date: NaiveDate,
        digitable_line: String,
    },
    BoletoReminder {
        customer_name: String,
        amount: Money,
        due_date: NaiveDate,
        days_until_due: i64,
    },
    BoletoOverdue {
        customer_name: String,
        amount: Money,
        updated_amount: Money,
        due_date: NaiveDate,
        days_late: i64,
    },
    PaymentReceived {
        customer_name: String,
        amount: Money,
        reference: String,
    },
    ReferralReward {
        customer_name: String,
        referred_name: String,
        points: u64,
    },
}

impl MessageTemplate {
    pub fn message_id(&self) -> &'static str {
        match self {
            MessageTemplate::OrderConfirmation { .. } => "order-confirmation",
            MessageTemplate::BoletoIssued { .. } => "boleto-issued",
            MessageTemplate::BoletoReminder { .. } => "boleto-reminder",
            MessageTemplate::BoletoOverdue { .. } => "boleto-overdue",
            MessageTemplate::PaymentReceived { .. } => "payment-received",
            MessageTemplate::ReferralReward { .. } => "referral-reward",
        }
    }

    fn args(&self) -> FluentArgs<'static> {
        let mut args = FluentArgs::new();
        match self {
            MessageTemplate::OrderConfirmation {
                customer_name,
                order_number,
                total,
                delivery_date,
            } => {
                args.set("name", customer_name.clone());
                args.set("order", order_number.clone());
                args.set("total", total.format_brl());
                args.set("delivery", delivery_date.map(date).unwrap_or_else(|| "none".to_string()));
            }
            MessageTemplate::BoletoIssued {
                customer_name,
                amount,
                due_date,
                digitable_line,
            } => {
                args.set("name", customer_name.clone());
                args.set("amount", amount.format_brl());
                args.set("due", date(*due_date));
                args.set("line", digitable_line.clone());
            }
            MessageTemplate::BoletoReminder {
                customer_name,
                amount,
                due_date,
                days_until_due,
            } => {
                args.set("name", customer_name.clone());
                args.set("amount", amount.format_brl());
                args.set("due", date(*due_date));
                args.set("days", FluentValue::from(*days_until_due));
            }
            MessageTemplate::BoletoOverdue {
                customer_name,
                amount,
                updated_amount,
                due_date,
                days_late,
            } => {
                args.set("name", customer_name.clone());
                args.set("amount", amount.format_brl());
                args.set("updated", updated_amount.format_brl());
                args.set("due", date(*due_date));
                args.set("days", FluentValue::from(*days_late));
            }
            MessageTemplate::PaymentReceived {
                customer_name,
                amount,
                reference,
            } => {
                args.set("name", customer_name.clone());
                args.set("amount", amount.format_brl());
                args.set("reference", reference.clone());
            }
            MessageTemplate::ReferralReward {
                customer_name,
                referred_name,
                points,
            } => {
                args.set("name", customer_name.clone());
                args.set("referred", referred_name.clone());
                args.set("points", FluentValue::from(*points));
            }
        }
        args
    }
}

fn locale() -> LanguageIdentifier {
    langid!("pt-BR")
}

fn date(d: NaiveDate) -> String {
    d.format("%d/%m/%Y").to_string()
}

/// Fluent bundle holding every notification text
pub struct Templates {
    bundle: FluentBundle<FluentResource>,
}

impl Templates {
    /// Loads the bundled pt-BR messages
    pub fn pt_br() -> Result<Self, MessagingError> {
        Self::from_source(MESSAGES)
    }

    /// Loads messages from FTL source, for tenants with custom wording
    pub fn from_source(source: &str) -> Result<Self, MessagingError> {
        let resource = FluentResource::try_new(source.to_string()).map_err(|(_, errors)| {
            MessagingError::Template(format!("{} syntax error(s) in messages", errors.len()))
        })?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale()]);
        // Isolation marks would end up in the WhatsApp text
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| MessagingError::Template(format!("{errors:?}")))?;
        Ok(Self { bundle })
    }

    pub fn render(&self, template: &MessageTemplate) -> Result<String, MessagingError> {
        let id = template.message_id();
        let pattern = self
            .bundle
            .get_message(id)
            .and_then(|m| m.value())
            .ok_or_else(|| MessagingError::Template(format!("missing message '{id}'")))?;

        let args = template.args();
        let mut errors = Vec::new();
        let text = self.bundle.format_pattern(pattern, Some(&args), &mut errors);
        if !errors.is_empty() {
            return Err(MessagingError::Template(format!("{id}: {errors:?}")));
        }
        Ok(text.into_owned())
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").field("locale", &locale().to_string()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_all_messages_present() {
        let templates = Templates::pt_br().unwrap();
        let text = templates
            .render(&MessageTemplate::PaymentReceived {
                customer_name: "Ana".to_string(),
                amount: Money::brl(dec!(1234.5)),
                reference: "PED-1".to_string(),
            })
            .unwrap();
        assert_eq!(
            text,
            "Olá, Ana! Recebemos seu pagamento de R$ 1.234,50 referente a PED-1. Obrigado!"
        );
    }

    #[test]
    fn test_missing_message() {
        let templates = Templates::from_source("hello = oi").unwrap();
        let result = templates.render(&MessageTemplate::ReferralReward {
            customer_name: "Ana".to_string(),
            referred_name: "Bia".to_string(),
            points: 500,
        });
        assert!(matches!(result, Err(MessagingError::Template(_))));
    }
}
