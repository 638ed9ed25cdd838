//! Tests for domain_messaging

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use core_kernel::{
    AdapterHealth, CircuitBreakerConfig, DomainPort, HealthCheckResult, HealthCheckable, Money,
    PortError, TenantId,
};

use domain_messaging::{
    EvolutionApiAdapter, EvolutionConfig, MessageStatus, MessageTemplate, MessagingError,
    MessagingPort, Notifier, OutboundMessage, PhoneNumber, QuietHours, SendReceipt, Templates,
    WebhookEvent,
};

// ============================================================================
// Mock gateway
// ============================================================================

const API_KEY: &str = "test-key";

#[derive(Clone, Default)]
struct Gateway {
    calls: Arc<AtomicUsize>,
    /// Number of leading calls answered with 503
    failures: usize,
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn send_text(
    State(gw): State<Gateway>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let call = gw.calls.fetch_add(1, Ordering::SeqCst);
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" })));
    }
    if instance == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "instance not found" })));
    }
    if call < gw.failures {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "busy" })));
    }
    *gw.last_body.lock().unwrap() = Some(body);
    (
        StatusCode::CREATED,
        Json(json!({
            "key": { "remoteJid": "5511999998888@s.whatsapp.net", "fromMe": true, "id": "BAE5F0A1" },
            "status": "PENDING"
        })),
    )
}

async fn start_gateway(gw: Gateway) -> String {
    let app = Router::new()
        .route("/message/sendText/:instance", post(send_text))
        .with_state(gw);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(base_url: String) -> EvolutionConfig {
    EvolutionConfig {
        base_url,
        api_key: API_KEY.to_string(),
        instance: "loja".to_string(),
        timeout_secs: 5,
        retry_attempts: 3,
        initial_backoff_ms: 1,
        circuit_breaker: Some(CircuitBreakerConfig {
            failure_threshold: 10,
            success_threshold: 1,
            reset_timeout_secs: 3600,
        }),
    }
}

fn phone() -> PhoneNumber {
    PhoneNumber::parse_br("(11) 99999-8888").unwrap()
}

// ============================================================================
// Phone Tests
// ============================================================================

mod phone_tests {
    use super::*;

    proptest! {
        #[test]
        fn formatting_does_not_change_the_number(area in 11u32..100, number in 900_000_000u32..1_000_000_000) {
            prop_assume!(area % 10 != 0);
            let digits = format!("{area}{number}");
            let formatted = format!("+55 ({area}) {}-{:04}", number / 10_000, number % 10_000);

            let plain = PhoneNumber::parse_br(&digits).unwrap();
            let pretty = PhoneNumber::parse_br(&formatted).unwrap();
            prop_assert_eq!(&plain, &pretty);
            prop_assert_eq!(plain.digits().len(), 13);
            prop_assert!(plain.is_mobile());
        }
    }
}

// ============================================================================
// Adapter Tests
// ============================================================================

mod adapter_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_text() {
        let gw = Gateway::default();
        let adapter = EvolutionApiAdapter::new(config(start_gateway(gw.clone()).await)).unwrap();

        let receipt = adapter.send_text("loja", &phone(), "Olá!").await.unwrap();

        assert_eq!(receipt.external_id.as_deref(), Some("BAE5F0A1"));
        assert_eq!(receipt.status.as_deref(), Some("PENDING"));
        let body = gw.last_body.lock().unwrap().clone().unwrap();
        assert_eq!(body, json!({ "number": "5511999998888", "text": "Olá!" }));
    }

    #[tokio::test]
    async fn test_wrong_key_is_not_retried() {
        let gw = Gateway::default();
        let mut cfg = config(start_gateway(gw.clone()).await);
        cfg.api_key = "wrong".to_string();
        let adapter = EvolutionApiAdapter::new(cfg).unwrap();

        let result = adapter.send_text("loja", &phone(), "x").await;

        assert!(matches!(result, Err(PortError::Unauthorized { .. })));
        assert_eq!(gw.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_instance() {
        let gw = Gateway::default();
        let adapter = EvolutionApiAdapter::new(config(start_gateway(gw.clone()).await)).unwrap();

        let result = adapter.send_text("missing", &phone(), "x").await;
        assert!(matches!(result, Err(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let gw = Gateway {
            failures: 2,
            ..Default::default()
        };
        let adapter = EvolutionApiAdapter::new(config(start_gateway(gw.clone()).await)).unwrap();

        let receipt = adapter.send_text("loja", &phone(), "x").await.unwrap();

        assert_eq!(receipt.external_id.as_deref(), Some("BAE5F0A1"));
        assert_eq!(gw.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_circuit_opens_and_short_circuits() {
        let gw = Gateway {
            failures: usize::MAX,
            ..Default::default()
        };
        let mut cfg = config(start_gateway(gw.clone()).await);
        cfg.retry_attempts = 1;
        cfg.circuit_breaker = Some(CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout_secs: 3600,
        });
        let adapter = EvolutionApiAdapter::new(cfg).unwrap();

        let first = adapter.send_text("loja", &phone(), "x").await;
        assert!(matches!(first, Err(PortError::ServiceUnavailable { .. })));
        assert_eq!(gw.calls.load(Ordering::SeqCst), 2);
        assert!(adapter.is_circuit_open().await);

        let second = adapter.send_text("loja", &phone(), "x").await;
        assert!(matches!(second, Err(PortError::ServiceUnavailable { .. })));
        assert_eq!(gw.calls.load(Ordering::SeqCst), 2);

        let health = adapter.health_check().await;
        assert_eq!(health.status, AdapterHealth::Degraded);
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        let mut cfg = config("http://127.0.0.1:1".to_string());
        cfg.retry_attempts = 0;
        let adapter = EvolutionApiAdapter::new(cfg).unwrap();

        let result = adapter.send_text("loja", &phone(), "x").await;
        assert!(matches!(result, Err(e) if e.is_transient()));
    }
}

// ============================================================================
// Template Tests
// ============================================================================

mod template_tests {
    use super::*;

    fn render(template: MessageTemplate) -> String {
        Templates::pt_br().unwrap().render(&template).unwrap()
    }

    #[test]
    fn test_order_confirmation() {
        let text = render(MessageTemplate::OrderConfirmation {
            customer_name: "Mercadinho Sol".to_string(),
            order_number: "PED-1001".to_string(),
            total: Money::brl(dec!(1520.40)),
            delivery_date: NaiveDate::from_ymd_opt(2024, 5, 16),
        });
        assert!(text.contains("Mercadinho Sol"));
        assert!(text.contains("PED-1001"));
        assert!(text.contains("R$ 1.520,40"));
        assert!(text.contains("Entrega prevista para 16/05/2024."));
    }

    #[test]
    fn test_order_confirmation_without_delivery() {
        let text = render(MessageTemplate::OrderConfirmation {
            customer_name: "Ana".to_string(),
            order_number: "PED-1".to_string(),
            total: Money::brl(dec!(10)),
            delivery_date: None,
        });
        assert!(text.contains("Avisaremos quando sair para entrega."));
    }

    #[test]
    fn test_reminder_wording() {
        let reminder = |days| {
            render(MessageTemplate::BoletoReminder {
                customer_name: "Ana".to_string(),
                amount: Money::brl(dec!(100)),
                due_date: NaiveDate::from_ymd_opt(2024, 6, 13).unwrap(),
                days_until_due: days,
            })
        };
        assert!(reminder(0).contains("vence hoje (13/06/2024)"));
        assert!(reminder(1).contains("vence amanhã"));
        assert!(reminder(3).contains("vence em 3 dias"));
    }

    #[test]
    fn test_overdue_and_boleto_issued() {
        let overdue = render(MessageTemplate::BoletoOverdue {
            customer_name: "Ana".to_string(),
            amount: Money::brl(dec!(100)),
            updated_amount: Money::brl(dec!(102.33)),
            due_date: NaiveDate::from_ymd_opt(2024, 6, 13).unwrap(),
            days_late: 10,
        });
        assert!(overdue.contains("há 10 dias"));
        assert!(overdue.contains("R$ 102,33"));

        let issued = render(MessageTemplate::BoletoIssued {
            customer_name: "Ana".to_string(),
            amount: Money::brl(dec!(33.34)),
            due_date: NaiveDate::from_ymd_opt(2024, 6, 13).unwrap(),
            digitable_line: "23791.23405 90000.000001 42005.678901 7 97460000003334".to_string(),
        });
        assert!(issued.contains("23791.23405 90000.000001"));
    }

    #[test]
    fn test_referral_reward() {
        let text = render(MessageTemplate::ReferralReward {
            customer_name: "Ana".to_string(),
            referred_name: "Bia".to_string(),
            points: 500,
        });
        assert!(text.contains("Bia fez a primeira compra"));
        assert!(text.contains("500 pontos"));
    }
}

// ============================================================================
// Webhook Tests
// ============================================================================

mod webhook_tests {
    use super::*;

    #[test]
    fn test_message_upsert() {
        let body = json!({
            "event": "messages.upsert",
            "instance": "loja",
            "data": {
                "key": { "remoteJid": "5511999998888@s.whatsapp.net", "fromMe": false, "id": "3EB0" },
                "pushName": "Ana",
                "message": { "conversation": "Quero fazer um pedido" },
                "messageTimestamp": 1715700000
            }
        });

        let WebhookEvent::MessageReceived(msg) = WebhookEvent::parse(&body).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.instance, "loja");
        assert!(!msg.from_me);
        assert!(!msg.is_group());
        assert_eq!(msg.text.as_deref(), Some("Quero fazer um pedido"));
        assert_eq!(msg.received_at, Utc.timestamp_opt(1_715_700_000, 0).single());
        assert_eq!(PhoneNumber::from_jid(&msg.remote_jid).unwrap(), phone());
    }

    #[test]
    fn test_extended_text_and_uppercase_event() {
        let body = json!({
            "event": "MESSAGES_UPSERT",
            "instance": "loja",
            "data": {
                "key": { "remoteJid": "120363@g.us", "fromMe": true },
                "message": { "extendedTextMessage": { "text": "link" } }
            }
        });

        let WebhookEvent::MessageReceived(msg) = WebhookEvent::parse(&body).unwrap() else {
            panic!("expected a message");
        };
        assert!(msg.from_me);
        assert!(msg.is_group());
        assert_eq!(msg.text.as_deref(), Some("link"));
    }

    #[test]
    fn test_connection_update_and_ignored() {
        let update = WebhookEvent::parse(&json!({
            "event": "connection.update",
            "instance": "loja",
            "data": { "state": "open" }
        }))
        .unwrap();
        assert_eq!(
            update,
            WebhookEvent::ConnectionUpdate {
                instance: "loja".to_string(),
                state: "open".to_string()
            }
        );

        let other = WebhookEvent::parse(&json!({ "event": "presence.update" })).unwrap();
        assert_eq!(
            other,
            WebhookEvent::Ignored {
                name: "presence.update".to_string()
            }
        );
        let echoed = serde_json::to_value(&other).unwrap();
        assert_eq!(echoed["event"], "ignored");
        assert_eq!(echoed["name"], "presence.update");
        assert!(matches!(
            WebhookEvent::parse(&json!({})),
            Err(MessagingError::InvalidWebhook(_))
        ));
    }
}

// ============================================================================
// Outbound Log Tests
// ============================================================================

mod outbound_tests {
    use super::*;

    struct RecordingPort {
        fail: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl DomainPort for RecordingPort {}

    #[async_trait]
    impl HealthCheckable for RecordingPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "recording".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl MessagingPort for RecordingPort {
        async fn send_text(&self, _: &str, to: &PhoneNumber, text: &str) -> Result<SendReceipt, PortError> {
            if self.fail {
                return Err(PortError::ServiceUnavailable {
                    service: "gateway".to_string(),
                });
            }
            self.sent.lock().unwrap().push((to.digits().to_string(), text.to_string()));
            Ok(SendReceipt {
                external_id: Some("ID1".to_string()),
                status: None,
            })
        }
    }

    fn notifier(fail: bool) -> (Notifier, Arc<RecordingPort>) {
        let port = Arc::new(RecordingPort {
            fail,
            sent: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(
            port.clone(),
            Arc::new(Templates::pt_br().unwrap()),
            QuietHours::default(),
            "loja",
        );
        (notifier, port)
    }

    fn payment() -> MessageTemplate {
        MessageTemplate::PaymentReceived {
            customer_name: "Ana".to_string(),
            amount: Money::brl(dec!(50)),
            reference: "PED-9".to_string(),
        }
    }

    #[tokio::test]
    async fn test_daytime_message_is_sent() {
        let (notifier, port) = notifier(false);
        // 15:00 in São Paulo
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 18, 0, 0).unwrap();

        let mut message = notifier.prepare(TenantId::new(), None, phone(), &payment(), now).unwrap();
        assert!(notifier.dispatch(&mut message, now).await.unwrap());

        assert_eq!(message.status, MessageStatus::Sent);
        assert_eq!(message.external_id.as_deref(), Some("ID1"));
        assert_eq!(message.template.as_deref(), Some("payment-received"));
        assert_eq!(port.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_night_message_waits_for_morning() {
        let (notifier, port) = notifier(false);
        // 22:00 in São Paulo
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 1, 0, 0).unwrap();

        let mut message = notifier.prepare(TenantId::new(), None, phone(), &payment(), now).unwrap();
        assert!(!notifier.dispatch(&mut message, now).await.unwrap());
        assert_eq!(message.status, MessageStatus::Queued);
        assert!(port.sent.lock().unwrap().is_empty());

        let morning = Utc.with_ymd_and_hms(2024, 5, 15, 11, 0, 0).unwrap();
        assert!(notifier.dispatch(&mut message, morning).await.unwrap());
        assert_eq!(message.status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_recorded() {
        let (notifier, _) = notifier(true);
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 18, 0, 0).unwrap();

        let mut message = notifier.prepare(TenantId::new(), None, phone(), &payment(), now).unwrap();
        assert!(notifier.dispatch(&mut message, now).await.unwrap());

        assert_eq!(message.status, MessageStatus::Failed);
        assert!(message.error.as_deref().unwrap().contains("gateway"));
        assert_eq!(message.attempts, 1);

        message.requeue(now).unwrap();
        assert_eq!(message.status, MessageStatus::Queued);
    }

    #[test]
    fn test_sent_message_cannot_fail() {
        let mut message = OutboundMessage::queue(TenantId::new(), phone(), "oi", Utc::now());
        message
            .mark_sent(SendReceipt { external_id: None, status: None }, Utc::now())
            .unwrap();

        assert!(matches!(
            message.mark_failed("late error"),
            Err(MessagingError::InvalidTransition { .. })
        ));
        assert!(message.requeue(Utc::now()).is_err());
    }
}
