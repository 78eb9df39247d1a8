//! End-to-end relay pipeline against a mocked SES endpoint

use regex::Regex;
use sesrelay_common::config::{RelayConfig, SendMode, SesConfig};
use sesrelay_common::{RelayError, Transaction};
use sesrelay_core::ses::encode_request;
use sesrelay_core::{
    EmailTransport, Overrides, Policy, RelayLogger, RelaySender, SendRawEmailRequest, SesClient,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_string, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MESSAGE: &[u8] = b"From: old@x\r\nTo: old@y\r\nSubject: Report\r\n\r\nFrom: body line\r\n";

const SUCCESS: &str = "<SendRawEmailResponse><SendRawEmailResult>\
    <MessageId>msg-1</MessageId></SendRawEmailResult></SendRawEmailResponse>";

#[derive(Default)]
struct MemoryLogger {
    entries: Mutex<Vec<(String, Vec<String>, Option<RelayError>)>>,
}

impl RelayLogger for MemoryLogger {
    fn log(&self, _origin: Option<SocketAddr>, from: &str, to: &[String], error: Option<&RelayError>) {
        self.entries
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_vec(), error.cloned()));
    }
}

async fn ses(server: &MockServer) -> Arc<dyn EmailTransport> {
    let config = SesConfig {
        endpoint: Some(format!("{}/", server.uri())),
        access_key_id: Some("AKIDEXAMPLE".to_string()),
        secret_access_key: Some("secret".to_string()),
        ..Default::default()
    };
    Arc::new(SesClient::new(&config).unwrap())
}

fn recipients(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn partial_denial_is_delivered_to_allowed_recipients() {
    let server = MockServer::start().await;
    let expected = SendRawEmailRequest {
        configuration_set: Some("relay".to_string()),
        source: Some("a@ex.com".to_string()),
        destinations: recipients(&["b@ex.com"]),
        raw_message: MESSAGE.to_vec(),
    };
    Mock::given(method("POST"))
        .and(body_string(encode_request(&expected)))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
        .expect(1)
        .mount(&server)
        .await;

    let logger = Arc::new(MemoryLogger::default());
    let config = RelayConfig {
        deny_to: Some(r"blocked\.com$".to_string()),
        configuration_set: Some("relay".to_string()),
        ..Default::default()
    };
    let relay = RelaySender::from_config(&config, ses(&server).await)
        .unwrap()
        .with_logger(logger.clone());

    let transaction = Transaction::new(
        Some("192.0.2.1:25".parse().unwrap()),
        "a@ex.com",
        recipients(&["b@ex.com", "c@blocked.com"]),
        MESSAGE,
    );

    assert_eq!(relay.relay(&transaction).await, Ok(()));

    let entries = logger.entries.lock().unwrap().clone();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].1, recipients(&["c@blocked.com"]));
    assert_eq!(entries[1], ("a@ex.com".to_string(), recipients(&["b@ex.com"]), None));
}

#[tokio::test]
async fn header_rewrite_embeds_addresses_in_message() {
    let server = MockServer::start().await;
    let expected = SendRawEmailRequest {
        configuration_set: None,
        source: None,
        destinations: Vec::new(),
        raw_message: b"From: new@x\r\nTo: b@ex.com\r\nSubject: Report\r\n\r\nFrom: body line\r\n"
            .to_vec(),
    };
    Mock::given(method("POST"))
        .and(body_string(encode_request(&expected)))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
        .expect(1)
        .mount(&server)
        .await;

    let relay = RelaySender::new(Policy::default(), ses(&server).await)
        .with_mode(SendMode::HeaderRewrite)
        .with_overrides(Overrides {
            from: Some("new@x".to_string()),
            to: None,
        });

    let result = relay
        .send(None, "a@ex.com", &recipients(&["b@ex.com", "d@ex.com"]), MESSAGE)
        .await;
    assert_eq!(result, Ok(()));
}

#[tokio::test]
async fn denied_sender_never_reaches_ses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
        .expect(0)
        .mount(&server)
        .await;

    let policy = Policy::new(Some(Regex::new(r"@ex\.com$").unwrap()), None);
    let relay = RelaySender::new(policy, ses(&server).await);

    let result = relay
        .send(None, "spam@elsewhere.test", &recipients(&["b@ex.com"]), MESSAGE)
        .await;
    assert_eq!(result, Err(RelayError::SenderNotPermitted));
}

#[tokio::test]
async fn ses_rejection_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            "<ErrorResponse><Error><Type>Sender</Type><Code>Throttling</Code>\
             <Message>Maximum sending rate exceeded.</Message></Error></ErrorResponse>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let relay = RelaySender::new(Policy::default(), ses(&server).await);
    let error = relay
        .send(None, "a@ex.com", &recipients(&["b@ex.com"]), MESSAGE)
        .await
        .unwrap_err();

    assert_eq!(error.smtp_code(), 451);
    assert!(error.to_string().contains("Throttling"));
}
