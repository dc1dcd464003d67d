use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// A plain-text informational email.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Delivers mail by posting it as JSON to an HTTP mail relay.
pub struct HttpMailRelay {
    http: Client,
    endpoint: String,
}

impl HttpMailRelay {
    pub fn new(endpoint: &str) -> Result<Self, MailError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(MailError::Http)?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailRelay {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(MailError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }

        tracing::info!(
            subject = %message.subject,
            recipients = message.to.len(),
            "Mail handed to relay"
        );
        Ok(())
    }
}

/// Used when no relay is configured: the message only goes to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        tracing::warn!(
            subject = %message.subject,
            to = ?message.to,
            body = %message.body,
            "No mail relay configured, message logged only"
        );
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),

    #[error("Message has no recipients")]
    NoRecipients,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    /// Relay on a free loopback port answering with `status`; keeps the
    /// JSON bodies it receives.
    async fn spawn_relay(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();
        let app = Router::new().route(
            "/send",
            post(move |Json(body): Json<serde_json::Value>| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(body);
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/send"), received)
    }

    fn message(to: &[&str]) -> MailMessage {
        MailMessage {
            from: "gold@example.com".to_string(),
            to: to.iter().map(|s| s.to_string()).collect(),
            subject: "Duplicate ColorKey JDF attempt for Item: 1-1".to_string(),
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_relay_refuses_message_without_recipients() {
        let relay = HttpMailRelay::new("http://127.0.0.1:9/send").unwrap();
        let err = tokio_test::assert_err!(relay.send(&message(&[])).await);
        assert!(matches!(err, MailError::NoRecipients));
    }

    #[tokio::test]
    async fn test_relay_posts_message_as_json() {
        let (endpoint, received) = spawn_relay(StatusCode::ACCEPTED).await;
        let relay = HttpMailRelay::new(&endpoint).unwrap();

        tokio_test::assert_ok!(relay.send(&message(&["ops@example.com"])).await);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["to"][0], "ops@example.com");
        assert_eq!(
            received[0]["subject"],
            "Duplicate ColorKey JDF attempt for Item: 1-1"
        );
    }

    #[tokio::test]
    async fn test_relay_error_status_is_rejected() {
        let (endpoint, _received) = spawn_relay(StatusCode::BAD_GATEWAY).await;
        let relay = HttpMailRelay::new(&endpoint).unwrap();

        let err = tokio_test::assert_err!(relay.send(&message(&["ops@example.com"])).await);
        assert!(matches!(err, MailError::Rejected(502)));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        tokio_test::assert_ok!(LogMailer.send(&message(&["ops@example.com"])).await);
    }

    #[test]
    fn test_message_serializes_for_relay() {
        let json = serde_json::to_value(message(&["ops@example.com"])).unwrap();
        assert_eq!(json["to"][0], "ops@example.com");
        assert_eq!(json["from"], "gold@example.com");
    }
}
