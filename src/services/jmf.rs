use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use reqwest::Client;
use std::time::Duration;

const JMF_CONTENT_TYPE: &str = "application/vnd.cip4-jmf+xml";

/// A JMF message for the Backstage/Automation Engine gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum JmfMessage {
    /// Ask the gateway to fetch and execute the JDF found at `url`.
    SubmitQueueEntry { url: String, return_jmf: String },
}

impl JmfMessage {
    pub fn submit_queue_entry(url: impl Into<String>, return_jmf: impl Into<String>) -> Self {
        JmfMessage::SubmitQueueEntry {
            url: url.into(),
            return_jmf: return_jmf.into(),
        }
    }

    pub fn to_xml(&self) -> Result<String, JmfError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("JMF").with_attributes([
            ("SenderID", "QMon"),
            ("Version", "1.2"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ])))?;

        match self {
            JmfMessage::SubmitQueueEntry { url, return_jmf } => {
                writer.write_event(Event::Start(
                    BytesStart::new("Command")
                        .with_attributes([("ID", "Job9043"), ("Type", "SubmitQueueEntry")]),
                ))?;
                writer.write_event(Event::Empty(
                    BytesStart::new("QueueSubmissionParams").with_attributes([
                        ("Hold", "false"),
                        ("Priority", "50"),
                        ("URL", url.as_str()),
                        ("ReturnJMF", return_jmf.as_str()),
                    ]),
                ))?;
                writer.write_event(Event::End(BytesEnd::new("Command")))?;
            }
        }

        writer.write_event(Event::End(BytesEnd::new("JMF")))?;
        Ok(String::from_utf8(writer.into_inner())?)
    }
}

/// HTTP client for the JMF gateway.
pub struct JmfGateway {
    http: Client,
    url: String,
}

impl JmfGateway {
    pub fn new(url: &str) -> Result<Self, JmfError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(JmfError::Http)?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// Post a message and return the gateway's raw response body.
    pub async fn execute(&self, message: &JmfMessage) -> Result<String, JmfError> {
        let body = message.to_xml()?;

        tracing::debug!(gateway = %self.url, "Posting JMF message");
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, JMF_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(JmfError::Http)?;

        let status = response.status();
        let text = response.text().await.map_err(JmfError::Http)?;
        if !status.is_success() {
            return Err(JmfError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JmfError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JMF gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("XML write failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header, HeaderMap, StatusCode},
        routing::post,
        Router,
    };
    use std::sync::{Arc, Mutex};

    /// Gateway on a free loopback port answering with `status` and `reply`.
    /// Keeps the content type and body of each post.
    async fn spawn_gateway(
        status: StatusCode,
        reply: &'static str,
    ) -> (String, Arc<Mutex<Vec<(String, String)>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();
        let app = Router::new().route(
            "/JDFP/JMF/",
            post(move |headers: HeaderMap, body: String| {
                let log = log.clone();
                async move {
                    let content_type = headers
                        .get(header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    log.lock().unwrap().push((content_type, body));
                    (status, reply)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/JDFP/JMF/"), received)
    }

    fn submission() -> JmfMessage {
        JmfMessage::submit_queue_entry(
            "http://gold/xml/jdf/gen/49297/1/fsb_proof",
            "http://gold/xml/echo",
        )
    }

    #[tokio::test]
    async fn test_execute_posts_jmf_and_returns_reply() {
        let (url, received) = spawn_gateway(StatusCode::OK, "<JMF ReturnCode=\"0\"/>").await;
        let gateway = JmfGateway::new(&url).unwrap();

        let reply = gateway.execute(&submission()).await.unwrap();
        assert_eq!(reply, "<JMF ReturnCode=\"0\"/>");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, JMF_CONTENT_TYPE);
        assert_eq!(received[0].1, submission().to_xml().unwrap());
    }

    #[tokio::test]
    async fn test_execute_error_status_is_rejected() {
        let (url, _received) = spawn_gateway(StatusCode::INTERNAL_SERVER_ERROR, "busy").await;
        let gateway = JmfGateway::new(&url).unwrap();

        let err = gateway.execute(&submission()).await.unwrap_err();
        match err {
            JmfError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "busy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_submit_queue_entry_document() {
        let msg = JmfMessage::submit_queue_entry(
            "http://gold/xml/jdf/gen/49297/1/fsb_proof",
            "http://gold/xml/echo",
        );
        let xml = msg.to_xml().unwrap();
        assert!(xml.contains("<JMF SenderID=\"QMon\" Version=\"1.2\""));
        assert!(xml.contains("<Command ID=\"Job9043\" Type=\"SubmitQueueEntry\">"));
        assert!(xml.contains("URL=\"http://gold/xml/jdf/gen/49297/1/fsb_proof\""));
        assert!(xml.contains("ReturnJMF=\"http://gold/xml/echo\""));
    }
}
