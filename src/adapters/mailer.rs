use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Seam to the transactional mail provider. Returns the provider's message
/// id on success.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<String, AppError>;
}

/// Brevo-style transactional email HTTP API client. Attachments go inline as
/// base64, which caps practical file sizes well above any embroidery design.
pub struct HttpMailer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<String, AppError> {
        let attachments: Vec<serde_json::Value> = message
            .attachments
            .iter()
            .map(|a| {
                json!({
                    "name": a.file_name,
                    "content": base64::engine::general_purpose::STANDARD.encode(&a.content),
                })
            })
            .collect();

        let mut payload = json!({
            "sender": { "email": message.from },
            "to": [{ "email": message.to }],
            "subject": message.subject,
            "htmlContent": message.html_body,
        });
        if !attachments.is_empty() {
            payload["attachment"] = serde_json::Value::Array(attachments);
        }

        let resp = self
            .http
            .post(format!("{}/smtp/email", self.base_url))
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "mail send failed ({status}): {body}"
            )));
        }

        let body: serde_json::Value = resp.json().await?;
        Ok(body
            .get("messageId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}
