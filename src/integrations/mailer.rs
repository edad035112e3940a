use base64::Engine;
use serde::Serialize;

use super::{check_status, http_client, transport_error, IntegrationError};
use crate::config::MailConfig;

/// A file sent along with an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Outbound email. Acceptance by the transport is the only confirmation.
pub trait Notifier: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), IntegrationError>;
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct HttpMailer {
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig, from: &str) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            from: from.to_string(),
        }
    }
}

#[derive(Serialize)]
struct RelayAttachment<'a> {
    filename: &'a str,
    #[serde(rename = "contentType")]
    content_type: &'a str,
    /// Base64 of the file bytes.
    content: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<RelayAttachment<'a>>,
}

fn relay_body<'a>(from: &'a str, message: &'a EmailMessage) -> RelayMessage<'a> {
    RelayMessage {
        from,
        to: vec![message.to.as_str()],
        cc: message.cc.iter().map(String::as_str).collect(),
        subject: &message.subject,
        html: &message.html,
        attachments: message
            .attachments
            .iter()
            .map(|a| RelayAttachment {
                filename: &a.file_name,
                content_type: &a.content_type,
                content: base64::engine::general_purpose::STANDARD.encode(&a.bytes),
            })
            .collect(),
    }
}

impl Notifier for HttpMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), IntegrationError> {
        let client = http_client()?;
        let mut request = client
            .post(&self.api_url)
            .json(&relay_body(&self.from, message));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| transport_error("Mail relay", &self.api_url, e))?;
        check_status("Mail relay", response)?;

        tracing::info!(subject = %message.subject, attachments = message.attachments.len(), "Email accepted by relay");
        Ok(())
    }
}

/// Used when no relay is configured: logs the message instead of sending it.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &EmailMessage) -> Result<(), IntegrationError> {
        tracing::info!(
            to = %message.to,
            cc = ?message.cc,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "Mail relay not configured, email logged only"
        );
        Ok(())
    }
}
