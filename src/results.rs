//! Emailing lab results to a patient, optionally copying their doctor.

use serde::Deserialize;

use crate::audit::{self, actions};
use crate::booking::{escape_html, AttachmentUpload};
use crate::db::RecordStore;
use crate::error::WorkflowError;
use crate::integrations::{decode_data_url, EmailAttachment, EmailMessage, Notifier, MAX_ATTACHMENT_BYTES};
use crate::models::Actor;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsRequest {
    pub patient_email: String,
    #[serde(default)]
    pub doctor_email: Option<String>,
    pub subject: String,
    pub message: String,
    pub file: Option<AttachmentUpload>,
}

fn message_html(message: &str) -> String {
    let body = message
        .lines()
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br>");
    format!("<div style=\"font-family: sans-serif; line-height: 1.6;\">{body}</div>")
}

/// Send one results email with exactly one attachment. Everything but the
/// doctor's address is required; a transport failure fails the call.
pub fn send_results(
    store: &dyn RecordStore,
    notifier: &dyn Notifier,
    actor: &Actor,
    request: &ResultsRequest,
) -> Result<(), WorkflowError> {
    let patient_email = request.patient_email.trim();
    if patient_email.is_empty() || request.subject.trim().is_empty() || request.message.trim().is_empty() {
        return Err(WorkflowError::validation(
            "Patient email, subject and message are required",
        ));
    }
    let upload = request
        .file
        .as_ref()
        .ok_or_else(|| WorkflowError::validation("A results file is required"))?;
    if upload.file_name.trim().is_empty() {
        return Err(WorkflowError::validation("Results file needs a name"));
    }
    let file = decode_data_url(&upload.data_url).map_err(WorkflowError::Validation)?;
    if file.bytes.is_empty() || file.bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(WorkflowError::validation("Results file must be between 1 byte and 10 MB"));
    }

    let cc = request
        .doctor_email
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    let content_type = file.content_type.unwrap_or_else(|| {
        mime_guess::from_path(&upload.file_name)
            .first_or_octet_stream()
            .to_string()
    });
    let message = EmailMessage {
        to: patient_email.to_string(),
        cc: cc.clone(),
        subject: request.subject.trim().to_string(),
        html: message_html(&request.message),
        attachments: vec![EmailAttachment {
            file_name: upload.file_name.trim().to_string(),
            content_type,
            bytes: file.bytes,
        }],
    };
    notifier.send(&message)?;
    tracing::info!(actor = %actor.email, cc = cc.is_some(), "Results email sent");

    let mut details = format!("Sent results \"{}\" to {patient_email}", message.subject);
    if let Some(doctor) = &cc {
        details.push_str(&format!(" (cc {doctor})"));
    }
    details.push('.');
    audit::record(store, &actor.email, actions::SENT_RESULTS, details)
}
