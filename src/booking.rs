//! Public booking workflow: validate a request, append the appointment row,
//! store an optional requisition file and send the confirmation email.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::audit::{self, actions};
use crate::db::repository;
use crate::db::RecordStore;
use crate::error::WorkflowError;
use crate::integrations::{
    decode_data_url, format_cents, service_price_cents, AttachmentStore, DataUrlFile,
    EmailAttachment, EmailMessage, Folder, Notifier, PaymentGateway, MAX_ATTACHMENT_BYTES,
};
use crate::models::{NewAppointment, DEPOSIT_REQUIRED, PAID_ONLINE};

/// Half-hour slots offered on the booking form.
pub const TIME_SLOTS: [&str; 12] = [
    "09:00 AM", "09:30 AM", "10:00 AM", "10:30 AM", "11:00 AM", "11:30 AM",
    "01:00 PM", "01:30 PM", "02:00 PM", "02:30 PM", "03:00 PM", "03:30 PM",
];

pub const SERVICES: [&str; 10] = [
    "Routine Annual Blood Draw",
    "Vital Signs",
    "Prenatal Lab Testing",
    "Full Blood Test Panels",
    "Cholesterol Testing",
    "ECG",
    "COVID, HIV & STD Screening",
    "HCG & Pregnancy Testing",
    "Drug & Food Allergy Sensitivity Testing",
    "Other",
];

const REQUESTED_DATE_FORMAT: &str = "%B %-d, %Y";
const REQUESTED_DATE_PARSE: &str = "%B %d, %Y";
const SLOT_FORMAT: &str = "%I:%M %p";
const EVENT_MINUTES: i64 = 60;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9()\-.\s]{7,20}$").unwrap());

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PaymentOutcome {
    /// Service fee captured through checkout before submitting. The order is
    /// checked with the processor and can pay for one booking only.
    PaidOnline {
        #[serde(rename = "orderId")]
        order_id: String,
    },
    DepositRequired,
}

impl PaymentOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PaidOnline { .. } => PAID_ONLINE,
            Self::DepositRequired => DEPOSIT_REQUIRED,
        }
    }

    fn order_id(&self) -> Option<&str> {
        match self {
            Self::PaidOnline { order_id } => Some(order_id.trim()),
            Self::DepositRequired => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUpload {
    pub file_name: String,
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
}

/// The three acknowledgements the booking form requires.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consents {
    #[serde(default)]
    pub treatment: bool,
    #[serde(default)]
    pub privacy_notice: bool,
    #[serde(default)]
    pub financial_policy: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub service: String,
    /// ISO date, e.g. "2025-08-07".
    pub date: String,
    pub time_slot: String,
    #[serde(default)]
    pub special_instructions: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub national_insurance: String,
    #[serde(default)]
    pub marital_status: String,
    #[serde(default)]
    pub occupation: String,
    pub payment: PaymentOutcome,
    #[serde(default)]
    pub consents: Consents,
    #[serde(default)]
    pub attachment: Option<AttachmentUpload>,
}

/// Settings the booking workflow needs from configuration.
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub business_name: String,
    pub deposit_cents: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub position: u32,
    pub requested_date: String,
    pub payment_status: String,
    pub attachment_link: Option<String>,
    pub email_sent: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOption {
    pub name: &'static str,
    /// Online price, e.g. "85.00"; `None` for deposit-only services.
    pub price: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOptions {
    pub services: Vec<ServiceOption>,
    pub time_slots: Vec<&'static str>,
    pub deposit: String,
}

pub fn booking_options(settings: &BookingSettings) -> BookingOptions {
    BookingOptions {
        services: SERVICES
            .iter()
            .map(|&name| ServiceOption {
                name,
                price: service_price_cents(name).map(format_cents),
            })
            .collect(),
        time_slots: TIME_SLOTS.to_vec(),
        deposit: format_cents(settings.deposit_cents),
    }
}

/// A request that passed validation, ready to be written.
#[derive(Debug, Clone)]
pub struct ValidatedBooking {
    pub appointment: NewAppointment,
    pub starts_at: NaiveDateTime,
    pub attachment: Option<(String, DataUrlFile)>,
}

/// Check every rule that must hold before anything is written.
pub fn validate_booking(request: &BookingRequest, today: NaiveDate) -> Result<ValidatedBooking, WorkflowError> {
    let required = [
        ("name", &request.name),
        ("phone", &request.phone),
        ("email", &request.email),
        ("address", &request.address),
        ("service", &request.service),
        ("date", &request.date),
        ("time slot", &request.time_slot),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(WorkflowError::validation(format!("Missing required field: {field}")));
    }

    let email = request.email.trim();
    if !EMAIL_RE.is_match(email) {
        return Err(WorkflowError::validation("Email address is not valid"));
    }
    if !PHONE_RE.is_match(request.phone.trim()) {
        return Err(WorkflowError::validation("Phone number is not valid"));
    }
    let service = request.service.trim();
    if !SERVICES.contains(&service) {
        return Err(WorkflowError::validation(format!("Unknown service: {service}")));
    }

    let slot = request.time_slot.trim();
    if !TIME_SLOTS.contains(&slot) {
        return Err(WorkflowError::validation(format!("Unknown time slot: {slot}")));
    }
    let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d")
        .map_err(|_| WorkflowError::validation("Date must be YYYY-MM-DD"))?;
    if date < today {
        return Err(WorkflowError::validation("Date cannot be in the past"));
    }
    let time = NaiveTime::parse_from_str(slot, SLOT_FORMAT)
        .map_err(|_| WorkflowError::validation(format!("Unknown time slot: {slot}")))?;

    let consents = &request.consents;
    if !(consents.treatment && consents.privacy_notice && consents.financial_policy) {
        return Err(WorkflowError::validation(
            "Consent to treatment, the privacy notice and the financial policy is required",
        ));
    }

    if let PaymentOutcome::PaidOnline { order_id } = &request.payment {
        if order_id.trim().is_empty() {
            return Err(WorkflowError::validation("Missing payment order id"));
        }
        if service_price_cents(service).is_none() {
            return Err(WorkflowError::validation(format!(
                "{service} cannot be paid online"
            )));
        }
    }

    let attachment = match &request.attachment {
        Some(upload) => Some(decode_attachment(upload)?),
        None => None,
    };

    Ok(ValidatedBooking {
        appointment: NewAppointment {
            name: request.name.trim().to_string(),
            phone: request.phone.trim().to_string(),
            email: email.to_string(),
            address: request.address.trim().to_string(),
            service: service.to_string(),
            requested_date: format_requested_date(date, slot),
            special_instructions: request.special_instructions.trim().to_string(),
            date_of_birth: request.date_of_birth.trim().to_string(),
            national_insurance: request.national_insurance.trim().to_string(),
            marital_status: request.marital_status.trim().to_string(),
            occupation: request.occupation.trim().to_string(),
            payment_status: request.payment.label().to_string(),
        },
        starts_at: date.and_time(time),
        attachment,
    })
}

fn decode_attachment(upload: &AttachmentUpload) -> Result<(String, DataUrlFile), WorkflowError> {
    if upload.file_name.trim().is_empty() {
        return Err(WorkflowError::validation("Attachment needs a file name"));
    }
    // Base64 is 4/3 of the payload; reject oversized uploads before decoding.
    if upload.data_url.len() > MAX_ATTACHMENT_BYTES / 3 * 4 + 1024 {
        return Err(WorkflowError::validation("Attachment exceeds 10 MB"));
    }
    let file = decode_data_url(&upload.data_url).map_err(WorkflowError::Validation)?;
    if file.bytes.is_empty() {
        return Err(WorkflowError::validation("Attachment is empty"));
    }
    if file.bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(WorkflowError::validation("Attachment exceeds 10 MB"));
    }
    Ok((upload.file_name.trim().to_string(), file))
}

/// Submit a booking. Only validation, payment verification and the row
/// append can fail the call; attachment, audit and email problems are
/// logged and reported in the receipt.
pub fn submit_booking(
    store: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    notifier: &dyn Notifier,
    payments: Option<&dyn PaymentGateway>,
    settings: &BookingSettings,
    request: &BookingRequest,
    today: NaiveDate,
) -> Result<BookingReceipt, WorkflowError> {
    let booking = validate_booking(request, today)?;
    let new = &booking.appointment;

    let timestamp = chrono::Utc::now().to_rfc3339();
    let position = match request.payment.order_id() {
        Some(order_id) => {
            crate::payments::verify_paid_order(payments, order_id, &new.service)?;
            repository::insert_paid_appointment(store, new, &timestamp, order_id)?
        }
        None => repository::insert_appointment(store, new, &timestamp)?,
    };
    tracing::info!(position, service = %new.service, payment = %new.payment_status, "Booking stored");

    if let Err(e) = audit::record(
        store,
        &new.email,
        actions::BOOKING_SUBMITTED,
        format!(
            "New booking for {} on {} (row {position}, {})",
            new.service, new.requested_date, new.payment_status
        ),
    ) {
        tracing::warn!(position, error = %e, "Could not audit booking");
    }

    let attachment_link = booking
        .attachment
        .as_ref()
        .and_then(|(name, file)| store_requisition(store, attachments, position, name, file));

    let message = confirmation_email(settings, new, booking.starts_at);
    let email_sent = match notifier.send(&message) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(position, error = %e, "Booking confirmation email failed");
            false
        }
    };

    Ok(BookingReceipt {
        position,
        requested_date: new.requested_date.clone(),
        payment_status: new.payment_status.clone(),
        attachment_link,
        email_sent,
    })
}

fn store_requisition(
    store: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    position: u32,
    name: &str,
    file: &DataUrlFile,
) -> Option<String> {
    let stored = match attachments.upload(&file.bytes, &format!("{position}-{name}"), Folder::Requisitions) {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(position, error = %e, "Requisition upload failed");
            return None;
        }
    };
    if let Err(e) = repository::update_requisition_link(store, position, &stored.link) {
        tracing::warn!(position, error = %e, "Could not record requisition link");
        return None;
    }
    Some(stored.link)
}

/// "August 7, 2025 at 09:00 AM"
pub fn format_requested_date(date: NaiveDate, slot: &str) -> String {
    format!("{} at {slot}", date.format(REQUESTED_DATE_FORMAT))
}

/// Inverse of [`format_requested_date`]; `None` for anything else.
pub fn parse_requested_date(value: &str) -> Option<NaiveDateTime> {
    let (date, time) = value.trim().split_once(" at ")?;
    let date = NaiveDate::parse_from_str(date.trim(), REQUESTED_DATE_PARSE).ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), SLOT_FORMAT).ok()?;
    Some(date.and_time(time))
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn calendar_stamp(at: NaiveDateTime) -> String {
    at.format("%Y%m%dT%H%M%S").to_string()
}

/// Google Calendar "add event" link for the visit.
pub fn calendar_link(title: &str, details: &str, starts_at: NaiveDateTime) -> String {
    let ends_at = starts_at + Duration::minutes(EVENT_MINUTES);
    let dates = format!("{}/{}", calendar_stamp(starts_at), calendar_stamp(ends_at));
    let params = [
        ("action", "TEMPLATE"),
        ("text", title),
        ("dates", dates.as_str()),
        ("details", details),
    ];
    match reqwest::Url::parse_with_params("https://www.google.com/calendar/render", &params) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not build calendar link");
            String::new()
        }
    }
}

/// One-hour iCalendar event, times in the clinic's local zone.
pub fn ics_event(title: &str, details: &str, starts_at: NaiveDateTime) -> String {
    let ends_at = starts_at + Duration::minutes(EVENT_MINUTES);
    let uid = uuid::Uuid::new_v4();
    [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:-//{}//Booking//EN", crate::config::APP_NAME),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{uid}"),
        format!("DTSTAMP:{}Z", chrono::Utc::now().format("%Y%m%dT%H%M%S")),
        format!("DTSTART:{}", calendar_stamp(starts_at)),
        format!("DTEND:{}", calendar_stamp(ends_at)),
        format!("SUMMARY:{}", ics_escape(title)),
        format!("DESCRIPTION:{}", ics_escape(details)),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ]
    .join("\r\n")
}

fn ics_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Paid bookings get a confirmation with calendar links; deposit bookings
/// get a "request received" email quoting the deposit.
pub fn confirmation_email(settings: &BookingSettings, new: &NewAppointment, starts_at: NaiveDateTime) -> EmailMessage {
    let business = &settings.business_name;
    let name = escape_html(&new.name);
    let service = escape_html(&new.service);
    let when = escape_html(&new.requested_date);

    if new.payment_status == PAID_ONLINE {
        let title = format!("{business} Appointment: {}", new.service);
        let details = format!("Appointment for {} with {business}.", new.service);
        let link = calendar_link(&title, &details, starts_at);
        let html = format!(
            "<div style=\"font-family: sans-serif; line-height: 1.6;\">\
             <h2>Your Appointment is Confirmed!</h2>\
             <p>Dear {name},</p>\
             <p>Thank you for your booking and payment. Your appointment with {biz} is confirmed.</p>\
             <p><strong>Service:</strong> {service}</p>\
             <p><strong>Date &amp; Time:</strong> {when}</p>\
             <p>A member of our team will see you at your provided address.</p>\
             <p><a href=\"{link}\">Add to Google Calendar</a></p>\
             <p>The attached invitation adds the visit to any other calendar.</p>\
             <p>Sincerely,<br><strong>The {biz} Team</strong></p></div>",
            biz = escape_html(business),
            link = escape_html(&link),
        );
        EmailMessage {
            to: new.email.clone(),
            cc: None,
            subject: format!("Your {business} Appointment is Confirmed!"),
            html,
            attachments: vec![EmailAttachment {
                file_name: "appointment.ics".into(),
                content_type: "text/calendar".into(),
                bytes: ics_event(&title, &details, starts_at).into_bytes(),
            }],
        }
    } else {
        let html = format!(
            "<div style=\"font-family: sans-serif; line-height: 1.6;\">\
             <h2>Your Appointment Request Has Been Received</h2>\
             <p>Dear {name},</p>\
             <p>Thank you for submitting your appointment request with {biz}.</p>\
             <p><strong>Service:</strong> {service}</p>\
             <p><strong>Date &amp; Time:</strong> {when}</p>\
             <p>To finalize your booking and secure your time slot, a <strong>${deposit} deposit</strong> \
             is required. We will contact you shortly by phone or email to arrange payment.</p>\
             <p>Once the deposit is received, we will send you an official confirmation email.</p>\
             <p>Sincerely,<br><strong>The {biz} Team</strong></p></div>",
            biz = escape_html(business),
            deposit = format_cents(settings.deposit_cents),
        );
        EmailMessage {
            to: new.email.clone(),
            cc: None,
            subject: format!("Your {business} Appointment Request Has Been Received"),
            html,
            attachments: Vec::new(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_request() -> BookingRequest {
    BookingRequest {
        name: "Jane Doe".into(),
        phone: "(242) 555-0101".into(),
        email: "jane@example.com".into(),
        address: "1 Bay St, Nassau".into(),
        service: "Routine Annual Blood Draw".into(),
        date: "2025-08-07".into(),
        time_slot: "09:00 AM".into(),
        special_instructions: String::new(),
        date_of_birth: String::new(),
        national_insurance: String::new(),
        marital_status: String::new(),
        occupation: String::new(),
        payment: PaymentOutcome::DepositRequired,
        consents: Consents {
            treatment: true,
            privacy_notice: true,
            financial_policy: true,
        },
        attachment: None,
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> BookingSettings {
    BookingSettings {
        business_name: "Health Wise".into(),
        deposit_cents: 3_000,
    }
}
