use serde::{Deserialize, Serialize};

use super::enums::{AppointmentStatus, DepositStatus};

/// Payment-status label marking a booking that still owes a deposit.
pub const DEPOSIT_REQUIRED: &str = "Deposit Required";
/// Payment-status label for bookings settled through PayPal checkout.
pub const PAID_ONLINE: &str = "Paid Online via PayPal";
/// Rendered in place of values that do not apply to a row.
pub const NOT_APPLICABLE: &str = "N/A";

/// One booking request; `position` is its permanent handle in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub position: u32,
    pub timestamp: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub service: String,
    /// e.g. "August 7, 2025 at 09:00 AM"
    pub requested_date: String,
    pub status: AppointmentStatus,
    pub special_instructions: String,
    pub physician_info: String,
    pub visit_notes: String,
    pub date_of_birth: String,
    pub national_insurance: String,
    pub marital_status: String,
    pub occupation: String,
    pub requisition_link: String,
    pub payment_status: String,
    pub deposit_status: Option<DepositStatus>,
    pub report_link: String,
}

impl Appointment {
    /// Whether the deposit column carries meaning for this row.
    pub fn requires_deposit(&self) -> bool {
        self.payment_status.contains(DEPOSIT_REQUIRED)
    }

    /// Deposit column as shown to staff: "N/A" unless a deposit is required,
    /// whatever the stored value says.
    pub fn deposit_display(&self) -> &'static str {
        if !self.requires_deposit() {
            return NOT_APPLICABLE;
        }
        self.deposit_status
            .unwrap_or(DepositStatus::Unpaid)
            .as_str()
    }

    /// Deposit required and not yet marked paid.
    pub fn deposit_outstanding(&self) -> bool {
        self.requires_deposit() && self.deposit_status != Some(DepositStatus::Paid)
    }
}

/// Fields written by the booking workflow when a new row is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub service: String,
    pub requested_date: String,
    pub special_instructions: String,
    pub date_of_birth: String,
    pub national_insurance: String,
    pub marital_status: String,
    pub occupation: String,
    pub payment_status: String,
}

/// Appointment as returned to the admin console, with the derived deposit column.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub deposit_display: &'static str,
}

impl From<Appointment> for AppointmentView {
    fn from(appointment: Appointment) -> Self {
        let deposit_display = appointment.deposit_display();
        Self {
            appointment,
            deposit_display,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_appointment(position: u32) -> Appointment {
    Appointment {
        position,
        timestamp: "2025-08-01T10:00:00+00:00".into(),
        name: "Jane Doe".into(),
        phone: "242-555-0101".into(),
        email: "jane@example.com".into(),
        address: "1 Bay St, Nassau".into(),
        service: "Routine Annual Blood Draw".into(),
        requested_date: "August 7, 2025 at 09:00 AM".into(),
        status: AppointmentStatus::Pending,
        special_instructions: String::new(),
        physician_info: String::new(),
        visit_notes: String::new(),
        date_of_birth: String::new(),
        national_insurance: String::new(),
        marital_status: String::new(),
        occupation: String::new(),
        requisition_link: String::new(),
        payment_status: DEPOSIT_REQUIRED.into(),
        deposit_status: None,
        report_link: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_display_unpaid_when_blank() {
        let appt = sample_appointment(2);
        assert_eq!(appt.deposit_display(), "Unpaid");
        assert!(appt.deposit_outstanding());
    }

    #[test]
    fn deposit_display_paid() {
        let mut appt = sample_appointment(2);
        appt.deposit_status = Some(DepositStatus::Paid);
        assert_eq!(appt.deposit_display(), "Paid");
        assert!(!appt.deposit_outstanding());
    }

    #[test]
    fn deposit_display_na_when_paid_online_even_if_marked() {
        let mut appt = sample_appointment(2);
        appt.payment_status = PAID_ONLINE.into();
        appt.deposit_status = Some(DepositStatus::Paid);
        assert_eq!(appt.deposit_display(), NOT_APPLICABLE);
        assert!(!appt.deposit_outstanding());
    }

    #[test]
    fn view_serializes_flat_with_display_column() {
        let view = AppointmentView::from(sample_appointment(4));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["position"], 4);
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["depositDisplay"], "Unpaid");
    }
}
