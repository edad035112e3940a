use serde::{Deserialize, Serialize};

/// Patient derived from appointment rows; never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub date_of_birth: String,
    pub national_insurance: String,
    pub marital_status: String,
    pub occupation: String,
    /// Row the demographics were taken from (most recent booking).
    pub latest_position: u32,
    pub appointment_count: usize,
}

/// Editable demographics, written back onto one appointment row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetails {
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub national_insurance: String,
    #[serde(default)]
    pub marital_status: String,
    #[serde(default)]
    pub occupation: String,
}
