use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::ReportStatus;

/// Specimen types offered on the phlebotomist report.
pub const SPECIMEN_TYPES: &[&str] = &[
    "Blood",
    "Pap Smear",
    "Saliva",
    "Sputum/Mucus",
    "Stool",
    "Swab (Nasal)",
    "Swab (Throat)",
    "Swab (Vaginal)",
    "Tissue",
    "Urine",
];

/// Partner labs a specimen can be transported to.
pub const TRANSPORT_DESTINATIONS: &[&str] = &[
    "Biotech",
    "BML",
    "CHL",
    "DHS",
    "FMC",
    "KELSO",
    "NEO CYT LAB",
    "OAKTREE",
    "PMH",
    "PREMIER",
];

fn unchecked(options: &[&str]) -> BTreeMap<String, bool> {
    options.iter().map(|o| (o.to_string(), false)).collect()
}

fn default_specimens() -> BTreeMap<String, bool> {
    unchecked(SPECIMEN_TYPES)
}

fn default_destinations() -> BTreeMap<String, bool> {
    unchecked(TRANSPORT_DESTINATIONS)
}

fn default_status() -> ReportStatus {
    ReportStatus::Pending
}

/// Structured visit report. Serialized as camelCase JSON into the
/// appointment's visit-notes cell; missing keys fall back to a blank form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitReport {
    #[serde(default)]
    pub date_transported: String,
    #[serde(default)]
    pub time_transported: String,
    #[serde(default)]
    pub ordering_physician: String,
    #[serde(default)]
    pub physician_address: String,
    #[serde(default)]
    pub received_by: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_specimens")]
    pub specimen_types: BTreeMap<String, bool>,
    #[serde(default = "default_destinations")]
    pub transported_to: BTreeMap<String, bool>,
    #[serde(default)]
    pub emergency_contact_name: String,
    #[serde(default)]
    pub emergency_contact_relationship: String,
    #[serde(default)]
    pub emergency_contact_home_phone: String,
    #[serde(default)]
    pub emergency_contact_mobile: String,
    #[serde(default = "default_status")]
    pub report_status: ReportStatus,
    #[serde(default)]
    pub phlebotomist_signature: String,
}

impl Default for VisitReport {
    fn default() -> Self {
        Self {
            date_transported: String::new(),
            time_transported: String::new(),
            ordering_physician: String::new(),
            physician_address: String::new(),
            received_by: String::new(),
            notes: String::new(),
            specimen_types: default_specimens(),
            transported_to: default_destinations(),
            emergency_contact_name: String::new(),
            emergency_contact_relationship: String::new(),
            emergency_contact_home_phone: String::new(),
            emergency_contact_mobile: String::new(),
            report_status: ReportStatus::Pending,
            phlebotomist_signature: String::new(),
        }
    }
}

impl VisitReport {
    /// Checked specimen types, in display order.
    pub fn collected_specimens(&self) -> Vec<&str> {
        checked(&self.specimen_types, SPECIMEN_TYPES)
    }

    /// Checked destinations, in display order.
    pub fn destinations(&self) -> Vec<&str> {
        checked(&self.transported_to, TRANSPORT_DESTINATIONS)
    }
}

/// Known options first in catalogue order, then any extra keys alphabetically.
fn checked<'a>(selections: &'a BTreeMap<String, bool>, order: &[&str]) -> Vec<&'a str> {
    let mut out: Vec<&str> = order
        .iter()
        .filter_map(|o| selections.get_key_value(*o))
        .filter(|(_, on)| **on)
        .map(|(k, _)| k.as_str())
        .collect();
    out.extend(
        selections
            .iter()
            .filter(|(k, on)| **on && !order.contains(&k.as_str()))
            .map(|(k, _)| k.as_str()),
    );
    out
}

/// Visit notes as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum VisitNotes {
    Empty,
    Structured(VisitReport),
    Unstructured(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_report_lists_all_options_unchecked() {
        let report = VisitReport::default();
        assert_eq!(report.specimen_types.len(), SPECIMEN_TYPES.len());
        assert_eq!(report.transported_to.len(), TRANSPORT_DESTINATIONS.len());
        assert!(report.collected_specimens().is_empty());
    }

    #[test]
    fn collected_specimens_in_catalogue_order() {
        let mut report = VisitReport::default();
        report.specimen_types.insert("Urine".into(), true);
        report.specimen_types.insert("Blood".into(), true);
        report.specimen_types.insert("Custom swab".into(), true);
        assert_eq!(report.collected_specimens(), vec!["Blood", "Urine", "Custom swab"]);
    }

    #[test]
    fn partial_json_fills_blank_defaults() {
        let report: VisitReport =
            serde_json::from_str(r#"{"notes":"fasting","specimenTypes":{"Blood":true}}"#).unwrap();
        assert_eq!(report.notes, "fasting");
        assert_eq!(report.report_status, ReportStatus::Pending);
        assert_eq!(report.collected_specimens(), vec!["Blood"]);
        assert_eq!(report.transported_to.len(), TRANSPORT_DESTINATIONS.len());
    }

    #[test]
    fn serializes_camel_case_keys() {
        let json = serde_json::to_value(VisitReport::default()).unwrap();
        assert!(json.get("phlebotomistSignature").is_some());
        assert!(json.get("emergencyContactHomePhone").is_some());
        assert_eq!(json["reportStatus"], "Pending");
    }
}
