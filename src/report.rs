//! Phlebotomist visit reports: stored as JSON in the visit-notes cell and
//! optionally rendered to a one-page PDF kept in the attachment store.

use std::io::BufWriter;

use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde::Serialize;

use crate::audit::{self, actions};
use crate::db::repository;
use crate::db::RecordStore;
use crate::error::WorkflowError;
use crate::integrations::{AttachmentStore, Folder, StoredFile};
use crate::models::{Actor, Appointment, AppointmentView, VisitNotes, VisitReport, NOT_APPLICABLE};

/// Read stored visit notes. Only a JSON object with `specimenTypes` counts
/// as a structured report; anything else is shown verbatim.
pub fn parse_visit_notes(raw: &str) -> VisitNotes {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return VisitNotes::Empty;
    }
    let looks_structured = serde_json::from_str::<serde_json::Value>(trimmed)
        .map(|v| v.get("specimenTypes").is_some())
        .unwrap_or(false);
    if looks_structured {
        match serde_json::from_str::<VisitReport>(trimmed) {
            Ok(report) => return VisitNotes::Structured(report),
            Err(e) => tracing::warn!(error = %e, "Visit report JSON has unexpected shape, showing raw text"),
        }
    }
    VisitNotes::Unstructured(raw.to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub appointment: AppointmentView,
    pub notes: VisitNotes,
}

/// The appointment with its visit notes parsed for the report editor.
pub fn get_report(store: &dyn RecordStore, position: u32) -> Result<ReportView, WorkflowError> {
    let appointment = repository::get_appointment(store, position)?;
    let notes = parse_visit_notes(&appointment.visit_notes);
    Ok(ReportView {
        appointment: appointment.into(),
        notes,
    })
}

fn to_json(report: &VisitReport) -> Result<String, WorkflowError> {
    serde_json::to_string(report).map_err(|e| WorkflowError::Render(format!("Report encoding: {e}")))
}

/// Save the report as JSON in the visit-notes cell.
pub fn save_report(
    store: &dyn RecordStore,
    actor: &Actor,
    position: u32,
    report: &VisitReport,
) -> Result<(), WorkflowError> {
    repository::get_appointment(store, position)?;
    repository::update_visit_notes(store, position, &to_json(report)?)?;
    tracing::info!(position, status = %report.report_status, actor = %actor.email, "Visit report saved");

    audit::record(
        store,
        &actor.email,
        actions::SAVED_REPORT,
        format!("Saved visit report for appointment row {position}."),
    )
}

/// `Report-Jane_Doe-12.pdf`
pub fn report_file_name(patient_name: &str, position: u32) -> String {
    let name: String = patient_name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("Report-{name}-{position}.pdf")
}

/// Render the PDF, store it, then write its link and the report JSON back
/// onto the row in one write. Any failure before that write leaves the row
/// untouched; a stored PDF whose link could not be written stays orphaned.
pub fn generate_report(
    store: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    actor: &Actor,
    business_name: &str,
    position: u32,
    report: &VisitReport,
) -> Result<StoredFile, WorkflowError> {
    let appointment = repository::get_appointment(store, position)?;
    let json = to_json(report)?;
    let pdf = render_report_pdf(business_name, &appointment, report)?;

    let file_name = report_file_name(&appointment.name, position);
    let stored = attachments.upload(&pdf, &file_name, Folder::Reports)?;
    repository::update_report(store, position, &stored.link, &json)?;
    tracing::info!(position, file = %stored.id, size = pdf.len(), "Report generated");

    audit::record(
        store,
        &actor.email,
        actions::GENERATED_REPORT,
        format!("Generated report {} for appointment row {position}.", stored.id),
    )?;
    Ok(stored)
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        NOT_APPLICABLE
    } else {
        value
    }
}

fn joined_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "None".into()
    } else {
        items.join(", ")
    }
}

/// Single A4 page: patient block, visit/specimen block, signature block.
pub fn render_report_pdf(
    business_name: &str,
    appointment: &Appointment,
    report: &VisitReport,
) -> Result<Vec<u8>, WorkflowError> {
    let title = format!("{business_name} - Phlebotomist Report");
    let (doc, page1, layer1) = PdfDocument::new(&title, Mm(210.0), Mm(297.0), "Layer 1");
    let layer = doc.get_page(page1).get_layer(layer1);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| WorkflowError::Render(format!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| WorkflowError::Render(format!("PDF font error: {e}")))?;

    let mut y = Mm(280.0);
    layer.use_text(&title, 16.0, Mm(20.0), y, &bold);
    y -= Mm(14.0);

    layer.use_text("Patient Information", 13.0, Mm(20.0), y, &bold);
    y -= Mm(7.0);
    for line in [
        format!("Name: {}", appointment.name),
        format!("Date of Birth: {}", or_na(&appointment.date_of_birth)),
        format!("Email: {}", or_na(&appointment.email)),
        format!("Phone: {}", or_na(&appointment.phone)),
        format!("Address: {}", or_na(&appointment.address)),
    ] {
        layer.use_text(&line, 10.0, Mm(20.0), y, &font);
        y -= Mm(5.5);
    }
    y -= Mm(6.0);

    layer.use_text("Visit & Specimen Details", 13.0, Mm(20.0), y, &bold);
    y -= Mm(7.0);
    let visit_lines = [
        format!("Service: {}", appointment.service),
        format!("Appointment: {}", or_na(&appointment.requested_date)),
        format!("Ordering Physician: {}", or_na(&report.ordering_physician)),
        format!("Physician Address: {}", or_na(&report.physician_address)),
        format!("Specimens Collected: {}", joined_or_none(&report.collected_specimens())),
        format!("Transported To: {}", joined_or_none(&report.destinations())),
        format!(
            "Date/Time Transported: {} at {}",
            or_na(&report.date_transported),
            or_na(&report.time_transported)
        ),
        format!("Received By: {}", or_na(&report.received_by)),
    ];
    for line in &visit_lines {
        for wrapped in wrap_text(line, 90) {
            layer.use_text(&wrapped, 10.0, Mm(20.0), y, &font);
            y -= Mm(5.5);
        }
    }
    y -= Mm(3.0);
    layer.use_text("Notes:", 10.0, Mm(20.0), y, &bold);
    y -= Mm(5.5);
    for wrapped in wrap_text(or_na(&report.notes), 90) {
        layer.use_text(&wrapped, 10.0, Mm(20.0), y, &font);
        y -= Mm(5.0);
    }
    y -= Mm(6.0);

    let has_emergency_contact = !report.emergency_contact_name.trim().is_empty();
    if has_emergency_contact {
        layer.use_text("Emergency Contact", 13.0, Mm(20.0), y, &bold);
        y -= Mm(7.0);
        for line in [
            format!(
                "{} ({})",
                report.emergency_contact_name,
                or_na(&report.emergency_contact_relationship)
            ),
            format!(
                "Home: {}   Mobile: {}",
                or_na(&report.emergency_contact_home_phone),
                or_na(&report.emergency_contact_mobile)
            ),
        ] {
            layer.use_text(&line, 10.0, Mm(20.0), y, &font);
            y -= Mm(5.5);
        }
        y -= Mm(6.0);
    }

    layer.use_text("Phlebotomist Signature", 13.0, Mm(20.0), y, &bold);
    y -= Mm(7.0);
    layer.use_text(or_na(&report.phlebotomist_signature), 11.0, Mm(20.0), y, &font);
    y -= Mm(6.0);
    layer.use_text(
        format!("Report status: {}", report.report_status),
        9.0,
        Mm(20.0),
        y,
        &font,
    );

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| WorkflowError::Render(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| WorkflowError::Render(format!("PDF buffer error: {e}")))
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_appointment, list_audit_entries, sample_new_appointment};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::db::{CellRange, DatabaseError, Sheet, SheetRow, SqliteRecordStore};
    use crate::integrations::fakes::MemoryAttachmentStore;
    use crate::models::{ReportStatus, UserRole};

    fn staff() -> Actor {
        Actor {
            email: "staff@clinic.com".into(),
            role: UserRole::Staff,
        }
    }

    fn filled_report() -> VisitReport {
        let mut report = VisitReport {
            ordering_physician: "Dr. Rolle".into(),
            notes: "Fasting 12h".into(),
            phlebotomist_signature: "K. Smith".into(),
            report_status: ReportStatus::Completed,
            ..Default::default()
        };
        report.specimen_types.insert("Blood".into(), true);
        report.transported_to.insert("CHL".into(), true);
        report
    }

    #[test]
    fn blank_notes_are_empty() {
        assert_eq!(parse_visit_notes("  "), VisitNotes::Empty);
    }

    #[test]
    fn free_text_stays_unstructured() {
        assert_eq!(
            parse_visit_notes("Patient was nervous"),
            VisitNotes::Unstructured("Patient was nervous".into())
        );
    }

    #[test]
    fn malformed_json_falls_back_to_text() {
        let raw = r#"{"specimenTypes": {"Blood": tru"#;
        assert_eq!(parse_visit_notes(raw), VisitNotes::Unstructured(raw.into()));
    }

    #[test]
    fn json_without_specimens_is_unstructured() {
        let raw = r#"{"notes":"hello"}"#;
        assert!(matches!(parse_visit_notes(raw), VisitNotes::Unstructured(_)));
    }

    #[test]
    fn wrong_typed_report_falls_back_to_text() {
        let raw = r#"{"specimenTypes": "Blood"}"#;
        assert!(matches!(parse_visit_notes(raw), VisitNotes::Unstructured(_)));
    }

    #[test]
    fn stored_report_parses_structured() {
        let json = serde_json::to_string(&filled_report()).unwrap();
        match parse_visit_notes(&json) {
            VisitNotes::Structured(report) => assert_eq!(report, filled_report()),
            other => panic!("expected structured report, got {other:?}"),
        }
    }

    #[test]
    fn file_name_underscores_spaces() {
        assert_eq!(report_file_name("Jane  Q Doe", 12), "Report-Jane__Q_Doe-12.pdf");
    }

    #[test]
    fn pdf_renders() {
        let appt = crate::models::sample_appointment(3);
        let bytes = render_report_pdf("Health Wise", &appt, &filled_report()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn wrap_text_splits_long_lines() {
        let lines = wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn save_report_writes_json_and_audits() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let pos = insert_appointment(&store, &sample_new_appointment("Jane Doe", "j@x.com"), "ts").unwrap();

        save_report(&store, &staff(), pos, &filled_report()).unwrap();
        let view = get_report(&store, pos).unwrap();
        assert_eq!(view.notes, VisitNotes::Structured(filled_report()));
        assert_eq!(list_audit_entries(&store).unwrap()[0].action, "Saved Visit Report");
    }

    #[test]
    fn generate_report_uploads_and_links() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let files = MemoryAttachmentStore::default();
        let pos = insert_appointment(&store, &sample_new_appointment("Jane Doe", "j@x.com"), "ts").unwrap();

        let stored = generate_report(&store, &files, &staff(), "Health Wise", pos, &filled_report()).unwrap();
        assert_eq!(stored.id, format!("Report-Jane_Doe-{pos}.pdf"));
        assert!(files.get(Folder::Reports, &stored.id).unwrap().starts_with(b"%PDF"));

        let appt = repository::get_appointment(&store, pos).unwrap();
        assert_eq!(appt.report_link, stored.link);
        assert!(matches!(parse_visit_notes(&appt.visit_notes), VisitNotes::Structured(_)));
        assert_eq!(list_audit_entries(&store).unwrap()[0].action, "Generated Report");
    }

    /// Counts row writes so tests can check a workflow lands in one write.
    struct CountingStore {
        inner: SqliteRecordStore,
        row_writes: AtomicUsize,
    }

    impl RecordStore for CountingStore {
        fn read_rows(&self, sheet: Sheet) -> Result<Vec<SheetRow>, DatabaseError> {
            self.inner.read_rows(sheet)
        }

        fn read_row(
            &self,
            sheet: Sheet,
            position: u32,
        ) -> Result<Option<SheetRow>, DatabaseError> {
            self.inner.read_row(sheet, position)
        }

        fn append_row(&self, sheet: Sheet, cells: &[String]) -> Result<u32, DatabaseError> {
            self.inner.append_row(sheet, cells)
        }

        fn append_row_redeeming(
            &self,
            sheet: Sheet,
            cells: &[String],
            order_id: &str,
        ) -> Result<u32, DatabaseError> {
            self.inner.append_row_redeeming(sheet, cells, order_id)
        }

        fn update_row(
            &self,
            sheet: Sheet,
            position: u32,
            ranges: &[CellRange],
        ) -> Result<(), DatabaseError> {
            if sheet == Sheet::Appointments {
                self.row_writes.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.update_row(sheet, position, ranges)
        }
    }

    #[test]
    fn generate_report_writes_link_and_notes_together() {
        let store = CountingStore {
            inner: SqliteRecordStore::in_memory().unwrap(),
            row_writes: Default::default(),
        };
        let pos = insert_appointment(&store, &sample_new_appointment("Jane Doe", "j@x.com"), "ts").unwrap();

        let stored = generate_report(
            &store,
            &MemoryAttachmentStore::default(),
            &staff(),
            "Health Wise",
            pos,
            &filled_report(),
        )
        .unwrap();
        assert_eq!(store.row_writes.load(Ordering::SeqCst), 1);
        let appt = repository::get_appointment(&store, pos).unwrap();
        assert_eq!(appt.report_link, stored.link);
        assert!(matches!(parse_visit_notes(&appt.visit_notes), VisitNotes::Structured(_)));
    }

    #[test]
    fn failed_upload_leaves_row_untouched() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let pos = insert_appointment(&store, &sample_new_appointment("Jane Doe", "j@x.com"), "ts").unwrap();

        let err = generate_report(
            &store,
            &MemoryAttachmentStore::failing(),
            &staff(),
            "Health Wise",
            pos,
            &filled_report(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Integration(_)));
        let appt = repository::get_appointment(&store, pos).unwrap();
        assert_eq!(appt.report_link, "");
        assert_eq!(appt.visit_notes, "");
        assert!(list_audit_entries(&store).unwrap().is_empty());
    }
}
