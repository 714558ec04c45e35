//! # Domain Models
//!
//! These structs represent the error reports filed by field technicians.
//! We use UUID v7 for time-ordered, globally unique identification.
//! JSON field names follow the document collection's camelCase schema.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned report identifier.
pub type ReportId = Uuid;

/// Triage state of a report. Exactly two values; toggling flips between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Open,
    Concluded,
}

impl ReportStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Open => Self::Concluded,
            Self::Concluded => Self::Open,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Concluded => "concluded",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "open" => Ok(Self::Open),
            "concluded" => Ok(Self::Concluded),
            other => Err(format!("unknown report status '{other}'")),
        }
    }
}

/// Answer to "was the database saved on the PC?" in attestation deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attestation {
    #[serde(rename = "sim")]
    Yes,
    #[serde(rename = "não")]
    No,
}

impl Attestation {
    /// Accepts the form values `sim` / `não` (and the unaccented `nao`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sim" => Some(Self::Yes),
            "não" | "nao" => Some(Self::No),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "sim",
            Self::No => "não",
        }
    }
}

/// Which schema the second attachment slot uses in this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMode {
    /// A free-form zip/rar upload stored as `zipUrl`.
    #[default]
    Archive,
    /// A fixed yes/no question stored as `databaseSavedOnPC`.
    Attestation,
}

/// The second attachment slot of a stored report. Only one variant is ever
/// present on a document, keyed by its own field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveRecord {
    #[serde(rename = "zipUrl")]
    ZipUrl(Option<String>),
    #[serde(rename = "databaseSavedOnPC")]
    DatabaseSavedOnPc(Attestation),
}

impl ArchiveRecord {
    pub fn zip_url(&self) -> Option<&str> {
        match self {
            Self::ZipUrl(url) => url.as_deref(),
            Self::DatabaseSavedOnPc(_) => None,
        }
    }
}

/// Opaque identifier of an authenticated (possibly anonymous) principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A committed error report as stored in the document collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ReportId,
    pub client_name: String,
    pub technician_name: String,
    /// Date the error happened, as given by the technician (`YYYY-MM-DD`).
    pub error_date: NaiveDate,
    /// Kept verbatim, whitespace included.
    pub report_text: String,
    pub media_url: Option<String>,
    #[serde(flatten)]
    pub archive: ArchiveRecord,
    pub reported_by_user_id: String,
    /// Assigned by the store at write time; the listing sort key.
    pub generated_at: DateTime<Utc>,
    pub status: ReportStatus,
}

/// Everything the store needs to create a report. `id`, `generated_at` and
/// `status` are server-assigned and therefore absent here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub client_name: String,
    pub technician_name: String,
    pub error_date: NaiveDate,
    pub report_text: String,
    pub media_url: Option<String>,
    #[serde(flatten)]
    pub archive: ArchiveRecord,
    pub reported_by_user_id: String,
}

impl NewReport {
    /// Materializes the stored document once the store has assigned its fields.
    pub fn into_report(self, id: ReportId, generated_at: DateTime<Utc>) -> Report {
        Report {
            id,
            client_name: self.client_name,
            technician_name: self.technician_name,
            error_date: self.error_date,
            report_text: self.report_text,
            media_url: self.media_url,
            archive: self.archive,
            reported_by_user_id: self.reported_by_user_id,
            generated_at,
            status: ReportStatus::Open,
        }
    }
}

/// Partial update. Only `Some` fields are written; everything else is untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
}

impl ReportPatch {
    pub fn status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.client_name.is_none()
            && self.technician_name.is_none()
            && self.error_date.is_none()
            && self.report_text.is_none()
            && self.status.is_none()
    }

    pub fn apply_to(&self, report: &mut Report) {
        if let Some(v) = &self.client_name {
            report.client_name = v.clone();
        }
        if let Some(v) = &self.technician_name {
            report.technician_name = v.clone();
        }
        if let Some(v) = self.error_date {
            report.error_date = v;
        }
        if let Some(v) = &self.report_text {
            report.report_text = v.clone();
        }
        if let Some(v) = self.status {
            report.status = v;
        }
    }

    /// The attempted write as a JSON document, for diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A raw file as received from the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    /// Declared content type, e.g. `image/png`.
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The submission form exactly as posted. Every field may be missing.
#[derive(Debug, Clone, Default)]
pub struct ReportSubmission {
    pub client_name: Option<String>,
    pub technician_name: Option<String>,
    pub error_date: Option<String>,
    pub report_text: Option<String>,
    pub media_file: Option<FileUpload>,
    pub zip_file: Option<FileUpload>,
    pub database_saved_on_pc: Option<String>,
}

/// A raw edit request from the list view. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEdit {
    pub client_name: Option<String>,
    pub technician_name: Option<String>,
    pub error_date: Option<String>,
    pub report_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        NewReport {
            client_name: "Acme".into(),
            technician_name: "Jo".into(),
            error_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            report_text: "disk full\n  twice".into(),
            media_url: None,
            archive: ArchiveRecord::ZipUrl(None),
            reported_by_user_id: "anon-1".into(),
        }
        .into_report(Uuid::now_v7(), Utc::now())
    }

    #[test]
    fn status_toggles_between_two_values() {
        assert_eq!(ReportStatus::Open.toggled(), ReportStatus::Concluded);
        assert_eq!(ReportStatus::Concluded.toggled(), ReportStatus::Open);
        assert_eq!("concluded".parse::<ReportStatus>().unwrap(), ReportStatus::Concluded);
        assert!("closed".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn report_serializes_with_document_field_names() {
        let report = sample();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["clientName"], "Acme");
        assert_eq!(json["errorDate"], "2024-01-05");
        assert_eq!(json["status"], "open");
        assert!(json["mediaUrl"].is_null());
        assert!(json.as_object().unwrap().contains_key("zipUrl"));
        assert!(!json.as_object().unwrap().contains_key("databaseSavedOnPC"));
    }

    #[test]
    fn attestation_variant_replaces_zip_url() {
        let mut report = sample();
        report.archive = ArchiveRecord::DatabaseSavedOnPc(Attestation::No);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["databaseSavedOnPC"], "não");
        assert!(!json.as_object().unwrap().contains_key("zipUrl"));

        let back: Report = serde_json::from_value(json).unwrap();
        assert_eq!(back.archive, ArchiveRecord::DatabaseSavedOnPc(Attestation::No));
    }

    #[test]
    fn patch_touches_only_named_fields() {
        let mut report = sample();
        let before = report.clone();
        ReportPatch::status(ReportStatus::Concluded).apply_to(&mut report);
        assert_eq!(report.status, ReportStatus::Concluded);
        assert_eq!(report.client_name, before.client_name);
        assert_eq!(report.report_text, before.report_text);
        assert_eq!(ReportPatch::status(ReportStatus::Open).to_json(), serde_json::json!({ "status": "open" }));
    }

    #[test]
    fn attestation_parses_form_values() {
        assert_eq!(Attestation::parse(" Sim "), Some(Attestation::Yes));
        assert_eq!(Attestation::parse("não"), Some(Attestation::No));
        assert_eq!(Attestation::parse("nao"), Some(Attestation::No));
        assert_eq!(Attestation::parse(""), None);
    }
}
