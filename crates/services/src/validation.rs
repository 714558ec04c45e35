//! # Report Validation
//!
//! Pure, synchronous checks over a raw submission. Every field is evaluated
//! independently and all violations are returned together.

use chrono::NaiveDate;
use domains::{
    ArchiveMode, Attestation, AttachmentPolicy, FieldErrors, FileUpload, ReportEdit, ReportPatch,
    ReportSubmission, ViolationKind,
};

pub const CLIENT_NAME: &str = "clientName";
pub const TECHNICIAN_NAME: &str = "technicianName";
pub const ERROR_DATE: &str = "errorDate";
pub const REPORT_TEXT: &str = "reportText";
pub const MEDIA_FILE: &str = "mediaFile";
pub const ZIP_FILE: &str = "zipFile";
pub const DATABASE_SAVED_ON_PC: &str = "databaseSavedOnPC";
/// Pseudo-field used when an edit names nothing to change.
pub const EDIT_FIELDS: &str = "fields";

const DATE_FORMAT: &str = "%Y-%m-%d";
const MIB: u64 = 1024 * 1024;

/// Second attachment slot after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedArchive {
    File(Option<FileUpload>),
    Attestation(Attestation),
}

/// A submission that passed every rule. Empty files have been dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedReport {
    pub client_name: String,
    pub technician_name: String,
    pub error_date: NaiveDate,
    pub report_text: String,
    pub media_file: Option<FileUpload>,
    pub archive: ValidatedArchive,
}

#[derive(Debug, Clone, Default)]
pub struct ReportValidator {
    policy: AttachmentPolicy,
}

impl ReportValidator {
    pub fn new(policy: AttachmentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AttachmentPolicy {
        &self.policy
    }

    pub fn validate(&self, input: &ReportSubmission) -> Result<ValidatedReport, FieldErrors> {
        let mut errors = FieldErrors::new();

        // Stored exactly as submitted; whitespace only matters for the blank check.
        let client_name = required(&mut errors, CLIENT_NAME, input.client_name.as_deref(), "Client name is required.")
            .map(str::to_string);
        let technician_name = required(
            &mut errors,
            TECHNICIAN_NAME,
            input.technician_name.as_deref(),
            "Technician name is required.",
        )
        .map(str::to_string);
        let error_date = required(&mut errors, ERROR_DATE, input.error_date.as_deref(), "Error date is required.")
            .and_then(|raw| parse_date(&mut errors, raw));
        let report_text = required(
            &mut errors,
            REPORT_TEXT,
            input.report_text.as_deref(),
            "The detailed report is required.",
        )
        .map(str::to_string);

        let media_file = self.check_file(
            &mut errors,
            MEDIA_FILE,
            input.media_file.as_ref(),
            |ct| self.policy.accepts_media(ct),
            "Only image and video formats are accepted.",
        );

        let archive = match self.policy.archive_mode {
            ArchiveMode::Archive => Some(ValidatedArchive::File(self.check_file(
                &mut errors,
                ZIP_FILE,
                input.zip_file.as_ref(),
                |ct| self.policy.accepts_archive(ct),
                "Only .zip or .rar archives are accepted.",
            ))),
            ArchiveMode::Attestation => {
                match input.database_saved_on_pc.as_deref().and_then(Attestation::parse) {
                    Some(answer) => Some(ValidatedArchive::Attestation(answer)),
                    None => {
                        errors.add(
                            DATABASE_SAVED_ON_PC,
                            ViolationKind::RequiredFieldMissing,
                            "Select whether the database was saved on the PC.",
                        );
                        None
                    }
                }
            }
        };

        match (client_name, technician_name, error_date, report_text, archive) {
            (Some(client_name), Some(technician_name), Some(error_date), Some(report_text), Some(archive))
                if errors.is_empty() =>
            {
                Ok(ValidatedReport {
                    client_name,
                    technician_name,
                    error_date,
                    report_text,
                    media_file,
                    archive,
                })
            }
            _ => Err(errors),
        }
    }

    /// Checks an edit from the list view and turns it into a partial update.
    pub fn validate_edit(&self, edit: &ReportEdit) -> Result<ReportPatch, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut patch = ReportPatch::default();

        if let Some(raw) = edit.client_name.as_deref() {
            patch.client_name =
                required(&mut errors, CLIENT_NAME, Some(raw), "Client name is required.").map(str::to_string);
        }
        if let Some(raw) = edit.technician_name.as_deref() {
            patch.technician_name = required(&mut errors, TECHNICIAN_NAME, Some(raw), "Technician name is required.")
                .map(str::to_string);
        }
        if let Some(raw) = edit.error_date.as_deref() {
            patch.error_date = required(&mut errors, ERROR_DATE, Some(raw), "Error date is required.")
                .and_then(|raw| parse_date(&mut errors, raw));
        }
        if let Some(raw) = edit.report_text.as_deref() {
            patch.report_text =
                required(&mut errors, REPORT_TEXT, Some(raw), "The detailed report is required.").map(str::to_string);
        }

        if errors.is_empty() && patch.is_empty() {
            errors.add(EDIT_FIELDS, ViolationKind::RequiredFieldMissing, "Nothing to update.");
        }
        if errors.is_empty() {
            Ok(patch)
        } else {
            Err(errors)
        }
    }

    fn check_file(
        &self,
        errors: &mut FieldErrors,
        field: &str,
        file: Option<&FileUpload>,
        accepts: impl Fn(&str) -> bool,
        type_message: &str,
    ) -> Option<FileUpload> {
        // An empty file input is the browser's way of saying "no file".
        let file = file.filter(|f| !f.is_empty())?;
        let mut ok = true;
        if file.size() > self.policy.max_file_bytes {
            errors.add(
                field,
                ViolationKind::FileTooLarge,
                format!("The maximum file size is {}.", human_size(self.policy.max_file_bytes)),
            );
            ok = false;
        }
        if !accepts(&file.content_type) {
            errors.add(field, ViolationKind::UnsupportedMediaType, type_message);
            ok = false;
        }
        ok.then(|| file.clone())
    }
}

fn required<'a>(errors: &mut FieldErrors, field: &str, value: Option<&'a str>, message: &str) -> Option<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.add(field, ViolationKind::RequiredFieldMissing, message);
            None
        }
    }
}

fn parse_date(errors: &mut FieldErrors, raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(
                ERROR_DATE,
                ViolationKind::InvalidDate,
                "The error date must be a calendar date (YYYY-MM-DD).",
            );
            None
        }
    }
}

fn human_size(bytes: u64) -> String {
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}
