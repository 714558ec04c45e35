//! # Attachment Policy
//!
//! File-size ceilings and content-type allow-lists. These are the only place
//! the numbers live; configuration selects a profile and may override the
//! ceiling.

use serde::{Deserialize, Serialize};

use crate::models::ArchiveMode;

/// Ceiling for the standard deployment profile (100 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;

/// Ceiling for constrained deployments (1 MiB).
pub const COMPACT_MAX_FILE_BYTES: u64 = 1024 * 1024;

pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
    "video/mp4",
    "video/quicktime",
    "video/webm",
];

pub const ACCEPTED_ARCHIVE_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/vnd.rar",
    "application/x-rar-compressed",
];

/// Storage folder tag for the media slot.
pub const MEDIA_FOLDER: &str = "midia";

/// Storage folder tag for the archive slot.
pub const ARCHIVE_FOLDER: &str = "banco_de_dados";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyProfile {
    #[default]
    Standard,
    Compact,
}

impl PolicyProfile {
    pub fn max_file_bytes(self) -> u64 {
        match self {
            Self::Standard => DEFAULT_MAX_FILE_BYTES,
            Self::Compact => COMPACT_MAX_FILE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_file_bytes: u64,
    pub media_types: Vec<String>,
    pub archive_types: Vec<String>,
    pub archive_mode: ArchiveMode,
}

impl AttachmentPolicy {
    pub fn for_profile(profile: PolicyProfile, archive_mode: ArchiveMode) -> Self {
        Self {
            max_file_bytes: profile.max_file_bytes(),
            media_types: ACCEPTED_MEDIA_TYPES.iter().map(|s| s.to_string()).collect(),
            archive_types: ACCEPTED_ARCHIVE_TYPES.iter().map(|s| s.to_string()).collect(),
            archive_mode,
        }
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn accepts_media(&self, content_type: &str) -> bool {
        type_in(&self.media_types, content_type)
    }

    pub fn accepts_archive(&self, content_type: &str) -> bool {
        type_in(&self.archive_types, content_type)
    }
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self::for_profile(PolicyProfile::Standard, ArchiveMode::Archive)
    }
}

/// Compares the essence (`type/subtype`) only, so `image/png; charset=x` still matches.
fn type_in(list: &[String], content_type: &str) -> bool {
    let Ok(parsed) = content_type.trim().parse::<mime::Mime>() else {
        return false;
    };
    let essence = parsed.essence_str();
    list.iter().any(|allowed| allowed.eq_ignore_ascii_case(essence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_pick_named_ceilings() {
        assert_eq!(PolicyProfile::Standard.max_file_bytes(), DEFAULT_MAX_FILE_BYTES);
        assert_eq!(PolicyProfile::Compact.max_file_bytes(), COMPACT_MAX_FILE_BYTES);
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        let policy = AttachmentPolicy::default();
        assert!(policy.accepts_media("image/png"));
        assert!(policy.accepts_media("IMAGE/PNG"));
        assert!(policy.accepts_media("video/mp4; codecs=avc1"));
        assert!(!policy.accepts_media("application/zip"));
        assert!(policy.accepts_archive("application/x-zip-compressed"));
        assert!(!policy.accepts_archive("not a mime"));
    }
}
