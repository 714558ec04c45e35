//! Adapters behind the `ReportRepository` and `ObjectStorage` ports.
//!
//! In-memory and local-filesystem adapters are always compiled; SQLite and S3
//! sit behind the `db-sqlite` and `media-s3` features.

pub mod media_local;
pub mod media_memory;
pub mod memory;

#[cfg(feature = "db-sqlite")]
pub mod sqlite;

#[cfg(feature = "media-s3")]
pub mod s3;

pub use media_local::LocalMediaStore;
pub use media_memory::InMemoryMediaStore;
pub use memory::InMemoryReportRepository;

#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteReportRepository;

#[cfg(feature = "media-s3")]
pub use s3::S3MediaStore;

/// `artifacts/{app_id}/public/data/error_reports`
pub fn collection_path(app_id: &str) -> String {
    format!("artifacts/{app_id}/public/data/error_reports")
}
