//! # Report Desk Binary
//!
//! Assembles the application from configuration: picks the document and
//! media backends, wires the lifecycle service and serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api_adapters::{build_router, AppState, HttpConfig, Metrics};
use auth_adapters::AnonymousAuthProvider;
use configs::{DocumentBackend, LogFormat, LoggingSettings, MediaBackend, Settings};
use domains::{IdentityProvider, ObjectStorage, ReportRepository};
use services::{run_diagnostics_logger, DiagnosticsBus, ErrorClassifier, ReportService};
use storage_adapters::{InMemoryMediaStore, InMemoryReportRepository, LocalMediaStore};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.logging);
    tracing::info!(
        app_id = %settings.tenant.app_id,
        documents = ?settings.storage.document_backend,
        media = ?settings.storage.media_backend,
        "settings loaded"
    );

    // --- Event bus ---
    let bus = Arc::new(DiagnosticsBus::default());
    let logger = tokio::spawn(run_diagnostics_logger(bus.subscribe()));

    // --- Adapters ---
    let repo = build_repository(&settings).await?;
    let (media, media_dir) = build_media_store(&settings).await?;
    let signing_key = settings.auth.jwt_secret.as_ref().context("auth.jwt_secret is not set")?;
    let identity: Arc<dyn IdentityProvider> = Arc::new(AnonymousAuthProvider::new(
        signing_key,
        chrono::Duration::minutes(settings.auth.session_ttl_mins),
    ));

    // --- Services ---
    let mut service = ReportService::new(
        repo,
        media,
        settings.policy.attachment_policy(),
        ErrorClassifier::new(Arc::clone(&bus)),
    );
    if let Some(limit) = settings.pipeline.stage_timeout() {
        service = service.with_stage_timeout(limit);
    }

    let metrics = Arc::new(Metrics::new());
    let counter = tokio::spawn(api_adapters::metrics::count_permission_denials(
        Arc::clone(&metrics),
        bus.subscribe(),
    ));

    // --- Router ---
    let state = AppState::new(Arc::new(service), identity, metrics);
    let http = HttpConfig {
        cors_origins: settings.server.cors_origins.clone(),
        request_timeout: Duration::from_secs(settings.server.request_timeout_secs),
        media_dir,
    };
    let app = build_router(state, &http);

    // --- Serve ---
    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "report desk listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    logger.abort();
    counter.abort();
    tracing::info!("report desk stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_repository(settings: &Settings) -> anyhow::Result<Arc<dyn ReportRepository>> {
    let access = settings.access.access_policy();
    match settings.storage.document_backend {
        DocumentBackend::Memory => Ok(Arc::new(InMemoryReportRepository::new(&settings.tenant.app_id, access))),
        #[cfg(feature = "db-sqlite")]
        DocumentBackend::Sqlite => {
            let repo = storage_adapters::SqliteReportRepository::connect(
                &settings.storage.database_url,
                &settings.tenant.app_id,
                access,
            )
            .await
            .context("opening sqlite report store")?;
            Ok(Arc::new(repo))
        }
        #[cfg(not(feature = "db-sqlite"))]
        DocumentBackend::Sqlite => anyhow::bail!("document_backend = sqlite requires the `db-sqlite` feature"),
    }
}

async fn build_media_store(settings: &Settings) -> anyhow::Result<(Arc<dyn ObjectStorage>, Option<PathBuf>)> {
    let storage = &settings.storage;
    match storage.media_backend {
        MediaBackend::Local => {
            let root = PathBuf::from(&storage.media_root);
            tokio::fs::create_dir_all(&root)
                .await
                .with_context(|| format!("creating media root {}", root.display()))?;
            let store = LocalMediaStore::new(root.clone(), storage.public_base_url.clone());
            Ok((Arc::new(store), Some(root)))
        }
        MediaBackend::Memory => Ok((Arc::new(InMemoryMediaStore::new(storage.public_base_url.clone())), None)),
        #[cfg(feature = "media-s3")]
        MediaBackend::S3 => {
            let bucket = storage.s3_bucket.clone().context("storage.s3_bucket is not set")?;
            let store =
                storage_adapters::S3MediaStore::from_env(bucket, storage.s3_region.clone(), storage.public_base_url.clone())
                    .await;
            Ok((Arc::new(store), None))
        }
        #[cfg(not(feature = "media-s3"))]
        MediaBackend::S3 => anyhow::bail!("media_backend = s3 requires the `media-s3` feature"),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
