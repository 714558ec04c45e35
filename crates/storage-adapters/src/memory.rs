//! In-process report collection.
//!
//! Writes are serialized by one mutex and the live query is republished while
//! the lock is still held, so subscribers see snapshots in commit order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domains::{
    AccessPolicy, LiveQueryHub, MonotonicClock, NewReport, OperationKind, Principal, Report, ReportId, ReportPatch,
    ReportRepository, ReportSubscription, StoreError,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::collection_path;

pub struct InMemoryReportRepository {
    reports: Mutex<BTreeMap<ReportId, Report>>,
    hub: LiveQueryHub,
    clock: MonotonicClock,
    policy: AccessPolicy,
    app_id: String,
    available: AtomicBool,
}

impl InMemoryReportRepository {
    pub fn new(app_id: impl Into<String>, policy: AccessPolicy) -> Self {
        Self {
            reports: Mutex::new(BTreeMap::new()),
            hub: LiveQueryHub::default(),
            clock: MonotonicClock::new(),
            policy,
            app_id: app_id.into(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the backend going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub async fn len(&self) -> usize {
        self.reports.lock().await.len()
    }

    pub async fn get(&self, id: ReportId) -> Option<Report> {
        self.reports.lock().await.get(&id).cloned()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("report store is unavailable".into()))
        }
    }

    fn republish(&self, reports: &BTreeMap<ReportId, Report>) {
        self.hub.publish(reports.values().cloned().collect());
    }
}

#[async_trait]
impl ReportRepository for InMemoryReportRepository {
    async fn create(&self, actor: &Principal, report: NewReport) -> Result<ReportId, StoreError> {
        self.policy.check(actor, OperationKind::Create)?;
        self.ensure_available()?;

        let mut reports = self.reports.lock().await;
        let id = Uuid::now_v7();
        reports.insert(id, report.into_report(id, self.clock.now()));
        self.republish(&reports);
        tracing::debug!(report_id = %id, total = reports.len(), "report stored");
        Ok(id)
    }

    async fn patch(&self, actor: &Principal, id: ReportId, patch: ReportPatch) -> Result<Report, StoreError> {
        self.policy.check(actor, OperationKind::Update)?;
        self.ensure_available()?;

        let mut reports = self.reports.lock().await;
        let report = reports.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply_to(report);
        let updated = report.clone();
        self.republish(&reports);
        Ok(updated)
    }

    async fn delete(&self, actor: &Principal, id: ReportId) -> Result<(), StoreError> {
        self.policy.check(actor, OperationKind::Delete)?;
        self.ensure_available()?;

        let mut reports = self.reports.lock().await;
        reports.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.republish(&reports);
        Ok(())
    }

    fn subscribe(&self) -> ReportSubscription {
        self.hub.subscribe()
    }

    fn collection_path(&self) -> String {
        collection_path(&self.app_id)
    }
}
