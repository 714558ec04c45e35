//! Prometheus counters for the submission pipeline and report mutations.

use std::sync::Arc;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use services::PermissionDeniedEvent;
use tokio::sync::broadcast;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SubmissionLabels {
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MutationLabels {
    pub kind: String,
    pub outcome: String,
}

pub struct Metrics {
    registry: Registry,
    submissions: Family<SubmissionLabels, Counter>,
    mutations: Family<MutationLabels, Counter>,
    permission_denials: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("report_desk");
        let submissions = Family::<SubmissionLabels, Counter>::default();
        let mutations = Family::<MutationLabels, Counter>::default();
        let permission_denials = Counter::default();

        registry.register("submissions", "Report submissions by outcome", submissions.clone());
        registry.register("mutations", "Report mutations by kind and outcome", mutations.clone());
        registry.register(
            "permission_denials",
            "Writes refused by the store's access rules",
            permission_denials.clone(),
        );

        Self {
            registry,
            submissions,
            mutations,
            permission_denials,
        }
    }

    pub fn record_submission(&self, outcome: &str) {
        self.submissions
            .get_or_create(&SubmissionLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_mutation(&self, kind: &str, outcome: &str) {
        self.mutations
            .get_or_create(&MutationLabels {
                kind: kind.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn permission_denials(&self) -> u64 {
        self.permission_denials.get()
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts every permission denial published on the diagnostics bus.
pub async fn count_permission_denials(metrics: Arc<Metrics>, mut rx: broadcast::Receiver<PermissionDeniedEvent>) {
    loop {
        match rx.recv().await {
            Ok(_) => {
                metrics.permission_denials.inc();
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                metrics.permission_denials.inc_by(skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
