//! Permission-denial classification and the process-wide diagnostics bus.
//!
//! [`ErrorClassifier`] sorts store failures into [`ClassifiedError`]s. Access
//! denials are additionally published on the [`DiagnosticsBus`] so that any
//! number of listeners (log sink, SSE stream, metrics) observe them without
//! the failing call site knowing about it. The caller's own error path is
//! unchanged either way.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{DomainError, OperationKind, Principal, ReportId, StoreError};
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// PermissionDeniedEvent
// ---------------------------------------------------------------------------

/// A write that the store refused for access-control reasons.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDeniedEvent {
    /// Document or collection path the write targeted.
    pub path: String,
    pub operation: OperationKind,
    /// The data that was attempted, for creates and updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_resource_data: Option<serde_json::Value>,
    pub principal: Principal,
    /// The store's own message.
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// What the classifier needs to know about the failed call.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub path: String,
    pub operation: OperationKind,
    pub principal: Principal,
    pub data: Option<serde_json::Value>,
}

impl OperationContext {
    pub fn new(path: impl Into<String>, operation: OperationKind, principal: &Principal) -> Self {
        Self {
            path: path.into(),
            operation,
            principal: principal.clone(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedError {
    PermissionDenied(PermissionDeniedEvent),
    NotFound(ReportId),
    Persistence(String),
}

impl From<ClassifiedError> for DomainError {
    fn from(value: ClassifiedError) -> Self {
        match value {
            ClassifiedError::PermissionDenied(event) => DomainError::PermissionDenied(event.message),
            ClassifiedError::NotFound(id) => DomainError::NotFound(id),
            ClassifiedError::Persistence(msg) => DomainError::Persistence(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// DiagnosticsBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out channel for [`PermissionDeniedEvent`]s.
///
/// Slow receivers that fall more than the capacity behind observe
/// `RecvError::Lagged` and skip ahead.
pub struct DiagnosticsBus {
    sender: broadcast::Sender<PermissionDeniedEvent>,
}

impl DiagnosticsBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes to all current subscribers; dropped when nobody listens.
    pub fn publish(&self, event: PermissionDeniedEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PermissionDeniedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DiagnosticsBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// ErrorClassifier
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ErrorClassifier {
    bus: Arc<DiagnosticsBus>,
}

impl ErrorClassifier {
    pub fn new(bus: Arc<DiagnosticsBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<DiagnosticsBus> {
        &self.bus
    }

    pub fn classify(&self, failure: StoreError, context: OperationContext) -> ClassifiedError {
        match failure {
            StoreError::PermissionDenied(message) => {
                let event = PermissionDeniedEvent {
                    path: context.path,
                    operation: context.operation,
                    // deletes carry no payload
                    request_resource_data: match context.operation {
                        OperationKind::Delete => None,
                        _ => context.data,
                    },
                    principal: context.principal,
                    message,
                    occurred_at: Utc::now(),
                };
                tracing::warn!(
                    path = %event.path,
                    operation = %event.operation,
                    principal = %event.principal,
                    "write refused by access rules"
                );
                self.bus.publish(event.clone());
                ClassifiedError::PermissionDenied(event)
            }
            StoreError::NotFound(id) => ClassifiedError::NotFound(id),
            StoreError::Unavailable(msg) => ClassifiedError::Persistence(msg),
        }
    }
}

/// Drains a bus receiver into the log until the bus is dropped.
pub async fn run_diagnostics_logger(mut rx: broadcast::Receiver<PermissionDeniedEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::warn!(
                target: "diagnostics",
                path = %event.path,
                operation = %event.operation,
                principal = %event.principal,
                data = ?event.request_resource_data,
                message = %event.message,
                "permission denied"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(target: "diagnostics", skipped, "diagnostics logger lagged")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
