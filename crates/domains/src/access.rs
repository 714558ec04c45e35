//! # Access Rules
//!
//! Write capability on the report collection. Adapters consult the policy
//! before every write and answer `StoreError::PermissionDenied` on refusal.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::models::Principal;

/// Kind of write attempted against the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Any authenticated principal may create, update and delete.
    #[default]
    Open,
    /// Anyone may create; only staff principals may update or delete.
    Staff,
    /// Every write is refused.
    ReadOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    pub mode: AccessMode,
    pub staff: BTreeSet<Principal>,
}

impl AccessPolicy {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            mode: AccessMode::ReadOnly,
            staff: BTreeSet::new(),
        }
    }

    pub fn staff<I: IntoIterator<Item = Principal>>(staff: I) -> Self {
        Self {
            mode: AccessMode::Staff,
            staff: staff.into_iter().collect(),
        }
    }

    pub fn check(&self, actor: &Principal, op: OperationKind) -> Result<(), StoreError> {
        let allowed = match (self.mode, op) {
            (AccessMode::Open, _) => true,
            (AccessMode::Staff, OperationKind::Create) => true,
            (AccessMode::Staff, _) => self.staff.contains(actor),
            (AccessMode::ReadOnly, _) => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied(format!(
                "principal '{actor}' may not {op} reports"
            )))
        }
    }
}
