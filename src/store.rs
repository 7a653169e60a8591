//! Record store and directory seams.
//!
//! The lifecycle controller and the visibility filter only talk to these
//! traits. `db_storage` implements them on Postgres and `memory` in process.
use crate::models::{NewOperation, OperationRecord, Status};
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Single field-equality predicate over `ccb_operations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEq {
    Status(Status),
    AwaitingPouch(bool),
    PendingRegularization(bool),
    Branch(String),
    Owner(Uuid),
}

impl FieldEq {
    /// Column the predicate applies to.
    pub fn column(&self) -> &'static str {
        match self {
            FieldEq::Status(_) => "status",
            FieldEq::AwaitingPouch(_) => "pendente_malote",
            FieldEq::PendingRegularization(_) => "pendencia_regularizacao",
            FieldEq::Branch(_) => "pa",
            FieldEq::Owner(_) => "user_id",
        }
    }

    pub fn matches(&self, record: &OperationRecord) -> bool {
        match self {
            FieldEq::Status(status) => record.status == *status,
            FieldEq::AwaitingPouch(flag) => record.pendente_malote == *flag,
            FieldEq::PendingRegularization(flag) => record.pendencia_regularizacao == *flag,
            FieldEq::Branch(pa) => record.pa == *pa,
            FieldEq::Owner(owner) => record.user_id == *owner,
        }
    }
}

/// Conjunction of field equalities. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreFilter {
    clauses: Vec<FieldEq>,
}

impl StoreFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(clause: FieldEq) -> Self {
        Self {
            clauses: vec![clause],
        }
    }

    /// Adds one more clause to the conjunction.
    pub fn and(mut self, clause: FieldEq) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[FieldEq] {
        &self.clauses
    }

    pub fn matches(&self, record: &OperationRecord) -> bool {
        self.clauses.iter().all(|clause| clause.matches(record))
    }
}

/// Failure reported by the record store or a directory lookup.
///
/// Opaque to callers beyond its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The targeted row does not exist; nothing was written.
    NotFound(Uuid),
    /// A stored row holds a value the model does not know.
    Corrupt(String),
    /// Connection, constraint or permission failure.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Operation {} not found", id),
            StoreError::Corrupt(msg) => write!(f, "Corrupt operation row: {}", msg),
            StoreError::Backend(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Persistence for the `ccb_operations` table.
///
/// Every call is a single awaited round trip; writes touch one row.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Rows matching `filter`, newest first.
    async fn select(&self, filter: &StoreFilter) -> Result<Vec<OperationRecord>, StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<OperationRecord>, StoreError>;

    /// Inserts a row owned by `owner`. The store assigns id and timestamp.
    async fn insert(&self, owner: Uuid, op: &NewOperation)
        -> Result<OperationRecord, StoreError>;

    /// Overwrites every mutable column of `id`.
    async fn update(&self, id: Uuid, op: &NewOperation) -> Result<OperationRecord, StoreError>;

    /// Hard delete. Either the row is gone or an error is returned.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Branch assignment from the `profiles` table.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn branch_code(&self, user_id: Uuid) -> Result<Option<String>, StoreError>;
}

/// Role lookup for an actor.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    /// Returns the role name, `None` when the actor has no role row.
    async fn role(&self, user_id: Uuid) -> Result<Option<String>, StoreError>;
}
