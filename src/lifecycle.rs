//! Create/update/delete orchestration for CCB operations.
//!
//! Every write is validated first and then issued as a single awaited store
//! call. Nothing is retried; concurrent edits of the same row are last
//! write wins.
use crate::models::{OperationInput, OperationRecord, OperationStats, ValidationError};
use crate::store::{OperationStore, StoreError, StoreFilter};
use crate::visibility::{scope_query, Actor, QueryPredicate, ScopeMode, ViewSelector};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Failure of a validated write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Rejected before any store call.
    Validation(ValidationError),
    Store(StoreError),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::Validation(e) => write!(f, "{}", e),
            LifecycleError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LifecycleError {}

impl From<ValidationError> for LifecycleError {
    fn from(err: ValidationError) -> Self {
        LifecycleError::Validation(err)
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        LifecycleError::Store(err)
    }
}

#[derive(Clone)]
pub struct LifecycleController {
    store: Arc<dyn OperationStore>,
}

impl LifecycleController {
    pub fn new(store: Arc<dyn OperationStore>) -> Self {
        Self { store }
    }

    /// Validates `input` and inserts it owned by `actor_id`.
    pub async fn create(
        &self,
        actor_id: Uuid,
        input: &OperationInput,
    ) -> Result<OperationRecord, LifecycleError> {
        let op = input.validate().inspect_err(|e| {
            tracing::debug!("Create rejected on {}: {}", e.field, e.message);
        })?;

        let record = self.store.insert(actor_id, &op).await?;
        tracing::info!(
            "Created operation {} (PA {}, CCB {}) for {}",
            record.id,
            record.pa,
            record.numero_ccb,
            actor_id
        );
        Ok(record)
    }

    /// Validates `input` and overwrites operation `id` with it.
    pub async fn update(
        &self,
        id: Uuid,
        input: &OperationInput,
    ) -> Result<OperationRecord, LifecycleError> {
        let op = input.validate().inspect_err(|e| {
            tracing::debug!("Update of {} rejected on {}: {}", id, e.field, e.message);
        })?;

        let record = self.store.update(id, &op).await?;
        tracing::info!(
            "Updated operation {} (status {}, malote {}, regularização {})",
            record.id,
            record.status.as_str(),
            record.pendente_malote,
            record.pendencia_regularizacao
        );
        Ok(record)
    }

    /// Hard-deletes operation `id`.
    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.store.delete(id).await?;
        tracing::info!("Deleted operation {}", id);
        Ok(())
    }

    /// Operations in `view` visible to `actor`, newest first.
    pub async fn list(
        &self,
        actor: &Actor,
        view: ViewSelector,
    ) -> Result<Vec<OperationRecord>, StoreError> {
        match scope_query(actor, view.base_filter(), ScopeMode::List) {
            QueryPredicate::Match(filter) => self.store.select(&filter).await,
            QueryPredicate::Nothing => Ok(Vec::new()),
        }
    }

    /// Dashboard counters, recomputed from the full scoped row set.
    pub async fn stats(&self, actor: &Actor) -> Result<OperationStats, StoreError> {
        let records = match scope_query(actor, StoreFilter::all(), ScopeMode::Aggregate) {
            QueryPredicate::Match(filter) => self.store.select(&filter).await?,
            QueryPredicate::Nothing => Vec::new(),
        };
        Ok(OperationStats::from_records(&records))
    }
}
