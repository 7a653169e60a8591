//! In-process implementations of the store seams.
//!
//! Used by the test suites and for running the API without a database.
use crate::models::{NewOperation, OperationRecord};
use crate::store::{OperationStore, ProfileDirectory, RoleResolver, StoreError, StoreFilter};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryOperationStore {
    rows: RwLock<Vec<OperationRecord>>,
    writes: AtomicUsize,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of insert/update/delete calls that reached the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn apply(record: &mut OperationRecord, op: &NewOperation) {
    record.pa = op.pa.clone();
    record.produto = op.produto.clone();
    record.limite = op.limite.clone();
    record.conta_corrente = op.conta_corrente.clone();
    record.nome = op.nome.clone();
    record.cpf_cnpj = op.cpf_cnpj.clone();
    record.numero_ccb = op.numero_ccb.clone();
    record.modalidade = op.modalidade;
    record.status = op.status;
    record.pendencia = op.pendencia;
    record.pendente_malote = op.pendente_malote;
    record.pendencia_regularizacao = op.pendencia_regularizacao;
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn select(&self, filter: &StoreFilter) -> Result<Vec<OperationRecord>, StoreError> {
        let rows = self.rows.read().await;
        // Reverse first so equal timestamps still come out newest first.
        let mut matched: Vec<OperationRecord> = rows
            .iter()
            .rev()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<OperationRecord>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|record| record.id == id).cloned())
    }

    async fn insert(
        &self,
        owner: Uuid,
        op: &NewOperation,
    ) -> Result<OperationRecord, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let record = OperationRecord {
            id: Uuid::new_v4(),
            user_id: owner,
            pa: op.pa.clone(),
            produto: op.produto.clone(),
            limite: op.limite.clone(),
            conta_corrente: op.conta_corrente.clone(),
            nome: op.nome.clone(),
            cpf_cnpj: op.cpf_cnpj.clone(),
            numero_ccb: op.numero_ccb.clone(),
            modalidade: op.modalidade,
            status: op.status,
            pendencia: op.pendencia,
            pendente_malote: op.pendente_malote,
            pendencia_regularizacao: op.pendencia_regularizacao,
            created_at: Utc::now(),
        };
        self.rows.write().await.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, op: &NewOperation) -> Result<OperationRecord, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().await;
        let record = rows
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(StoreError::NotFound(id))?;
        apply(record, op);
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().await;
        let idx = rows
            .iter()
            .position(|record| record.id == id)
            .ok_or(StoreError::NotFound(id))?;
        rows.remove(idx);
        Ok(())
    }
}

/// Role and branch assignments held in memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    roles: RwLock<HashMap<Uuid, String>>,
    branches: RwLock<HashMap<Uuid, String>>,
    fail_lookups: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_role(&self, user_id: Uuid, role: &str) {
        self.roles.write().await.insert(user_id, role.to_string());
    }

    pub async fn set_branch(&self, user_id: Uuid, pa: &str) {
        self.branches.write().await.insert(user_id, pa.to_string());
    }

    /// Makes every lookup fail, to exercise degraded resolution.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("directory unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryDirectory {
    async fn branch_code(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.branches.read().await.get(&user_id).cloned())
    }
}

#[async_trait]
impl RoleResolver for InMemoryDirectory {
    async fn role(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.roles.read().await.get(&user_id).cloned())
    }
}
