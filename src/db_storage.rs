use crate::models::{Modality, NewOperation, OperationRecord, Status};
use crate::store::{
    FieldEq, OperationStore, ProfileDirectory, RoleResolver, StoreError, StoreFilter,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const OPERATION_COLUMNS: &str = "id, user_id, pa, produto, limite, conta_corrente, nome, \
     cpf_cnpj, numero_ccb, modalidade, status, pendencia, pendente_malote, \
     pendencia_regularizacao, created_at";

/// Opens the shared connection pool and checks it answers.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

/// Row of `ccb_operations` as stored, enums still as text.
#[derive(Debug, sqlx::FromRow)]
struct OperationRow {
    id: Uuid,
    user_id: Uuid,
    pa: String,
    produto: String,
    limite: BigDecimal,
    conta_corrente: String,
    nome: String,
    cpf_cnpj: String,
    numero_ccb: String,
    modalidade: String,
    status: String,
    pendencia: bool,
    pendente_malote: bool,
    pendencia_regularizacao: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<OperationRow> for OperationRecord {
    type Error = StoreError;

    fn try_from(row: OperationRow) -> Result<Self, Self::Error> {
        let modalidade: Modality = row
            .modalidade
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("{} in row {}", e, row.id)))?;
        let status: Status = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("{} in row {}", e, row.id)))?;

        Ok(OperationRecord {
            id: row.id,
            user_id: row.user_id,
            pa: row.pa,
            produto: row.produto,
            limite: row.limite,
            conta_corrente: row.conta_corrente,
            nome: row.nome,
            cpf_cnpj: row.cpf_cnpj,
            numero_ccb: row.numero_ccb,
            modalidade,
            status,
            pendencia: row.pendencia,
            pendente_malote: row.pendente_malote,
            pendencia_regularizacao: row.pendencia_regularizacao,
            created_at: row.created_at,
        })
    }
}

/// `ccb_operations` on Postgres.
#[derive(Clone)]
pub struct PgOperationStore {
    pool: PgPool,
}

impl PgOperationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, clause: &FieldEq) {
    builder.push(" AND ").push(clause.column()).push(" = ");
    match clause {
        FieldEq::Status(status) => builder.push_bind(status.as_str()),
        FieldEq::AwaitingPouch(flag) | FieldEq::PendingRegularization(flag) => {
            builder.push_bind(*flag)
        }
        FieldEq::Branch(pa) => builder.push_bind(pa.clone()),
        FieldEq::Owner(owner) => builder.push_bind(*owner),
    };
}

#[async_trait]
impl OperationStore for PgOperationStore {
    async fn select(&self, filter: &StoreFilter) -> Result<Vec<OperationRecord>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder.push(OPERATION_COLUMNS);
        builder.push(" FROM ccb_operations WHERE 1=1");
        for clause in filter.clauses() {
            push_clause(&mut builder, clause);
        }
        builder.push(" ORDER BY created_at DESC");

        let rows = builder
            .build_query_as::<OperationRow>()
            .fetch_all(&self.pool)
            .await?;

        // A row with an unknown enum value must not hide the rest of the list.
        let records = rows
            .into_iter()
            .filter_map(|row| match OperationRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping operation row: {}", e);
                    None
                }
            })
            .collect();
        Ok(records)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<OperationRecord>, StoreError> {
        let query = format!("SELECT {} FROM ccb_operations WHERE id = $1", OPERATION_COLUMNS);
        let row: Option<OperationRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(OperationRecord::try_from).transpose()
    }

    async fn insert(
        &self,
        owner: Uuid,
        op: &NewOperation,
    ) -> Result<OperationRecord, StoreError> {
        let query = format!(
            r#"
            INSERT INTO ccb_operations (
                user_id, pa, produto, limite, conta_corrente, nome, cpf_cnpj,
                numero_ccb, modalidade, status, pendencia, pendente_malote,
                pendencia_regularizacao
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            OPERATION_COLUMNS
        );

        let row: OperationRow = sqlx::query_as(&query)
            .bind(owner)
            .bind(&op.pa)
            .bind(&op.produto)
            .bind(&op.limite)
            .bind(&op.conta_corrente)
            .bind(&op.nome)
            .bind(&op.cpf_cnpj)
            .bind(&op.numero_ccb)
            .bind(op.modalidade.as_str())
            .bind(op.status.as_str())
            .bind(op.pendencia)
            .bind(op.pendente_malote)
            .bind(op.pendencia_regularizacao)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn update(&self, id: Uuid, op: &NewOperation) -> Result<OperationRecord, StoreError> {
        let query = format!(
            r#"
            UPDATE ccb_operations SET
                pa = $2, produto = $3, limite = $4, conta_corrente = $5, nome = $6,
                cpf_cnpj = $7, numero_ccb = $8, modalidade = $9, status = $10,
                pendencia = $11, pendente_malote = $12, pendencia_regularizacao = $13
            WHERE id = $1
            RETURNING {}
            "#,
            OPERATION_COLUMNS
        );

        let row: Option<OperationRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(&op.pa)
            .bind(&op.produto)
            .bind(&op.limite)
            .bind(&op.conta_corrente)
            .bind(&op.nome)
            .bind(&op.cpf_cnpj)
            .bind(&op.numero_ccb)
            .bind(op.modalidade.as_str())
            .bind(op.status.as_str())
            .bind(op.pendencia)
            .bind(op.pendente_malote)
            .bind(op.pendencia_regularizacao)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(StoreError::NotFound(id))?.try_into()
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM ccb_operations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

/// `profiles` and `user_roles` lookups.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileDirectory for PgDirectory {
    async fn branch_code(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT pa FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(pa,)| pa))
    }
}

#[async_trait]
impl RoleResolver for PgDirectory {
    async fn role(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        // An actor may hold several roles; admin outranks the rest.
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT role::text FROM user_roles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let roles: Vec<String> = rows.into_iter().map(|(role,)| role).collect();
        let role = roles
            .iter()
            .find(|role| role.as_str() == crate::identity::ADMIN_ROLE)
            .or_else(|| roles.first())
            .cloned();
        Ok(role)
    }
}
