use crate::normalize::{
    digits_only, format_limit, format_tax_id, parse_currency_display, CNPJ_LEN, CPF_LEN,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Vocabulary ============

/// Credit modality of a CCB operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    #[serde(rename = "capital_giro")]
    WorkingCapital,
    #[serde(rename = "financiamento")]
    Financing,
    #[serde(rename = "emprestimo")]
    Loan,
    #[serde(rename = "credito_pessoal")]
    PersonalCredit,
    #[serde(rename = "consignado")]
    PayrollDeductible,
}

impl Modality {
    pub const ALL: [Modality; 5] = [
        Modality::WorkingCapital,
        Modality::Financing,
        Modality::Loan,
        Modality::PersonalCredit,
        Modality::PayrollDeductible,
    ];

    /// Value stored in the `modalidade` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::WorkingCapital => "capital_giro",
            Modality::Financing => "financiamento",
            Modality::Loan => "emprestimo",
            Modality::PersonalCredit => "credito_pessoal",
            Modality::PayrollDeductible => "consignado",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Modality::WorkingCapital => "Capital de Giro",
            Modality::Financing => "Financiamento",
            Modality::Loan => "Empréstimo",
            Modality::PersonalCredit => "Crédito Pessoal",
            Modality::PayrollDeductible => "Consignado",
        }
    }
}

impl FromStr for Modality {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownValue::new("modalidade", s))
    }
}

/// Lifecycle stage of a CCB operation.
///
/// Any status may follow any other: back-office staff correct records by
/// hand at every stage, so there is no transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "aberto")]
    Open,
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "em_analise")]
    UnderReview,
    #[serde(rename = "aprovado")]
    Approved,
    #[serde(rename = "rejeitado")]
    Rejected,
    #[serde(rename = "cancelado")]
    Cancelled,
    #[serde(rename = "liquidado")]
    Settled,
    #[serde(rename = "prejuizo_quitado")]
    LossSettled,
    #[serde(rename = "transferencia_prejuizo")]
    LossTransferred,
    #[serde(rename = "repactuado")]
    Renegotiated,
}

impl Status {
    pub const ALL: [Status; 10] = [
        Status::Open,
        Status::Pending,
        Status::UnderReview,
        Status::Approved,
        Status::Rejected,
        Status::Cancelled,
        Status::Settled,
        Status::LossSettled,
        Status::LossTransferred,
        Status::Renegotiated,
    ];

    /// Value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "aberto",
            Status::Pending => "pendente",
            Status::UnderReview => "em_analise",
            Status::Approved => "aprovado",
            Status::Rejected => "rejeitado",
            Status::Cancelled => "cancelado",
            Status::Settled => "liquidado",
            Status::LossSettled => "prejuizo_quitado",
            Status::LossTransferred => "transferencia_prejuizo",
            Status::Renegotiated => "repactuado",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Open => "Aberto",
            Status::Pending => "Pendente",
            Status::UnderReview => "Em Análise",
            Status::Approved => "Aprovado",
            Status::Rejected => "Rejeitado",
            Status::Cancelled => "Cancelado",
            Status::Settled => "Liquidado",
            Status::LossSettled => "Prejuízo Quitado",
            Status::LossTransferred => "Transf. Prejuízo",
            Status::Renegotiated => "Repactuado",
        }
    }
}

impl FromStr for Status {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownValue::new("status", s))
    }
}

/// A stored or submitted value outside a closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue {
    pub field: &'static str,
    pub value: String,
}

impl UnknownValue {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} value '{}'", self.field, self.value)
    }
}

// ============ Database Models ============

/// A tracked credit instrument (CCB operation).
///
/// `cpf_cnpj` is always digits-only here; formatting happens on display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Unique identifier of the operation.
    pub id: Uuid,
    /// Actor that created the operation.
    pub user_id: Uuid,
    /// Branch (PA) code, the only branch-scoping key.
    pub pa: String,
    pub produto: String,
    /// Credit limit in BRL.
    pub limite: BigDecimal,
    pub conta_corrente: String,
    /// Holder name.
    pub nome: String,
    /// Holder CPF (11 digits) or CNPJ (14 digits).
    pub cpf_cnpj: String,
    pub numero_ccb: String,
    pub modalidade: Modality,
    pub status: Status,
    /// Operation has an open issue.
    pub pendencia: bool,
    /// Documents still waiting for the courier pouch.
    pub pendente_malote: bool,
    /// Compliance/documentation correction outstanding.
    pub pendencia_regularizacao: bool,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl OperationRecord {
    pub fn display_limit(&self) -> String {
        format_limit(&self.limite)
    }

    pub fn display_tax_id(&self) -> String {
        format_tax_id(&self.cpf_cnpj)
    }

    /// Pre-fills an edit form with this record, in display notation.
    pub fn to_input(&self) -> OperationInput {
        OperationInput {
            pa: self.pa.clone(),
            produto: self.produto.clone(),
            limite: self.display_limit(),
            conta_corrente: self.conta_corrente.clone(),
            nome: self.nome.clone(),
            cpf_cnpj: self.display_tax_id(),
            numero_ccb: self.numero_ccb.clone(),
            modalidade: self.modalidade.as_str().to_string(),
            status: self.status.as_str().to_string(),
            pendencia: self.pendencia,
            pendente_malote: self.pendente_malote,
            pendencia_regularizacao: self.pendencia_regularizacao,
        }
    }
}

/// Validated, canonical write payload for the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub pa: String,
    pub produto: String,
    pub limite: BigDecimal,
    pub conta_corrente: String,
    pub nome: String,
    pub cpf_cnpj: String,
    pub numero_ccb: String,
    pub modalidade: Modality,
    pub status: Status,
    pub pendencia: bool,
    pub pendente_malote: bool,
    pub pendencia_regularizacao: bool,
}

// ============ API Request/Response Models ============

/// Form-shaped submission for creating or editing an operation.
///
/// `limite` and `cpf_cnpj` arrive in display notation; the enum fields are
/// raw strings so membership can be reported as a validation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInput {
    #[serde(default)]
    pub pa: String,
    #[serde(default)]
    pub produto: String,
    #[serde(default)]
    pub limite: String,
    #[serde(default)]
    pub conta_corrente: String,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub cpf_cnpj: String,
    #[serde(default)]
    pub numero_ccb: String,
    #[serde(default)]
    pub modalidade: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub pendencia: bool,
    #[serde(default)]
    pub pendente_malote: bool,
    #[serde(default)]
    pub pendencia_regularizacao: bool,
}

impl Default for OperationInput {
    fn default() -> Self {
        Self {
            pa: String::new(),
            produto: String::new(),
            limite: String::new(),
            conta_corrente: String::new(),
            nome: String::new(),
            cpf_cnpj: String::new(),
            numero_ccb: String::new(),
            modalidade: Modality::WorkingCapital.as_str().to_string(),
            status: Status::Pending.as_str().to_string(),
            pendencia: false,
            pendente_malote: false,
            pendencia_regularizacao: false,
        }
    }
}

impl OperationInput {
    /// Checks the submission and converts it to its stored form.
    ///
    /// Fields are checked in form order and the first failure is returned.
    pub fn validate(&self) -> Result<NewOperation, ValidationError> {
        let pa = required(&self.pa, "pa", "PA é obrigatório")?;
        let produto = required(&self.produto, "produto", "Produto é obrigatório")?;

        let limite_display = required(&self.limite, "limite", "Limite é obrigatório")?;
        let limite = parse_currency_display(&limite_display)
            .filter(|value| *value >= BigDecimal::from(0))
            .ok_or(ValidationError::new("limite", "Limite inválido"))?;

        let conta_corrente = required(
            &self.conta_corrente,
            "conta_corrente",
            "Conta corrente é obrigatória",
        )?;

        let nome = self.nome.trim();
        if nome.chars().count() < 2 {
            return Err(ValidationError::new("nome", "Nome é obrigatório"));
        }

        let cpf_cnpj = digits_only(&self.cpf_cnpj);
        if cpf_cnpj.len() != CPF_LEN && cpf_cnpj.len() != CNPJ_LEN {
            return Err(ValidationError::new("cpf_cnpj", "CPF/CNPJ inválido"));
        }

        let numero_ccb = required(&self.numero_ccb, "numero_ccb", "Número CCB é obrigatório")?;

        let modalidade = self
            .modalidade
            .trim()
            .parse::<Modality>()
            .map_err(|_| ValidationError::new("modalidade", "Modalidade inválida"))?;
        let status = self
            .status
            .trim()
            .parse::<Status>()
            .map_err(|_| ValidationError::new("status", "Status inválido"))?;

        Ok(NewOperation {
            pa,
            produto,
            limite,
            conta_corrente,
            nome: nome.to_string(),
            cpf_cnpj,
            numero_ccb,
            modalidade,
            status,
            pendencia: self.pendencia,
            pendente_malote: self.pendente_malote,
            pendencia_regularizacao: self.pendencia_regularizacao,
        })
    }
}

fn required(
    value: &str,
    field: &'static str,
    message: &'static str,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, message));
    }
    Ok(trimmed.to_string())
}

/// First schema violation found in a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Message shown to the user.
    pub message: &'static str,
}

impl ValidationError {
    pub fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Operation as returned to clients, with display-ready fields.
#[derive(Debug, Clone, Serialize)]
pub struct OperationView {
    #[serde(flatten)]
    pub record: OperationRecord,
    pub limite_display: String,
    pub cpf_cnpj_display: String,
    pub status_label: &'static str,
    pub modalidade_label: &'static str,
}

impl From<OperationRecord> for OperationView {
    fn from(record: OperationRecord) -> Self {
        Self {
            limite_display: record.display_limit(),
            cpf_cnpj_display: record.display_tax_id(),
            status_label: record.status.label(),
            modalidade_label: record.modalidade.label(),
            record,
        }
    }
}

/// Dashboard counters over the actor's visible operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub total: usize,
    pub aprovados: usize,
    /// Pending or under review.
    pub em_analise: usize,
    pub com_pendencia: usize,
    pub pendente_malote: usize,
    pub pendencia_regularizacao: usize,
}

impl OperationStats {
    pub fn from_records(records: &[OperationRecord]) -> Self {
        let count = |pred: fn(&OperationRecord) -> bool| records.iter().filter(|op| pred(op)).count();

        Self {
            total: records.len(),
            aprovados: count(|op| op.status == Status::Approved),
            em_analise: count(|op| matches!(op.status, Status::Pending | Status::UnderReview)),
            com_pendencia: count(|op| op.pendencia),
            pendente_malote: count(|op| op.pendente_malote),
            pendencia_regularizacao: count(|op| op.pendencia_regularizacao),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> OperationInput {
        OperationInput {
            pa: "05".to_string(),
            produto: "Capital de Giro PJ".to_string(),
            limite: "15.000,00".to_string(),
            conta_corrente: "12345-6".to_string(),
            nome: "Maria Silva".to_string(),
            cpf_cnpj: "123.456.789-01".to_string(),
            numero_ccb: "CCB-2024-001".to_string(),
            ..OperationInput::default()
        }
    }

    #[test]
    fn valid_input_is_canonicalized() {
        let op = valid_input().validate().unwrap();
        assert_eq!(op.cpf_cnpj, "12345678901");
        assert_eq!(op.limite, BigDecimal::from(15000));
        assert_eq!(op.modalidade, Modality::WorkingCapital);
        assert_eq!(op.status, Status::Pending);
    }

    #[test]
    fn first_violation_wins() {
        let input = OperationInput {
            pa: String::new(),
            nome: "M".to_string(),
            ..valid_input()
        };
        let err = input.validate().unwrap_err();
        assert_eq!(err.field, "pa");
        assert_eq!(err.message, "PA é obrigatório");
    }

    #[test]
    fn tax_id_must_be_cpf_or_cnpj_length() {
        for bad in ["1234567890", "123456789012", "1234567890123", "123456789012345"] {
            let input = OperationInput {
                cpf_cnpj: bad.to_string(),
                ..valid_input()
            };
            assert_eq!(input.validate().unwrap_err().field, "cpf_cnpj", "{bad}");
        }

        let cnpj = OperationInput {
            cpf_cnpj: "12.345.678/0001-99".to_string(),
            ..valid_input()
        };
        assert_eq!(cnpj.validate().unwrap().cpf_cnpj, "12345678000199");
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let input = OperationInput {
            modalidade: "leasing".to_string(),
            ..valid_input()
        };
        assert_eq!(input.validate().unwrap_err().message, "Modalidade inválida");

        let input = OperationInput {
            status: "arquivado".to_string(),
            ..valid_input()
        };
        assert_eq!(input.validate().unwrap_err().message, "Status inválido");
    }

    #[test]
    fn whitespace_only_fields_are_missing() {
        let input = OperationInput {
            numero_ccb: "   ".to_string(),
            ..valid_input()
        };
        assert_eq!(input.validate().unwrap_err().field, "numero_ccb");
    }

    #[test]
    fn malformed_limit_is_rejected() {
        let input = OperationInput {
            limite: "R$ 10,00".to_string(),
            ..valid_input()
        };
        assert_eq!(input.validate().unwrap_err().message, "Limite inválido");
    }

    #[test]
    fn enums_round_trip_their_wire_values() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        for modality in Modality::ALL {
            assert_eq!(modality.as_str().parse::<Modality>().unwrap(), modality);
        }
    }
}
