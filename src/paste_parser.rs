//! Spreadsheet clipboard import for the CCB form.
//!
//! Two heuristics, tried in order:
//! 1. Label/value rows: the first cell is matched against a keyword table,
//!    the second cell is the value.
//! 2. Single positional row: only when (1) found nothing, the paste is a
//!    single line and it has at least seven cells.
//!
//! The parser never fails. An empty result means the format was not
//! recognized and the caller reports it.
use crate::models::{Modality, OperationInput, Status};
use crate::normalize::{coerce_flag, digits_only, format_currency, format_tax_id};
use std::collections::BTreeMap;

/// Form fields the parser can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PasteField {
    Pa,
    Produto,
    Limite,
    ContaCorrente,
    Nome,
    CpfCnpj,
    NumeroCcb,
    Modalidade,
    Status,
    Pendencia,
}

impl PasteField {
    pub fn key(&self) -> &'static str {
        match self {
            PasteField::Pa => "pa",
            PasteField::Produto => "produto",
            PasteField::Limite => "limite",
            PasteField::ContaCorrente => "conta_corrente",
            PasteField::Nome => "nome",
            PasteField::CpfCnpj => "cpf_cnpj",
            PasteField::NumeroCcb => "numero_ccb",
            PasteField::Modalidade => "modalidade",
            PasteField::Status => "status",
            PasteField::Pendencia => "pendencia",
        }
    }
}

// Evaluated top to bottom, first hit wins. Reordering changes how ambiguous
// labels parse.
const LABEL_KEYWORDS: &[(&str, PasteField)] = &[
    ("pa", PasteField::Pa),
    ("produto", PasteField::Produto),
    ("limite", PasteField::Limite),
    ("conta", PasteField::ContaCorrente),
    ("corrente", PasteField::ContaCorrente),
    ("nome", PasteField::Nome),
    ("cpf", PasteField::CpfCnpj),
    ("cnpj", PasteField::CpfCnpj),
    ("ccb", PasteField::NumeroCcb),
    ("número", PasteField::NumeroCcb),
    ("modalidade", PasteField::Modalidade),
    ("status", PasteField::Status),
    ("pendência", PasteField::Pendencia),
    ("pendencia", PasteField::Pendencia),
];

/// Column order of a single-row paste.
const POSITIONAL_FIELDS: [PasteField; 7] = [
    PasteField::Pa,
    PasteField::Produto,
    PasteField::Limite,
    PasteField::ContaCorrente,
    PasteField::Nome,
    PasteField::CpfCnpj,
    PasteField::NumeroCcb,
];

/// Raw, unnormalized values recognized in a paste.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PastedFields {
    values: BTreeMap<PasteField, String>,
}

impl PastedFields {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, field: PasteField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Field map keyed by column name.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        self.values
            .iter()
            .map(|(field, value)| (field.key(), value.clone()))
            .collect()
    }

    /// Merges the paste into a draft form.
    ///
    /// Non-empty pasted text replaces the draft value. `limite` and
    /// `cpf_cnpj` come out in display notation. The pending-issue flag is
    /// only ever switched on. `modalidade` and `status` are taken only when
    /// they name a known value.
    pub fn apply_to(&self, form: &OperationInput) -> OperationInput {
        let text = |field: PasteField, prior: &str| -> String {
            match self.get(field) {
                Some(value) if !value.is_empty() => value.to_string(),
                _ => prior.to_string(),
            }
        };

        let limite = match self.get(PasteField::Limite) {
            Some(value) if !value.is_empty() => format_currency(&digits_only(value)),
            _ => form.limite.clone(),
        };
        let cpf_cnpj = match self.get(PasteField::CpfCnpj) {
            Some(value) if !value.is_empty() => format_tax_id(value),
            _ => form.cpf_cnpj.clone(),
        };
        let modalidade = self
            .get(PasteField::Modalidade)
            .map(|value| value.to_lowercase())
            .filter(|value| value.parse::<Modality>().is_ok())
            .unwrap_or_else(|| form.modalidade.clone());
        let status = self
            .get(PasteField::Status)
            .map(|value| value.to_lowercase())
            .filter(|value| value.parse::<Status>().is_ok())
            .unwrap_or_else(|| form.status.clone());
        let pendencia = self
            .get(PasteField::Pendencia)
            .map(coerce_flag)
            .unwrap_or(false)
            || form.pendencia;

        OperationInput {
            pa: text(PasteField::Pa, &form.pa),
            produto: text(PasteField::Produto, &form.produto),
            limite,
            conta_corrente: text(PasteField::ContaCorrente, &form.conta_corrente),
            nome: text(PasteField::Nome, &form.nome),
            cpf_cnpj,
            numero_ccb: text(PasteField::NumeroCcb, &form.numero_ccb),
            modalidade,
            status,
            pendencia,
            pendente_malote: form.pendente_malote,
            pendencia_regularizacao: form.pendencia_regularizacao,
        }
    }
}

/// Parses pasted spreadsheet text.
pub fn parse(pasted: &str) -> PastedFields {
    let lines: Vec<&str> = pasted.trim().split('\n').collect();
    let mut parsed = PastedFields::default();

    for line in &lines {
        let cells: Vec<&str> = line.split('\t').collect();
        if cells.len() < 2 {
            continue;
        }
        if let Some(field) = label_field(cells[0]) {
            parsed.values.insert(field, cells[1].trim().to_string());
        }
    }

    if parsed.is_empty() && lines.len() == 1 {
        let cells: Vec<&str> = lines[0].split('\t').collect();
        if cells.len() >= POSITIONAL_FIELDS.len() {
            for (field, cell) in POSITIONAL_FIELDS.iter().zip(&cells) {
                parsed.values.insert(*field, cell.trim().to_string());
            }
        }
    }

    tracing::debug!("Paste parser recognized {} field(s)", parsed.len());
    parsed
}

fn label_field(label: &str) -> Option<PasteField> {
    let label = label.trim().to_lowercase();
    LABEL_KEYWORDS
        .iter()
        .find(|(keyword, _)| label.contains(keyword))
        .map(|(_, field)| *field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_column_paste() {
        let parsed = parse("PA\t05\nNome\tMaria Silva\nCPF\t12345678901");
        let map = parsed.to_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map["pa"], "05");
        assert_eq!(map["nome"], "Maria Silva");
        assert_eq!(map["cpf_cnpj"], "12345678901");
    }

    #[test]
    fn later_rows_overwrite_earlier_ones() {
        let parsed = parse("Nome\tFulano\nNome do titular\tBeltrano");
        assert_eq!(parsed.get(PasteField::Nome), Some("Beltrano"));
    }

    #[test]
    fn first_keyword_wins() {
        // "cpf/cnpj" matches the tax id once; "número ccb" is not a name.
        let parsed = parse("CPF/CNPJ\t123\nNúmero CCB\t998");
        assert_eq!(parsed.get(PasteField::CpfCnpj), Some("123"));
        assert_eq!(parsed.get(PasteField::NumeroCcb), Some("998"));
        // "pagamento" contains "pa", which outranks "status".
        let parsed = parse("Status do pagamento\tX");
        assert_eq!(parsed.get(PasteField::Pa), Some("X"));
        assert_eq!(parsed.get(PasteField::Status), None);
    }

    #[test]
    fn positional_fallback_on_single_row() {
        let parsed = parse("05\tCapital de Giro\t1500000\t12345-6\tMaria Silva\t12345678901\tCCB-1\textra");
        let map = parsed.to_map();
        assert_eq!(map.len(), 7);
        assert_eq!(map["pa"], "05");
        assert_eq!(map["produto"], "Capital de Giro");
        assert_eq!(map["limite"], "1500000");
        assert_eq!(map["conta_corrente"], "12345-6");
        assert_eq!(map["nome"], "Maria Silva");
        assert_eq!(map["cpf_cnpj"], "12345678901");
        assert_eq!(map["numero_ccb"], "CCB-1");
    }

    #[test]
    fn six_cells_is_not_enough() {
        assert!(parse("05\tProd\t100\t1\tMaria\t12345678901").is_empty());
    }

    #[test]
    fn positional_fallback_needs_a_single_line() {
        let row = "05\tProd\t100\t1\tMaria\t12345678901\tCCB";
        assert!(parse(&format!("{row}\n{row}")).is_empty());
    }

    #[test]
    fn unrecognized_input_is_empty() {
        assert!(parse("").is_empty());
        assert!(parse("hello world").is_empty());
        assert!(parse("foo\tbar\nbaz\tqux").is_empty());
    }

    #[test]
    fn windows_line_endings_are_trimmed() {
        let parsed = parse("PA\t05\r\nProduto\tConsignado\r\n");
        assert_eq!(parsed.get(PasteField::Pa), Some("05"));
        assert_eq!(parsed.get(PasteField::Produto), Some("Consignado"));
    }

    #[test]
    fn apply_normalizes_values() {
        let parsed = parse("Limite\tR$ 1.500,00\nCPF\t12345678901\nPendência\tSim\nStatus\tAprovado");
        let form = parsed.apply_to(&OperationInput {
            pa: "07".to_string(),
            ..OperationInput::default()
        });
        assert_eq!(form.pa, "07");
        assert_eq!(form.limite, "1.500,00");
        assert_eq!(form.cpf_cnpj, "123.456.789-01");
        assert!(form.pendencia);
        assert_eq!(form.status, "aprovado");
    }

    #[test]
    fn apply_keeps_prior_values_for_unknown_enums() {
        let parsed = parse("Modalidade\tLeasing\nPendencia\tnão");
        let prior = OperationInput {
            pendencia: true,
            ..OperationInput::default()
        };
        let form = parsed.apply_to(&prior);
        assert_eq!(form.modalidade, prior.modalidade);
        assert!(form.pendencia);
    }
}
