//! Role and branch scoped visibility over CCB operations.
//!
//! Administrators see every branch. Everyone else is pinned to the branch
//! (PA) on their profile. An actor without a branch sees nothing in the
//! branch-filtered lists but still gets counters over their own operations;
//! the two paths are kept apart on purpose until product settles which one
//! is intended.
use crate::models::Status;
use crate::store::{FieldEq, StoreFilter};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

/// Resolved actor for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub is_admin: bool,
    /// Branch from the actor's profile, `None` when unassigned or the
    /// lookup failed.
    pub branch_code: Option<String>,
}

impl Actor {
    fn branch(&self) -> Option<&str> {
        self.branch_code
            .as_deref()
            .map(str::trim)
            .filter(|pa| !pa.is_empty())
    }
}

/// Mutually exclusive list selectors behind the dashboard tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSelector {
    Status(Status),
    AwaitingPouch,
    PendingRegularization,
}

impl ViewSelector {
    pub fn key(&self) -> &'static str {
        match self {
            ViewSelector::Status(status) => status.as_str(),
            ViewSelector::AwaitingPouch => "pendente_malote",
            ViewSelector::PendingRegularization => "pendencia_regularizacao",
        }
    }

    /// Store filter selecting the rows of this view, before scoping.
    pub fn base_filter(&self) -> StoreFilter {
        match self {
            ViewSelector::Status(status) => StoreFilter::eq(FieldEq::Status(*status)),
            ViewSelector::AwaitingPouch => StoreFilter::eq(FieldEq::AwaitingPouch(true)),
            ViewSelector::PendingRegularization => {
                StoreFilter::eq(FieldEq::PendingRegularization(true))
            }
        }
    }
}

impl FromStr for ViewSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendente_malote" => Ok(ViewSelector::AwaitingPouch),
            "pendencia_regularizacao" => Ok(ViewSelector::PendingRegularization),
            other => other
                .parse::<Status>()
                .map(ViewSelector::Status)
                .map_err(|_| format!("Unknown view '{}'", other)),
        }
    }
}

/// Which consumer the predicate is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// Branch-filtered lists (tabs).
    List,
    /// Aggregate counters.
    Aggregate,
}

/// Query to run against the store for a given actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPredicate {
    Match(StoreFilter),
    /// The actor may not see any row; skip the store call.
    Nothing,
}

/// Restricts `base` to what `actor` may see.
pub fn scope_query(actor: &Actor, base: StoreFilter, mode: ScopeMode) -> QueryPredicate {
    if actor.is_admin {
        return QueryPredicate::Match(base);
    }

    match (actor.branch(), mode) {
        (Some(pa), _) => QueryPredicate::Match(base.and(FieldEq::Branch(pa.to_string()))),
        (None, ScopeMode::List) => {
            tracing::debug!("Actor {} has no branch, list view is empty", actor.id);
            QueryPredicate::Nothing
        }
        (None, ScopeMode::Aggregate) => QueryPredicate::Match(base.and(FieldEq::Owner(actor.id))),
    }
}

/// A dashboard tab.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub key: &'static str,
    pub label: &'static str,
    pub title: &'static str,
    pub empty_message: &'static str,
}

/// Tabs offered to `actor`, default tab first.
pub fn dashboard_views(actor: &Actor) -> Vec<DashboardView> {
    if actor.is_admin {
        vec![
            view(ViewSelector::Status(Status::Open), "Abertos", "CCBs Abertas", "Nenhuma CCB aberta no momento"),
            view(ViewSelector::AwaitingPouch, "Pendente Malote", "Documentos Pendentes - Malote", "Nenhum documento pendente de malote"),
            view(ViewSelector::PendingRegularization, "Pend. Regularização", "Pendência de Regularização", "Nenhuma pendência de regularização"),
            view(ViewSelector::Status(Status::Settled), "Liquidadas", "CCBs Liquidadas", "Nenhuma CCB liquidada"),
            view(ViewSelector::Status(Status::LossSettled), "Prejuízo Quitado", "Prejuízo Quitado", "Nenhum prejuízo quitado"),
            view(ViewSelector::Status(Status::LossTransferred), "Transf. Prejuízo", "Transferência de Prejuízo", "Nenhuma transferência de prejuízo"),
            view(ViewSelector::Status(Status::Renegotiated), "Repactuadas", "CCBs Repactuadas", "Nenhuma CCB repactuada"),
        ]
    } else {
        vec![
            view(ViewSelector::AwaitingPouch, "Pendente Malote", "Documentos Pendentes - Malote", "Nenhum documento pendente de malote na sua agência"),
            view(ViewSelector::PendingRegularization, "Pend. Regularização", "Pendência de Regularização", "Nenhuma pendência de regularização na sua agência"),
        ]
    }
}

/// Tab opened when no view is requested.
pub fn default_view(actor: &Actor) -> ViewSelector {
    if actor.is_admin {
        ViewSelector::Status(Status::Open)
    } else {
        ViewSelector::AwaitingPouch
    }
}

fn view(
    selector: ViewSelector,
    label: &'static str,
    title: &'static str,
    empty_message: &'static str,
) -> DashboardView {
    DashboardView {
        key: selector.key(),
        label,
        title,
        empty_message,
    }
}
