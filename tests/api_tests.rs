/// HTTP tests for the router with an in-memory store and a fake auth service
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use ccb_ops::handlers::{router, AppState};
use ccb_ops::identity::{AuthError, Identity, IdentityProvider, Session};
use ccb_ops::lifecycle::LifecycleController;
use ccb_ops::memory::{InMemoryDirectory, InMemoryOperationStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const ADMIN_TOKEN: &str = "admin-token";
const AGENCY_TOKEN: &str = "agency-token";

struct FakeIdentity {
    users: HashMap<&'static str, Identity>,
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        self.users
            .get(access_token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let (token, user) = self
            .users
            .iter()
            .find(|(_, user)| user.email == email)
            .ok_or(AuthError::InvalidCredentials)?;
        if password != "segredo1" {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Session {
            access_token: token.to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            user: user.clone(),
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        full_name: &str,
        _branch_code: &str,
    ) -> Result<Identity, AuthError> {
        if self.users.values().any(|user| user.email == email) {
            return Err(AuthError::AlreadyRegistered);
        }
        Ok(Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: Some(full_name.to_string()),
        })
    }
}

async fn test_app() -> Router {
    let admin = Identity {
        id: Uuid::new_v4(),
        email: "admin@coop.com.br".to_string(),
        display_name: Some("Admin".to_string()),
    };
    let agency = Identity {
        id: Uuid::new_v4(),
        email: "pa05@coop.com.br".to_string(),
        display_name: Some("Agência 05".to_string()),
    };

    let directory = Arc::new(InMemoryDirectory::new());
    directory.set_role(admin.id, "admin").await;
    directory.set_branch(agency.id, "05").await;

    let identity = FakeIdentity {
        users: HashMap::from([(ADMIN_TOKEN, admin), (AGENCY_TOKEN, agency)]),
    };
    let controller = LifecycleController::new(Arc::new(InMemoryOperationStore::new()));
    let state = AppState::new(controller, Arc::new(identity), directory.clone(), directory);

    router(Arc::new(state))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn operation(pa: &str) -> Value {
    json!({
        "pa": pa,
        "produto": "Capital de Giro",
        "limite": "1.500,00",
        "conta_corrente": "12345-6",
        "nome": "Maria Silva",
        "cpf_cnpj": "12.345.678/0001-90",
        "numero_ccb": "CCB-77",
        "modalidade": "capital_giro",
        "status": "aberto",
        "pendente_malote": true
    })
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let app = test_app().await;

    let (status, _) = send(&app, Method::GET, "/api/v1/operations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/api/v1/me", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Sessão inválida ou expirada.");
}

#[tokio::test]
async fn test_me_lists_tabs_per_role() {
    let app = test_app().await;

    let (_, admin) = send(&app, Method::GET, "/api/v1/me", Some(ADMIN_TOKEN), None).await;
    assert_eq!(admin["actor"]["is_admin"], true);
    assert_eq!(admin["views"].as_array().unwrap().len(), 7);
    assert_eq!(admin["default_view"], "aberto");

    let (_, agency) = send(&app, Method::GET, "/api/v1/me", Some(AGENCY_TOKEN), None).await;
    assert_eq!(agency["actor"]["branch_code"], "05");
    assert_eq!(agency["views"].as_array().unwrap().len(), 2);
    assert_eq!(agency["default_view"], "pendente_malote");
}

#[tokio::test]
async fn test_create_list_update_delete() {
    let app = test_app().await;

    let (status, created) = send(&app, Method::POST, "/api/v1/operations", Some(AGENCY_TOKEN), Some(operation("05"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let op = &created["operation"];
    assert_eq!(op["cpf_cnpj"], "12345678000190");
    assert_eq!(op["cpf_cnpj_display"], "12.345.678/0001-90");
    assert_eq!(op["limite_display"], "1.500,00");
    assert_eq!(op["status_label"], "Aberto");
    let id = op["id"].as_str().unwrap().to_string();

    send(&app, Method::POST, "/api/v1/operations", Some(ADMIN_TOKEN), Some(operation("06"))).await;

    let (status, listed) = send(&app, Method::GET, "/api/v1/operations?view=pendente_malote", Some(AGENCY_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, listed) = send(&app, Method::GET, "/api/v1/operations", Some(ADMIN_TOKEN), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let mut edit = operation("05");
    edit["status"] = json!("liquidado");
    edit["pendente_malote"] = json!(false);
    let (status, updated) = send(&app, Method::PUT, &format!("/api/v1/operations/{}", id), Some(AGENCY_TOKEN), Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["operation"]["status"], "liquidado");

    let (_, listed) = send(&app, Method::GET, "/api/v1/operations?view=liquidado", Some(ADMIN_TOKEN), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let uri = format!("/api/v1/operations/{}", id);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(AGENCY_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::DELETE, &uri, Some(AGENCY_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Erro ao excluir operação. Tente novamente.");
}

#[tokio::test]
async fn test_invalid_submission_is_rejected_with_field() {
    let app = test_app().await;
    let mut bad = operation("05");
    bad["cpf_cnpj"] = json!("123");

    let (status, body) = send(&app, Method::POST, "/api/v1/operations", Some(AGENCY_TOKEN), Some(bad)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "cpf_cnpj");
    assert_eq!(body["error"], "CPF/CNPJ inválido");

    let (_, stats) = send(&app, Method::GET, "/api/v1/operations/stats", Some(ADMIN_TOKEN), None).await;
    assert_eq!(stats["total"], 0);
}

#[tokio::test]
async fn test_unknown_view_is_a_bad_request() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/operations?view=arquivado", Some(ADMIN_TOKEN), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown view 'arquivado'");
}

#[tokio::test]
async fn test_paste_fills_the_form() {
    let app = test_app().await;
    let payload = json!({
        "text": "PA\t05\nNome\tMaria Silva\nCPF\t12345678901\nLimite\t150000",
        "form": { "produto": "Consignado" }
    });

    let (status, body) = send(&app, Method::POST, "/api/v1/operations/paste", Some(AGENCY_TOKEN), Some(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recognized"], 4);
    assert_eq!(body["form"]["pa"], "05");
    assert_eq!(body["form"]["produto"], "Consignado");
    assert_eq!(body["form"]["cpf_cnpj"], "123.456.789-01");
    assert_eq!(body["form"]["limite"], "1.500,00");
}

#[tokio::test]
async fn test_unrecognized_paste_is_unprocessable() {
    let app = test_app().await;
    let payload = json!({ "text": "hello world" });

    let (status, body) = send(&app, Method::POST, "/api/v1/operations/paste", Some(AGENCY_TOKEN), Some(payload)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Formato não reconhecido");
}

#[tokio::test]
async fn test_sign_in_and_sign_up() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::POST, "/api/v1/auth/sign-in", None, Some(json!({
        "email": "admin@coop.com.br",
        "password": "segredo1"
    }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["access_token"], ADMIN_TOKEN);

    let (status, body) = send(&app, Method::POST, "/api/v1/auth/sign-in", None, Some(json!({
        "email": "admin@coop.com.br",
        "password": "errada1"
    }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Email ou senha incorretos.");

    let sign_up = json!({
        "full_name": "Admin",
        "email": "admin@coop.com.br",
        "password": "segredo1",
        "confirm_password": "segredo1",
        "pa": "05"
    });
    let (status, body) = send(&app, Method::POST, "/api/v1/auth/sign-up", None, Some(sign_up)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Este email já está cadastrado.");

    let (status, body) = send(&app, Method::POST, "/api/v1/auth/sign-up", None, Some(json!({
        "full_name": "Nova Pessoa",
        "email": "nova@coop.com.br",
        "password": "segredo1",
        "confirm_password": "outra123",
        "pa": "05"
    }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Senhas não conferem");
}
