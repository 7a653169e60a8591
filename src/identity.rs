//! Identity provider integration and actor resolution.
//!
//! Authentication is delegated to a GoTrue-compatible auth service. This
//! module only forwards credentials, classifies the provider's errors into
//! user-facing messages and turns a verified identity into an [`Actor`].
use crate::models::ValidationError;
use crate::store::{ProfileDirectory, RoleResolver};
use crate::visibility::Actor;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use uuid::Uuid;

/// Branch codes offered at sign-up.
pub const BRANCH_CODES: &[&str] = &[
    "00", "02", "03", "05", "06", "07", "09", "10", "11", "12", "15", "16", "17", "18", "20",
    "21", "22", "23", "24", "25", "26", "97",
];

/// Role name that grants cross-branch visibility.
pub const ADMIN_ROLE: &str = "admin";

const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Verified identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

/// Session returned by a successful sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: Identity,
}

/// Identity provider failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    AlreadyRegistered,
    /// Missing, expired or revoked access token.
    InvalidToken,
    /// Anything else the provider said, passed through verbatim.
    Provider(String),
}

impl AuthError {
    /// Classifies a raw provider message by its well-known substrings.
    pub fn from_provider_message(message: &str) -> Self {
        if message.contains("Invalid login credentials") {
            AuthError::InvalidCredentials
        } else if message.contains("User already registered") {
            AuthError::AlreadyRegistered
        } else {
            AuthError::Provider(message.to_string())
        }
    }

    /// Message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Email ou senha incorretos.".to_string(),
            AuthError::AlreadyRegistered => "Este email já está cadastrado.".to_string(),
            AuthError::InvalidToken => "Sessão inválida ou expirada.".to_string(),
            AuthError::Provider(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Provider(err.to_string())
    }
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identity behind an access token.
    async fn current_user(&self, access_token: &str) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        branch_code: &str,
    ) -> Result<Identity, AuthError>;
}

// ============ Forms ============

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignInRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub pa: String,
}

impl SignUpRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().chars().count() < 2 {
            return Err(ValidationError::new(
                "full_name",
                "Nome deve ter pelo menos 2 caracteres",
            ));
        }
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if !BRANCH_CODES.contains(&self.pa.trim()) {
            return Err(ValidationError::new("pa", "Selecione uma agência"));
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::new("confirm_password", "Senhas não conferem"));
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if !EMAIL.is_match(email.trim()) {
        return Err(ValidationError::new("email", "Email inválido"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            "Senha deve ter pelo menos 6 caracteres",
        ));
    }
    Ok(())
}

// ============ GoTrue client ============

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl From<GoTrueUser> for Identity {
    fn from(user: GoTrueUser) -> Self {
        let display_name = user
            .user_metadata
            .get("full_name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
            display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: GoTrueUser,
}

/// Client for a GoTrue-compatible auth service.
#[derive(Clone)]
pub struct GoTrueClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoTrueClient {
    /// Creates a new `GoTrueClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL; `/auth/v1` is appended per call.
    /// * `api_key` - Public API key sent as the `apikey` header.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AuthError::Provider(format!("Failed to create auth client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn provider_error(response: reqwest::Response) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                ["msg", "error_description", "message", "error"]
                    .iter()
                    .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
            })
            .unwrap_or_else(|| format!("Auth service returned {}: {}", status, body));

        tracing::warn!("Auth service error ({}): {}", status, message);
        AuthError::from_provider_message(&message)
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn current_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::InvalidToken);
        }
        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let user: GoTrueUser = response.json().await?;
        Ok(user.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        tracing::info!("Signing in {}", email);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let session: GoTrueSession = response.json().await?;
        Ok(Session {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_in: session.expires_in,
            user: session.user.into(),
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        branch_code: &str,
    ) -> Result<Identity, AuthError> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        tracing::info!("Registering {} for PA {}", email, branch_code);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "full_name": full_name, "pa": branch_code },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        // With auto-confirm the body is a session, otherwise the bare user.
        let body: Value = response.json().await?;
        let user_value = body.get("user").cloned().unwrap_or(body);
        let user: GoTrueUser = serde_json::from_value(user_value)
            .map_err(|e| AuthError::Provider(format!("Unexpected sign-up response: {}", e)))?;
        Ok(user.into())
    }
}

// ============ Actor resolution ============

/// Builds the request actor from a verified identity.
///
/// Role and branch lookups never block a request: a failed role lookup
/// yields a non-admin, a failed branch lookup yields no branch.
pub async fn resolve_actor(
    identity: Identity,
    roles: &dyn RoleResolver,
    profiles: &dyn ProfileDirectory,
) -> Actor {
    let role = match roles.role(identity.id).await {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!("Role lookup failed for {}: {}", identity.id, e);
            None
        }
    };

    let branch_code = match profiles.branch_code(identity.id).await {
        Ok(pa) => pa,
        Err(e) => {
            tracing::warn!("Branch lookup failed for {}: {}", identity.id, e);
            None
        }
    };

    Actor {
        id: identity.id,
        email: identity.email,
        display_name: identity.display_name,
        is_admin: role.as_deref() == Some(ADMIN_ROLE),
        role,
        branch_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_messages_are_classified() {
        assert_eq!(
            AuthError::from_provider_message("Invalid login credentials"),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            AuthError::from_provider_message("User already registered"),
            AuthError::AlreadyRegistered
        );
        let other = AuthError::from_provider_message("Email rate limit exceeded");
        assert_eq!(other.user_message(), "Email rate limit exceeded");
    }

    fn sign_up() -> SignUpRequest {
        SignUpRequest {
            full_name: "Ana Souza".to_string(),
            email: "ana@coop.com.br".to_string(),
            password: "segredo1".to_string(),
            confirm_password: "segredo1".to_string(),
            pa: "05".to_string(),
        }
    }

    #[test]
    fn sign_up_form_rules() {
        assert!(sign_up().validate().is_ok());

        let bad_email = SignUpRequest {
            email: "ana@".to_string(),
            ..sign_up()
        };
        assert_eq!(bad_email.validate().unwrap_err().message, "Email inválido");

        let short = SignUpRequest {
            password: "123".to_string(),
            confirm_password: "123".to_string(),
            ..sign_up()
        };
        assert_eq!(short.validate().unwrap_err().field, "password");

        let unknown_pa = SignUpRequest {
            pa: "99".to_string(),
            ..sign_up()
        };
        assert_eq!(unknown_pa.validate().unwrap_err().message, "Selecione uma agência");

        let mismatch = SignUpRequest {
            confirm_password: "outro123".to_string(),
            ..sign_up()
        };
        assert_eq!(mismatch.validate().unwrap_err().message, "Senhas não conferem");
    }

    #[test]
    fn sign_in_form_rules() {
        let ok = SignInRequest {
            email: "ana@coop.com.br".to_string(),
            password: "segredo1".to_string(),
        };
        assert!(ok.validate().is_ok());
        let empty = SignInRequest {
            email: String::new(),
            password: String::new(),
        };
        assert_eq!(empty.validate().unwrap_err().field, "email");
    }
}
