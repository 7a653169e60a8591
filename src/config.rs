use serde::Deserialize;

const DEFAULT_RATE_LIMIT_PER_SECOND: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Base URL of the GoTrue-compatible auth service.
    pub auth_base_url: String,
    pub auth_api_key: String,
    pub rate_limit_per_second: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .map_err(|_| anyhow::anyhow!("AUTH_BASE_URL environment variable required"))
                .and_then(|url| validate_http_url("AUTH_BASE_URL", url))?,
            auth_api_key: std::env::var("AUTH_API_KEY")
                .map_err(|_| anyhow::anyhow!("AUTH_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("AUTH_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            rate_limit_per_second: match std::env::var("RATE_LIMIT_PER_SECOND") {
                Ok(value) => value
                    .trim()
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        anyhow::anyhow!("RATE_LIMIT_PER_SECOND must be a positive number")
                    })?,
                Err(_) => DEFAULT_RATE_LIMIT_PER_SECOND,
            },
        };

        // Never log the API key or full database URL
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Auth Base URL: {}", config.auth_base_url);
        tracing::debug!("Rate limit: {} req/s", config.rate_limit_per_second);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn validate_http_url(name: &str, value: String) -> anyhow::Result<String> {
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    let parsed = url::Url::parse(value.trim())
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(value.trim().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_must_be_http() {
        assert_eq!(
            validate_http_url("AUTH_BASE_URL", "https://abc.supabase.co/".to_string()).unwrap(),
            "https://abc.supabase.co"
        );
        assert!(validate_http_url("AUTH_BASE_URL", "ftp://host".to_string()).is_err());
        assert!(validate_http_url("AUTH_BASE_URL", "not a url".to_string()).is_err());
        assert!(validate_http_url("AUTH_BASE_URL", "  ".to_string()).is_err());
    }
}
