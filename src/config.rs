use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub provider_url: String,
    pub provider_anon_key: String,
    pub provider_timeout_secs: u64,
    pub account_cache_ttl_secs: u64,
    pub session_revocation_ttl_secs: u64, // Should outlive the provider's access tokens
    pub session_webhook_secret: Option<String>, // Unset means webhook is unauthenticated
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            provider_url: std::env::var("PROVIDER_URL")
                .map_err(|_| anyhow::anyhow!("PROVIDER_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("PROVIDER_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("PROVIDER_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })?,
            provider_anon_key: std::env::var("PROVIDER_ANON_KEY")
                .map_err(|_| anyhow::anyhow!("PROVIDER_ANON_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("PROVIDER_ANON_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            provider_timeout_secs: parse_secs("PROVIDER_TIMEOUT_SECS", 10)?,
            account_cache_ttl_secs: parse_secs("ACCOUNT_CACHE_TTL_SECS", 30)?,
            session_revocation_ttl_secs: parse_secs("SESSION_REVOCATION_TTL_SECS", 3600)?,
            session_webhook_secret: std::env::var("SESSION_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Provider URL: {}", config.provider_url);
        tracing::debug!("Provider timeout: {}s", config.provider_timeout_secs);
        tracing::debug!("Account cache TTL: {}s", config.account_cache_ttl_secs);
        tracing::debug!(
            "Session revocation TTL: {}s",
            config.session_revocation_ttl_secs
        );
        if config.session_webhook_secret.is_none() {
            tracing::warn!("SESSION_WEBHOOK_SECRET not set; session webhook accepts any caller");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn parse_secs(var: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(var) {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", var))?;
            if secs == 0 {
                anyhow::bail!("{} must be greater than zero", var);
            }
            Ok(secs)
        }
        Err(_) => Ok(default),
    }
}
