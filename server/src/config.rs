use std::path::PathBuf;

use anyhow::{Result, anyhow};
use platform_authn::TokenConfig;
use platform_notify::{EmailJsConfig, ResendConfig};

const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-me";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => AppEnv::Production,
            _ => AppEnv::Development,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub env: AppEnv,
    pub default_org_slug: String,
    pub default_org_name: String,
    pub cors_allowed_origins: Vec<String>,
    pub tokens: TokenConfig,
    pub upload_dir: PathBuf,
    pub company_name: String,
    pub emailjs: EmailJsConfig,
    pub resend: Option<ResendConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let env = get("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let secret = |key: &str, fallback: &str| -> Result<String> {
            match get(key) {
                Some(value) => Ok(value),
                None if env == AppEnv::Production => {
                    Err(anyhow!("{key} must be set when APP_ENV=production"))
                }
                None => Ok(fallback.to_string()),
            }
        };
        let number = |key: &str, default: i64| -> Result<i64> {
            match get(key) {
                Some(raw) => raw
                    .parse::<i64>()
                    .ok()
                    .filter(|v| *v > 0)
                    .ok_or_else(|| anyhow!("{key} must be a positive integer")),
                None => Ok(default),
            }
        };

        let tokens = TokenConfig {
            access_secret: secret("JWT_SECRET", DEV_ACCESS_SECRET)?,
            refresh_secret: secret("JWT_REFRESH_SECRET", DEV_REFRESH_SECRET)?,
            access_ttl_minutes: number("JWT_EXPIRES_MINUTES", 15)?,
            refresh_ttl_days: number("JWT_REFRESH_EXPIRES_DAYS", 7)?,
            candidate_ttl_days: number("CANDIDATE_TOKEN_DAYS", 7)?,
        };
        if tokens.access_secret == tokens.refresh_secret {
            return Err(anyhow!("JWT_SECRET and JWT_REFRESH_SECRET must differ"));
        }

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let resend = match (get("RESEND_API_KEY"), get("RESEND_FROM")) {
            (Some(api_key), from) => Some(ResendConfig {
                api_key,
                from: from.unwrap_or_else(|| "HRMS <onboarding@resend.dev>".into()),
            }),
            (None, _) => None,
        };

        Ok(Self {
            env,
            default_org_slug: get("DEFAULT_ORG_SLUG").unwrap_or_else(|| "default".into()),
            default_org_name: get("DEFAULT_ORG_NAME").unwrap_or_else(|| "Default".into()),
            cors_allowed_origins,
            tokens,
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "uploads".into())),
            company_name: get("COMPANY_NAME").unwrap_or_else(|| "HRMS".into()),
            emailjs: EmailJsConfig {
                service_id: get("EMAILJS_SERVICE_ID"),
                template_id: get("EMAILJS_TEMPLATE_ID"),
                public_key: get("EMAILJS_PUBLIC_KEY"),
                fallback_recipient: get("EMAILJS_FALLBACK_RECIPIENT"),
                endpoint: get("EMAILJS_ENDPOINT"),
            },
            resend,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn development_falls_back_to_dev_secrets() {
        let config = load(&[]).unwrap();
        assert_eq!(config.env, AppEnv::Development);
        assert_eq!(config.tokens.access_ttl_minutes, 15);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:5173"]);
        assert!(config.resend.is_none());
        assert!(!config.emailjs.is_configured());
    }

    #[test]
    fn production_requires_secrets() {
        let err = load(&[("APP_ENV", "production")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let config = load(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "a"),
            ("JWT_REFRESH_SECRET", "b"),
            ("CORS_ALLOWED_ORIGINS", "https://hr.example.com, ,https://admin.example.com"),
        ])
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.cors_allowed_origins.len(), 2);
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(load(&[("JWT_EXPIRES_MINUTES", "soon")]).is_err());
        assert!(load(&[("JWT_REFRESH_EXPIRES_DAYS", "0")]).is_err());
    }
}
