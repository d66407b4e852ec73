use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::rbac::OrgCreationPolicy;
use crate::service::data_key::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY};

#[derive(Debug, Clone)]
pub struct DefaultOrganization {
    pub title: String,
    pub tenant_id: String,
    /// Bound as owners of the default organization.
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DefaultProject {
    pub title: String,
    pub kubernetes_namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultApiKey {
    pub name: String,
    #[serde(default)]
    pub user_id: String,
    /// Pre-provisioned secret; generated when absent.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub is_service_account: bool,
    #[serde(default)]
    pub excluded_from_rate_limiting: bool,
}

/// Resources provisioned idempotently at startup.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    pub organization: Option<DefaultOrganization>,
    pub project: Option<DefaultProject>,
    pub api_keys: Vec<DefaultApiKey>,
    /// Parse failure of `DEFAULT_API_KEYS`, surfaced by `validate`.
    api_keys_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub internal_port: u16,
    pub database_path: String,
    /// When false every call runs as a fixed pseudo-identity with no RBAC.
    pub auth_enabled: bool,
    pub org_creation_policy: OrgCreationPolicy,
    /// Encrypt API key secrets under a KMS-wrapped data key.
    pub kms_enabled: bool,
    pub kms_master_key: Option<String>,
    pub data_key_retry_count: u32,
    pub data_key_retry_delay: Duration,
    pub defaults: Defaults,
}

fn flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off"))
        .unwrap_or(default)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let internal_port: u16 = env::var("INTERNAL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8082);

        let org_creation_policy = env::var("ORG_CREATION_POLICY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let data_key_retry_count = env::var("DATA_KEY_RETRY_COUNT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETRY_COUNT);
        let data_key_retry_delay = env::var("DATA_KEY_RETRY_DELAY_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_DELAY);

        Self {
            host,
            port,
            internal_port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "tenancy.db".to_string()),
            auth_enabled: flag("AUTH_ENABLED", true),
            org_creation_policy,
            kms_enabled: flag("KMS_ENABLED", false),
            kms_master_key: non_empty("KMS_MASTER_KEY"),
            data_key_retry_count,
            data_key_retry_delay,
            defaults: Defaults::from_env(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn internal_addr(&self) -> String {
        format!("{}:{}", self.host, self.internal_port)
    }

    /// Reject combinations that cannot boot.
    pub fn validate(&self) -> Result<(), String> {
        if self.kms_enabled && self.kms_master_key.is_none() {
            return Err("KMS_MASTER_KEY is required when KMS_ENABLED is set".into());
        }
        if self.port == self.internal_port {
            return Err("PORT and INTERNAL_PORT must differ".into());
        }
        self.defaults.validate()
    }
}

impl Defaults {
    pub fn from_env() -> Self {
        let organization = non_empty("DEFAULT_ORG_TITLE").map(|title| DefaultOrganization {
            title,
            tenant_id: non_empty("DEFAULT_TENANT_ID")
                .unwrap_or_else(|| crate::rbac::DEFAULT_TENANT_ID.to_string()),
            user_ids: env::var("DEFAULT_ORG_USER_IDS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
        });

        let project = non_empty("DEFAULT_PROJECT_TITLE").map(|title| DefaultProject {
            title,
            kubernetes_namespace: non_empty("DEFAULT_PROJECT_NAMESPACE")
                .unwrap_or_else(|| "default".to_string()),
        });

        let (api_keys, api_keys_error) = match non_empty("DEFAULT_API_KEYS") {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(keys) => (keys, None),
                Err(e) => (Vec::new(), Some(format!("DEFAULT_API_KEYS is not valid JSON: {}", e))),
            },
            None => (Vec::new(), None),
        };

        Self {
            organization,
            project,
            api_keys,
            api_keys_error,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(err) = &self.api_keys_error {
            return Err(err.clone());
        }
        if let Some(org) = &self.organization {
            if org.user_ids.is_empty() {
                return Err("DEFAULT_ORG_USER_IDS must name at least one owner".into());
            }
        }
        if self.project.is_some() && self.organization.is_none() {
            return Err("a default project requires a default organization".into());
        }
        if !self.api_keys.is_empty() && self.project.is_none() {
            return Err("default API keys require a default project".into());
        }
        for key in &self.api_keys {
            if key.name.trim().is_empty() {
                return Err("default API key name is required".into());
            }
            if !key.is_service_account && key.user_id.trim().is_empty() {
                return Err(format!("default API key {:?} needs a user_id", key.name));
            }
        }
        Ok(())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
