use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Firebase web-app settings served to the browser; empty when unset.
#[derive(Debug, Clone, Default)]
pub struct FirebaseSettings {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub table_name: String,
    pub allowed_email_domain: String,
    pub admin_emails: Vec<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_default_model: String,
    pub firebase: FirebaseSettings,
    pub demo_video_bucket: Option<String>,
    pub ws_api_endpoint: Option<String>,
    pub local_cache_only: bool,
    pub quick_shorts_max_new: usize,
    pub quick_shorts_max_per_source: usize,
}

impl HubConfig {
    pub fn load() -> Self {
        Self {
            table_name: try_load("TABLE_NAME", "learning-hub".to_string()),
            allowed_email_domain: try_load("ALLOWED_EMAIL_DOMAIN", "oneorigin.us".to_string())
                .trim_start_matches('@')
                .to_lowercase(),
            admin_emails: optional("ADMIN_EMAILS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_default_model: try_load("GEMINI_DEFAULT_MODEL", DEFAULT_GEMINI_MODEL.to_string()),
            firebase: FirebaseSettings {
                api_key: optional("FIREBASE_API_KEY").unwrap_or_default(),
                auth_domain: optional("FIREBASE_AUTH_DOMAIN").unwrap_or_default(),
                project_id: optional("FIREBASE_PROJECT_ID").unwrap_or_default(),
                storage_bucket: optional("FIREBASE_STORAGE_BUCKET").unwrap_or_default(),
                messaging_sender_id: optional("FIREBASE_MESSAGING_SENDER_ID").unwrap_or_default(),
                app_id: optional("FIREBASE_APP_ID").unwrap_or_default(),
            },
            demo_video_bucket: optional("DEMO_VIDEO_BUCKET"),
            ws_api_endpoint: optional("WS_API_ENDPOINT"),
            local_cache_only: try_load("LOCAL_CACHE_ONLY", false),
            quick_shorts_max_new: try_load("QUICK_SHORTS_MAX_NEW", 40),
            quick_shorts_max_per_source: try_load("QUICK_SHORTS_MAX_PER_SOURCE", 200),
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

impl Default for HubConfig {
    /// Defaults only, no environment lookups.
    fn default() -> Self {
        Self {
            table_name: "learning-hub".to_string(),
            allowed_email_domain: "oneorigin.us".to_string(),
            admin_emails: Vec::new(),
            gemini_api_key: None,
            gemini_default_model: DEFAULT_GEMINI_MODEL.to_string(),
            firebase: FirebaseSettings::default(),
            demo_video_bucket: None,
            ws_api_endpoint: None,
            local_cache_only: false,
            quick_shorts_max_new: 40,
            quick_shorts_max_per_source: 200,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = optional(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value ({e}), using default: {default}");
        default
    })
}

/// Comma-separated, lower-cased, empties dropped.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_is_normalized() {
        assert_eq!(
            parse_list(" Boss@OneOrigin.us, ,ops@oneorigin.us"),
            vec!["boss@oneorigin.us".to_string(), "ops@oneorigin.us".to_string()]
        );
    }

    #[test]
    fn admin_lookup_ignores_case() {
        let config = HubConfig {
            admin_emails: vec!["boss@oneorigin.us".into()],
            ..HubConfig::default()
        };
        assert!(config.is_admin_email(" Boss@OneOrigin.US "));
        assert!(!config.is_admin_email("intern@oneorigin.us"));
    }
}
