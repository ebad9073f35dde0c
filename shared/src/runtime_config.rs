use serde::Serialize;

use crate::config::FirebaseSettings;
use crate::error::{HubError, HubResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseWebConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

#[derive(Debug, Serialize)]
pub struct RuntimeConfig {
    pub firebase: FirebaseWebConfig,
}

/// Browser-side settings; every key must be present.
pub fn runtime_config(settings: &FirebaseSettings) -> HubResult<RuntimeConfig> {
    let fields = [
        ("apiKey", &settings.api_key),
        ("authDomain", &settings.auth_domain),
        ("projectId", &settings.project_id),
        ("storageBucket", &settings.storage_bucket),
        ("messagingSenderId", &settings.messaging_sender_id),
        ("appId", &settings.app_id),
    ];
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(HubError::Config(format!(
            "Firebase runtime config not configured (missing: {})",
            missing.join(", ")
        )));
    }

    Ok(RuntimeConfig {
        firebase: FirebaseWebConfig {
            api_key: settings.api_key.clone(),
            auth_domain: settings.auth_domain.clone(),
            project_id: settings.project_id.clone(),
            storage_bucket: settings.storage_bucket.clone(),
            messaging_sender_id: settings.messaging_sender_id.clone(),
            app_id: settings.app_id.clone(),
        },
    })
}
