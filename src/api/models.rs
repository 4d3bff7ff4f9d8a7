use serde::{Deserialize, Serialize};

/// A user-registered page monitored for changes, optionally scoped to a
/// CSS selector. The server owns these; the client only renders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedUrl {
    pub url: String,
    #[serde(default)]
    pub css_selector: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access: String,
}

fn default_ring_count() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_ring_count")]
    pub ring_count: u32,
    #[serde(default)]
    pub volume: Option<u32>,
    #[serde(default)]
    pub play_loop: Option<bool>,
    #[serde(default)]
    pub default_ringtone_url: Option<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            ring_count: default_ring_count(),
            volume: None,
            play_loop: None,
            default_ringtone_url: None,
        }
    }
}

/// The server wraps settings in a `{"settings": {...}}` envelope.
#[derive(Debug, Deserialize)]
pub struct SettingsEnvelope {
    pub settings: UserSettings,
}

#[derive(Debug, Serialize)]
pub struct SettingsUpdate {
    pub ring_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_loop: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadResponse {
    pub ok: bool,
    #[serde(default)]
    pub updated: u64,
}
