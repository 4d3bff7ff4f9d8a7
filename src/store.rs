use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// What survives across runs: the last email that logged in, used only to
/// pre-fill the login prompt. It says nothing about whether a token is
/// still valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredProfile {
    email: Option<String>,
}

pub struct ProfileStore {
    path: PathBuf,
    data: RwLock<StoredProfile>,
}

impl ProfileStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read profile from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            StoredProfile::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn email(&self) -> Option<String> {
        self.data.read().unwrap().email.clone()
    }

    pub fn remember_email(&self, email: &str) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.email = Some(email.to_string());
        self.persist(&guard)
    }

    pub fn forget_email(&self) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.email = None;
        self.persist(&guard)
    }

    fn persist(&self, data: &StoredProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write profile to {}", self.path.display()))
    }
}
