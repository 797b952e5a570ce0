//! Configuration service.
//!
//! Layering: built-in defaults, then the TOML file, then `CHATSYNC__*`
//! environment variables (e.g. `CHATSYNC__SYNC__PAGE_SIZE=50`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ChatSyncError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Messages requested per history page.
    pub page_size: u32,
    /// Deactivated conversations kept in memory for quick reactivation.
    pub retained_conversations: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 20,
            retained_conversations: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub max_message_length: usize,
    pub max_group_name_length: usize,
    pub min_members: usize,
    pub max_members: usize,
    pub max_user_id_length: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            max_group_name_length: 100,
            min_members: 1,
            max_members: 100,
            max_user_id_length: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Sender id stamped on outbound messages.
    pub user_id: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSyncConfig {
    pub sync: SyncSettings,
    pub limits: LimitSettings,
    pub logging: LoggingSettings,
    pub identity: IdentitySettings,
}

impl ChatSyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sync.page_size == 0 {
            return Err(ChatSyncError::ConfigError(
                "sync.page_size must be greater than zero".to_string(),
            ));
        }
        if self.limits.min_members > self.limits.max_members {
            return Err(ChatSyncError::ConfigError(format!(
                "limits.min_members ({}) exceeds limits.max_members ({})",
                self.limits.min_members, self.limits.max_members
            )));
        }
        if self.identity.user_id.trim().is_empty() {
            return Err(ChatSyncError::ConfigError(
                "identity.user_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads, holds and persists the client configuration.
pub struct ConfigService {
    config: ChatSyncConfig,
    path: PathBuf,
}

impl ConfigService {
    /// Load from the default location.
    pub fn new() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("chatsync").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".chatsync/config.toml"))
    }

    /// Load from `path`. A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let defaults = config::Config::try_from(&ChatSyncConfig::default())
            .map_err(|e| ChatSyncError::ConfigError(format!("Defaults: {}", e)))?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("CHATSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ChatSyncError::ConfigError(format!("Load {:?}: {}", path, e)))?;

        let config: ChatSyncConfig = settings
            .try_deserialize()
            .map_err(|e| ChatSyncError::ConfigError(format!("Parse {:?}: {}", path, e)))?;
        config.validate()?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(Self {
            config,
            path: path.to_path_buf(),
        })
    }

    pub fn get(&self) -> ChatSyncConfig {
        self.config.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate, replace and persist.
    pub fn update(&mut self, config: ChatSyncConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(&self.config)
            .map_err(|e| ChatSyncError::ConfigError(format!("Serialize config: {}", e)))?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}
