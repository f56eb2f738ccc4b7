//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::auth::{StoredToken, TokenStore};
use crate::models::Contact;

/// Default portal API base URL (overridable via config or MONTEVERDE_API_URL).
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal API base URL
    pub api_url: Option<String>,
    /// Stored JWT access token
    pub access_token: Option<StoredToken>,
    /// Stored refresh token
    pub refresh_token: Option<String>,
    /// Logged-in user (from the login response)
    pub user: Option<Contact>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("MONTEVERDE_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let proj_dirs = ProjectDirs::from("es", "monteverde", "monteverde-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Effective API base URL: env var, then config file, then default.
    pub fn api_url(&self) -> String {
        std::env::var("MONTEVERDE_API_URL")
            .ok()
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn get_user(&self) -> Option<Contact> {
        self.user.clone()
    }

    pub fn set_user(&mut self, user: Contact) {
        self.user = Some(user);
    }
}

impl TokenStore for Config {
    fn get_access_token(&self) -> Option<StoredToken> {
        self.access_token.clone()
    }

    fn set_access_token(&mut self, token: String) {
        self.access_token = Some(StoredToken::new(token));
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_refresh_token(&mut self, token: String) {
        self.refresh_token = Some(token);
    }

    fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.user = None;
    }
}
