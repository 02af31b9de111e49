//! Centralized configuration for Awesome Manual.
//!
//! Constants for the HTTP surface, the database, seeding, and the on-disk
//! layout of the data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Awesome Manual";
    pub const DATA_DIR_NAME: &'static str = "awesome-manual";
    pub const USER_AGENT: &'static str = "Awesome-Manual/0.1";
}

/// Paths and fixed messages of the REST API.
pub struct ApiConfig;

impl ApiConfig {
    pub const BASE_PATH: &'static str = "/api/v1";
    pub const MANUALS_PATH: &'static str = "/api/v1/manuals";
    pub const ATTACHMENTS_PATH: &'static str = "/api/v1/attachments";
    pub const MANUAL_NOT_FOUND: &'static str = "Manual not found";
    pub const ATTACHMENT_NOT_FOUND: &'static str = "Attachment not found";
    /// Literal sent in place of a file to remove a step image.
    pub const REMOVE_IMAGE_SIGNAL: &'static str = "null";
}

/// SQLite connection settings.
pub struct DatabaseConfig;

impl DatabaseConfig {
    pub const FILENAME: &'static str = "manuals.db";
    pub const BUSY_TIMEOUT_MS: u32 = 30_000;
    /// Attempts at resolving a tag name before giving up on a uniqueness race.
    pub const TAG_RESOLVE_ATTEMPTS: u32 = 3;
}

/// HTTP server defaults.
pub struct ServerConfig;

impl ServerConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 3000;
    pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
}

/// Demo content seeding.
pub struct SeedConfig;

impl SeedConfig {
    pub const IMAGE_BASE_URL: &'static str = "https://picsum.photos/seed";
    pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
    pub const THUMBNAIL_SIZE: (u32, u32) = (400, 300);
    pub const STEP_IMAGE_SIZE: (u32, u32) = (600, 400);
}

/// Locations inside the data root.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub const STORAGE_DIR_NAME: &'static str = "storage";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Platform data directory, falling back to the working directory.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(AppConfig::DATA_DIR_NAME)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DatabaseConfig::FILENAME)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.root.join(Self::STORAGE_DIR_NAME)
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_paths_layout() {
        let paths = DataPaths::new("/srv/manuals");
        assert_eq!(paths.database_path(), PathBuf::from("/srv/manuals/manuals.db"));
        assert_eq!(paths.storage_dir(), PathBuf::from("/srv/manuals/storage"));
    }

    #[test]
    fn test_default_root_is_app_scoped() {
        assert!(DataPaths::default_root().ends_with(AppConfig::DATA_DIR_NAME));
    }

    #[test]
    fn test_api_paths_share_base() {
        assert!(ApiConfig::MANUALS_PATH.starts_with(ApiConfig::BASE_PATH));
        assert!(ApiConfig::ATTACHMENTS_PATH.starts_with(ApiConfig::BASE_PATH));
    }
}
