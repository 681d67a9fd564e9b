pub mod error;
pub mod manifest;
pub mod settings;

pub use error::*;
pub use manifest::{MANIFEST_FILE, Manifest, ManifestEntry, find_manifest_file};
pub use settings::{RetrySettings, Settings};

use std::path::PathBuf;

/// 利用者設定のディレクトリ (`~/.config/ensureflow`)
///
/// 読み込み専用なので作成はしません。
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("ensureflow"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let dir = config_dir().unwrap();
        assert!(dir.ends_with("ensureflow"));
    }
}
