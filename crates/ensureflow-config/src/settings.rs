//! 利用者設定 (`~/.config/ensureflow/config.yaml`)

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

pub const SETTINGS_FILE: &str = "config.yaml";

/// プロバイダー呼び出しの再試行設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetrySettings {
    /// 待ち時間の計算が破綻する値を拒否する
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidSetting {
                key: "retry.backoff_multiplier",
                value: self.backoff_multiplier.to_string(),
                reason: "1.0 以上の有限値を指定してください",
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "retry.max_attempts",
                value: self.max_attempts.to_string(),
                reason: "1 以上を指定してください",
            });
        }
        Ok(())
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// AWS リージョン (未指定なら SDK の既定の解決順に従う)
    pub region: Option<String>,
    /// 共有認証情報ファイルのプロファイル名
    pub profile: Option<String>,
    pub retry: RetrySettings,
}

impl Settings {
    /// 設定ディレクトリの config.yaml を読み込む
    ///
    /// ファイルが無ければ既定値を使います。環境変数 `ENSURE_REGION` と
    /// `ENSURE_PROFILE` はファイルの値より優先されます。
    pub fn load() -> Result<Self> {
        let path = crate::config_dir()?.join(SETTINGS_FILE);
        let settings = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        Ok(settings.with_env_overrides())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        settings.retry.validate()?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(region) = non_empty_env("ENSURE_REGION") {
            self.region = Some(region);
        }
        if let Some(profile) = non_empty_env("ENSURE_PROFILE") {
            self.profile = Some(profile);
        }
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_load_partial_settings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(SETTINGS_FILE);
        fs::write(&path, "region: ap-northeast-1\nretry:\n  max_attempts: 5\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.region.as_deref(), Some("ap-northeast-1"));
        assert_eq!(settings.profile, None);
        assert_eq!(settings.retry.max_attempts, 5);
        // 指定していない項目は既定値
        assert_eq!(settings.retry.initial_delay_ms, 1000);
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(SETTINGS_FILE);
        fs::write(&path, "retry: [1, 2").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_load_rejects_overflowing_backoff() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(SETTINGS_FILE);
        fs::write(&path, "retry:\n  backoff_multiplier: 1e300\n").unwrap();
        assert!(Settings::load_from(&path).is_ok());

        fs::write(&path, "retry:\n  backoff_multiplier: 0.5\n").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSetting {
                key: "retry.backoff_multiplier",
                ..
            }
        ));

        fs::write(&path, "retry:\n  backoff_multiplier: .inf\n").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(ConfigError::InvalidSetting { .. })
        ));

        fs::write(&path, "retry:\n  max_attempts: 0\n").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(ConfigError::InvalidSetting {
                key: "retry.max_attempts",
                ..
            })
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("ENSURE_REGION", Some("eu-west-1")),
                ("ENSURE_PROFILE", None::<&str>),
            ],
            || {
                let settings = Settings {
                    region: Some("us-east-1".to_string()),
                    profile: Some("work".to_string()),
                    ..Settings::default()
                }
                .with_env_overrides();
                assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
                assert_eq!(settings.profile.as_deref(), Some("work"));
            },
        );
    }
}
