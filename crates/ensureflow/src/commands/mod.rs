pub mod apply;
pub mod compile;
pub mod ensure;

use std::time::Duration;

use colored::Colorize;
use ensureflow_cloud::{EnsureError, RetryConfig};
use ensureflow_cloud_aws::{AwsProviders, load_sdk_config};
use ensureflow_config::{ConfigError, RetrySettings, Settings};
use ensureflow_core::CompileError;

use crate::AwsOptions;

/// 失敗した段階の名前
pub fn stage_of(err: &anyhow::Error) -> &'static str {
    if let Some(err) = err.downcast_ref::<EnsureError>() {
        err.stage()
    } else if let Some(err) = err.downcast_ref::<CompileError>() {
        err.stage()
    } else if err.downcast_ref::<ConfigError>().is_some() {
        "config"
    } else {
        "internal"
    }
}

/// `Error [<stage>]: <message>` の1行を stderr に出力する
pub fn report_error(err: &anyhow::Error) {
    eprintln!(
        "{} {}",
        format!("Error [{}]:", stage_of(err)).red().bold(),
        err
    );
}

pub fn print_ensure_error(err: &EnsureError) {
    eprintln!(
        "{} {}",
        format!("Error [{}]:", err.stage()).red().bold(),
        err
    );
}

/// 設定ファイルと CLI 引数から AWS プロバイダーを組み立てる
///
/// CLI 引数 (または環境変数) が設定ファイルより優先されます。
pub async fn connect(options: &AwsOptions) -> anyhow::Result<AwsProviders> {
    let mut settings = Settings::load()?;
    if let Some(region) = &options.region {
        settings.region = Some(region.clone());
    }
    if let Some(profile) = &options.profile {
        settings.profile = Some(profile.clone());
    }

    let config = load_sdk_config(settings.region.as_deref(), settings.profile.as_deref()).await;
    Ok(AwsProviders::new(&config, retry_config(&settings.retry)))
}

pub fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig {
        max_attempts: settings.max_attempts.max(1),
        initial_delay: Duration::from_millis(settings.initial_delay_ms),
        max_delay: Duration::from_millis(settings.max_delay_ms),
        backoff_multiplier: settings.backoff_multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensureflow_core::{ResourceKind, compile};

    #[test]
    fn test_stage_of_compile_error() {
        let err = compile(ResourceKind::Table, "orders", &["ProvisionedThroughput.FakeName=10"])
            .unwrap_err();
        assert_eq!(stage_of(&anyhow::Error::from(err)), "path");
    }

    #[test]
    fn test_stage_of_other_errors() {
        assert_eq!(
            stage_of(&anyhow::Error::from(ConfigError::ManifestNotFound("/srv".into()))),
            "config"
        );
        assert_eq!(stage_of(&anyhow::anyhow!("boom")), "internal");
    }

    #[test]
    fn test_retry_config_from_settings() {
        let retry = retry_config(&RetrySettings {
            max_attempts: 0,
            initial_delay_ms: 250,
            max_delay_ms: 2000,
            backoff_multiplier: 3.0,
        });
        assert_eq!(retry.max_attempts, 1);
        assert_eq!(retry.initial_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, Duration::from_secs(2));
    }
}
