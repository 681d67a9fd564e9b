use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "マニフェスト (ensure.yaml) が見つかりません: {0} とその親ディレクトリを探しました\n\
        ENSURE_MANIFEST_PATH 環境変数かコマンド引数でパスを指定できます"
    )]
    ManifestNotFound(PathBuf),

    #[error("ENSURE_MANIFEST_PATH のファイルがありません: {0}")]
    ManifestPathMissing(PathBuf),

    #[error("YAML の解析に失敗しました: {path}\n理由: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("設定値が不正です: {key} = {value} ({reason})")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
