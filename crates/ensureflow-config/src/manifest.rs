//! 一括照合用のマニフェスト
//!
//! ```yaml
//! infraset: web
//! table:
//!   events: [ "id:s:hash", "ts:n:range", "stream=new_image" ]
//! bucket:
//!   assets: [ "acl=public", "versioning=true" ]
//! queue:
//!   jobs: [ "timeout=60" ]
//! sg:
//!   web: [ "vpc=main", "tcp:443:0.0.0.0/0" ]
//! record:
//!   www.example.com: [ "alias=d111.cloudfront.net", "aliaszone=Z2FDTNDATAQYW2" ]
//! ```
//!
//! `infraset` を書くと、タグを持つ種別のリソースに `ensureflow.infraset` タグが付きます。

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use ensureflow_core::{INFRASET_TAG, ResourceKind, Tag};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

pub const MANIFEST_FILE: &str = "ensure.yaml";

/// マニフェストのパスを上書きする環境変数
pub const MANIFEST_PATH_ENV: &str = "ENSURE_MANIFEST_PATH";

/// マニフェストを探す
///
/// 1. `ENSURE_MANIFEST_PATH` 環境変数 (ファイルが無ければエラー)
/// 2. カレントディレクトリから親へ向かって最初に見つかった `ensure.yaml`
pub fn find_manifest_file() -> Result<PathBuf> {
    if let Ok(path) = env::var(MANIFEST_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
        return Err(ConfigError::ManifestPathMissing(path));
    }

    let cwd = env::current_dir()?;
    manifest_in_ancestors(&cwd).ok_or(ConfigError::ManifestNotFound(cwd))
}

/// `start` とその親ディレクトリのうち、`ensure.yaml` を持つ最も近いもの
pub fn manifest_in_ancestors(start: &Path) -> Option<PathBuf> {
    let found = start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_FILE))
        .find(|path| path.is_file());
    debug!(start = %start.display(), found = ?found, "manifest search");
    found
}

/// マニフェストの1エントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub kind: ResourceKind,
    pub name: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    /// このマニフェストのリソースをまとめる名前
    pub infraset: Option<String>,
    pub table: BTreeMap<String, Vec<String>>,
    pub bucket: BTreeMap<String, Vec<String>>,
    pub queue: BTreeMap<String, Vec<String>>,
    pub sg: BTreeMap<String, Vec<String>>,
    pub record: BTreeMap<String, Vec<String>>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 種別順 (table, bucket, queue, sg, record)、名前順に並べたエントリ
    pub fn entries(&self) -> Vec<ManifestEntry> {
        let sections = [
            (ResourceKind::Table, &self.table),
            (ResourceKind::Bucket, &self.bucket),
            (ResourceKind::Queue, &self.queue),
            (ResourceKind::SecurityGroup, &self.sg),
            (ResourceKind::Record, &self.record),
        ];

        sections
            .into_iter()
            .flat_map(|(kind, resources)| {
                resources.iter().map(move |(name, tokens)| ManifestEntry {
                    kind,
                    name: name.clone(),
                    tokens: tokens.clone(),
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// 全リソースに既定で付けるタグ
    pub fn default_tags(&self) -> Vec<Tag> {
        self.infraset
            .iter()
            .map(|name| Tag::new(INFRASET_TAG, name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_load_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ensure.yaml");
        fs::write(
            &path,
            r#"
table:
  events: ["id:s:hash", "ts:n:range", "stream=new_image"]
queue:
  jobs: ["timeout=60"]
  alerts: []
"#,
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        let entries = manifest.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, ResourceKind::Table);
        assert_eq!(entries[0].tokens.len(), 3);
        // 同じ種別の中では名前順
        assert_eq!(entries[1].name, "alerts");
        assert_eq!(entries[2].name, "jobs");
        assert!(manifest.bucket.is_empty());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ensure.yaml");
        fs::write(&path, "topic:\n  news: []\n").unwrap();

        assert!(matches!(
            Manifest::load(&path),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_sg_record_and_infraset() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(MANIFEST_FILE);
        fs::write(
            &path,
            r#"
infraset: web
record:
  www.example.com: ["10.0.0.1"]
sg:
  web: ["tcp:443:0.0.0.0/0"]
"#,
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        let kinds: Vec<_> = manifest.entries().iter().map(|entry| entry.kind).collect();
        assert_eq!(kinds, vec![ResourceKind::SecurityGroup, ResourceKind::Record]);
        assert!(!manifest.is_empty());
        assert_eq!(manifest.default_tags(), vec![Tag::new(INFRASET_TAG, "web")]);

        assert!(Manifest::default().default_tags().is_empty());
        assert!(Manifest::default().is_empty());
    }

    #[test]
    fn test_manifest_found_in_parent_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("services").join("api");
        fs::create_dir_all(&nested).unwrap();
        let path = temp_dir.path().join(MANIFEST_FILE);
        fs::write(&path, "queue: {}\n").unwrap();

        assert_eq!(manifest_in_ancestors(&nested), Some(path.clone()));
        assert_eq!(manifest_in_ancestors(temp_dir.path()), Some(path));
    }

    #[test]
    #[serial]
    fn test_manifest_path_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("infra.yaml");
        fs::write(&path, "table: {}\n").unwrap();

        temp_env::with_var(MANIFEST_PATH_ENV, Some(&path), || {
            assert_eq!(find_manifest_file().unwrap(), path);
        });

        let missing = temp_dir.path().join("missing.yaml");
        temp_env::with_var(MANIFEST_PATH_ENV, Some(&missing), || {
            assert!(matches!(
                find_manifest_file(),
                Err(ConfigError::ManifestPathMissing(p)) if p == missing
            ));
        });
    }
}
