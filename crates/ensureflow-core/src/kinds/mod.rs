//! リソース種別の定義
//!
//! 種別ごとにスキーマ、ショートカット表、推論規則、ショートハンド文法をまとめます。

pub mod bucket;
pub mod queue;
pub mod record;
pub mod security_group;
pub mod table;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::Field;
use crate::shortcut::{Implication, ShortcutTable};

pub use bucket::BucketSpec;
pub use queue::QueueSpec;
pub use record::RecordSpec;
pub use security_group::SecurityGroupSpec;
pub use table::TableSpec;

/// 一括照合で作成したリソースに付けるタグのキー
pub const INFRASET_TAG: &str = "ensureflow.infraset";

/// 照合対象のリソース種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// DynamoDB テーブル
    Table,
    /// S3 バケット
    Bucket,
    /// SQS キュー
    Queue,
    /// EC2 セキュリティグループ
    #[serde(rename = "sg")]
    SecurityGroup,
    /// Route53 レコード
    Record,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Table,
        ResourceKind::Bucket,
        ResourceKind::Queue,
        ResourceKind::SecurityGroup,
        ResourceKind::Record,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Table => "table",
            ResourceKind::Bucket => "bucket",
            ResourceKind::Queue => "queue",
            ResourceKind::SecurityGroup => "sg",
            ResourceKind::Record => "record",
        }
    }

    pub fn definition(&self) -> &'static KindDef {
        match self {
            ResourceKind::Table => &table::DEFINITION,
            ResourceKind::Bucket => &bucket::DEFINITION,
            ResourceKind::Queue => &queue::DEFINITION,
            ResourceKind::SecurityGroup => &security_group::DEFINITION,
            ResourceKind::Record => &record::DEFINITION,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" | "dynamodb" => Ok(ResourceKind::Table),
            "bucket" | "s3" => Ok(ResourceKind::Bucket),
            "queue" | "sqs" => Ok(ResourceKind::Queue),
            "sg" | "security-group" | "ec2" => Ok(ResourceKind::SecurityGroup),
            "record" | "dns" | "route53" => Ok(ResourceKind::Record),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}

/// `=` を含まないトークンの解釈
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shorthand {
    /// `name:type:role` をルートの `KeySchema` と `AttributeDefinitions` に追加する
    KeyTriple,
    /// `proto:port:source` をルートの `Rules` に追加する
    RuleTriple,
    /// トークンをそのまま指定のリストの末尾に追加する
    ListValue(&'static str),
}

/// 1つのリソース種別の静的な定義
#[derive(Debug)]
pub struct KindDef {
    pub kind: ResourceKind,
    /// リソース名を書き込むフィールド (利用者は設定できない)
    pub name_field: &'static str,
    pub fields: &'static [Field],
    pub shortcuts: ShortcutTable,
    pub implications: &'static [Implication],
    pub shorthand: Option<Shorthand>,
}

/// タグ (マップ型フィールドの要素)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
