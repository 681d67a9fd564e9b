//! S3 バケット
//!
//! バケットのプロパティはすべてショートカットで指定でき、省略されたショートカットには
//! 既定値が補われます。

use serde::{Deserialize, Serialize};

use super::{KindDef, ResourceKind, Tag};
use crate::schema::{BOOLEAN, Field, Fill, INTEGER, STRING, ScalarType, Shape};
use crate::shortcut::{ShortcutEntry, ShortcutTable};

pub const ACLS: ScalarType = ScalarType::Enum(&["private", "public"]);

const TOGGLE_FIELDS: &[Field] = &[Field {
    name: "Enabled",
    shape: BOOLEAN,
    settable: true,
    fill: Fill::None,
}];
const TOGGLE: Shape = Shape::Struct(TOGGLE_FIELDS);

const FIELDS: &[Field] = &[
    Field {
        name: "Name",
        shape: STRING,
        settable: false,
        fill: Fill::None,
    },
    Field {
        name: "Acl",
        shape: Shape::Scalar(ACLS),
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "Versioning",
        shape: TOGGLE,
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "Encryption",
        shape: TOGGLE,
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "Metrics",
        shape: TOGGLE,
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "Cors",
        shape: TOGGLE,
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "Lifecycle",
        shape: Shape::Struct(&[Field {
            name: "ExpirationDays",
            shape: INTEGER,
            settable: true,
            fill: Fill::None,
        }]),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "Tags",
        shape: Shape::Map(ScalarType::String),
        settable: true,
        fill: Fill::Empty,
    },
];

const SHORTCUTS: &[ShortcutEntry] = &[
    ShortcutEntry {
        alias: "acl",
        path: "Acl",
        default: Some("private"),
    },
    ShortcutEntry {
        alias: "versioning",
        path: "Versioning.Enabled",
        default: Some("false"),
    },
    ShortcutEntry {
        alias: "encryption",
        path: "Encryption.Enabled",
        default: Some("true"),
    },
    ShortcutEntry {
        alias: "metrics",
        path: "Metrics.Enabled",
        default: Some("true"),
    },
    ShortcutEntry {
        alias: "cors",
        path: "Cors.Enabled",
        default: Some("false"),
    },
    ShortcutEntry {
        alias: "ttldays",
        path: "Lifecycle.ExpirationDays",
        default: Some("0"),
    },
];

pub static DEFINITION: KindDef = KindDef {
    kind: ResourceKind::Bucket,
    name_field: "Name",
    fields: FIELDS,
    shortcuts: ShortcutTable::new(SHORTCUTS),
    implications: &[],
    shorthand: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acl {
    #[default]
    Private,
    Public,
}

impl Acl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::Public => "public",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Toggle {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Lifecycle {
    /// 0 は期限切れ削除なし
    #[serde(default)]
    pub expiration_days: i64,
}

/// バケットの型付き仕様
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketSpec {
    pub name: String,
    #[serde(default)]
    pub acl: Acl,
    #[serde(default)]
    pub versioning: Toggle,
    #[serde(default)]
    pub encryption: Toggle,
    #[serde(default)]
    pub metrics: Toggle,
    #[serde(default)]
    pub cors: Toggle,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub tags: Vec<Tag>,
}
