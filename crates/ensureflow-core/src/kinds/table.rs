//! DynamoDB テーブル
//!
//! 作成リクエストのスキーマと、コンパイル結果を変換する型付き仕様を定義します。
//!
//! ```text
//! ensure table orders id:s:hash created:n:range read=5 write=5 \
//!     GlobalSecondaryIndexes.0.IndexName=by-user \
//!     GlobalSecondaryIndexes.0.Key.0=user:s:hash \
//!     GlobalSecondaryIndexes.0.Projection.ProjectionType=ALL
//! ```

use serde::{Deserialize, Serialize};

use super::{KindDef, ResourceKind, Shorthand, Tag};
use crate::schema::{BOOLEAN, Field, Fill, INTEGER, STRING, ScalarType, Shape};
use crate::shortcut::{Implication, ShortcutEntry, ShortcutTable};

pub const ATTRIBUTE_TYPES: ScalarType = ScalarType::Enum(&["S", "N", "B"]);
pub const KEY_TYPES: ScalarType = ScalarType::Enum(&["HASH", "RANGE"]);
pub const BILLING_MODES: ScalarType = ScalarType::Enum(&["PROVISIONED", "PAY_PER_REQUEST"]);
pub const STREAM_VIEW_TYPES: ScalarType =
    ScalarType::Enum(&["NEW_IMAGE", "OLD_IMAGE", "NEW_AND_OLD_IMAGES", "KEYS_ONLY"]);
pub const SSE_TYPES: ScalarType = ScalarType::Enum(&["AES256", "KMS"]);
pub const PROJECTION_TYPES: ScalarType = ScalarType::Enum(&["ALL", "KEYS_ONLY", "INCLUDE"]);

const ATTRIBUTE_DEFINITION_FIELDS: &[Field] = &[
    Field {
        name: "AttributeName",
        shape: STRING,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "AttributeType",
        shape: Shape::Scalar(ATTRIBUTE_TYPES),
        settable: true,
        fill: Fill::None,
    },
];
const ATTRIBUTE_DEFINITION: Shape = Shape::Struct(ATTRIBUTE_DEFINITION_FIELDS);

const KEY_ELEMENT_FIELDS: &[Field] = &[
    Field {
        name: "AttributeName",
        shape: STRING,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "KeyType",
        shape: Shape::Scalar(KEY_TYPES),
        settable: true,
        fill: Fill::None,
    },
];
const KEY_ELEMENT: Shape = Shape::Struct(KEY_ELEMENT_FIELDS);

const THROUGHPUT_FIELDS: &[Field] = &[
    Field {
        name: "ReadCapacityUnits",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "WriteCapacityUnits",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
];

const PROJECTION_FIELDS: &[Field] = &[
    Field {
        name: "ProjectionType",
        shape: Shape::Scalar(PROJECTION_TYPES),
        settable: true,
        fill: Fill::Value("ALL"),
    },
    Field {
        name: "NonKeyAttributes",
        shape: Shape::List(&STRING),
        settable: true,
        fill: Fill::None,
    },
];

const INDEX_NAME: Field = Field {
    name: "IndexName",
    shape: STRING,
    settable: true,
    fill: Fill::None,
};
const INDEX_KEY: Field = Field {
    name: "Key",
    shape: Shape::KeyTriple,
    settable: true,
    fill: Fill::None,
};
const INDEX_KEY_SCHEMA: Field = Field {
    name: "KeySchema",
    shape: Shape::List(&KEY_ELEMENT),
    settable: true,
    fill: Fill::Empty,
};
const INDEX_PROJECTION: Field = Field {
    name: "Projection",
    shape: Shape::Struct(PROJECTION_FIELDS),
    settable: true,
    fill: Fill::Empty,
};

const LOCAL_INDEX_FIELDS: &[Field] = &[INDEX_NAME, INDEX_KEY, INDEX_KEY_SCHEMA, INDEX_PROJECTION];
const LOCAL_INDEX: Shape = Shape::Struct(LOCAL_INDEX_FIELDS);

const GLOBAL_INDEX_FIELDS: &[Field] = &[
    INDEX_NAME,
    INDEX_KEY,
    INDEX_KEY_SCHEMA,
    INDEX_PROJECTION,
    Field {
        name: "ProvisionedThroughput",
        shape: Shape::Struct(THROUGHPUT_FIELDS),
        settable: true,
        fill: Fill::Empty,
    },
];
const GLOBAL_INDEX: Shape = Shape::Struct(GLOBAL_INDEX_FIELDS);

const FIELDS: &[Field] = &[
    Field {
        name: "TableName",
        shape: STRING,
        settable: false,
        fill: Fill::None,
    },
    Field {
        name: "AttributeDefinitions",
        shape: Shape::List(&ATTRIBUTE_DEFINITION),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "KeySchema",
        shape: Shape::List(&KEY_ELEMENT),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "BillingMode",
        shape: Shape::Scalar(BILLING_MODES),
        settable: false,
        fill: Fill::Value("PAY_PER_REQUEST"),
    },
    Field {
        name: "ProvisionedThroughput",
        shape: Shape::Struct(THROUGHPUT_FIELDS),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "StreamSpecification",
        shape: Shape::Struct(&[
            Field {
                name: "StreamEnabled",
                shape: BOOLEAN,
                settable: true,
                fill: Fill::Value("false"),
            },
            Field {
                name: "StreamViewType",
                shape: Shape::Scalar(STREAM_VIEW_TYPES),
                settable: true,
                fill: Fill::None,
            },
        ]),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "SSESpecification",
        shape: Shape::Struct(&[
            Field {
                name: "Enabled",
                shape: BOOLEAN,
                settable: true,
                fill: Fill::None,
            },
            Field {
                name: "SSEType",
                shape: Shape::Scalar(SSE_TYPES),
                settable: false,
                fill: Fill::None,
            },
            Field {
                name: "KMSMasterKeyId",
                shape: STRING,
                settable: true,
                fill: Fill::None,
            },
        ]),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "LocalSecondaryIndexes",
        shape: Shape::List(&LOCAL_INDEX),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "GlobalSecondaryIndexes",
        shape: Shape::List(&GLOBAL_INDEX),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "Tags",
        shape: Shape::Map(ScalarType::String),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "TimeToLiveSpecification",
        shape: Shape::Struct(&[
            Field {
                name: "AttributeName",
                shape: STRING,
                settable: true,
                fill: Fill::None,
            },
            Field {
                name: "Enabled",
                shape: BOOLEAN,
                settable: true,
                fill: Fill::None,
            },
        ]),
        settable: true,
        fill: Fill::Empty,
    },
];

const SHORTCUTS: &[ShortcutEntry] = &[
    ShortcutEntry {
        alias: "read",
        path: "ProvisionedThroughput.ReadCapacityUnits",
        default: None,
    },
    ShortcutEntry {
        alias: "write",
        path: "ProvisionedThroughput.WriteCapacityUnits",
        default: None,
    },
    ShortcutEntry {
        alias: "stream",
        path: "StreamSpecification.StreamViewType",
        default: None,
    },
    ShortcutEntry {
        alias: "ttl",
        path: "TimeToLiveSpecification.AttributeName",
        default: None,
    },
];

const IMPLICATIONS: &[Implication] = &[
    Implication {
        when: "ProvisionedThroughput.ReadCapacityUnits",
        then: &[("BillingMode", "PROVISIONED")],
    },
    Implication {
        when: "ProvisionedThroughput.WriteCapacityUnits",
        then: &[("BillingMode", "PROVISIONED")],
    },
    Implication {
        when: "StreamSpecification.StreamViewType",
        then: &[("StreamSpecification.StreamEnabled", "true")],
    },
    Implication {
        when: "SSESpecification.KMSMasterKeyId",
        then: &[
            ("SSESpecification.Enabled", "true"),
            ("SSESpecification.SSEType", "KMS"),
        ],
    },
    Implication {
        when: "TimeToLiveSpecification.AttributeName",
        then: &[("TimeToLiveSpecification.Enabled", "true")],
    },
];

pub static DEFINITION: KindDef = KindDef {
    kind: ResourceKind::Table,
    name_field: "TableName",
    fields: FIELDS,
    shortcuts: ShortcutTable::new(SHORTCUTS),
    implications: IMPLICATIONS,
    shorthand: Some(Shorthand::KeyTriple),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    S,
    N,
    B,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::S => "S",
            AttributeType::N => "N",
            AttributeType::B => "B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    Hash,
    Range,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Hash => "HASH",
            KeyType::Range => "RANGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    Provisioned,
    PayPerRequest,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Provisioned => "PROVISIONED",
            BillingMode::PayPerRequest => "PAY_PER_REQUEST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamViewType {
    NewImage,
    OldImage,
    NewAndOldImages,
    KeysOnly,
}

impl StreamViewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamViewType::NewImage => "NEW_IMAGE",
            StreamViewType::OldImage => "OLD_IMAGE",
            StreamViewType::NewAndOldImages => "NEW_AND_OLD_IMAGES",
            StreamViewType::KeysOnly => "KEYS_ONLY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SseType {
    #[serde(rename = "AES256")]
    Aes256,
    #[serde(rename = "KMS")]
    Kms,
}

impl SseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SseType::Aes256 => "AES256",
            SseType::Kms => "KMS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionType {
    All,
    KeysOnly,
    Include,
}

impl ProjectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionType::All => "ALL",
            ProjectionType::KeysOnly => "KEYS_ONLY",
            ProjectionType::Include => "INCLUDE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: Option<i64>,
    pub write_capacity_units: Option<i64>,
}

impl ProvisionedThroughput {
    pub fn new(read: i64, write: i64) -> Self {
        Self {
            read_capacity_units: Some(read),
            write_capacity_units: Some(write),
        }
    }

    /// 読み書きどちらも指定されていない
    pub fn is_empty(&self) -> bool {
        self.read_capacity_units.is_none() && self.write_capacity_units.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamSpecification {
    #[serde(default)]
    pub stream_enabled: bool,
    pub stream_view_type: Option<StreamViewType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SseSpecification {
    #[serde(rename = "Enabled")]
    pub enabled: Option<bool>,
    #[serde(rename = "SSEType")]
    pub sse_type: Option<SseType>,
    #[serde(rename = "KMSMasterKeyId")]
    pub kms_master_key_id: Option<String>,
}

impl SseSpecification {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.sse_type.is_none() && self.kms_master_key_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Projection {
    pub projection_type: Option<ProjectionType>,
    #[serde(default)]
    pub non_key_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalSecondaryIndex {
    pub index_name: String,
    #[serde(default)]
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    pub projection: Projection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalSecondaryIndex {
    pub index_name: String,
    #[serde(default)]
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    pub projection: Projection,
    #[serde(default)]
    pub provisioned_throughput: ProvisionedThroughput,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeToLiveSpecification {
    pub attribute_name: Option<String>,
    pub enabled: Option<bool>,
}

/// テーブルの型付き仕様
///
/// 省略されたプロパティは既定値または空の値として表現されます。
/// どのプロパティが利用者によって指定されたかは [`crate::DesiredState`] 側で判定します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableSpec {
    pub table_name: String,
    #[serde(default)]
    pub attribute_definitions: Vec<AttributeDefinition>,
    #[serde(default)]
    pub key_schema: Vec<KeySchemaElement>,
    pub billing_mode: BillingMode,
    #[serde(default)]
    pub provisioned_throughput: ProvisionedThroughput,
    #[serde(default)]
    pub stream_specification: StreamSpecification,
    #[serde(rename = "SSESpecification", default)]
    pub sse_specification: SseSpecification,
    #[serde(default)]
    pub local_secondary_indexes: Vec<LocalSecondaryIndex>,
    #[serde(default)]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub time_to_live_specification: TimeToLiveSpecification,
}

impl TableSpec {
    pub fn global_index(&self, name: &str) -> Option<&GlobalSecondaryIndex> {
        self.global_secondary_indexes
            .iter()
            .find(|index| index.index_name == name)
    }
}
