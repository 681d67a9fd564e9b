//! SQS キュー

use serde::{Deserialize, Serialize};

use super::{KindDef, ResourceKind, Tag};
use crate::schema::{Field, Fill, INTEGER, STRING, ScalarType, Shape};
use crate::shortcut::{ShortcutEntry, ShortcutTable};

/// KMS キーを指定しなかった場合に使う AWS 管理キー
pub const DEFAULT_KMS_MASTER_KEY_ID: &str = "alias/aws/sqs";

const ATTRIBUTE_FIELDS: &[Field] = &[
    Field {
        name: "DelaySeconds",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "MaximumMessageSize",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "MessageRetentionPeriod",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "ReceiveMessageWaitTimeSeconds",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "VisibilityTimeout",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "KmsDataKeyReusePeriodSeconds",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "KmsMasterKeyId",
        shape: STRING,
        settable: true,
        fill: Fill::Value(DEFAULT_KMS_MASTER_KEY_ID),
    },
];

const FIELDS: &[Field] = &[
    Field {
        name: "QueueName",
        shape: STRING,
        settable: false,
        fill: Fill::None,
    },
    Field {
        name: "Attributes",
        shape: Shape::Struct(ATTRIBUTE_FIELDS),
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
        alias: "delay",
        path: "Attributes.DelaySeconds",
        default: None,
    },
    ShortcutEntry {
        alias: "size",
        path: "Attributes.MaximumMessageSize",
        default: None,
    },
    ShortcutEntry {
        alias: "retention",
        path: "Attributes.MessageRetentionPeriod",
        default: None,
    },
    ShortcutEntry {
        alias: "wait",
        path: "Attributes.ReceiveMessageWaitTimeSeconds",
        default: None,
    },
    ShortcutEntry {
        alias: "timeout",
        path: "Attributes.VisibilityTimeout",
        default: None,
    },
    ShortcutEntry {
        alias: "kms",
        path: "Attributes.KmsMasterKeyId",
        default: None,
    },
    ShortcutEntry {
        alias: "DelaySeconds",
        path: "Attributes.DelaySeconds",
        default: None,
    },
    ShortcutEntry {
        alias: "MaximumMessageSize",
        path: "Attributes.MaximumMessageSize",
        default: None,
    },
    ShortcutEntry {
        alias: "MessageRetentionPeriod",
        path: "Attributes.MessageRetentionPeriod",
        default: None,
    },
    ShortcutEntry {
        alias: "ReceiveMessageWaitTimeSeconds",
        path: "Attributes.ReceiveMessageWaitTimeSeconds",
        default: None,
    },
    ShortcutEntry {
        alias: "VisibilityTimeout",
        path: "Attributes.VisibilityTimeout",
        default: None,
    },
    ShortcutEntry {
        alias: "KmsDataKeyReusePeriodSeconds",
        path: "Attributes.KmsDataKeyReusePeriodSeconds",
        default: None,
    },
    ShortcutEntry {
        alias: "KmsMasterKeyId",
        path: "Attributes.KmsMasterKeyId",
        default: None,
    },
];

pub static DEFINITION: KindDef = KindDef {
    kind: ResourceKind::Queue,
    name_field: "QueueName",
    fields: FIELDS,
    shortcuts: ShortcutTable::new(SHORTCUTS),
    implications: &[],
    shorthand: None,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueAttributes {
    pub delay_seconds: Option<i64>,
    pub maximum_message_size: Option<i64>,
    pub message_retention_period: Option<i64>,
    pub receive_message_wait_time_seconds: Option<i64>,
    pub visibility_timeout: Option<i64>,
    pub kms_data_key_reuse_period_seconds: Option<i64>,
    pub kms_master_key_id: Option<String>,
}

impl QueueAttributes {
    /// SQS の属性名と文字列値の組 (値のあるものだけ)
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let numbers = [
            ("DelaySeconds", self.delay_seconds),
            ("MaximumMessageSize", self.maximum_message_size),
            ("MessageRetentionPeriod", self.message_retention_period),
            (
                "ReceiveMessageWaitTimeSeconds",
                self.receive_message_wait_time_seconds,
            ),
            ("VisibilityTimeout", self.visibility_timeout),
            (
                "KmsDataKeyReusePeriodSeconds",
                self.kms_data_key_reuse_period_seconds,
            ),
        ];

        let mut entries: Vec<_> = numbers
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v.to_string())))
            .collect();
        if let Some(key) = &self.kms_master_key_id {
            entries.push(("KmsMasterKeyId", key.clone()));
        }
        entries
    }
}

/// キューの型付き仕様
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueSpec {
    pub queue_name: String,
    #[serde(default)]
    pub attributes: QueueAttributes,
    #[serde(default)]
    pub tags: Vec<Tag>,
}
