//! Route53 レコード
//!
//! リソース名はレコードの完全修飾名です。`=` を含まないトークンはレコードの値として
//! 順に `Values` へ追加されます。
//!
//! ```text
//! ensure record api.example.com type=A ttl=60 10.0.0.1 10.0.0.2
//! ensure record www.example.com alias=d111.cloudfront.net aliaszone=Z2FDTNDATAQYW2
//! ```

use serde::{Deserialize, Serialize};

use super::{KindDef, ResourceKind, Shorthand};
use crate::schema::{BOOLEAN, Field, Fill, INTEGER, STRING, ScalarType, Shape};
use crate::shortcut::{ShortcutEntry, ShortcutTable};

pub const RECORD_TYPES: ScalarType = ScalarType::Enum(&[
    "A", "AAAA", "CAA", "CNAME", "DS", "MX", "NAPTR", "NS", "PTR", "SOA", "SPF", "SRV", "TXT",
]);

/// エイリアスでないレコードで TTL を省略した場合の値
pub const DEFAULT_TTL: i64 = 300;

const ALIAS_FIELDS: &[Field] = &[
    Field {
        name: "DNSName",
        shape: STRING,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "HostedZoneId",
        shape: STRING,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "EvaluateTargetHealth",
        shape: BOOLEAN,
        settable: true,
        fill: Fill::Value("false"),
    },
];

const FIELDS: &[Field] = &[
    Field {
        name: "Name",
        shape: STRING,
        settable: false,
        fill: Fill::None,
    },
    Field {
        name: "Zone",
        shape: STRING,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "Type",
        shape: Shape::Scalar(RECORD_TYPES),
        settable: true,
        fill: Fill::Value("A"),
    },
    Field {
        name: "TTL",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "Values",
        shape: Shape::List(&STRING),
        settable: true,
        fill: Fill::Empty,
    },
    Field {
        name: "AliasTarget",
        shape: Shape::Struct(ALIAS_FIELDS),
        settable: true,
        fill: Fill::None,
    },
];

const SHORTCUTS: &[ShortcutEntry] = &[
    ShortcutEntry {
        alias: "zone",
        path: "Zone",
        default: None,
    },
    ShortcutEntry {
        alias: "type",
        path: "Type",
        default: None,
    },
    ShortcutEntry {
        alias: "ttl",
        path: "TTL",
        default: None,
    },
    ShortcutEntry {
        alias: "alias",
        path: "AliasTarget.DNSName",
        default: None,
    },
    ShortcutEntry {
        alias: "aliaszone",
        path: "AliasTarget.HostedZoneId",
        default: None,
    },
    ShortcutEntry {
        alias: "hostedzoneid",
        path: "AliasTarget.HostedZoneId",
        default: None,
    },
];

pub static DEFINITION: KindDef = KindDef {
    kind: ResourceKind::Record,
    name_field: "Name",
    fields: FIELDS,
    shortcuts: ShortcutTable::new(SHORTCUTS),
    implications: &[],
    shorthand: Some(Shorthand::ListValue("Values")),
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: String,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
    #[serde(rename = "EvaluateTargetHealth", default)]
    pub evaluate_target_health: bool,
}

/// レコードの型付き仕様
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    #[serde(rename = "Name")]
    pub name: String,
    /// ホストゾーン名。省略時はレコード名に最も長く一致するゾーン
    #[serde(rename = "Zone", default)]
    pub zone: Option<String>,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(rename = "TTL", default)]
    pub ttl: Option<i64>,
    #[serde(rename = "Values", default)]
    pub values: Vec<String>,
    #[serde(rename = "AliasTarget", default)]
    pub alias_target: Option<AliasTarget>,
}

impl RecordSpec {
    /// 末尾のドットを除いたレコード名
    pub fn fqdn(&self) -> &str {
        trim_dot(&self.name)
    }

    /// 作成時に使う TTL (エイリアスには TTL が無い)
    pub fn effective_ttl(&self) -> Option<i64> {
        if self.alias_target.is_some() {
            None
        } else {
            Some(self.ttl.unwrap_or(DEFAULT_TTL))
        }
    }
}

/// DNS 名の末尾のドットを除く
pub fn trim_dot(name: &str) -> &str {
    name.trim_end_matches('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(alias: bool, ttl: Option<i64>) -> RecordSpec {
        RecordSpec {
            name: "api.example.com.".to_string(),
            zone: None,
            record_type: "A".to_string(),
            ttl,
            values: vec![],
            alias_target: alias.then(|| AliasTarget {
                dns_name: "d111.cloudfront.net".to_string(),
                hosted_zone_id: "Z2FDTNDATAQYW2".to_string(),
                evaluate_target_health: false,
            }),
        }
    }

    #[test]
    fn test_effective_ttl() {
        assert_eq!(spec(false, None).effective_ttl(), Some(DEFAULT_TTL));
        assert_eq!(spec(false, Some(60)).effective_ttl(), Some(60));
        assert_eq!(spec(true, None).effective_ttl(), None);
        assert_eq!(spec(true, None).fqdn(), "api.example.com");
    }
}
