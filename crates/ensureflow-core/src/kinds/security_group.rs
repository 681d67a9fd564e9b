//! EC2 セキュリティグループ
//!
//! インバウンドルールは `proto:port:source` の省略記法で並べます。
//!
//! ```text
//! ensure sg web vpc=main tcp:443:0.0.0.0/0 tcp:22:10.0.0.0/8 ::sg-0123456789abcdef0
//! ```
//!
//! プロトコルとポートを省略したルールは全トラフィックを許可します。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{KindDef, ResourceKind, Shorthand, Tag};
use crate::schema::{Field, Fill, INTEGER, STRING, ScalarType, Shape};
use crate::shortcut::{ShortcutEntry, ShortcutTable};

pub const PROTOCOLS: ScalarType = ScalarType::Enum(&["tcp", "udp", "icmp"]);

pub const MAX_PORT: i64 = 65535;

const RULE_FIELDS: &[Field] = &[
    Field {
        name: "Protocol",
        shape: Shape::Scalar(PROTOCOLS),
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "Port",
        shape: INTEGER,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "Source",
        shape: STRING,
        settable: true,
        fill: Fill::None,
    },
];

const FIELDS: &[Field] = &[
    Field {
        name: "GroupName",
        shape: STRING,
        settable: false,
        fill: Fill::None,
    },
    Field {
        name: "VpcName",
        shape: STRING,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "Description",
        shape: STRING,
        settable: true,
        fill: Fill::None,
    },
    Field {
        name: "Rules",
        shape: Shape::List(&Shape::Struct(RULE_FIELDS)),
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
        alias: "vpc",
        path: "VpcName",
        default: None,
    },
    ShortcutEntry {
        alias: "description",
        path: "Description",
        default: None,
    },
];

pub static DEFINITION: KindDef = KindDef {
    kind: ResourceKind::SecurityGroup,
    name_field: "GroupName",
    fields: FIELDS,
    shortcuts: ShortcutTable::new(SHORTCUTS),
    implications: &[],
    shorthand: Some(Shorthand::RuleTriple),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }
}

/// インバウンドルール 1 件
///
/// `protocol` と `port` がどちらも `None` なら全トラフィック。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressRule {
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub port: Option<i64>,
    pub source: String,
}

impl IngressRule {
    pub fn new(protocol: Option<Protocol>, port: Option<i64>, source: impl Into<String>) -> Self {
        Self {
            protocol,
            port,
            source: source.into(),
        }
    }

    /// プロトコルとポートの組み合わせを検査する
    pub fn check(&self) -> Result<(), String> {
        if self.source.is_empty() {
            return Err(format!("rule '{}' has no source", self));
        }
        if self.protocol.is_some() != self.port.is_some() {
            return Err(format!(
                "rule '{}' must give both protocol and port, or neither",
                self
            ));
        }
        match self.port {
            Some(port) if !(0..=MAX_PORT).contains(&port) => {
                Err(format!("rule '{}' has a port outside 0-{}", self, MAX_PORT))
            }
            _ => Ok(()),
        }
    }
}

/// 省略記法と同じ `proto:port:source` 形式
impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let protocol = self.protocol.map_or("", |protocol| protocol.as_str());
        let port = self.port.map(|port| port.to_string()).unwrap_or_default();
        write!(f, "{}:{}:{}", protocol, port, self.source)
    }
}

/// セキュリティグループの型付き仕様
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupSpec {
    pub group_name: String,
    /// `Name` タグで探す VPC。省略時は既定の VPC
    #[serde(default)]
    pub vpc_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<IngressRule>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl SecurityGroupSpec {
    /// 作成時の説明文 (省略時はグループ名)
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.group_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_display_matches_shorthand() {
        assert_eq!(
            IngressRule::new(Some(Protocol::Tcp), Some(22), "0.0.0.0/0").to_string(),
            "tcp:22:0.0.0.0/0"
        );
        assert_eq!(IngressRule::new(None, None, "sg-1").to_string(), "::sg-1");
    }

    #[test]
    fn test_rule_check() {
        assert!(IngressRule::new(Some(Protocol::Udp), Some(53), "10.0.0.0/8").check().is_ok());
        assert!(IngressRule::new(None, None, "sg-1").check().is_ok());
        assert!(IngressRule::new(Some(Protocol::Tcp), None, "sg-1").check().is_err());
        assert!(IngressRule::new(None, Some(22), "sg-1").check().is_err());
        assert!(IngressRule::new(Some(Protocol::Tcp), Some(70000), "sg-1").check().is_err());
        assert!(IngressRule::new(None, None, "").check().is_err());
    }
}
