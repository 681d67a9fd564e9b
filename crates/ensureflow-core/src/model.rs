//! 望ましい状態 (DesiredState)
//!
//! コンパイル結果の木です。各リーフは利用者が指定したものか既定値かを記録しており、
//! 照合エンジンは利用者が指定したプロパティだけを既存リソースと比較します。

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::kinds::ResourceKind;
use crate::token::{Path, Segment};

/// 型付けされたリーフ値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Boolean(bool),
    /// 列挙値。正規の表記を保持する
    Enum(&'static str),
}

impl Scalar {
    fn to_json(&self) -> Value {
        match self {
            Scalar::String(s) => Value::String(s.clone()),
            Scalar::Integer(n) => Value::from(*n),
            Scalar::Boolean(b) => Value::Bool(*b),
            Scalar::Enum(e) => Value::String((*e).to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(n) => write!(f, "{}", n),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Enum(e) => f.write_str(e),
        }
    }
}

/// 値の出どころ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// トークン、またはトークンからの推論で与えられた
    Supplied,
    /// 既定値で補われた
    Defaulted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub value: Scalar,
    pub origin: Origin,
}

impl Leaf {
    pub fn new(value: Scalar, origin: Origin) -> Self {
        Self { value, origin }
    }

    pub fn is_supplied(&self) -> bool {
        self.origin == Origin::Supplied
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Leaf),
    Branch(Branch),
    List(Vec<Node>),
    /// 挿入順を保つ文字列キーのマップ
    Map(Vec<(String, Leaf)>),
}

impl Node {
    /// 配下に利用者が指定したリーフが1つでもあるか
    pub fn is_supplied(&self) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.is_supplied(),
            Node::Branch(branch) => branch.entries.iter().any(|(_, node)| node.is_supplied()),
            Node::List(items) => items.iter().any(Node::is_supplied),
            Node::Map(entries) => entries.iter().any(|(_, leaf)| leaf.is_supplied()),
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Node::Leaf(leaf) => leaf.value.to_json(),
            Node::Branch(branch) => branch.to_json(),
            Node::List(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Map(entries) => Value::Array(
                entries
                    .iter()
                    .map(|(key, leaf)| {
                        let mut pair = Map::new();
                        pair.insert("Key".to_string(), Value::String(key.clone()));
                        pair.insert("Value".to_string(), leaf.value.to_json());
                        Value::Object(pair)
                    })
                    .collect(),
            ),
        }
    }
}

/// 名前付きの子ノードを定義順 (初出順) に保持する構造体ノード
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Branch {
    entries: Vec<(&'static str, Node)>,
}

impl Branch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(key, _)| *key == name)
            .map(|(_, node)| node)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &Node)> {
        self.entries.iter().map(|(key, node)| (*key, node))
    }

    /// 子ノードを設定する。既にあれば置き換える (後勝ち)
    pub fn set(&mut self, name: &'static str, node: Node) {
        match self.get_mut(name) {
            Some(slot) => *slot = node,
            None => self.entries.push((name, node)),
        }
    }

    /// 子ノードを取得する。なければ `make` で作成して追加する
    fn entry(&mut self, name: &'static str, make: impl FnOnce() -> Node) -> &mut Node {
        let position = match self.entries.iter().position(|(key, _)| *key == name) {
            Some(position) => position,
            None => {
                self.entries.push((name, make()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }

    /// 構造体の子を取得または作成する
    ///
    /// 同名の子が構造体以外であれば置き換えます。スキーマに従って
    /// 構築している限り起こりません。
    pub fn branch_mut(&mut self, name: &'static str) -> &mut Branch {
        let node = self.entry(name, || Node::Branch(Branch::new()));
        if !matches!(node, Node::Branch(_)) {
            *node = Node::Branch(Branch::new());
        }
        match node {
            Node::Branch(branch) => branch,
            _ => unreachable!("branch was just inserted"),
        }
    }

    pub fn list_mut(&mut self, name: &'static str) -> &mut Vec<Node> {
        let node = self.entry(name, || Node::List(Vec::new()));
        if !matches!(node, Node::List(_)) {
            *node = Node::List(Vec::new());
        }
        match node {
            Node::List(items) => items,
            _ => unreachable!("list was just inserted"),
        }
    }

    pub fn map_mut(&mut self, name: &'static str) -> &mut Vec<(String, Leaf)> {
        let node = self.entry(name, || Node::Map(Vec::new()));
        if !matches!(node, Node::Map(_)) {
            *node = Node::Map(Vec::new());
        }
        match node {
            Node::Map(entries) => entries,
            _ => unreachable!("map was just inserted"),
        }
    }

    /// パスを辿ってノードを探す
    pub fn lookup(&self, path: &Path) -> Option<&Node> {
        let mut segments = path.segments().iter();
        let first = match segments.next()? {
            Segment::Field(name) => self.get(name)?,
            Segment::Index(_) => return None,
        };

        segments.try_fold(first, |node, segment| match (node, segment) {
            (Node::Branch(branch), Segment::Field(name)) => branch.get(name),
            (Node::List(items), Segment::Index(index)) => items.get(*index),
            (Node::Map(entries), segment) => {
                let key = segment.to_string();
                // マップのリーフは Node ではないため、ここでは存在確認のみ行う
                entries.iter().any(|(k, _)| *k == key).then_some(node)
            }
            _ => None,
        })
    }

    fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (key, node) in &self.entries {
            object.insert((*key).to_string(), node.to_json());
        }
        Value::Object(object)
    }
}

/// 望ましい状態: リソース種別、名前、作成リクエストの木
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    kind: ResourceKind,
    name: String,
    root: Branch,
}

impl DesiredState {
    pub(crate) fn new(kind: ResourceKind, name: impl Into<String>, root: Branch) -> Self {
        Self {
            kind,
            name: name.into(),
            root,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Branch {
        &self.root
    }

    /// ドット区切りのパスでノードを探す
    pub fn get(&self, path: &str) -> Option<&Node> {
        let path = Path::parse(path).ok()?;
        self.root.lookup(&path)
    }

    /// パスのリーフを取得する
    pub fn leaf(&self, path: &str) -> Option<&Leaf> {
        self.get(path).and_then(Node::as_leaf)
    }

    /// パス配下に利用者が指定した値があるか
    pub fn is_supplied(&self, path: &str) -> bool {
        self.get(path).is_some_and(Node::is_supplied)
    }

    /// 作成リクエストの JSON 表現
    pub fn to_json(&self) -> Value {
        self.root.to_json()
    }

    /// 種別ごとの型付き仕様へ変換する
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplied(value: Scalar) -> Node {
        Node::Leaf(Leaf::new(value, Origin::Supplied))
    }

    #[test]
    fn test_branch_set_is_last_write_wins() {
        let mut branch = Branch::new();
        branch.set("A", supplied(Scalar::Integer(1)));
        branch.set("B", supplied(Scalar::Integer(2)));
        branch.set("A", supplied(Scalar::Integer(3)));

        let keys: Vec<_> = branch.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(
            branch.get("A").and_then(Node::as_leaf).map(|l| &l.value),
            Some(&Scalar::Integer(3))
        );
    }

    #[test]
    fn test_supplied_tracking_through_nesting() {
        let mut root = Branch::new();
        root.branch_mut("Empty");
        root.branch_mut("Spec").set(
            "Enabled",
            Node::Leaf(Leaf::new(Scalar::Boolean(false), Origin::Defaulted)),
        );
        root.list_mut("Items").push(supplied(Scalar::String("x".into())));

        let state = DesiredState::new(ResourceKind::Table, "t", root);
        assert!(!state.is_supplied("Empty"));
        assert!(!state.is_supplied("Spec"));
        assert!(state.is_supplied("Items"));
        assert!(state.is_supplied("Items.0"));
        assert!(!state.is_supplied("Missing"));
    }

    #[test]
    fn test_map_serializes_as_key_value_pairs() {
        let mut root = Branch::new();
        root.map_mut("Tags").push((
            "env".to_string(),
            Leaf::new(Scalar::String("prod".into()), Origin::Supplied),
        ));
        let state = DesiredState::new(ResourceKind::Bucket, "b", root);
        assert_eq!(
            state.to_json(),
            serde_json::json!({"Tags": [{"Key": "env", "Value": "prod"}]})
        );
        assert!(state.get("Tags.env").is_some());
        assert!(state.get("Tags.other").is_none());
    }
}
