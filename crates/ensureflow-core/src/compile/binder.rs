//! パスバインダー
//!
//! 正規パスをスキーマに沿って辿り、望ましい状態の木へ値を書き込みます。
//! 配列インデックスは 0 から昇順に与える必要があり、現在の末尾要素を
//! 再度指定することだけが許されます (複数フィールドを持つ要素のため)。

use tracing::trace;

use crate::error::{CompileError, Result};
use crate::kinds::security_group::{MAX_PORT, PROTOCOLS};
use crate::kinds::table::{ATTRIBUTE_TYPES, KEY_TYPES};
use crate::kinds::{KindDef, Shorthand, Tag};
use crate::model::{Branch, Leaf, Node, Origin, Scalar};
use crate::schema::{self, Field, ScalarType, Shape};
use crate::shortcut::implied_by;
use crate::token::{self, Path, Segment, Token};

const KEY_SCHEMA: &str = "KeySchema";
const ATTRIBUTE_DEFINITIONS: &str = "AttributeDefinitions";
const RULES: &str = "Rules";
const TAGS: &str = "Tags";

/// 書き込みの主体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// 利用者のトークン。推論専用フィールドには書き込めない
    User,
    /// 推論規則や既定値
    Internal,
}

/// `name:type:role` 形式のキー指定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTriple {
    pub name: String,
    pub attribute_type: &'static str,
    pub key_type: &'static str,
}

impl KeyTriple {
    /// キー指定を解析する。`token` はエラー表示用の元トークン
    pub fn parse(token: &str, raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        let [name, attribute_type, key_type] = parts.as_slice() else {
            return Err(CompileError::parse(
                token,
                "キーは 'name:type:role' 形式で指定してください (例: id:s:hash)",
            ));
        };
        if name.is_empty() {
            return Err(CompileError::parse(token, "キーの属性名が空です"));
        }

        let attribute_type = match ATTRIBUTE_TYPES.coerce(attribute_type) {
            Some(Scalar::Enum(value)) => value,
            _ => {
                return Err(CompileError::parse(
                    token,
                    format!("属性型は s, n, b のいずれかです: '{}'", attribute_type),
                ));
            }
        };
        let key_type = match KEY_TYPES.coerce(key_type) {
            Some(Scalar::Enum(value)) => value,
            _ => {
                return Err(CompileError::parse(
                    token,
                    format!("キー種別は hash, range のいずれかです: '{}'", key_type),
                ));
            }
        };

        Ok(Self {
            name: name.to_string(),
            attribute_type,
            key_type,
        })
    }

    fn key_element(&self, origin: Origin) -> Node {
        let mut element = Branch::new();
        element.set(
            "AttributeName",
            Node::Leaf(Leaf::new(Scalar::String(self.name.clone()), origin)),
        );
        element.set(
            "KeyType",
            Node::Leaf(Leaf::new(Scalar::Enum(self.key_type), origin)),
        );
        Node::Branch(element)
    }

    fn attribute_definition(&self, origin: Origin) -> Node {
        let mut definition = Branch::new();
        definition.set(
            "AttributeName",
            Node::Leaf(Leaf::new(Scalar::String(self.name.clone()), origin)),
        );
        definition.set(
            "AttributeType",
            Node::Leaf(Leaf::new(Scalar::Enum(self.attribute_type), origin)),
        );
        Node::Branch(definition)
    }
}

/// `proto:port:source` 形式のインバウンドルール
///
/// プロトコルとポートは両方指定するか両方省略します (省略は全トラフィック)。
/// 送信元は最初の 2 つの `:` より後ろすべてなので IPv6 の CIDR も書けます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTriple {
    pub protocol: Option<&'static str>,
    pub port: Option<i64>,
    pub source: String,
}

impl RuleTriple {
    pub fn parse(token: &str, raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, ':');
        let (Some(protocol), Some(port), Some(source)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CompileError::parse(
                token,
                "ルールは 'proto:port:source' 形式で指定してください (例: tcp:22:0.0.0.0/0)",
            ));
        };
        if source.is_empty() {
            return Err(CompileError::parse(token, "ルールの送信元が空です"));
        }

        let protocol = if protocol.is_empty() {
            None
        } else {
            match PROTOCOLS.coerce(protocol) {
                Some(Scalar::Enum(value)) => Some(value),
                _ => {
                    return Err(CompileError::parse(
                        token,
                        format!("プロトコルは tcp, udp, icmp のいずれかです: '{}'", protocol),
                    ));
                }
            }
        };
        let port = if port.is_empty() {
            None
        } else {
            match port.parse::<i64>() {
                Ok(port) if (0..=MAX_PORT).contains(&port) => Some(port),
                _ => {
                    return Err(CompileError::parse(
                        token,
                        format!("ポートは 0-{} の整数です: '{}'", MAX_PORT, port),
                    ));
                }
            }
        };
        if protocol.is_some() != port.is_some() {
            return Err(CompileError::parse(
                token,
                "プロトコルとポートは両方指定するか、両方省略してください",
            ));
        }

        Ok(Self {
            protocol,
            port,
            source: source.to_string(),
        })
    }

    fn element(&self, origin: Origin) -> Node {
        let mut rule = Branch::new();
        if let Some(protocol) = self.protocol {
            rule.set("Protocol", Node::Leaf(Leaf::new(Scalar::Enum(protocol), origin)));
        }
        if let Some(port) = self.port {
            rule.set("Port", Node::Leaf(Leaf::new(Scalar::Integer(port), origin)));
        }
        rule.set(
            "Source",
            Node::Leaf(Leaf::new(Scalar::String(self.source.clone()), origin)),
        );
        Node::Branch(rule)
    }
}

/// 1回の書き込みの文脈
struct Binding<'a> {
    token: &'a str,
    path: &'a Path,
    value: &'a str,
    origin: Origin,
    access: Access,
}

impl Binding<'_> {
    fn path_error(&self, at: usize, reason: impl Into<String>) -> CompileError {
        let segment = self
            .path
            .segments()
            .get(at)
            .map(ToString::to_string)
            .unwrap_or_default();
        CompileError::Path {
            path: self.path.to_string(),
            segment,
            reason: reason.into(),
        }
    }

    fn coerce(&self, ty: &ScalarType) -> Result<Scalar> {
        ty.coerce(self.value)
            .ok_or_else(|| CompileError::TypeCoercion {
                field: self.path.to_string(),
                value: self.value.to_string(),
                expected: ty.describe(),
            })
    }

    fn is_last(&self, at: usize) -> bool {
        at + 1 == self.path.len()
    }

    fn index_at(&self, at: usize) -> Result<usize> {
        match self.path.segments().get(at) {
            Some(Segment::Index(index)) => Ok(*index),
            Some(Segment::Field(_)) => Err(self.path_error(at, "配列インデックスが必要です")),
            None => Err(self.path_error(at.saturating_sub(1), "配列インデックスが必要です")),
        }
    }

    /// 配列の書き込み先を決める
    ///
    /// 現在の長さと同じインデックスは追加、末尾のインデックスは既存要素の再利用。
    /// それ以外 (飛び番や過去の要素) は順序エラーです。
    fn slot(&self, len: usize, index: usize, at: usize) -> Result<usize> {
        if index == len || (len > 0 && index == len - 1) {
            Ok(index)
        } else {
            Err(CompileError::ArrayOrdering {
                path: self.path.to_string(),
                site: self.path.prefix(at).to_string(),
                expected: len,
                got: index,
            })
        }
    }
}

/// トークンを望ましい状態の木へ書き込む
pub struct PathBinder {
    definition: &'static KindDef,
    root: Branch,
}

impl PathBinder {
    pub fn new(definition: &'static KindDef, name: &str) -> Self {
        let mut root = Branch::new();
        root.set(
            definition.name_field,
            Node::Leaf(Leaf::new(Scalar::String(name.to_string()), Origin::Supplied)),
        );
        Self { definition, root }
    }

    pub fn definition(&self) -> &'static KindDef {
        self.definition
    }

    /// トークンを1つ書き込む
    pub fn bind_token(&mut self, raw: &str) -> Result<()> {
        match token::lex(raw) {
            Token::Shorthand(text) => match self.definition.shorthand {
                Some(Shorthand::KeyTriple) => {
                    let key = KeyTriple::parse(raw, text)?;
                    self.root
                        .list_mut(KEY_SCHEMA)
                        .push(key.key_element(Origin::Supplied));
                    self.upsert_attribute(&key)
                }
                Some(Shorthand::RuleTriple) => {
                    let rule = RuleTriple::parse(raw, text)?;
                    self.root.list_mut(RULES).push(rule.element(Origin::Supplied));
                    Ok(())
                }
                Some(Shorthand::ListValue(field)) => {
                    self.root.list_mut(field).push(Node::Leaf(Leaf::new(
                        Scalar::String(text.to_string()),
                        Origin::Supplied,
                    )));
                    Ok(())
                }
                None => Err(CompileError::parse(
                    raw,
                    format!(
                        "{} には位置引数の省略記法がありません。'Target=Value' 形式で指定してください",
                        self.definition.kind
                    ),
                )),
            },
            Token::Assign { target, value } => {
                if target.is_empty() {
                    return Err(CompileError::parse(raw, "ターゲットが空です"));
                }

                let canonical = self.definition.shortcuts.resolve(target);
                let path = Path::parse(canonical).map_err(|err| match err {
                    CompileError::Parse { reason, .. } => CompileError::parse(raw, reason),
                    other => other,
                })?;
                self.bind(raw, &path, value, Origin::Supplied, Access::User)?;

                for (implied_path, implied_value) in
                    implied_by(self.definition.implications, canonical)
                {
                    let implied = Path::parse(implied_path)?;
                    self.bind(raw, &implied, implied_value, Origin::Supplied, Access::Internal)?;
                }
                Ok(())
            }
        }
    }

    /// 値がまだ無ければ既定値を書き込む
    pub fn bind_default(&mut self, path: &str, value: &str) -> Result<()> {
        let parsed = Path::parse(path)?;
        if self.root.lookup(&parsed).is_some() {
            return Ok(());
        }
        self.bind(path, &parsed, value, Origin::Defaulted, Access::Internal)
    }

    /// タグを既定値として加える
    ///
    /// 利用者が同じキーを指定していればそちらが優先されます。タグを持たない
    /// 種別では何もしません。
    pub fn default_tags(&mut self, tags: &[Tag]) {
        let has_tags = schema::lookup(self.definition.fields, TAGS)
            .is_some_and(|field| matches!(field.shape, Shape::Map(_)));
        if !has_tags || tags.is_empty() {
            return;
        }

        let entries = self.root.map_mut(TAGS);
        for tag in tags {
            if !entries.iter().any(|(key, _)| *key == tag.key) {
                entries.push((
                    tag.key.clone(),
                    Leaf::new(Scalar::String(tag.value.clone()), Origin::Defaulted),
                ));
            }
        }
    }

    pub fn root_mut(&mut self) -> &mut Branch {
        &mut self.root
    }

    pub fn finish(self) -> Branch {
        self.root
    }

    fn bind(
        &mut self,
        token: &str,
        path: &Path,
        value: &str,
        origin: Origin,
        access: Access,
    ) -> Result<()> {
        let binding = Binding {
            token,
            path,
            value,
            origin,
            access,
        };

        if let Some(key) = bind_struct(&mut self.root, self.definition.fields, &binding, 0)? {
            self.upsert_attribute(&key)?;
        }
        trace!(path = %path, value, ?origin, "bound");
        Ok(())
    }

    /// キー指定の属性をテーブルの AttributeDefinitions に追加する
    ///
    /// 同名の属性が既にあれば型が一致する限り何もしません。
    fn upsert_attribute(&mut self, key: &KeyTriple) -> Result<()> {
        let definitions = self.root.list_mut(ATTRIBUTE_DEFINITIONS);
        for existing in definitions.iter() {
            let Node::Branch(definition) = existing else {
                continue;
            };
            let same_name = definition
                .get("AttributeName")
                .and_then(Node::as_leaf)
                .is_some_and(|leaf| matches!(&leaf.value, Scalar::String(name) if *name == key.name));
            if !same_name {
                continue;
            }

            let declared = definition
                .get("AttributeType")
                .and_then(Node::as_leaf)
                .map(|leaf| leaf.value.to_string());
            return match declared {
                Some(declared) if declared != key.attribute_type => {
                    Err(CompileError::TypeCoercion {
                        field: format!("{}.{}", ATTRIBUTE_DEFINITIONS, key.name),
                        value: key.attribute_type.to_string(),
                        expected: declared,
                    })
                }
                _ => Ok(()),
            };
        }

        definitions.push(key.attribute_definition(Origin::Supplied));
        Ok(())
    }
}

fn bind_struct(
    branch: &mut Branch,
    fields: &'static [Field],
    binding: &Binding<'_>,
    at: usize,
) -> Result<Option<KeyTriple>> {
    let name = match &binding.path.segments()[at] {
        Segment::Field(name) => name,
        Segment::Index(_) => {
            return Err(binding.path_error(at, "フィールド名が必要な位置に配列インデックスがあります"));
        }
    };
    let field = schema::lookup(fields, name)
        .ok_or_else(|| binding.path_error(at, "未知のフィールドです"))?;
    if !field.settable && binding.access == Access::User {
        return Err(binding.path_error(
            at,
            "このフィールドは他の値から推論されるため直接設定できません",
        ));
    }

    match field.shape {
        Shape::Scalar(ty) => {
            if !binding.is_last(at) {
                return Err(binding.path_error(at + 1, "スカラー値に子フィールドはありません"));
            }
            let value = binding.coerce(&ty)?;
            branch.set(field.name, Node::Leaf(Leaf::new(value, binding.origin)));
            Ok(None)
        }
        Shape::Struct(children) => {
            if binding.is_last(at) {
                return Err(binding.path_error(at, "構造体に値を直接設定することはできません"));
            }
            bind_struct(branch.branch_mut(field.name), children, binding, at + 1)
        }
        Shape::List(element) => {
            let index = binding.index_at(at + 1)?;
            bind_element(branch.list_mut(field.name), element, index, binding, at + 1)
        }
        Shape::Map(ty) => {
            if binding.is_last(at) {
                return Err(binding.path_error(at, "マップのキーが必要です"));
            }
            if !binding.is_last(at + 1) {
                return Err(binding.path_error(at + 2, "マップの値に子フィールドはありません"));
            }
            let key = binding.path.segments()[at + 1].to_string();
            let leaf = Leaf::new(binding.coerce(&ty)?, binding.origin);
            let entries = branch.map_mut(field.name);
            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, slot)) => *slot = leaf,
                None => entries.push((key, leaf)),
            }
            Ok(None)
        }
        Shape::KeyTriple => {
            let index = binding.index_at(at + 1)?;
            if !binding.is_last(at + 1) {
                return Err(binding.path_error(at + 2, "キー指定に子フィールドはありません"));
            }
            let key = KeyTriple::parse(binding.token, binding.value)?;
            let schema = branch.list_mut(KEY_SCHEMA);
            let slot = binding.slot(schema.len(), index, at + 1)?;
            let element = key.key_element(binding.origin);
            if slot == schema.len() {
                schema.push(element);
            } else {
                schema[slot] = element;
            }
            Ok(Some(key))
        }
    }
}

fn bind_element(
    items: &mut Vec<Node>,
    element: &'static Shape,
    index: usize,
    binding: &Binding<'_>,
    at: usize,
) -> Result<Option<KeyTriple>> {
    let slot = binding.slot(items.len(), index, at)?;

    match element {
        Shape::Scalar(ty) => {
            if !binding.is_last(at) {
                return Err(binding.path_error(at + 1, "スカラー値に子フィールドはありません"));
            }
            let leaf = Node::Leaf(Leaf::new(binding.coerce(ty)?, binding.origin));
            if slot == items.len() {
                items.push(leaf);
            } else {
                items[slot] = leaf;
            }
            Ok(None)
        }
        Shape::Struct(children) => {
            if binding.is_last(at) {
                return Err(binding.path_error(at, "配列要素のフィールド名が必要です"));
            }
            if slot == items.len() {
                items.push(Node::Branch(Branch::new()));
            }
            match &mut items[slot] {
                Node::Branch(item) => bind_struct(item, *children, binding, at + 1),
                _ => Err(binding.path_error(at, "配列要素が構造体ではありません")),
            }
        }
        _ => Err(binding.path_error(at, "入れ子の配列には対応していません")),
    }
}
