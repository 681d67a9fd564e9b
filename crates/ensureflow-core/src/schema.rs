//! リソーススキーマ
//!
//! 各リソース種別の作成リクエストを静的なフィールド表の木として表現します。
//! バインダーはこの表に沿ってパスを辿り、未知のフィールドを拒否します。

use crate::model::Scalar;

/// リーフの値型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    Boolean,
    /// 閉じた列挙。大文字小文字を区別せずに照合し、正規の表記に揃える
    Enum(&'static [&'static str]),
}

impl ScalarType {
    /// リテラルを型に合わせて変換する。変換できなければ `None`
    pub fn coerce(&self, literal: &str) -> Option<Scalar> {
        match self {
            ScalarType::String => Some(Scalar::String(literal.to_string())),
            ScalarType::Integer => literal.parse::<i64>().ok().map(Scalar::Integer),
            ScalarType::Boolean => {
                if literal.eq_ignore_ascii_case("true") {
                    Some(Scalar::Boolean(true))
                } else if literal.eq_ignore_ascii_case("false") {
                    Some(Scalar::Boolean(false))
                } else {
                    None
                }
            }
            ScalarType::Enum(members) => members
                .iter()
                .copied()
                .find(|member| member.eq_ignore_ascii_case(literal))
                .map(Scalar::Enum),
        }
    }

    /// エラーメッセージ用の型の説明
    pub fn describe(&self) -> String {
        match self {
            ScalarType::String => "string".to_string(),
            ScalarType::Integer => "integer".to_string(),
            ScalarType::Boolean => "boolean (true|false)".to_string(),
            ScalarType::Enum(members) => format!("one of {}", members.join("|")),
        }
    }
}

/// フィールドの形
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    Scalar(ScalarType),
    Struct(&'static [Field]),
    /// 要素の形。インデックスは 0 から昇順に埋める
    List(&'static Shape),
    /// 任意キーを持つ文字列マップ (タグなど)
    Map(ScalarType),
    /// `name:type:role` を受け取り、兄弟の `KeySchema` へ追加しつつ
    /// ルートの `AttributeDefinitions` を更新する
    KeyTriple,
}

/// 省略時の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    None,
    /// 空の構造体・リスト・マップとして常に存在させる
    Empty,
    /// 既定値
    Value(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    /// `false` のフィールドは推論専用で、利用者が直接設定すると拒否される
    pub settable: bool,
    pub fill: Fill,
}

/// フィールド表から名前でフィールドを探す (大文字小文字は区別する)
pub fn lookup(fields: &'static [Field], name: &str) -> Option<&'static Field> {
    fields.iter().find(|field| field.name == name)
}

pub const STRING: Shape = Shape::Scalar(ScalarType::String);
pub const INTEGER: Shape = Shape::Scalar(ScalarType::Integer);
pub const BOOLEAN: Shape = Shape::Scalar(ScalarType::Boolean);

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: ScalarType = ScalarType::Enum(&["PROVISIONED", "PAY_PER_REQUEST"]);

    #[test]
    fn test_coerce_enum_normalizes_case() {
        assert_eq!(
            MODES.coerce("pay_per_request"),
            Some(Scalar::Enum("PAY_PER_REQUEST"))
        );
        assert_eq!(MODES.coerce("ON_DEMAND"), None);
    }

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(ScalarType::Integer.coerce("-3"), Some(Scalar::Integer(-3)));
        assert_eq!(ScalarType::Integer.coerce("3x"), None);
        assert_eq!(ScalarType::Boolean.coerce("TRUE"), Some(Scalar::Boolean(true)));
        assert_eq!(ScalarType::Boolean.coerce("yes"), None);
        assert_eq!(
            ScalarType::String.coerce(""),
            Some(Scalar::String(String::new()))
        );
    }
}
