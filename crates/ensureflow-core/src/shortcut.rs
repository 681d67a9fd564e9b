//! ショートカット表と推論規則
//!
//! ショートカットは正規パスの別名です。推論規則は正規パスに紐づくため、
//! 別名で書いても正規パスで書いても同じ結果になります。

/// 別名 1 件
#[derive(Debug, Clone, Copy)]
pub struct ShortcutEntry {
    pub alias: &'static str,
    /// 別名が展開される正規パス
    pub path: &'static str,
    /// トークン列に現れなかった場合の既定値
    pub default: Option<&'static str>,
}

/// リソース種別ごとの別名表
#[derive(Debug, Clone, Copy)]
pub struct ShortcutTable {
    entries: &'static [ShortcutEntry],
}

impl ShortcutTable {
    pub const fn new(entries: &'static [ShortcutEntry]) -> Self {
        Self { entries }
    }

    /// ターゲットを正規パスへ展開する
    ///
    /// 別名は大文字小文字を区別せずに照合します。別名でなければそのまま返します。
    pub fn resolve<'a>(&self, target: &'a str) -> &'a str {
        self.find(target).map(|entry| entry.path).unwrap_or(target)
    }

    pub fn find(&self, target: &str) -> Option<&'static ShortcutEntry> {
        self.entries
            .iter()
            .find(|entry| entry.alias.eq_ignore_ascii_case(target))
    }

    pub fn entries(&self) -> &'static [ShortcutEntry] {
        self.entries
    }
}

/// 正規パスへの代入が、別のフィールドの値を推論させる規則
///
/// 推論された値は利用者が指定したものとして扱われ、直接設定できない
/// フィールドにも書き込まれます。
#[derive(Debug, Clone, Copy)]
pub struct Implication {
    /// 推論のきっかけとなる正規パス
    pub when: &'static str,
    pub then: &'static [(&'static str, &'static str)],
}

/// `path` への代入で発火する推論をすべて返す
pub fn implied_by(
    implications: &'static [Implication],
    path: &str,
) -> impl Iterator<Item = &'static (&'static str, &'static str)> {
    implications
        .iter()
        .filter(move |implication| implication.when == path)
        .flat_map(|implication| implication.then.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: ShortcutTable = ShortcutTable::new(&[
        ShortcutEntry {
            alias: "read",
            path: "ProvisionedThroughput.ReadCapacityUnits",
            default: None,
        },
        ShortcutEntry {
            alias: "acl",
            path: "Acl",
            default: Some("private"),
        },
    ]);

    const IMPLICATIONS: &[Implication] = &[Implication {
        when: "ProvisionedThroughput.ReadCapacityUnits",
        then: &[("BillingMode", "PROVISIONED")],
    }];

    #[test]
    fn test_resolve_alias_case_insensitive() {
        assert_eq!(
            TABLE.resolve("READ"),
            "ProvisionedThroughput.ReadCapacityUnits"
        );
        assert_eq!(TABLE.resolve("Other.Path"), "Other.Path");
        assert_eq!(TABLE.find("acl").and_then(|e| e.default), Some("private"));
    }

    #[test]
    fn test_implications_keyed_on_canonical_path() {
        let implied: Vec<_> =
            implied_by(IMPLICATIONS, TABLE.resolve("read")).collect();
        assert_eq!(implied, vec![&("BillingMode", "PROVISIONED")]);
        assert_eq!(implied_by(IMPLICATIONS, "read").count(), 0);
    }
}
