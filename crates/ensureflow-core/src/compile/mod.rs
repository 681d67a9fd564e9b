//! トークン列のコンパイル
//!
//! 字句解析、ショートカット展開、パスの書き込み、既定値の補完を順に行い、
//! [`DesiredState`] を組み立てます。リモートへの問い合わせは一切行いません。

mod binder;
mod defaults;

pub use binder::{KeyTriple, PathBinder, RuleTriple};

use tracing::debug;

use crate::error::{CompileError, Result};
use crate::kinds::{ResourceKind, Tag};
use crate::model::DesiredState;

/// リソース名とトークン列から望ましい状態を作る
///
/// 同じ入力からは常に同じ結果になります。
pub fn compile<S: AsRef<str>>(
    kind: ResourceKind,
    name: &str,
    tokens: &[S],
) -> Result<DesiredState> {
    compile_with_tags(kind, name, tokens, &[])
}

/// [`compile`] に加え、作成時だけ付けるタグを既定値として補う
///
/// 既定値なので既存リソースとの比較には使われません。
pub fn compile_with_tags<S: AsRef<str>>(
    kind: ResourceKind,
    name: &str,
    tokens: &[S],
    tags: &[Tag],
) -> Result<DesiredState> {
    if name.is_empty() {
        return Err(CompileError::parse(name, "リソース名が空です"));
    }

    let mut binder = PathBinder::new(kind.definition(), name);
    for token in tokens {
        binder.bind_token(token.as_ref())?;
    }
    binder.default_tags(tags);
    defaults::fill(&mut binder)?;

    debug!(kind = %kind, name, tokens = tokens.len(), "compiled desired state");
    Ok(DesiredState::new(kind, name, binder.finish()))
}
