use thiserror::Error;

/// トークン列を望ましい状態へコンパイルする際のエラー
///
/// どの段階で失敗したかは [`CompileError::stage`] で取得できます。
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("トークンを解析できません: '{token}' ({reason})")]
    Parse { token: String, reason: String },

    #[error("パスを解決できません: '{path}' (セグメント '{segment}': {reason})")]
    Path {
        path: String,
        segment: String,
        reason: String,
    },

    #[error(
        "配列インデックスの順序が不正です: '{path}'; {site} の次のインデックスは {expected} である必要がありますが {got} が指定されました"
    )]
    ArrayOrdering {
        path: String,
        site: String,
        expected: usize,
        got: usize,
    },

    #[error("値の型が一致しません: {field} = '{value}' (期待される型: {expected})")]
    TypeCoercion {
        field: String,
        value: String,
        expected: String,
    },

    #[error("望ましい状態を型付き仕様に変換できません: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CompileError {
    /// 診断行に表示する段階名
    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Parse { .. } => "parse",
            CompileError::Path { .. } => "path",
            CompileError::ArrayOrdering { .. } => "array-ordering",
            CompileError::TypeCoercion { .. } => "type-coercion",
            CompileError::Decode(_) => "decode",
        }
    }

    pub(crate) fn parse(token: &str, reason: impl Into<String>) -> Self {
        CompileError::Parse {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
