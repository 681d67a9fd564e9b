//! 属性トークンの字句解析
//!
//! `Target=Value` 形式のトークンを最初の `=` で分割し、ターゲットを
//! ドット区切りのパスへ分解します。`=` を含まないトークンはショートハンドとして扱います。

use std::fmt;
use std::str::FromStr;

use crate::error::{CompileError, Result};

/// 1つのトークンを分類したもの
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `Target=Value`。値は最初の `=` 以降すべて (空文字も可)
    Assign { target: &'a str, value: &'a str },
    /// `=` を含まない位置引数
    Shorthand(&'a str),
}

/// トークンを分類する
pub fn lex(raw: &str) -> Token<'_> {
    match raw.split_once('=') {
        Some((target, value)) => Token::Assign { target, value },
        None => Token::Shorthand(raw),
    }
}

/// パスの1セグメント
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// ドット区切りのフィールドパス
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// パス文字列を解析する
    ///
    /// 空のセグメント (`A..B`、先頭や末尾のドット) は解析エラーになります。
    /// 数字のみで構成されるセグメントは配列インデックスとして扱います。
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(CompileError::parse(raw, "ターゲットが空です"));
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            if part.is_empty() {
                return Err(CompileError::parse(raw, "空のパスセグメントがあります"));
            }
            if part.bytes().all(|b| b.is_ascii_digit()) {
                let index = part.parse::<usize>().map_err(|_| {
                    CompileError::parse(raw, format!("インデックスが大きすぎます: {}", part))
                })?;
                segments.push(Segment::Index(index));
            } else {
                segments.push(Segment::Field(part.to_string()));
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 先頭 `len` セグメントだけのパス
    pub fn prefix(&self, len: usize) -> Path {
        Path {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }
}

impl FromStr for Path {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}
