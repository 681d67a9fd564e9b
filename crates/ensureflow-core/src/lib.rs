//! ensureflow-core
//!
//! `Target=Value` 形式の属性トークンを、リソース種別ごとのスキーマに沿って
//! 望ましい状態 (DesiredState) へコンパイルします。
//!
//! ```
//! use ensureflow_core::{ResourceKind, TableSpec, compile};
//!
//! let desired = compile(ResourceKind::Table, "orders", &["id:s:hash", "read=5", "write=5"]).unwrap();
//! let spec: TableSpec = desired.decode().unwrap();
//! assert_eq!(spec.billing_mode.as_str(), "PROVISIONED");
//! ```

pub mod compile;
pub mod error;
pub mod kinds;
pub mod model;
pub mod schema;
pub mod shortcut;
pub mod token;

pub use compile::{compile, compile_with_tags};
pub use error::{CompileError, Result};
pub use kinds::{
    BucketSpec, INFRASET_TAG, QueueSpec, RecordSpec, ResourceKind, SecurityGroupSpec, TableSpec,
    Tag,
};
pub use model::{Branch, DesiredState, Leaf, Node, Origin, Scalar};
