//! 既定値の補完
//!
//! トークンの書き込みが終わった後に実行し、省略されたショートカットの既定値と
//! フィールドの既定値を書き込みます。補った値はすべて `Origin::Defaulted` です。

use crate::error::{CompileError, Result};
use crate::model::{Branch, Leaf, Node, Origin};
use crate::schema::{Field, Fill, Shape};

use super::binder::PathBinder;

pub(crate) fn fill(binder: &mut PathBinder) -> Result<()> {
    let definition = binder.definition();

    for entry in definition.shortcuts.entries() {
        if let Some(default) = entry.default {
            binder.bind_default(entry.path, default)?;
        }
    }

    fill_branch(binder.root_mut(), definition.fields)
}

fn fill_branch(branch: &mut Branch, fields: &'static [Field]) -> Result<()> {
    for field in fields {
        match (field.shape, field.fill) {
            (Shape::Scalar(ty), Fill::Value(literal)) => {
                if !branch.contains(field.name) {
                    let value = ty.coerce(literal).ok_or_else(|| CompileError::TypeCoercion {
                        field: field.name.to_string(),
                        value: literal.to_string(),
                        expected: ty.describe(),
                    })?;
                    branch.set(field.name, Node::Leaf(Leaf::new(value, Origin::Defaulted)));
                }
            }
            (Shape::Struct(children), fill) => {
                if fill == Fill::Empty {
                    branch.branch_mut(field.name);
                }
                if let Some(Node::Branch(child)) = branch.get_mut(field.name) {
                    fill_branch(child, children)?;
                }
            }
            (Shape::List(element), fill) => {
                if fill == Fill::Empty {
                    branch.list_mut(field.name);
                }
                // 構造体の要素にも既定値を補う
                if let (Shape::Struct(children), Some(Node::List(items))) =
                    (element, branch.get_mut(field.name))
                {
                    for item in items.iter_mut() {
                        if let Node::Branch(child) = item {
                            fill_branch(child, *children)?;
                        }
                    }
                }
            }
            (Shape::Map(_), Fill::Empty) => {
                branch.map_mut(field.name);
            }
            _ => {}
        }
    }
    Ok(())
}
