//! Go types for resolved PGo types.
//!
//! The code generator only ever sees fully resolved types, so conversion
//! fails if a type still contains an inference variable or the error marker.

use std::fmt;

use serde::Serialize;

use crate::{Type, sanitize_type_display};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoType {
    Int,
    Float64,
    Bool,
    String,
    /// `[]T`. Sets lower to sorted slices.
    Slice { elem: Box<GoType> },
    /// Anonymous struct; tuples lower to `struct{e0 T0; e1 T1}`.
    Struct { fields: Vec<GoField> },
    Map { key: Box<GoType>, value: Box<GoType> },
    Func {
        params: Vec<GoType>,
        ret: Option<Box<GoType>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoField {
    pub name: String,
    pub ty: GoType,
}

impl GoType {
    /// Whether values of this type may be used as Go map keys.
    pub fn is_comparable(&self) -> bool {
        match self {
            GoType::Int | GoType::Float64 | GoType::Bool | GoType::String => true,
            GoType::Struct { fields } => fields.iter().all(|f| f.ty.is_comparable()),
            GoType::Slice { .. } | GoType::Map { .. } | GoType::Func { .. } => false,
        }
    }

    fn slice(elem: GoType) -> Self {
        GoType::Slice {
            elem: Box::new(elem),
        }
    }
}

impl fmt::Display for GoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoType::Int => write!(f, "int"),
            GoType::Float64 => write!(f, "float64"),
            GoType::Bool => write!(f, "bool"),
            GoType::String => write!(f, "string"),
            GoType::Slice { elem } => write!(f, "[]{elem}"),
            GoType::Struct { fields } => {
                write!(f, "struct{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
            GoType::Map { key, value } => write!(f, "map[{key}]{value}"),
            GoType::Func { params, ret } => {
                write!(f, "func(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                if let Some(ret) = ret {
                    write!(f, " {ret}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetTypeError {
    #[error("type `{0}` still contains type variables")]
    UnresolvedVariable(String),
    #[error("type `{0}` could not be determined")]
    Unresolved(String),
}

/// Convert a fully resolved type into its Go representation.
pub fn to_go_type(ty: &Type) -> Result<GoType, TargetTypeError> {
    if ty.contains_unresolved() {
        return Err(TargetTypeError::Unresolved(sanitize_type_display(ty)));
    }
    if ty.contains_vars() {
        return Err(TargetTypeError::UnresolvedVariable(sanitize_type_display(ty)));
    }
    Ok(lower(ty))
}

fn lower(ty: &Type) -> GoType {
    match ty {
        Type::Int(_) => GoType::Int,
        Type::Real(_) => GoType::Float64,
        Type::Bool(_) => GoType::Bool,
        Type::String(_) => GoType::String,
        Type::Set(elem, _) => GoType::slice(lower(elem)),
        Type::Tuple(elems, _) => GoType::Struct {
            fields: elems
                .iter()
                .enumerate()
                .map(|(i, elem)| GoField {
                    name: format!("e{i}"),
                    ty: lower(elem),
                })
                .collect(),
        },
        Type::Map(key, value, _) => {
            let key = lower(key);
            let value = lower(value);
            if key.is_comparable() {
                GoType::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                }
            } else {
                GoType::slice(GoType::Struct {
                    fields: vec![
                        GoField {
                            name: "key".to_string(),
                            ty: key,
                        },
                        GoField {
                            name: "value".to_string(),
                            ty: value,
                        },
                    ],
                })
            }
        }
        Type::Function(ft) => GoType::Func {
            params: ft.params.iter().map(lower).collect(),
            ret: ft.ret.as_deref().map(|r| Box::new(lower(r))),
        },
        // Rejected by `to_go_type` before lowering.
        Type::Var(_) | Type::Unresolved(_) => GoType::Int,
    }
}
