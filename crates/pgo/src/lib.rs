//! The type inference pass of the PGo compiler.
//!
//! Drives one constraint generation pass and one solve pass over a
//! Modular PlusCal algorithm and hands the resolved node types, or the
//! diagnostics explaining why there are none, to code generation.

mod compiler;

pub use compiler::{
    InferError, InferenceResult, TypeReport, check_types, infer_types, write_global_types,
};
pub use pgo_infer::{DefinitionRegistry, InferOptions};
