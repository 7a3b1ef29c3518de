//! Core compiler for REX record expressions.
//!
//! This crate provides the compile-once, evaluate-many pipeline for the
//! REX expression language. The pipeline is roughly:
//!
//!   expression text
//!     -> lexer      (tokens)
//!     -> parser     (surface AST with spans)
//!     -> typecheck  (typed tree, symbols bound to slots)
//!     -> eval       (compiled closures over a caller-owned environment)
//!
//! Higher-level tools (CLI, pipeline stages, etc.) should depend on this
//! crate rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;
pub mod typeparse;

// ---------------------------------------------------------------------
// Semantic layers: types, symbols, type checking
// ---------------------------------------------------------------------

pub mod types;
pub mod symbol;
pub mod typecheck;

// ---------------------------------------------------------------------
// Back-end: runtime values, closure compilation, entry points
// ---------------------------------------------------------------------

pub mod value;
pub mod eval;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{
    Annotation, ExportPlan, compile_annotations, compile_expression, compile_export_args,
    parse_annotation_types,
};
pub use error::CoreError;
pub use eval::CompiledExpr;
pub use symbol::SymbolTable;
pub use typeparse::{parse_field_list, parse_type};
pub use types::Type;
pub use value::Value;
