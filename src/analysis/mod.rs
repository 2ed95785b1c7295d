//! Tree-backed structural analysis of Python source.
//!
//! This module turns source text into immutable facts:
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────────┐
//! │ Source text │────▶│ SourceTree   │────▶│ StructuralSnapshot │
//! └─────────────┘     │ (tree-sitter)│     │ (names, imports,   │
//!                     └──────────────┘     │  docs, complexity) │
//!                                          └────────────────────┘
//!                                                    │
//!                                                    ▼
//!                                          diff / smells / security
//! ```
//!
//! Every operation here is a synchronous, pure function over the tree; no
//! I/O, no shared mutable state, so independent sources can be analyzed on
//! independent threads with zero coordination.

mod complexity;
mod snapshot;
mod source;

pub use complexity::{function_complexity, ComplexityLevel};
pub use snapshot::{StructuralSnapshot, MODULE_DOC_KEY};
pub use source::SourceTree;

pub(crate) use snapshot::{direct_methods, named_parameters, string_content};
