//! kseq-util - Shared infrastructure for the kseq pipeline.
//!
//! This crate provides the vocabulary used by every other kseq crate:
//!
//! - [`diagnostic`]: the diagnostic handler through which the compiler
//!   reports warnings and errors, with file/line/column locations.
//! - [`keysym`]: the key-symbol namespace: numeric codes, their textual
//!   names, Unicode mappings, and modifier classification.

pub mod diagnostic;
pub mod keysym;

pub use diagnostic::{Diagnostic, Handler, Level, Loc};
pub use keysym::{Keysym, NO_SYMBOL};
