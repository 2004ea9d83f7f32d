//! kseq-par - Compilation of compose files into compose tables.
//!
//! This crate drives the kseq-lex tokenizer over compose-file text and
//! builds the packed trie the matcher walks at feed time:
//!
//! - [`table`]: the [`ComposeTable`] trie, its conflict-resolution rules,
//!   and a depth-first iterator over the compiled sequences.
//! - the parser: the line-oriented grammar, soft error recovery, and
//!   `include` handling with a bounded nesting depth.
//! - [`paths`]: locale and system compose-file discovery.
//!
//! Compilation entry points live on [`ComposeTable`]: [`ComposeTable::from_buffer`],
//! [`ComposeTable::from_file`], [`ComposeTable::from_path`] and
//! [`ComposeTable::from_locale`]. All of them take a diagnostic
//! [`Handler`](kseq_util::Handler); per-line problems are reported there
//! while compilation continues, and only fatal conditions surface as a
//! [`CompileError`].

mod error;
mod io;
mod parser;
pub mod paths;
pub mod table;

pub use error::CompileError;
pub use table::{ComposeNode, ComposeTable, NodeData, SequenceEntry, Sequences};
