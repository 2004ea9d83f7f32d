//! kseq-lex - Tokenizer for the compose-file format.
//!
//! This crate turns compose-file bytes into the small token alphabet the
//! parser consumes. The format is line-oriented: sequences of `<keysym>`
//! events, a colon, then a result string and/or keysym, with `#` comments
//! and `include` directives.
//!
//! The lexer has two modes. The main mode ([`Lexer::lex`]) produces the
//! regular token alphabet. The include-path mode
//! ([`Lexer::lex_include_string`]) is entered only after an `include`
//! keyword and reads a quoted path while expanding `%`-escapes inline;
//! the expansion values come from a [`PathResolver`] supplied by the
//! caller.
//!
//! The lexer works on raw bytes rather than `str` because string-literal
//! escapes can produce arbitrary bytes; each literal is validated as UTF-8
//! only once it is fully decoded.

pub mod cursor;
pub mod escape;
pub mod lexer;
pub mod token;

pub use cursor::Cursor;
pub use lexer::{KeysymNameCache, Lexer, PathResolver, SCANNER_BUF_SIZE};
pub use token::Token;
