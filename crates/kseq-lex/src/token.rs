//! The compose-file token alphabet.

use kseq_util::Keysym;

/// A lexical unit of the compose-file format.
///
/// String payloads are owned: escape decoding means a token's text rarely
/// matches the input bytes it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// The input is exhausted.
    EndOfFile,

    /// A newline.
    EndOfLine,

    /// The `include` keyword.
    Include,

    /// A quoted include path, with `%`-escapes already expanded.
    ///
    /// Only produced by the include-path lexer mode.
    IncludeString(String),

    /// A `<name>` event on the left-hand side, already resolved to a code.
    LhsKeysym(Keysym),

    /// The `:` separating left- and right-hand sides.
    Colon,

    /// A quoted string literal with escapes decoded; always valid UTF-8.
    String(String),

    /// A bare identifier on the right-hand side, resolved to a code.
    RhsKeysym(Keysym),

    /// A malformed token. A diagnostic has already been reported.
    Error,
}

impl Token {
    /// Returns true for the tokens that terminate a line scan.
    pub fn ends_line(&self) -> bool {
        matches!(self, Token::EndOfLine | Token::EndOfFile)
    }
}
