//! The compose-file lexer.
//!
//! The lexer drives a [`Cursor`] over the input bytes and produces
//! [`Token`]s. It owns a small accumulation buffer for token text and an
//! 8-slot cache in front of the key-symbol name resolver, which dominates
//! tokenization cost on realistic files.
//!
//! Diagnostics are reported through the caller's [`Handler`] and carry the
//! position where the current token *started*, not where the problem was
//! noticed.

use std::sync::Arc;

use kseq_util::diagnostic::{Handler, Loc};
use kseq_util::keysym::{self, Keysym, NO_SYMBOL};

use crate::cursor::Cursor;
use crate::escape::{hex, is_ident_continue, is_ident_start, is_space, oct};
use crate::token::Token;

/// Capacity of the token accumulation buffer, in bytes.
///
/// Token text that does not fit (including room for a terminator, so the
/// longest representable text is one byte shorter) is a lexical error.
pub const SCANNER_BUF_SIZE: usize = 1024;

/// Number of slots in the key-symbol name cache.
const NAME_CACHE_SIZE: usize = 8;

/// Longest name the cache will store. Longer names skip the cache and go
/// straight to the resolver.
const NAME_CACHE_NAME_MAX: usize = 64;

/// A fixed-capacity, round-robin cache in front of the key-symbol name
/// resolver.
///
/// Compose files resolve the same handful of names over and over
/// (`Multi_key`, the dead keys, a few letters), so even a tiny cache with
/// the simplest possible eviction covers most lookups. Lookup is a linear
/// scan with case-sensitive comparison; a miss calls the resolver and
/// overwrites the next slot in rotation. Misses are cached too: an unknown
/// name stays unknown.
pub struct KeysymNameCache {
    entries: [(String, Keysym); NAME_CACHE_SIZE],
    next: usize,
}

impl KeysymNameCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| (String::new(), NO_SYMBOL)),
            next: 0,
        }
    }

    /// Resolves a name, consulting the cache first.
    ///
    /// Returns [`NO_SYMBOL`] for unknown names. Unused slots hold empty
    /// names, which can only match an empty lookup; that in turn resolves
    /// to [`NO_SYMBOL`], the same answer the resolver would give.
    pub fn lookup(&mut self, name: &str) -> Keysym {
        if name.len() >= NAME_CACHE_NAME_MAX {
            return keysym::from_name(name);
        }

        for (cached_name, cached_keysym) in &self.entries {
            if cached_name == name {
                return *cached_keysym;
            }
        }

        let resolved = keysym::from_name(name);
        let slot = &mut self.entries[self.next];
        slot.0.clear();
        slot.0.push_str(name);
        slot.1 = resolved;
        self.next = (self.next + 1) % NAME_CACHE_SIZE;
        resolved
    }
}

impl Default for KeysymNameCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Supplies the values for `%`-escapes in include paths.
///
/// The lexer itself knows nothing about locales or the filesystem; the
/// parsing layer implements this trait against its environment.
pub trait PathResolver {
    /// The user's home directory, for `%H`.
    fn home(&self) -> Option<String>;

    /// The locale's default compose file, for `%L`.
    fn locale_compose_file(&self) -> Option<String>;

    /// The system-wide compose directory, for `%S`.
    fn system_compose_dir(&self) -> String;
}

/// The main lexer for compose-file input.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kseq_lex::{Lexer, Token};
/// use kseq_util::Handler;
///
/// let handler = Handler::new();
/// let mut lexer = Lexer::new(b"<A> : \"foo\"\n", Arc::from("Compose"), &handler);
///
/// assert!(matches!(lexer.lex(), Token::LhsKeysym(_)));
/// assert_eq!(lexer.lex(), Token::Colon);
/// assert_eq!(lexer.lex(), Token::String("foo".to_string()));
/// assert_eq!(lexer.lex(), Token::EndOfLine);
/// assert_eq!(lexer.lex(), Token::EndOfFile);
/// ```
pub struct Lexer<'a> {
    /// Byte cursor over the input.
    cursor: Cursor<'a>,

    /// Diagnostic sink.
    handler: &'a Handler,

    /// Name of the file being lexed, for diagnostics.
    file: Arc<str>,

    /// Line where the current token started.
    token_start_line: u32,

    /// Column where the current token started.
    token_start_column: u32,

    /// Accumulation buffer for the current token's text.
    buf: Vec<u8>,

    /// Cache in front of the key-symbol name resolver.
    cache: KeysymNameCache,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer over `input`.
    ///
    /// `file` is only used to label diagnostics.
    pub fn new(input: &'a [u8], file: Arc<str>, handler: &'a Handler) -> Self {
        Self {
            cursor: Cursor::new(input),
            handler,
            file,
            token_start_line: 1,
            token_start_column: 1,
            buf: Vec::with_capacity(SCANNER_BUF_SIZE),
            cache: KeysymNameCache::new(),
        }
    }

    /// The file name this lexer labels diagnostics with.
    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    /// Location of the current token's start.
    pub fn token_loc(&self) -> Loc {
        Loc::new(
            self.file.clone(),
            self.token_start_line,
            self.token_start_column,
        )
    }

    /// Returns the next token.
    pub fn lex(&mut self) -> Token {
        loop {
            // Skip horizontal whitespace; a newline is a token of its own.
            while is_space(self.cursor.peek()) {
                if self.cursor.advance() == b'\n' {
                    return Token::EndOfLine;
                }
            }

            // Comments run to the end of the line and count as whitespace.
            if self.cursor.match_byte(b'#') {
                while !self.cursor.is_at_end() && !self.cursor.is_at_eol() {
                    self.cursor.advance();
                }
                continue;
            }

            break;
        }

        if self.cursor.is_at_end() {
            return Token::EndOfFile;
        }

        self.start_token();

        // LHS keysym event.
        if self.cursor.match_byte(b'<') {
            while self.cursor.peek() != b'>'
                && !self.cursor.is_at_eol()
                && !self.cursor.is_at_end()
            {
                let b = self.cursor.advance();
                self.buf_push(b);
            }
            if !self.cursor.match_byte(b'>') {
                self.err("unterminated keysym literal");
                return Token::Error;
            }
            if self.buf_overflowed() {
                self.err("keysym literal is too long");
                return Token::Error;
            }
            let name = String::from_utf8_lossy(&self.buf).into_owned();
            let sym = self.cache.lookup(&name);
            if sym == NO_SYMBOL {
                self.err(format!(
                    "unrecognized keysym \"{}\" on left-hand side",
                    name
                ));
                return Token::Error;
            }
            return Token::LhsKeysym(sym);
        }

        // Colon.
        if self.cursor.match_byte(b':') {
            return Token::Colon;
        }

        // String literal.
        if self.cursor.match_byte(b'"') {
            while !self.cursor.is_at_end()
                && !self.cursor.is_at_eol()
                && self.cursor.peek() != b'"'
            {
                if self.cursor.match_byte(b'\\') {
                    if self.cursor.match_byte(b'\\') {
                        self.buf_push(b'\\');
                    } else if self.cursor.match_byte(b'"') {
                        self.buf_push(b'"');
                    } else if self.cursor.match_byte(b'x') || self.cursor.match_byte(b'X') {
                        match hex(&mut self.cursor) {
                            Some(byte) => {
                                self.buf_push(byte);
                            }
                            None => self.warn(
                                "illegal hexadecimal escape sequence in string literal",
                            ),
                        }
                    } else if let Some(byte) = oct(&mut self.cursor) {
                        self.buf_push(byte);
                    } else {
                        // Only the backslash is dropped; the escape byte is
                        // then consumed as a plain character.
                        self.warn(format!(
                            "unknown escape sequence ({}) in string literal",
                            self.cursor.peek() as char
                        ));
                    }
                } else {
                    let b = self.cursor.advance();
                    self.buf_push(b);
                }
            }
            if !self.cursor.match_byte(b'"') {
                self.err("unterminated string literal");
                return Token::Error;
            }
            if self.buf_overflowed() {
                self.err("string literal is too long");
                return Token::Error;
            }
            return match String::from_utf8(std::mem::take(&mut self.buf)) {
                Ok(string) => Token::String(string),
                Err(_) => {
                    self.err("string literal is not a valid UTF-8 string");
                    Token::Error
                }
            };
        }

        // RHS keysym name or the include keyword.
        if is_ident_start(self.cursor.peek()) {
            while is_ident_continue(self.cursor.peek()) {
                let b = self.cursor.advance();
                self.buf_push(b);
            }
            if self.buf_overflowed() {
                self.err("identifier is too long");
                return Token::Error;
            }
            let name = String::from_utf8_lossy(&self.buf).into_owned();

            if name == "include" {
                return Token::Include;
            }

            let sym = self.cache.lookup(&name);
            if sym == NO_SYMBOL {
                self.err(format!(
                    "unrecognized keysym \"{}\" on right-hand side",
                    name
                ));
                return Token::Error;
            }
            return Token::RhsKeysym(sym);
        }

        // Nothing matched: drop the rest of the line.
        while !self.cursor.is_at_end() && !self.cursor.is_at_eol() {
            self.cursor.advance();
        }
        self.err("unrecognized token");
        Token::Error
    }

    /// Reads a quoted include path, expanding `%`-escapes inline.
    ///
    /// This separate entry point is used only immediately after an
    /// `include` keyword; the path grammar (quoting, `%` expansion) exists
    /// nowhere else in the format.
    pub fn lex_include_string(&mut self, resolver: &dyn PathResolver) -> Token {
        while is_space(self.cursor.peek()) {
            if self.cursor.advance() == b'\n' {
                return Token::EndOfLine;
            }
        }

        self.start_token();

        if !self.cursor.match_byte(b'"') {
            self.err("include statement must be followed by a path");
            return Token::Error;
        }

        while !self.cursor.is_at_end()
            && !self.cursor.is_at_eol()
            && self.cursor.peek() != b'"'
        {
            if self.cursor.match_byte(b'%') {
                if self.cursor.match_byte(b'%') {
                    self.buf_push(b'%');
                } else if self.cursor.match_byte(b'H') {
                    let home = match resolver.home() {
                        Some(home) => home,
                        None => {
                            self.err(
                                "%H was used in an include statement, but the HOME \
                                 environment variable is not set",
                            );
                            return Token::Error;
                        }
                    };
                    if !self.buf_push_str(&home) {
                        self.err("include path after expanding %H is too long");
                        return Token::Error;
                    }
                } else if self.cursor.match_byte(b'L') {
                    let path = match resolver.locale_compose_file() {
                        Some(path) => path,
                        None => {
                            self.err("failed to expand %L to the locale Compose file");
                            return Token::Error;
                        }
                    };
                    if !self.buf_push_str(&path) {
                        self.err("include path after expanding %L is too long");
                        return Token::Error;
                    }
                } else if self.cursor.match_byte(b'S') {
                    let dir = resolver.system_compose_dir();
                    if !self.buf_push_str(&dir) {
                        self.err("include path after expanding %S is too long");
                        return Token::Error;
                    }
                } else {
                    self.err(format!(
                        "unknown % format ({}) in include statement",
                        self.cursor.peek() as char
                    ));
                    return Token::Error;
                }
            } else {
                let b = self.cursor.advance();
                self.buf_push(b);
            }
        }

        if !self.cursor.match_byte(b'"') {
            self.err("unterminated include statement");
            return Token::Error;
        }
        if self.buf_overflowed() {
            self.err("include path is too long");
            return Token::Error;
        }
        Token::IncludeString(String::from_utf8_lossy(&self.buf).into_owned())
    }

    /// Latches the current position as the token start and resets the
    /// accumulation buffer.
    fn start_token(&mut self) {
        self.token_start_line = self.cursor.line();
        self.token_start_column = self.cursor.column();
        self.buf.clear();
    }

    /// Appends a byte to the token buffer. Bytes past the capacity are
    /// dropped; [`Lexer::buf_overflowed`] reports the condition once the
    /// token is complete.
    fn buf_push(&mut self, b: u8) -> bool {
        if self.buf.len() >= SCANNER_BUF_SIZE {
            return false;
        }
        self.buf.push(b);
        true
    }

    /// Appends a string to the token buffer.
    fn buf_push_str(&mut self, s: &str) -> bool {
        let mut ok = true;
        for &b in s.as_bytes() {
            ok &= self.buf_push(b);
        }
        ok
    }

    /// True if the accumulated token text cannot be represented within the
    /// buffer capacity (terminator included).
    fn buf_overflowed(&self) -> bool {
        self.buf.len() + 1 > SCANNER_BUF_SIZE
    }

    fn err(&self, message: impl Into<String>) {
        self.handler.error(message, self.token_loc());
    }

    fn warn(&self, message: impl Into<String>) {
        self.handler.warning(message, self.token_loc());
    }
}
