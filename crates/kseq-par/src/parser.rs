//! The compose-file parser.
//!
//! The grammar is line-oriented:
//!
//! ```text
//! file        ::= { line }
//! line        ::= newline | include | production
//! include     ::= "include" '"' path '"' newline
//! production  ::= event { event } ":" result newline
//! event       ::= "<" keysym-name ">"
//! result      ::= string [keysym-name] | keysym-name
//! ```
//!
//! The parser is a deterministic machine over the token stream, written as
//! a loop over explicit states. Recovery is soft and line-granular: a bad
//! line is reported, drained to its newline, and parsing resumes; only an
//! include failure or more than [`MAX_ERRORS`] errors abandons the file.
//!
//! `include` statements re-enter the parser recursively on the included
//! file, inserting into the same table, with a depth cap against include
//! loops.

use std::env;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use kseq_lex::{Lexer, PathResolver, Token};
use kseq_util::diagnostic::Handler;
use kseq_util::keysym::{Keysym, NO_SYMBOL};

use crate::error::CompileError;
use crate::io;
use crate::paths;
use crate::table::ComposeTable;

/// Longest accepted left-hand side, in keysyms.
const MAX_LHS_LEN: usize = 10;

/// Deepest accepted include nesting; the top-level file is depth 0.
const MAX_INCLUDE_DEPTH: u32 = 5;

/// Grammar errors tolerated per file before the parse is abandoned.
const MAX_ERRORS: u32 = 10;

/// Result-string capacity, including a terminator byte.
const MAX_COMPOSE_STRING_SIZE: usize = 256;

/// One production, assembled over the course of a line.
#[derive(Debug, Default)]
pub(crate) struct Production {
    pub(crate) lhs: Vec<Keysym>,
    pub(crate) string: String,
    pub(crate) keysym: Keysym,
    pub(crate) has_string: bool,
    pub(crate) has_keysym: bool,
}

impl Production {
    fn reset(&mut self) {
        self.lhs.clear();
        self.string.clear();
        self.keysym = NO_SYMBOL;
        self.has_string = false;
        self.has_keysym = false;
    }
}

/// `%`-escape values for include paths, resolved from the process
/// environment and the table's locale.
struct IncludePaths<'a> {
    locale: &'a str,
}

impl PathResolver for IncludePaths<'_> {
    fn home(&self) -> Option<String> {
        env::var("HOME").ok().filter(|home| !home.is_empty())
    }

    fn locale_compose_file(&self) -> Option<String> {
        paths::locale_compose_file_path(self.locale)
            .map(|path| path.to_string_lossy().into_owned())
    }

    fn system_compose_dir(&self) -> String {
        paths::xlocaledir()
    }
}

/// The parser's control states. `Unexpected` and `Skip` implement the
/// shared recovery path every other state can fall into.
enum State {
    Initial,
    InitialEol,
    Include,
    IncludeEol,
    Lhs,
    Rhs,
    Unexpected,
    Skip,
}

fn parse(
    table: &mut ComposeTable,
    lexer: &mut Lexer<'_>,
    handler: &Handler,
    include_depth: u32,
) -> Result<(), CompileError> {
    let locale = table.locale().to_string();
    let resolver = IncludePaths { locale: &locale };

    let mut production = Production::default();
    let mut include_path = String::new();
    let mut num_errors: u32 = 0;
    let mut token = Token::EndOfLine;
    let mut state = State::Initial;

    loop {
        state = match state {
            State::Initial => {
                production.reset();
                State::InitialEol
            }

            State::InitialEol => {
                token = lexer.lex();
                match token {
                    Token::EndOfLine => State::InitialEol,
                    Token::EndOfFile => return Ok(()),
                    Token::Include => State::Include,
                    Token::LhsKeysym(sym) => {
                        production.lhs.push(sym);
                        State::Lhs
                    }
                    _ => State::Unexpected,
                }
            }

            State::Include => {
                token = lexer.lex_include_string(&resolver);
                match token {
                    Token::IncludeString(ref path) => {
                        include_path = path.clone();
                        State::IncludeEol
                    }
                    _ => State::Unexpected,
                }
            }

            State::IncludeEol => {
                token = lexer.lex();
                match token {
                    Token::EndOfLine => {
                        if do_include(table, handler, lexer, &include_path, include_depth)
                            .is_err()
                        {
                            handler.error("failed to parse file", lexer.token_loc());
                            return Err(CompileError::Parse {
                                file: lexer.file().to_string(),
                            });
                        }
                        State::Initial
                    }
                    _ => State::Unexpected,
                }
            }

            State::Lhs => {
                token = lexer.lex();
                match token {
                    Token::LhsKeysym(sym) => {
                        if production.lhs.len() + 1 > MAX_LHS_LEN {
                            handler.warning(
                                format!(
                                    "too many keysyms ({}) on left-hand side; \
                                     skipping line",
                                    MAX_LHS_LEN + 1
                                ),
                                lexer.token_loc(),
                            );
                            State::Skip
                        } else {
                            production.lhs.push(sym);
                            State::Lhs
                        }
                    }
                    Token::Colon => {
                        if production.lhs.is_empty() {
                            handler.warning(
                                "expected at least one keysym on left-hand side; \
                                 skipping line",
                                lexer.token_loc(),
                            );
                            State::Skip
                        } else {
                            State::Rhs
                        }
                    }
                    _ => State::Unexpected,
                }
            }

            State::Rhs => {
                token = lexer.lex();
                match token {
                    Token::String(ref string) => {
                        if production.has_string {
                            handler.warning(
                                "right-hand side can have at most one string; \
                                 skipping line",
                                lexer.token_loc(),
                            );
                            State::Skip
                        } else if string.is_empty() {
                            handler.warning(
                                "right-hand side string must not be empty; \
                                 skipping line",
                                lexer.token_loc(),
                            );
                            State::Skip
                        } else if string.len() + 1 > MAX_COMPOSE_STRING_SIZE {
                            handler.warning(
                                "right-hand side string is too long; skipping line",
                                lexer.token_loc(),
                            );
                            State::Skip
                        } else {
                            production.string.clear();
                            production.string.push_str(string);
                            production.has_string = true;
                            State::Rhs
                        }
                    }
                    Token::RhsKeysym(sym) => {
                        if production.has_keysym {
                            handler.warning(
                                "right-hand side can have at most one keysym; \
                                 skipping line",
                                lexer.token_loc(),
                            );
                            State::Skip
                        } else {
                            production.keysym = sym;
                            production.has_keysym = true;
                            // A keysym result commits the line immediately;
                            // the newline is picked up by the next round.
                            commit(table, handler, lexer, &production)
                        }
                    }
                    Token::EndOfLine => commit(table, handler, lexer, &production),
                    _ => State::Unexpected,
                }
            }

            State::Unexpected => {
                if token != Token::Error {
                    handler.error("unexpected token", lexer.token_loc());
                }
                num_errors += 1;
                if num_errors > MAX_ERRORS {
                    handler.error("too many errors", lexer.token_loc());
                    handler.error("failed to parse file", lexer.token_loc());
                    return Err(CompileError::Parse {
                        file: lexer.file().to_string(),
                    });
                }
                State::Skip
            }

            State::Skip => {
                while !token.ends_line() {
                    token = lexer.lex();
                }
                State::Initial
            }
        };
    }
}

/// Commits an assembled production, or rejects a line with no result.
fn commit(
    table: &mut ComposeTable,
    handler: &Handler,
    lexer: &Lexer<'_>,
    production: &Production,
) -> State {
    if !production.has_string && !production.has_keysym {
        handler.warning(
            "right-hand side must have at least one of string or keysym; \
             skipping line",
            lexer.token_loc(),
        );
        return State::Skip;
    }
    table.add_production(handler, &lexer.token_loc(), production);
    State::Initial
}

/// Opens, reads and parses an included compose file into `table`.
fn do_include(
    table: &mut ComposeTable,
    handler: &Handler,
    lexer: &Lexer<'_>,
    path: &str,
    include_depth: u32,
) -> Result<(), CompileError> {
    if include_depth >= MAX_INCLUDE_DEPTH {
        handler.error(
            format!(
                "maximum include depth ({}) exceeded; maybe there is an \
                 include loop?",
                MAX_INCLUDE_DEPTH
            ),
            lexer.token_loc(),
        );
        return Err(CompileError::Parse {
            file: lexer.file().to_string(),
        });
    }

    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            handler.error(
                format!("failed to open included Compose file \"{}\": {}", path, err),
                lexer.token_loc(),
            );
            return Err(CompileError::Io {
                file: path.to_string(),
                source: err,
            });
        }
    };

    let contents = match io::map_file(&file) {
        Ok(contents) => contents,
        Err(err) => {
            handler.error(
                format!("failed to read included Compose file \"{}\": {}", path, err),
                lexer.token_loc(),
            );
            return Err(CompileError::Io {
                file: path.to_string(),
                source: err,
            });
        }
    };

    tracing::debug!(path, depth = include_depth + 1, "parsing included Compose file");

    let mut included = Lexer::new(contents.as_bytes(), Arc::from(path), handler);
    parse(table, &mut included, handler, include_depth + 1)
}

impl ComposeTable {
    /// Compiles a table from in-memory compose-file text.
    ///
    /// Diagnostics land in `handler`; per-line problems are reported and
    /// skipped, and only a fatal condition produces an `Err`.
    ///
    /// # Example
    ///
    /// ```
    /// use kseq_par::ComposeTable;
    /// use kseq_util::Handler;
    ///
    /// let handler = Handler::new();
    /// let table =
    ///     ComposeTable::from_buffer(&handler, b"<A> <B> : \"ab\"\n", "C").unwrap();
    /// assert_eq!(table.sequence_count(), 1);
    /// ```
    pub fn from_buffer(
        handler: &Handler,
        buffer: &[u8],
        locale: &str,
    ) -> Result<ComposeTable, CompileError> {
        Self::parse_buffer(handler, buffer, "(input string)", locale)
    }

    /// Compiles a table from an open file, mapping it when possible.
    ///
    /// `file_name` is only used to label diagnostics.
    pub fn from_file(
        handler: &Handler,
        file: File,
        file_name: &str,
        locale: &str,
    ) -> Result<ComposeTable, CompileError> {
        let contents = io::map_file(&file).map_err(|source| CompileError::Io {
            file: file_name.to_string(),
            source,
        })?;
        Self::parse_buffer(handler, contents.as_bytes(), file_name, locale)
    }

    /// Compiles the compose file at `path`.
    pub fn from_path(
        handler: &Handler,
        path: &Path,
        locale: &str,
    ) -> Result<ComposeTable, CompileError> {
        let file = File::open(path).map_err(|source| CompileError::Io {
            file: path.display().to_string(),
            source,
        })?;
        Self::from_file(handler, file, &path.display().to_string(), locale)
    }

    /// Compiles the table for a locale.
    ///
    /// `XCOMPOSEFILE`, when set, overrides the per-locale default path.
    pub fn from_locale(
        handler: &Handler,
        locale: &str,
    ) -> Result<ComposeTable, CompileError> {
        if let Ok(path) = env::var("XCOMPOSEFILE") {
            if !path.is_empty() {
                tracing::debug!(path, "using XCOMPOSEFILE override");
                return Self::from_path(handler, Path::new(&path), locale);
            }
        }

        let path = paths::locale_compose_file_path(locale).ok_or_else(|| {
            CompileError::NoComposeFile {
                locale: locale.to_string(),
            }
        })?;
        Self::from_path(handler, &path, locale)
    }

    fn parse_buffer(
        handler: &Handler,
        buffer: &[u8],
        file_name: &str,
        locale: &str,
    ) -> Result<ComposeTable, CompileError> {
        let mut table = ComposeTable::new(locale);
        let mut lexer = Lexer::new(buffer, Arc::from(file_name), handler);
        parse(&mut table, &mut lexer, handler, 0)?;
        table.shrink();
        tracing::debug!(
            locale,
            file = file_name,
            nodes = table.node_count(),
            sequences = table.sequence_count(),
            "compiled compose table"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn compile(input: &str) -> (Result<ComposeTable, CompileError>, Handler) {
        let handler = Handler::new();
        let result = ComposeTable::from_buffer(&handler, input.as_bytes(), "C");
        (result, handler)
    }

    fn sequences(table: &ComposeTable) -> Vec<(Vec<Keysym>, Option<String>, Option<Keysym>)> {
        table
            .iter()
            .map(|entry| {
                (
                    entry.keysyms,
                    entry.utf8.map(str::to_string),
                    entry.keysym,
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let (table, handler) = compile("");
        let table = table.unwrap();
        assert_eq!(table.sequence_count(), 0);
        assert!(handler.diagnostics().is_empty());
    }

    #[test]
    fn test_basic_productions() {
        let (table, handler) = compile(
            "# header comment\n\
             <A>          :  \"foo\"  X \n\
             <B> <A>      :  \"baz\"  Y \n",
        );
        let table = table.unwrap();
        assert!(handler.diagnostics().is_empty());
        assert_eq!(
            sequences(&table),
            vec![
                (vec![Keysym(0x41)], Some("foo".into()), Some(Keysym(0x58))),
                (
                    vec![Keysym(0x42), Keysym(0x41)],
                    Some("baz".into()),
                    Some(Keysym(0x59))
                ),
            ]
        );
        assert_eq!(table.locale(), "C");
    }

    #[test]
    fn test_keysym_only_rhs_commits_once() {
        let (table, handler) = compile("<C> : dead_acute   \n");
        let table = table.unwrap();
        assert!(handler.diagnostics().is_empty());
        assert_eq!(table.sequence_count(), 1);
        let entry = table.iter().next().unwrap();
        assert_eq!(entry.utf8, None);
        assert_eq!(entry.keysym, Some(Keysym(0xfe51)));
    }

    #[test]
    fn test_keysym_then_string_is_rejected() {
        // A keysym result ends the production, so a trailing string is an
        // unexpected token on a fresh line.
        let (table, handler) = compile("<A> : X \"tail\"\n");
        let table = table.unwrap();
        assert_eq!(table.sequence_count(), 1);
        assert_eq!(handler.error_count(), 1);
        assert!(handler.diagnostics()[0].message.contains("unexpected token"));
    }

    #[test]
    fn test_string_then_keysym_is_one_production() {
        let (table, handler) = compile("<A> : \"foo\" X\n");
        let table = table.unwrap();
        assert!(handler.diagnostics().is_empty());
        let entry = table.iter().next().unwrap();
        assert_eq!(entry.utf8, Some("foo"));
        assert_eq!(entry.keysym, Some(Keysym(0x58)));
    }

    #[test]
    fn test_missing_rhs_is_skipped() {
        let (table, handler) = compile("<A> :\n<B> : \"ok\"\n");
        let table = table.unwrap();
        assert_eq!(table.sequence_count(), 1);
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.diagnostics()[0]
            .message
            .contains("at least one of string or keysym"));
    }

    #[test]
    fn test_empty_string_rhs_is_skipped() {
        let (table, handler) = compile("<A> : \"\"\n");
        assert_eq!(table.unwrap().sequence_count(), 0);
        assert!(handler.diagnostics()[0]
            .message
            .contains("must not be empty"));
    }

    #[test]
    fn test_lhs_at_cap_is_accepted() {
        let line = format!("{} : \"x\"\n", "<A> ".repeat(MAX_LHS_LEN));
        let (table, handler) = compile(&line);
        assert_eq!(table.unwrap().sequence_count(), 1);
        assert!(handler.diagnostics().is_empty());
    }

    #[test]
    fn test_lhs_over_cap_is_skipped() {
        let line = format!("{} : \"x\"\n", "<A> ".repeat(MAX_LHS_LEN + 1));
        let (table, handler) = compile(&line);
        assert_eq!(table.unwrap().sequence_count(), 0);
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.diagnostics()[0]
            .message
            .contains("too many keysyms (11)"));
    }

    #[test]
    fn test_string_at_cap_is_accepted() {
        let line = format!("<A> : \"{}\"\n", "s".repeat(MAX_COMPOSE_STRING_SIZE - 1));
        let (table, handler) = compile(&line);
        assert_eq!(table.unwrap().sequence_count(), 1);
        assert!(handler.diagnostics().is_empty());
    }

    #[test]
    fn test_string_over_cap_is_skipped() {
        let line = format!("<A> : \"{}\"\n", "s".repeat(MAX_COMPOSE_STRING_SIZE));
        let (table, handler) = compile(&line);
        assert_eq!(table.unwrap().sequence_count(), 0);
        assert!(handler.diagnostics()[0]
            .message
            .contains("right-hand side string is too long"));
    }

    #[test]
    fn test_duplicate_string_warning() {
        let (table, handler) = compile("<A> : \"x\" \"y\"\n");
        assert_eq!(table.unwrap().sequence_count(), 0);
        assert!(handler.diagnostics()[0]
            .message
            .contains("at most one string"));
    }

    #[test]
    fn test_error_recovery_continues() {
        let (table, handler) = compile(
            "@@@\n\
             <A> : \"ok\"\n\
             <nosuchkeysym> : \"bad\"\n\
             <B> : \"also ok\"\n",
        );
        let table = table.unwrap();
        assert_eq!(table.sequence_count(), 2);
        assert_eq!(handler.error_count(), 2);
    }

    #[test]
    fn test_error_cap_is_soft_at_ten() {
        let input = format!("{}<A> : \"ok\"\n", "@@@\n".repeat(MAX_ERRORS as usize));
        let (table, handler) = compile(&input);
        let table = table.unwrap();
        assert_eq!(table.sequence_count(), 1);
        assert_eq!(handler.error_count(), MAX_ERRORS as usize);
    }

    #[test]
    fn test_error_cap_fails_at_eleven() {
        let input = "@@@\n".repeat(MAX_ERRORS as usize + 1);
        let (result, handler) = compile(&input);
        assert!(matches!(result, Err(CompileError::Parse { .. })));
        assert!(handler
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("too many errors")));
    }

    #[test]
    fn test_missing_include_file_is_fatal() {
        let (result, handler) = compile("include \"/no/such/compose/file\"\n");
        assert!(matches!(result, Err(CompileError::Parse { .. })));
        assert!(handler
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("failed to open included Compose file")));
    }

    #[test]
    fn test_include_merges_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("extra");
        std::fs::write(&inner, "<B> : \"from include\"\n").unwrap();

        let input = format!("<A> : \"top\"\ninclude \"{}\"\n<C> : \"after\"\n", inner.display());
        let (table, handler) = compile(&input);
        let table = table.unwrap();
        assert!(handler.diagnostics().is_empty());
        assert_eq!(table.sequence_count(), 3);
    }

    #[test]
    fn test_include_depth_cap() {
        let dir = tempfile::tempdir().unwrap();

        // A chain of five files is accepted...
        for i in (1..=5).rev() {
            let path = dir.path().join(format!("level{}", i));
            let mut file = std::fs::File::create(&path).unwrap();
            if i == 5 {
                writeln!(file, "<A> : \"deep\"").unwrap();
            } else {
                writeln!(file, "include \"{}\"", dir.path().join(format!("level{}", i + 1)).display())
                    .unwrap();
            }
        }
        let input = format!("include \"{}\"\n", dir.path().join("level1").display());
        let (table, handler) = compile(&input);
        assert_eq!(table.unwrap().sequence_count(), 1);
        assert!(handler.diagnostics().is_empty());

        // ...but a sixth level is not.
        let path = dir.path().join("level0");
        std::fs::write(&path, format!("include \"{}\"\n", dir.path().join("level1").display()))
            .unwrap();
        let input = format!("include \"{}\"\n", path.display());
        let (result, handler) = compile(&input);
        assert!(result.is_err());
        assert!(handler
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("maximum include depth")));
    }

    #[test]
    fn test_include_loop_is_caught() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop");
        std::fs::write(&path, format!("include \"{}\"\n", path.display())).unwrap();

        let (result, handler) =
            compile(&format!("include \"{}\"\n", path.display()));
        assert!(result.is_err());
        assert!(handler
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("maximum include depth")));
    }

    #[test]
    fn test_from_path_and_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Compose");
        std::fs::write(&path, "<A> <B> : \"ab\" X\n").unwrap();

        let handler = Handler::new();
        let table = ComposeTable::from_path(&handler, &path, "C").unwrap();
        assert_eq!(table.sequence_count(), 1);

        let handler = Handler::new();
        let file = File::open(&path).unwrap();
        let table = ComposeTable::from_file(&handler, file, "Compose", "C").unwrap();
        assert_eq!(table.sequence_count(), 1);
    }

    #[test]
    fn test_from_locale() {
        // Kept as a single test: XCOMPOSEFILE is process-global state.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Compose");
        std::fs::write(&path, "<A> : \"via env\"\n").unwrap();

        env::set_var("XCOMPOSEFILE", &path);
        let handler = Handler::new();
        let table = ComposeTable::from_locale(&handler, "whatever").unwrap();
        assert_eq!(table.sequence_count(), 1);
        assert_eq!(table.locale(), "whatever");
        env::remove_var("XCOMPOSEFILE");

        let handler = Handler::new();
        let result = ComposeTable::from_locale(&handler, "has/slash");
        assert!(matches!(result, Err(CompileError::NoComposeFile { .. })));
    }

    #[test]
    fn test_diagnostics_carry_file_and_position() {
        let (_, handler) = compile("\n  <bogus_name> : \"x\"\n");
        let diag = &handler.diagnostics()[0];
        assert_eq!(&*diag.loc.file, "(input string)");
        assert_eq!(diag.loc.line, 2);
        assert_eq!(diag.loc.column, 3);
    }

    /// Renders a table back into compose-file syntax and recompiles it;
    /// the sequence sets must match exactly.
    #[test]
    fn test_dump_reparse_roundtrip() {
        let (table, handler) = compile(
            "<Multi_key> <a> <e> : \"\u{e6}\" ae\n\
             <Multi_key> <o> : \"\u{f8}\"\n\
             <dead_acute> <e> : eacute\n\
             <A> <B> <C> : \"abc\" X\n",
        );
        let table = table.unwrap();
        assert!(handler.diagnostics().is_empty());

        let mut dump = String::new();
        for entry in table.iter() {
            dump.push_str(&entry.to_string());
            dump.push('\n');
        }

        let (reparsed, handler) = compile(&dump);
        let reparsed = reparsed.unwrap();
        assert!(handler.diagnostics().is_empty(), "dump: {}", dump);
        assert_eq!(sequences(&table), sequences(&reparsed), "dump: {}", dump);
    }
}
