//! Diagnostic reporting infrastructure.
//!
//! Compose files are compiled with soft, line-granular error recovery, so
//! diagnostics are collected rather than returned: the compiler pushes
//! warnings and errors into a [`Handler`] supplied by the caller and keeps
//! going where it can. Every diagnostic carries the file name and the
//! line/column where the offending token started.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

/// Diagnostic severity level.
///
/// # Example
///
/// ```
/// use kseq_util::diagnostic::Level;
///
/// assert_eq!(format!("{}", Level::Error), "error");
/// assert_eq!(format!("{}", Level::Warning), "warning");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// A problem that fails the compilation of the current file.
    Error,
    /// A problem confined to one line or rule; the line is skipped or a
    /// conflicting rule is overridden, and compilation continues.
    Warning,
}

impl Level {
    /// Returns true if this level represents an error.
    #[inline]
    pub const fn is_error(&self) -> bool {
        matches!(self, Level::Error)
    }

    /// Returns true if this level represents a warning.
    #[inline]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Level::Warning)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
        }
    }
}

/// A source location: file name plus 1-based line and column.
///
/// Locations point at the *start* of the token that triggered the
/// diagnostic, not at the cursor position when the problem was detected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loc {
    /// Name of the file being compiled (shared across many diagnostics).
    pub file: Arc<str>,
    /// Line number, 1-based.
    pub line: u32,
    /// Column number, 1-based.
    pub column: u32,
}

impl Loc {
    /// Create a new location.
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A diagnostic message with severity and location.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kseq_util::diagnostic::{Diagnostic, Level, Loc};
///
/// let loc = Loc::new(Arc::from("Compose"), 3, 7);
/// let diag = Diagnostic::warning("unknown escape sequence", loc);
/// assert_eq!(diag.level, Level::Warning);
/// assert_eq!(format!("{}", diag), "Compose:3:7: warning: unknown escape sequence");
/// ```
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Diagnostic severity level.
    pub level: Level,
    /// Main diagnostic message.
    pub message: String,
    /// Location of the offending token's start.
    pub loc: Loc,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(level: Level, message: impl Into<String>, loc: Loc) -> Self {
        Self {
            level,
            message: message.into(),
            loc,
        }
    }

    /// Create an error diagnostic.
    pub fn error(message: impl Into<String>, loc: Loc) -> Self {
        Self::new(Level::Error, message, loc)
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>, loc: Loc) -> Self {
        Self::new(Level::Warning, message, loc)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.loc, self.level, self.message)
    }
}

/// Handler for collecting and querying diagnostics.
///
/// The handler is handed by reference into every compile entry point and
/// accumulates everything the compiler has to say. Interior mutability
/// keeps the borrow story simple for code that reports while traversing.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kseq_util::diagnostic::{Diagnostic, Handler, Loc};
///
/// let handler = Handler::new();
/// let loc = Loc::new(Arc::from("Compose"), 1, 1);
/// handler.warning("right-hand side string must not be empty; skipping line", loc);
///
/// assert!(!handler.has_errors());
/// assert_eq!(handler.warning_count(), 1);
/// ```
pub struct Handler {
    /// Collected diagnostics.
    diagnostics: RefCell<Vec<Diagnostic>>,
    /// Whether to panic on errors (for tests that expect a clean parse).
    panic_on_error: bool,
}

impl Handler {
    /// Create a new handler.
    pub fn new() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            panic_on_error: false,
        }
    }

    /// Create a handler that panics on the first error.
    pub fn new_panicking() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            panic_on_error: true,
        }
    }

    /// Report an error.
    pub fn error(&self, message: impl Into<String>, loc: Loc) {
        self.emit(Diagnostic::error(message, loc));
    }

    /// Report a warning.
    pub fn warning(&self, message: impl Into<String>, loc: Loc) {
        self.emit(Diagnostic::warning(message, loc));
    }

    /// Emit a pre-built diagnostic.
    pub fn emit(&self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "diagnostic emitted");
        if self.panic_on_error && diagnostic.level.is_error() {
            panic!("diagnostic error: {}", diagnostic);
        }
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// Check if any errors have been reported.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level.is_error())
    }

    /// Get the number of errors.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level.is_error())
            .count()
    }

    /// Get the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level.is_warning())
            .count()
    }

    /// Get a snapshot of all diagnostics reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Clear all diagnostics.
    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}
