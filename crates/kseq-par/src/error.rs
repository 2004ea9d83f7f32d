//! Compile-time error type.
//!
//! Most problems in a compose file are reported as diagnostics and the
//! offending line is skipped; only conditions that abort the compile as a
//! whole surface here.

use thiserror::Error;

/// A fatal compilation failure.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Parsing aborted: too many errors, or a failed include.
    ///
    /// The details are in the diagnostics collected by the handler.
    #[error("failed to parse Compose file \"{file}\"")]
    Parse {
        /// The file whose parse was abandoned.
        file: String,
    },

    /// A compose file could not be opened or read.
    #[error("couldn't read Compose file \"{file}\": {source}")]
    Io {
        /// The file that could not be read.
        file: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No compose file could be resolved for the requested locale.
    #[error("couldn't find a Compose file for locale \"{locale}\"")]
    NoComposeFile {
        /// The locale that was looked up.
        locale: String,
    },
}
