//! File access for compose files.
//!
//! Compose files are read in full before parsing. Mapping is preferred
//! (the system compose files are shared between processes this way); when
//! the file cannot be mapped, for example because it is a pipe, the
//! contents are read into memory instead.

use std::fs::File;
use std::io::{self, Read};

use memmap2::Mmap;

/// The contents of a compose file, mapped or owned.
pub(crate) enum FileContents {
    Mapped(Mmap),
    Read(Vec<u8>),
}

impl FileContents {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            FileContents::Mapped(map) => map,
            FileContents::Read(buf) => buf,
        }
    }
}

/// Reads a file in full, mapping it when possible.
pub(crate) fn map_file(file: &File) -> io::Result<FileContents> {
    // SAFETY: the mapping is read-only and lives only for the duration of
    // the parse; concurrent truncation of a compose file is the same
    // hazard it is for every other reader of these files.
    match unsafe { Mmap::map(file) } {
        Ok(map) => Ok(FileContents::Mapped(map)),
        Err(err) => {
            tracing::debug!(%err, "mmap failed, falling back to read");
            let mut buf = Vec::new();
            let mut reader = io::BufReader::new(file);
            reader.read_to_end(&mut buf)?;
            Ok(FileContents::Read(buf))
        }
    }
}
