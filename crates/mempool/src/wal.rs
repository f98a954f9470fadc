//! Transaction write-ahead log.
//!
//! Every admitted transaction is appended as its raw bytes followed by a
//! newline before the application sees it. The log is an operator recovery
//! aid, not a consensus structure; it is never read back by the node.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// An open mempool write-ahead log.
pub struct Wal {
    path: PathBuf,
    file: File,
}

impl Wal {
    /// Open (creating if needed) the log file `wal` inside `dir`.
    pub fn open(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("wal");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "mempool: wal opened");
        Ok(Self { path, file })
    }

    /// Append one transaction record.
    pub fn write(&mut self, tx: &[u8]) -> io::Result<()> {
        self.file.write_all(tx)?;
        self.file.write_all(b"\n")
    }

    /// Flush buffered records to the OS.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
