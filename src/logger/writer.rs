//! Access log writer
//!
//! Access lines go to their own target, separate from diagnostics, so they
//! can be shipped to a dedicated file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static ACCESS_WRITER: OnceLock<AccessWriter> = OnceLock::new();

enum AccessTarget {
    Stdout,
    File(Mutex<File>),
}

pub struct AccessWriter {
    target: AccessTarget,
}

impl AccessWriter {
    fn new(path: Option<&str>) -> io::Result<Self> {
        let target = match path {
            Some(path) => AccessTarget::File(Mutex::new(open_log_file(path)?)),
            None => AccessTarget::Stdout,
        };
        Ok(Self { target })
    }

    pub fn write_line(&self, message: &str) {
        match &self.target {
            AccessTarget::Stdout => println!("{message}"),
            AccessTarget::File(file) => {
                if let Ok(mut f) = file.lock() {
                    let _ = writeln!(f, "{message}");
                }
            }
        }
    }
}

/// Open or create a log file for appending, creating parent directories
pub fn open_log_file(path: &str) -> io::Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the access log target; only the first call takes effect
pub fn init(path: Option<&str>) -> io::Result<()> {
    let writer = AccessWriter::new(path)?;
    ACCESS_WRITER.set(writer).map_err(|_| {
        io::Error::new(io::ErrorKind::AlreadyExists, "access log already initialized")
    })
}

/// Write one access line; stdout until `init` has run
pub fn write_access(message: &str) {
    match ACCESS_WRITER.get() {
        Some(writer) => writer.write_line(message),
        None => println!("{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/access.log");
        let path = path.to_str().unwrap();

        let writer = AccessWriter::new(Some(path)).unwrap();
        writer.write_line("first");
        writer.write_line("second");

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }
}
