use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::domain::ViewerError;

/// Text acquisition collaborator. The core pipeline only ever sees a file
/// reference and the text behind it; where the bytes come from is this
/// seam's business. Read failures are terminal for the file in question,
/// the model logs and discards them.
pub trait TextSource {
    fn read_text(&self, file: &Path) -> Result<String, ViewerError>;
}

/// Filesystem backend used by the binary.
#[derive(Debug, Default)]
pub struct FsTextSource;

impl TextSource for FsTextSource {
    fn read_text(&self, file: &Path) -> Result<String, ViewerError> {
        trace!("Reading {:?}", file);
        Ok(fs::read_to_string(file)?)
    }
}

/// Table identifier: the first two characters of the file name, as the
/// tier list naming convention encodes the position there (QB01.csv,
/// RB02.csv, ...).
pub fn table_id(file: &Path) -> String {
    file.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("??")
        .chars()
        .take(2)
        .collect()
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn table_id_is_first_two_name_chars() {
        assert_eq!(table_id(Path::new("/tmp/QB01.csv")), "QB");
        assert_eq!(table_id(Path::new("WR.csv")), "WR");
        assert_eq!(table_id(Path::new("x")), "x");
    }

    #[test]
    fn fs_source_reads_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a,b\r\n1,2\r\n").unwrap();

        let text = FsTextSource.read_text(file.path()).unwrap();
        assert_eq!(text, "a,b\r\n1,2\r\n");
    }

    #[test]
    fn fs_source_surfaces_read_errors() {
        match FsTextSource.read_text(Path::new("/definitely/not/here.csv")) {
            Err(ViewerError::IoError(_)) => {}
            other => panic!("expected IoError, got {other:?}"),
        }
    }
}
