use crate::reporter::ReportError;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Writes `value` as JSON next to its final name and renames it into place,
/// so readers never observe a partially written artifact.
pub fn write_atomic<T: Serialize>(dir: &Path, file_name: &str, value: &T, pretty: bool) -> Result<PathBuf, ReportError> {
    let target = dir.join(file_name);
    let mut staged = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        if pretty {
            serde_json::to_writer_pretty(&mut writer, value)?;
        } else {
            serde_json::to_writer(&mut writer, value)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    staged.as_file().sync_all()?;
    staged.persist(&target).map_err(|e| ReportError::Io(e.error))?;
    Ok(target)
}
