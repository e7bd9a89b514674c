use crate::export::workbook;
use crate::utils::error::OcrError;
use crate::Result;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One lock per store path, shared by every accumulator in the process.
static STORE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn store_lock(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = STORE_LOCKS.lock();
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportConfig {
    /// Durable workbook that accumulates recognized lines.
    pub path: PathBuf,
    pub sheet_name: String,
    /// Filename advertised on the downloaded artifact.
    pub download_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("extracted_words.xlsx"),
            sheet_name: "Extracted Words".to_string(),
            download_name: "extracted_words.xlsx".to_string(),
        }
    }
}

/// Append-only spreadsheet store. Appends to the same file are serialized and
/// each one replaces the store atomically.
pub struct ExportAccumulator {
    config: ExportConfig,
    lock: Arc<Mutex<()>>,
}

impl ExportAccumulator {
    pub fn new(config: ExportConfig) -> Self {
        let lock = store_lock(&store_identity(&config.path));
        Self { config, lock }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Append `words` as one space-joined row and return the whole store as xlsx bytes.
    pub fn append_and_export(&self, words: &[String]) -> Result<Vec<u8>> {
        let line = join_words(words)?;

        let _guard = self.lock.lock();

        let mut rows = if self.config.path.exists() {
            workbook::read_rows(&self.config.path)?
        } else {
            tracing::info!("Creating export store at {}", self.config.path.display());
            Vec::new()
        };
        rows.push(line);

        let bytes = workbook::render(&self.config.sheet_name, &rows)?;
        self.replace_store(&bytes)?;

        tracing::info!(
            "Appended row {} to {} ({} bytes)",
            rows.len(),
            self.config.path.display(),
            bytes.len()
        );

        Ok(bytes)
    }

    /// Current rows of the store, oldest first.
    pub fn rows(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock();
        if self.config.path.exists() {
            workbook::read_rows(&self.config.path)
        } else {
            Ok(Vec::new())
        }
    }

    /// Write to a uniquely named sibling temp file, then rename over the store.
    /// The temp file is deleted on drop if anything fails before the rename.
    fn replace_store(&self, bytes: &[u8]) -> Result<()> {
        let dir = match self.config.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| {
            OcrError::ExportIo(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".export-")
            .suffix(".xlsx.tmp")
            .tempfile_in(&dir)
            .map_err(|e| OcrError::ExportIo(format!("Failed to create temp file: {}", e)))?;

        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| OcrError::ExportIo(format!("Failed to write temp file: {}", e)))?;

        tmp.persist(&self.config.path).map_err(|e| {
            OcrError::ExportIo(format!(
                "Failed to replace {}: {}",
                self.config.path.display(),
                e.error
            ))
        })?;

        Ok(())
    }
}

/// Largest string an xlsx cell can hold.
pub const MAX_CELL_CHARS: usize = 32_767;

fn join_words(words: &[String]) -> Result<String> {
    let line = words.join(" ");
    if line.trim().is_empty() {
        return Err(OcrError::NoWordsProvided);
    }
    let chars = line.chars().count();
    if chars > MAX_CELL_CHARS {
        return Err(OcrError::InvalidInput(format!(
            "Saved line has {} characters, the limit is {}",
            chars, MAX_CELL_CHARS
        )));
    }
    Ok(line)
}

/// Stable key for a store path whether or not the file exists yet.
fn store_identity(path: &Path) -> PathBuf {
    let absolute = absolute(path);
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|dir| dir.join(name))
            .unwrap_or_else(|_| absolute.clone()),
        _ => absolute,
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn accumulator(dir: &Path) -> ExportAccumulator {
        ExportAccumulator::new(ExportConfig {
            path: dir.join("extracted_words.xlsx"),
            ..ExportConfig::default()
        })
    }

    #[test]
    fn test_creates_store_on_first_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = accumulator(dir.path());

        let bytes = store.append_and_export(&words(&["hello", "world"])).unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert_eq!(store.rows().unwrap(), vec!["hello world"]);
        assert_eq!(std::fs::read(&store.config().path).unwrap(), bytes);
    }

    #[test]
    fn test_append_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = accumulator(dir.path());
        store.append_and_export(&words(&["hello", "world"])).unwrap();

        // A fresh accumulator must see the durable store, not in-memory state.
        let reopened = accumulator(dir.path());
        reopened.append_and_export(&words(&["foo", "bar"])).unwrap();

        assert_eq!(reopened.rows().unwrap(), vec!["hello world", "foo bar"]);
    }

    #[test]
    fn test_empty_words_rejected_without_touching_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = accumulator(dir.path());

        assert!(matches!(store.append_and_export(&[]), Err(OcrError::NoWordsProvided)));
        assert!(matches!(
            store.append_and_export(&words(&["", " "])),
            Err(OcrError::NoWordsProvided)
        ));
        assert!(!store.config().path.exists());
    }

    #[test]
    fn test_overlong_line_rejected_as_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = accumulator(dir.path());

        let at_limit = "a".repeat(MAX_CELL_CHARS);
        store.append_and_export(&[at_limit.clone()]).unwrap();

        let err = store
            .append_and_export(&[at_limit, "b".to_string()])
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidInput(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(store.rows().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_appends_lose_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let writers = 12;

        thread::scope(|scope| {
            for i in 0..writers {
                let path = dir.path().to_path_buf();
                scope.spawn(move || {
                    // Separate instances on purpose: the lock is per store path.
                    let store = accumulator(&path);
                    store
                        .append_and_export(&words(&["writer", &i.to_string()]))
                        .unwrap();
                });
            }
        });

        let mut rows = accumulator(dir.path()).rows().unwrap();
        assert_eq!(rows.len(), writers);
        rows.sort();
        rows.dedup();
        assert_eq!(rows.len(), writers);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = accumulator(dir.path());
        for i in 0..3 {
            store.append_and_export(&words(&["line", &i.to_string()])).unwrap();
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["extracted_words.xlsx"]);
    }

    #[test]
    fn test_corrupt_store_reports_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = accumulator(dir.path());
        std::fs::write(&store.config().path, b"garbage").unwrap();

        let err = store.append_and_export(&words(&["x"])).unwrap_err();
        assert!(matches!(err, OcrError::ExportIo(_)));
        // The corrupt file is left as-is rather than silently replaced.
        assert_eq!(std::fs::read(&store.config().path).unwrap(), b"garbage");
    }
}
