//! Market file discovery and loading.
//!
//! Market files live under `<data_dir>/<SYMBOL>/<YYYY-MM-DD>/<file>.json`.
//! Each file holds one JSON document (an object with a trade list and
//! optional depth data, or a bare trade array).

use crate::domain::errors::MarketDataError;
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the directory searched for by [`find_data_dir`]
pub const DATA_DIR_NAME: &str = "data";

/// Walks up from `start` at most `max_up` levels looking for a `data` directory.
pub fn find_data_dir(start: &Path, max_up: usize) -> Result<PathBuf, MarketDataError> {
    let mut current = Some(start);
    for _ in 0..max_up {
        let Some(dir) = current else {
            break;
        };
        let candidate = dir.join(DATA_DIR_NAME);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        current = dir.parent();
    }
    Err(MarketDataError::DataDirNotFound {
        start: start.to_path_buf(),
        max_up,
    })
}

/// Reads market files for a symbol from a data directory.
#[derive(Debug, Clone)]
pub struct MarketFileStore {
    data_dir: PathBuf,
}

impl MarketFileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Lists `*.json` files for `symbol` in chronological (lexicographic) order.
    pub fn list_files(&self, symbol: &str) -> Result<Vec<PathBuf>, MarketDataError> {
        let symbol_path = self.data_dir.join(symbol);
        if !symbol_path.is_dir() {
            return Err(MarketDataError::SymbolNotFound { path: symbol_path });
        }

        let mut day_dirs = read_dir_sorted(&symbol_path)?;
        day_dirs.retain(|p| p.is_dir());

        let mut files = Vec::new();
        for day_dir in day_dirs {
            let mut day_files = read_dir_sorted(&day_dir)?;
            day_files.retain(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"));
            files.extend(day_files);
        }
        Ok(files)
    }

    /// Loads every market file for `symbol`. Unreadable or malformed files are
    /// logged and skipped; the remaining documents keep chronological order.
    pub fn load(&self, symbol: &str) -> Result<Vec<Value>, MarketDataError> {
        info!("Data dir: {}", self.data_dir.display());
        let files = self.list_files(symbol)?;

        let docs: Vec<Value> = files
            .par_iter()
            .filter_map(|path| match read_json(path) {
                Ok(doc) => Some(doc),
                Err(reason) => {
                    warn!("Error reading {}: {}", path.display(), reason);
                    None
                }
            })
            .collect();

        debug!(
            "Parsed {}/{} market files for {}",
            docs.len(),
            files.len(),
            symbol
        );
        Ok(docs)
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, MarketDataError> {
    let entries = fs::read_dir(dir).map_err(|source| MarketDataError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    Ok(paths)
}

fn read_json(path: &Path) -> Result<Value, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_find_data_dir_walks_up() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("data")).unwrap();
        let nested = root.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let found = find_data_dir(&nested, 6).unwrap();
        assert_eq!(found, root.path().join("data"));
    }

    #[test]
    fn test_find_data_dir_respects_limit() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("data")).unwrap();
        let nested = root.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        assert!(matches!(
            find_data_dir(&nested, 2),
            Err(MarketDataError::DataDirNotFound { max_up: 2, .. })
        ));
    }

    #[test]
    fn test_load_orders_days_and_files() {
        let root = TempDir::new().unwrap();
        write(root.path(), "XRPUSDT/2024-01-02/00.json", r#"{"n": 3}"#);
        write(root.path(), "XRPUSDT/2024-01-01/01.json", r#"{"n": 2}"#);
        write(root.path(), "XRPUSDT/2024-01-01/00.json", r#"{"n": 1}"#);
        write(root.path(), "XRPUSDT/2024-01-01/notes.txt", "ignored");

        let store = MarketFileStore::new(root.path().to_path_buf());
        let docs = store.load("XRPUSDT").unwrap();

        let order: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_load_skips_malformed_files() {
        let root = TempDir::new().unwrap();
        write(root.path(), "BTCUSDT/2024-01-01/00.json", "{not json");
        write(root.path(), "BTCUSDT/2024-01-01/01.json", "[]");

        let store = MarketFileStore::new(root.path().to_path_buf());
        let docs = store.load("BTCUSDT").unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_missing_symbol_is_error() {
        let root = TempDir::new().unwrap();
        let store = MarketFileStore::new(root.path().to_path_buf());

        assert!(matches!(
            store.load("ETHUSDT"),
            Err(MarketDataError::SymbolNotFound { .. })
        ));
    }
}
