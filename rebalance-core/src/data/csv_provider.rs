//! History from a directory of per-symbol CSV files.
//!
//! Each file is named `{symbol}.csv` with a header row
//! `date,open,high,low,close,volume` and ISO dates.

use std::path::{Path, PathBuf};

use super::provider::{DataError, HistoryProvider};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct CsvHistoryProvider {
    dir: PathBuf,
}

impl CsvHistoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

/// Read bars from one CSV file.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, DataError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| match e.into_kind() {
        csv::ErrorKind::Io(io) => DataError::Io(io),
        other => DataError::Parse(format!("{other:?}")),
    })?;
    reader
        .deserialize::<Bar>()
        .map(|row| row.map_err(|e| DataError::Parse(format!("{}: {e}", path.display()))))
        .collect()
}

impl HistoryProvider for CsvHistoryProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn history(&self, symbol: &str) -> Result<Vec<Bar>, DataError> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        read_bars(&path)
    }
}
