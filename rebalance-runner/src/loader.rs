//! File and provider loading for callers that do not build requests in code.
//!
//! Holdings come from a CSV file with the header
//! `symbol,quantity,average_cost[,current_price][,sector]`. Universe snapshots
//! are fetched from a `HistoryProvider` on a worker pool; symbols that fail
//! are reported, not fatal.

use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;
use rebalance_core::data::{fetch_snapshot, HistoryProvider, Universe};
use rebalance_core::domain::{Holding, InstrumentSnapshot};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("worker pool: {0}")]
    WorkerPool(String),
}

#[derive(Debug, Deserialize)]
struct HoldingRow {
    symbol: String,
    quantity: u64,
    average_cost: f64,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    sector: Option<String>,
}

/// Read holdings from a CSV file.
pub fn load_holdings_csv(path: &Path) -> Result<Vec<Holding>, LoadError> {
    let file = std::fs::File::open(path)?;
    read_holdings(file)
}

/// Read holdings from any CSV source. Rows are numbered from 1 after the header.
pub fn read_holdings<R: std::io::Read>(reader: R) -> Result<Vec<Holding>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut holdings = Vec::new();
    for (i, row) in rdr.deserialize::<HoldingRow>().enumerate() {
        let row = row?;
        let line = i + 1;
        if row.symbol.is_empty() {
            return Err(LoadError::InvalidRow {
                row: line,
                reason: "empty symbol".into(),
            });
        }
        if !row.average_cost.is_finite() || row.average_cost < 0.0 {
            return Err(LoadError::InvalidRow {
                row: line,
                reason: format!("average_cost must be finite and >= 0 (got {})", row.average_cost),
            });
        }
        let price = match row.current_price {
            Some(p) if p.is_finite() && p > 0.0 => p,
            Some(p) => {
                return Err(LoadError::InvalidRow {
                    row: line,
                    reason: format!("current_price must be finite and > 0 (got {p})"),
                })
            }
            None => row.average_cost,
        };
        let mut holding = Holding::new(row.symbol, row.quantity, row.average_cost, price);
        if let Some(sector) = row.sector.filter(|s| !s.is_empty()) {
            holding = holding.with_sector(sector);
        }
        holdings.push(holding);
    }
    Ok(holdings)
}

/// Options for fetching universe snapshots.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub worker_threads: usize,
    /// Skip these symbols, typically the caller's holdings.
    pub exclude: Vec<String>,
    /// Stop after this many symbols; `None` loads the whole universe.
    pub limit: Option<usize>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            worker_threads: 5,
            exclude: Vec::new(),
            limit: None,
        }
    }
}

/// Snapshots fetched for a universe, plus the symbols that failed.
#[derive(Debug, Default)]
pub struct LoadedUniverse {
    pub snapshots: Vec<InstrumentSnapshot>,
    pub failures: Vec<(String, String)>,
}

/// Fetch a snapshot for every universe symbol in parallel. Output order
/// follows the universe's (sector, symbol) order.
pub fn load_universe(
    universe: &Universe,
    provider: &dyn HistoryProvider,
    opts: &LoadOptions,
) -> Result<LoadedUniverse, LoadError> {
    let mut entries: Vec<(&str, &str)> = universe
        .entries()
        .into_iter()
        .filter(|(symbol, _)| !opts.exclude.iter().any(|e| e == symbol))
        .collect();
    if let Some(limit) = opts.limit {
        entries.truncate(limit);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.worker_threads.max(1))
        .build()
        .map_err(|e| LoadError::WorkerPool(e.to_string()))?;

    let results: Vec<_> = pool.install(|| {
        entries
            .par_iter()
            .map(|(symbol, sector)| (symbol.to_string(), fetch_snapshot(provider, symbol, sector)))
            .collect()
    });

    let mut loaded = LoadedUniverse::default();
    for (symbol, result) in results {
        match result {
            Ok(snapshot) => loaded.snapshots.push(snapshot),
            Err(e) => {
                warn!("{symbol}: {e}");
                loaded.failures.push((symbol, e.to_string()));
            }
        }
    }
    info!(
        "loaded {} snapshots from {} ({} failed)",
        loaded.snapshots.len(),
        provider.name(),
        loaded.failures.len()
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebalance_core::data::SyntheticHistoryProvider;
    use std::io::Write;

    #[test]
    fn holdings_with_optional_columns() {
        let csv = "symbol,quantity,average_cost,current_price,sector\n\
                   TCS.NS,10,3500,3600,technology\n\
                   ITC.NS,5,400,,\n";
        let holdings = read_holdings(csv.as_bytes()).unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].current_value, 36_000.0);
        assert_eq!(holdings[0].sector.as_deref(), Some("technology"));
        assert_eq!(holdings[1].current_value, 2_000.0);
        assert_eq!(holdings[1].sector, None);
    }

    #[test]
    fn minimal_header_is_enough() {
        let holdings = read_holdings("symbol,quantity,average_cost\nINFY.NS,3,1500\n".as_bytes()).unwrap();
        assert_eq!(holdings[0].quantity, 3);
    }

    #[test]
    fn bad_price_names_the_row() {
        let csv = "symbol,quantity,average_cost,current_price\nA,1,10,11\nB,1,10,-5\n";
        let err = read_holdings(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidRow { row: 2, .. }));
    }

    #[test]
    fn holdings_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "symbol,quantity,average_cost").unwrap();
        writeln!(file, "SBIN.NS,20,600").unwrap();
        let holdings = load_holdings_csv(file.path()).unwrap();
        assert_eq!(holdings[0].symbol, "SBIN.NS");
    }

    #[test]
    fn universe_load_skips_excluded_and_respects_limit() {
        let universe = Universe::from_toml("technology = [\"TCS.NS\", \"INFY.NS\", \"WIPRO.NS\"]\n").unwrap();
        let provider = SyntheticHistoryProvider::new(40, chrono::NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
        let opts = LoadOptions {
            worker_threads: 2,
            exclude: vec!["INFY.NS".into()],
            limit: None,
        };
        let loaded = load_universe(&universe, &provider, &opts).unwrap();
        assert_eq!(loaded.snapshots.len(), 2);
        assert!(loaded.snapshots.iter().all(|s| s.symbol != "INFY.NS"));
        assert!(loaded.failures.is_empty());

        let limited = load_universe(&universe, &provider, &LoadOptions { limit: Some(1), ..opts }).unwrap();
        assert_eq!(limited.snapshots.len(), 1);
    }
}
