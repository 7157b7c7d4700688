//! Candidate universe: sector-organized symbol lists.
//!
//! Stored as TOML with one array of symbols per sector:
//!
//! ```toml
//! technology = ["TCS.NS", "INFY.NS"]
//! banking = ["HDFCBANK.NS"]
//! ```
//!
//! A symbol listed under more than one sector resolves to the first sector in
//! name order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read universe file: {e}"))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse universe TOML: {e}"))
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("serialize universe: {e}"))
    }

    /// Distinct symbols across all sectors, in sector then listing order.
    pub fn all_symbols(&self) -> Vec<&str> {
        self.entries().into_iter().map(|(symbol, _)| symbol).collect()
    }

    /// `(symbol, sector)` pairs with duplicates removed.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for (sector, symbols) in &self.sectors {
            for symbol in symbols {
                if seen.insert(symbol.as_str()) {
                    out.push((symbol.as_str(), sector.as_str()));
                }
            }
        }
        out
    }

    pub fn sector_of(&self, symbol: &str) -> Option<&str> {
        self.sectors
            .iter()
            .find(|(_, symbols)| symbols.iter().any(|s| s == symbol))
            .map(|(sector, _)| sector.as_str())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.sector_of(symbol).is_some()
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(|s| s.as_str()).collect()
    }

    pub fn symbol_count(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol_count() == 0
    }

    /// Large-cap NSE universe grouped by sector.
    pub fn default_nse() -> Self {
        let table: [(&str, &[&str]); 8] = [
            (
                "technology",
                &[
                    "TCS.NS", "INFY.NS", "HCLTECH.NS", "WIPRO.NS", "TECHM.NS", "LTIM.NS",
                    "MPHASIS.NS", "PERSISTENT.NS", "COFORGE.NS", "TATAELXSI.NS",
                ],
            ),
            (
                "banking",
                &[
                    "HDFCBANK.NS", "ICICIBANK.NS", "SBIN.NS", "KOTAKBANK.NS", "AXISBANK.NS",
                    "INDUSINDBK.NS", "BANKBARODA.NS", "BAJFINANCE.NS", "BAJAJFINSV.NS",
                    "CHOLAFIN.NS",
                ],
            ),
            (
                "pharmaceuticals",
                &[
                    "SUNPHARMA.NS", "DRREDDY.NS", "CIPLA.NS", "DIVISLAB.NS", "LUPIN.NS",
                    "TORNTPHARM.NS", "BIOCON.NS", "ALKEM.NS",
                ],
            ),
            (
                "automotive",
                &[
                    "MARUTI.NS", "TATAMOTORS.NS", "M&M.NS", "EICHERMOT.NS", "HEROMOTOCO.NS",
                    "BAJAJ-AUTO.NS", "ASHOKLEY.NS", "BOSCHLTD.NS",
                ],
            ),
            (
                "energy",
                &[
                    "RELIANCE.NS", "ONGC.NS", "BPCL.NS", "IOC.NS", "GAIL.NS", "NTPC.NS",
                    "POWERGRID.NS", "COALINDIA.NS", "TATAPOWER.NS",
                ],
            ),
            (
                "fmcg",
                &[
                    "HINDUNILVR.NS", "ITC.NS", "NESTLEIND.NS", "BRITANNIA.NS", "TATACONSUM.NS",
                    "DABUR.NS", "MARICO.NS", "COLPAL.NS", "GODREJCP.NS",
                ],
            ),
            (
                "metals",
                &[
                    "TATASTEEL.NS", "JSWSTEEL.NS", "HINDALCO.NS", "VEDL.NS", "SAIL.NS",
                    "NMDC.NS", "JINDALSTEL.NS", "NATIONALUM.NS",
                ],
            ),
            (
                "real_estate",
                &[
                    "DLF.NS", "GODREJPROP.NS", "PRESTIGE.NS", "OBEROI.NS", "BRIGADE.NS",
                    "SOBHA.NS",
                ],
            ),
        ];

        let sectors = table
            .iter()
            .map(|(sector, symbols)| {
                (
                    sector.to_string(),
                    symbols.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self { sectors }
    }
}
