//! Sentiment lookup.
//!
//! Sentiment is precomputed elsewhere; the engine only reads a per-symbol or
//! per-sector score in [-1, 1]. Lookup falls back from symbol to sector to 0.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// What a sentiment score is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentKey<'a> {
    Symbol(&'a str),
    Sector(&'a str),
}

pub trait SentimentProvider: Send + Sync {
    /// Raw score for a key, `None` when unknown.
    fn sentiment(&self, key: SentimentKey<'_>) -> Option<f64>;
}

/// Symbol score, else sector score, else 0. Clamped to [-1, 1]; NaN is neutral.
pub fn resolve_sentiment(provider: &dyn SentimentProvider, symbol: &str, sector: &str) -> f64 {
    let raw = provider
        .sentiment(SentimentKey::Symbol(symbol))
        .or_else(|| provider.sentiment(SentimentKey::Sector(sector)))
        .unwrap_or(0.0);
    if raw.is_finite() {
        raw.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Every lookup is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralSentiment;

impl SentimentProvider for NeutralSentiment {
    fn sentiment(&self, _key: SentimentKey<'_>) -> Option<f64> {
        None
    }
}

/// Fixed score tables, loadable from TOML.
///
/// ```toml
/// [sectors]
/// technology = 0.5
///
/// [symbols]
/// "TCS.NS" = 0.2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticSentiment {
    #[serde(default)]
    pub symbols: BTreeMap<String, f64>,
    #[serde(default)]
    pub sectors: BTreeMap<String, f64>,
}

impl StaticSentiment {
    /// Sector outlook table: positive 0.5, neutral 0, negative -0.5.
    pub fn default_sectors() -> Self {
        let sectors = [
            ("technology", 0.5),
            ("banking", 0.0),
            ("pharmaceuticals", 0.5),
            ("automotive", 0.0),
            ("energy", -0.5),
            ("fmcg", 0.5),
            ("metals", 0.0),
            ("real_estate", 0.0),
        ]
        .into_iter()
        .map(|(s, v)| (s.to_string(), v))
        .collect();
        Self {
            symbols: BTreeMap::new(),
            sectors,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse sentiment TOML: {e}"))
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read sentiment file: {e}"))?;
        Self::from_toml(&content)
    }
}

impl SentimentProvider for StaticSentiment {
    fn sentiment(&self, key: SentimentKey<'_>) -> Option<f64> {
        match key {
            SentimentKey::Symbol(s) => self.symbols.get(s).copied(),
            SentimentKey::Sector(s) => self.sectors.get(&s.to_ascii_lowercase()).copied(),
        }
    }
}
