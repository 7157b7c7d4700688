//! Rebalance Core: domain types, indicators, return model, scoring, data sources.
//!
//! This crate holds everything that scores a single instrument:
//! - Domain types (bars, instrument snapshots, holdings, order plans and outcomes)
//! - Technical indicators and the fixed `IndicatorSet` feature vector
//! - The versioned linear return model behind the `ReturnPredictor` trait
//! - The composite score aggregator and the cross-asset risk score
//! - Sentiment lookup and history providers (Yahoo, CSV, synthetic)
//!
//! Orchestration across a universe lives in `rebalance-runner`.

pub mod aggregator;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod predictor;
pub mod risk;
pub mod rng;
pub mod sentiment;
