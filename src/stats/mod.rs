//! Fundamental player statistics: external lookup, normalization and the
//! TTL cache that sits in front of both.

pub mod cache;
pub mod client;
pub mod normalizer;

pub use cache::FundamentalCache;
pub use client::{FortniteApiClient, StatsProvider};

use serde::Serialize;
use thiserror::Error;

use crate::types::{MarketType, Platform};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Fortnite player not found: {0}")]
    NotFound(String),

    #[error("Fortnite-API rate limited (429)")]
    RateLimited,

    #[error("Fortnite-API error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Fortnite-API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Normalized stats for one (player, platform, scope) plus the computed score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundamentalStats {
    pub player: String,
    pub platform: Platform,
    pub scope: MarketType,
    pub wins: f64,
    pub kd: f64,
    #[serde(rename = "winRate")]
    pub win_rate: f64,
    pub matches: f64,
    pub kills: f64,
    pub score: f64,
    /// Untouched API payload, kept for debugging.
    pub raw: serde_json::Value,
}
