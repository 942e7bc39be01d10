use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market type
// ---------------------------------------------------------------------------

/// One of the two parallel markets. Each has its own prices, holdings and
/// player records; the same value doubles as the stats lookup scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Season,
    Historical,
}

impl MarketType {
    pub const ALL: [MarketType; 2] = [MarketType::Season, MarketType::Historical];

    /// Anything other than `"historical"` (including absence) maps to `Season`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("historical") => MarketType::Historical,
            _ => MarketType::Season,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Season => "season",
            MarketType::Historical => "historical",
        }
    }

    /// `timeWindow` parameter of the stats API for this scope.
    pub fn time_window(&self) -> &'static str {
        match self {
            MarketType::Season => "season",
            MarketType::Historical => "lifetime",
        }
    }
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Pc,
    Xbl,
}

impl Platform {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pc" => Some(Platform::Pc),
            "xbl" => Some(Platform::Xbl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Pc => "pc",
            Platform::Xbl => "xbl",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trade side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fundamental status
// ---------------------------------------------------------------------------

/// Where a fundamental score came from on this read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundamentalStatus {
    /// Fetched from the stats API during this request.
    Live,
    /// Served from an unexpired cache row.
    Cached,
    /// Stats lookup failed; neutral score substituted.
    Fallback,
}

impl std::fmt::Display for FundamentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FundamentalStatus::Live => "live",
            FundamentalStatus::Cached => "cached",
            FundamentalStatus::Fallback => "fallback",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Coin catalog
// ---------------------------------------------------------------------------

/// Static catalog entry: a tradable coin tracking one real player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinProfile {
    pub symbol: String,
    pub label: String,
    /// Epic display name looked up on the stats API.
    pub player: String,
    pub platform: Platform,
    pub seed_price: f64,
}

impl CoinProfile {
    pub fn new(symbol: &str, player: &str, platform: Platform, seed_price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            label: player.to_string(),
            player: player.to_string(),
            platform,
            seed_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_type_defaults_to_season() {
        assert_eq!(MarketType::from_param(None), MarketType::Season);
        assert_eq!(MarketType::from_param(Some("bogus")), MarketType::Season);
        assert_eq!(MarketType::from_param(Some("Historical")), MarketType::Season);
        assert_eq!(MarketType::from_param(Some("historical")), MarketType::Historical);
    }

    #[test]
    fn historical_scope_uses_lifetime_window() {
        assert_eq!(MarketType::Season.time_window(), "season");
        assert_eq!(MarketType::Historical.time_window(), "lifetime");
    }

    #[test]
    fn platform_parse_rejects_unknown() {
        assert_eq!(Platform::parse("pc"), Some(Platform::Pc));
        assert_eq!(Platform::parse("xbl"), Some(Platform::Xbl));
        assert_eq!(Platform::parse("psn"), None);
    }
}
