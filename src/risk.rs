//! Change-risk classification derived from graph topology.

use std::fmt;

use serde::Serialize;

/// Highest degree still classified [`RiskLevel::Low`].
pub const LOW_MAX: usize = 3;
/// Highest degree still classified [`RiskLevel::Medium`].
pub const MEDIUM_MAX: usize = 10;
/// Minimum degree for [`RiskLevel::Critical`]; the node must also be a hub.
pub const CRITICAL_MIN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Classify a node from its total degree (in + out) and hub membership.
    ///
    /// A node of degree 20 or more that is not a hub stays `High`.
    pub fn classify(degree: usize, is_hub: bool) -> Self {
        match degree {
            d if d <= LOW_MAX => RiskLevel::Low,
            d if d <= MEDIUM_MAX => RiskLevel::Medium,
            d if d >= CRITICAL_MIN && is_hub => RiskLevel::Critical,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order `(id, degree)` pairs by degree descending, id ascending.
pub fn rank_by_degree<'a>(entries: impl IntoIterator<Item = (&'a str, usize)>) -> Vec<(&'a str, usize)> {
    let mut ranked: Vec<(&str, usize)> = entries.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(RiskLevel::classify(0, false), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(3, true), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(4, false), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(10, true), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(11, false), RiskLevel::High);
        assert_eq!(RiskLevel::classify(19, true), RiskLevel::High);
        assert_eq!(RiskLevel::classify(20, false), RiskLevel::High);
        assert_eq!(RiskLevel::classify(20, true), RiskLevel::Critical);
    }

    #[test]
    fn test_levels_order_by_severity() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"CRITICAL\"");
    }

    #[test]
    fn test_rank_ties_break_by_id() {
        let ranked = rank_by_degree([("b", 2), ("a", 2), ("c", 5)]);
        assert_eq!(ranked, vec![("c", 5), ("a", 2), ("b", 2)]);
    }
}
