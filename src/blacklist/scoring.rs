//! Reliability-weighted reputation score and risk band.

use serde::Serialize;

use super::lookup::ProviderCheckResult;

/// Risk band of a set of DNSBL results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskBand {
    /// Ratio under 20.
    Low,
    /// Ratio under 50.
    Medium,
    /// Ratio under 80.
    High,
    /// Ratio of 80 or more.
    Critical,
}

/// Risk band with its explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskLevel {
    /// Band.
    pub level: RiskBand,
    /// Human-readable explanation.
    pub description: &'static str,
}

/// Starts at 100 and loses `10 × (10 − reliability)` per listing, floored at 0.
pub fn reliability_score<'a>(results: impl IntoIterator<Item = &'a ProviderCheckResult>) -> u32 {
    let penalty: u32 = results
        .into_iter()
        .filter(|r| r.listed)
        .map(|r| 10 * (10 - u32::from(r.reliability.min(10))))
        .sum();
    100u32.saturating_sub(penalty)
}

/// Bands `listed / total × (1 − score / 100) × 100`.
pub fn risk_level(listed: usize, total: usize, score: u32) -> RiskLevel {
    let ratio = if total == 0 {
        0.0
    } else {
        (listed as f64 / total as f64) * (1.0 - f64::from(score.min(100)) / 100.0) * 100.0
    };
    if ratio < 20.0 {
        RiskLevel {
            level: RiskBand::Low,
            description: "Low risk: little or no blocklist presence",
        }
    } else if ratio < 50.0 {
        RiskLevel {
            level: RiskBand::Medium,
            description: "Medium risk: listed by some providers, deliverability may suffer",
        }
    } else if ratio < 80.0 {
        RiskLevel {
            level: RiskBand::High,
            description: "High risk: widely listed, mail is likely to be rejected",
        }
    } else {
        RiskLevel {
            level: RiskBand::Critical,
            description: "Critical risk: listed by most providers, request delisting",
        }
    }
}

/// Aggregate over a set of provider results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistSummary {
    /// Provider checks counted.
    pub total_checks: usize,
    /// Checks that reported a listing.
    pub listed_count: usize,
    /// Checks that failed for a reason other than "not listed".
    pub error_count: usize,
    /// Weighted score, 100 when nothing is listed.
    pub reliability_score: u32,
    /// Risk band of the listing ratio.
    pub risk_level: RiskLevel,
}

impl BlacklistSummary {
    /// Summarizes `results`.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ProviderCheckResult> + Clone) -> Self {
        let mut total_checks = 0;
        let mut listed_count = 0;
        let mut error_count = 0;
        for result in results.clone() {
            total_checks += 1;
            if result.listed {
                listed_count += 1;
            }
            if result.error.is_some() {
                error_count += 1;
            }
        }
        let score = reliability_score(results);
        BlacklistSummary {
            total_checks,
            listed_count,
            error_count,
            reliability_score: score,
            risk_level: risk_level(listed_count, total_checks, score),
        }
    }
}
