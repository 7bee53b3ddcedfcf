//! Per-trial outcome records and aggregation across trials

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a trial stopped short of its goals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCause {
    CharacterLimitBeforeGoal,
    WeaponLimitBeforeGoal,
    CharacterLimitDuringQuotaTopup,
    QuotaExhausted,
}

impl FailureCause {
    pub const ALL: [FailureCause; 4] = [
        FailureCause::CharacterLimitBeforeGoal,
        FailureCause::WeaponLimitBeforeGoal,
        FailureCause::CharacterLimitDuringQuotaTopup,
        FailureCause::QuotaExhausted,
    ];

    /// Stable machine-readable tag, same as the serialized form
    pub fn tag(self) -> &'static str {
        match self {
            FailureCause::CharacterLimitBeforeGoal => "character-limit-before-goal",
            FailureCause::WeaponLimitBeforeGoal => "weapon-limit-before-goal",
            FailureCause::CharacterLimitDuringQuotaTopup => "character-limit-during-quota-topup",
            FailureCause::QuotaExhausted => "quota-exhausted",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            FailureCause::CharacterLimitBeforeGoal => {
                "character pull limit reached before the character goal"
            }
            FailureCause::WeaponLimitBeforeGoal => "weapon batch limit reached before the weapon goal",
            FailureCause::CharacterLimitDuringQuotaTopup => {
                "character pull limit reached while earning weapon quota"
            }
            FailureCause::QuotaExhausted => "weapon quota exhausted",
        };
        f.write_str(message)
    }
}

/// Result of a single trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub character_paid_pulls: u32,
    pub character_free_pulls: u32,
    pub character_pulls_excluding_urgent: u32,
    pub character_urgent_pulls: u32,
    pub character_pulls_total: u32,
    pub weapon_batches: u32,
    pub weapon_pulls: u32,
    pub weapon_quota_consumed: u64,
    pub quota_earned: u64,
    pub quota_remaining: u64,
    pub supply_containers: u32,
    pub quota_purchased: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_cause: Option<FailureCause>,
}

/// Distribution of one per-trial quantity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: u64,
    pub max: u64,
    /// Upper median: `sorted[len / 2]`
    pub median: u64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Percentile of sorted values, interpolating linearly between closest ranks
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let low = sorted[lo] as f64;
    low + (sorted[hi] as f64 - low) * (rank - lo as f64)
}

impl Summary {
    pub fn from_values(mut values: Vec<u64>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        values.sort_unstable();
        let n = values.len();
        let sum: u64 = values.iter().sum();
        let mean = sum as f64 / n as f64;
        let variance = values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n as f64;

        Self {
            mean,
            std_dev: variance.sqrt(),
            min: values[0],
            max: values[n - 1],
            median: values[n / 2],
            p25: percentile(&values, 25.0),
            p75: percentile(&values, 75.0),
            p90: percentile(&values, 90.0),
            p95: percentile(&values, 95.0),
            p99: percentile(&values, 99.0),
        }
    }
}

/// Aggregated statistics from multiple trials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub simulations: usize,
    pub successes: usize,
    pub failures: usize,
    /// Percentage in [0, 100]
    pub success_rate: f64,
    /// Failure counts keyed by cause tag
    pub failure_causes: BTreeMap<String, usize>,
    pub character_pulls: Summary,
    pub weapon_batches: Summary,
    pub quota_remaining: Summary,
    pub quota_purchased: Summary,
}

impl AggregatedStats {
    pub fn from_results(results: &[OutcomeRecord]) -> Self {
        let n = results.len();
        if n == 0 {
            return Self::default();
        }

        let successes = results.iter().filter(|r| r.success).count();
        let mut failure_causes = BTreeMap::new();
        for cause in results.iter().filter_map(|r| r.failure_cause) {
            *failure_causes.entry(cause.tag().to_string()).or_insert(0) += 1;
        }

        Self {
            simulations: n,
            successes,
            failures: n - successes,
            success_rate: successes as f64 / n as f64 * 100.0,
            failure_causes,
            character_pulls: Summary::from_values(
                results
                    .iter()
                    .map(|r| r.character_pulls_excluding_urgent as u64)
                    .collect(),
            ),
            weapon_batches: Summary::from_values(
                results.iter().map(|r| r.weapon_batches as u64).collect(),
            ),
            quota_remaining: Summary::from_values(results.iter().map(|r| r.quota_remaining).collect()),
            quota_purchased: Summary::from_values(results.iter().map(|r| r.quota_purchased).collect()),
        }
    }

    /// Failure causes ordered by count, most common first
    pub fn failure_causes_by_count(&self) -> Vec<(FailureCause, usize)> {
        let mut causes: Vec<(FailureCause, usize)> = FailureCause::ALL
            .iter()
            .filter_map(|&cause| self.failure_causes.get(cause.tag()).map(|&count| (cause, count)))
            .collect();
        causes.sort_by(|a, b| b.1.cmp(&a.1));
        causes
    }
}
