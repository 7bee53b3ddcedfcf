//! Pool rule tables, player intent, and scenario loading

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Allowed drift when checking that a probability table sums to 1.0
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Draws per batch; the weapon pool only accepts whole batches
pub const BATCH_SIZE: u32 = 10;

/// Draws after which a 5★-or-better result is forced
pub const FORCED_FIVE_STAR_WINDOW: u32 = 10;

/// Prize name -> required count
pub type Goals = HashMap<String, u32>;

/// Rarity tier of a single character draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Four,
    Five,
    Six,
}

/// One named entry of a six-star prize table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeEntry {
    pub name: String,
    pub probability: f64,
}

impl PrizeEntry {
    pub fn new(name: &str, probability: f64) -> Self {
        Self {
            name: name.to_string(),
            probability,
        }
    }
}

/// Pick a prize by walking the cumulative distribution in table order.
/// `roll` is a uniform value in [0, 1); float drift past the last bucket lands on the last entry.
pub fn pick_prize(table: &[PrizeEntry], roll: f64) -> &str {
    let mut cumulative = 0.0;
    for entry in table {
        cumulative += entry.probability;
        if roll < cumulative {
            return &entry.name;
        }
    }
    table.last().map(|e| e.name.as_str()).unwrap_or("")
}

/// Soft-pity accumulator interval that raises the six-star rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostInterval {
    pub start: u32,
    pub end: u32,
    pub boost: f64,
}

impl BoostInterval {
    pub fn contains(&self, accumulator: u32) -> bool {
        self.start <= accumulator && accumulator <= self.end
    }
}

/// Weapon quota awarded per character draw, by rarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaAwards {
    pub four_star: u64,
    pub five_star: u64,
    pub six_star: u64,
}

impl QuotaAwards {
    pub fn for_rarity(&self, rarity: Rarity) -> u64 {
        match rarity {
            Rarity::Four => self.four_star,
            Rarity::Five => self.five_star,
            Rarity::Six => self.six_star,
        }
    }

    fn any_positive(&self) -> bool {
        self.four_star > 0 || self.five_star > 0 || self.six_star > 0
    }
}

impl Default for QuotaAwards {
    fn default() -> Self {
        Self {
            four_star: 20,
            five_star: 200,
            six_star: 2000,
        }
    }
}

/// Character pool rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterPoolConfig {
    pub four_star_probability: f64,
    pub five_star_probability: f64,
    pub base_six_probability: f64,

    /// Accumulator value that forces a six-star
    pub soft_pity: u32,
    /// Total draw count that forces the limited prize, once per trial
    pub hard_pity: u32,
    /// Every multiple of this total draw count grants a bonus limited prize
    pub loop_pity: u32,
    /// Total draw count that grants one urgent batch voucher
    pub urgent_recruitment_pity: u32,

    pub six_star_pool: Vec<PrizeEntry>,
    /// Name of the limited entry in `six_star_pool`
    pub limited: String,
    pub probability_boosts: Vec<BoostInterval>,
    pub quota_awards: QuotaAwards,

    /// Whether the hard-pity award resets the soft-pity accumulator
    pub hard_pity_resets_soft_pity: bool,
}

impl Default for CharacterPoolConfig {
    fn default() -> Self {
        let standard = 1.0 / 14.0;
        Self {
            four_star_probability: 912.0 / 1000.0,
            five_star_probability: 80.0 / 1000.0,
            base_six_probability: 8.0 / 1000.0,
            soft_pity: 80,
            hard_pity: 120,
            loop_pity: 240,
            urgent_recruitment_pity: 30,
            six_star_pool: vec![
                PrizeEntry::new("Limited", 0.5),
                PrizeEntry::new("Yvonne", standard),
                PrizeEntry::new("Jiege", standard),
                PrizeEntry::new("Bieli", standard),
                PrizeEntry::new("Junwei", standard),
                PrizeEntry::new("Lifeng", standard),
                PrizeEntry::new("Xiaoyang", standard),
                PrizeEntry::new("Ember", standard),
            ],
            limited: "Limited".to_string(),
            // +5% per draw from accumulator 66 through 79
            probability_boosts: (66..=79)
                .enumerate()
                .map(|(i, n)| BoostInterval {
                    start: n,
                    end: n,
                    boost: 0.05 * (i + 1) as f64,
                })
                .collect(),
            quota_awards: QuotaAwards::default(),
            hard_pity_resets_soft_pity: true,
        }
    }
}

impl CharacterPoolConfig {
    /// Six-star rate for the given soft-pity accumulator value
    pub fn six_star_probability_at(&self, accumulator: u32) -> f64 {
        self.probability_boosts
            .iter()
            .find(|b| b.contains(accumulator))
            .map(|b| self.base_six_probability + b.boost)
            .unwrap_or(self.base_six_probability)
    }

    pub fn prize_probability(&self, name: &str) -> Option<f64> {
        self.six_star_pool
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.probability)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("character_pool.four_star_probability", self.four_star_probability)?;
        check_probability("character_pool.five_star_probability", self.five_star_probability)?;
        check_probability("character_pool.base_six_probability", self.base_six_probability)?;
        check_sum(
            "character_pool rarity probabilities",
            self.four_star_probability + self.five_star_probability + self.base_six_probability,
        )?;

        if self.soft_pity == 0 || self.soft_pity >= self.hard_pity || self.hard_pity >= self.loop_pity {
            return Err(ConfigError::PityOrder {
                soft: self.soft_pity,
                hard: self.hard_pity,
                loop_pity: self.loop_pity,
            });
        }

        check_table("character_pool.six_star_pool", &self.six_star_pool, &self.limited)?;

        for (i, boost) in self.probability_boosts.iter().enumerate() {
            if boost.start > boost.end {
                return Err(ConfigError::InvalidBoost {
                    index: i,
                    message: format!("start {} is after end {}", boost.start, boost.end),
                });
            }
            if !boost.boost.is_finite() || boost.boost < 0.0 {
                return Err(ConfigError::InvalidBoost {
                    index: i,
                    message: format!("boost {} must be a non-negative number", boost.boost),
                });
            }
            if let Some(other) = self.probability_boosts[..i]
                .iter()
                .find(|o| o.start <= boost.end && boost.start <= o.end)
            {
                return Err(ConfigError::InvalidBoost {
                    index: i,
                    message: format!(
                        "{}..={} overlaps {}..={}",
                        boost.start, boost.end, other.start, other.end
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Weapon pool rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponPoolConfig {
    pub five_star_probability: f64,
    pub base_six_probability: f64,
    pub six_star_pool: Vec<PrizeEntry>,
    /// Name of the limited entry in `six_star_pool`
    pub limited: String,
    pub quota_cost_per_batch: u64,
    pub only_ten_pull: bool,
    /// Re-arm the 4-batch six-star and 8-batch limited guarantees every window
    /// instead of firing them once per trial
    pub guarantees_rearm: bool,
}

impl Default for WeaponPoolConfig {
    fn default() -> Self {
        let standard = 0.75 / 6.0;
        let mut six_star_pool = vec![PrizeEntry::new("Limited Weapon", 0.25)];
        six_star_pool.extend((1..=6).map(|i| PrizeEntry::new(&format!("Standard Weapon {}", i), standard)));
        Self {
            five_star_probability: 0.96,
            base_six_probability: 0.04,
            six_star_pool,
            limited: "Limited Weapon".to_string(),
            quota_cost_per_batch: 1980,
            only_ten_pull: true,
            guarantees_rearm: false,
        }
    }
}

impl WeaponPoolConfig {
    pub fn prize_probability(&self, name: &str) -> Option<f64> {
        self.six_star_pool
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.probability)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("weapon_pool.five_star_probability", self.five_star_probability)?;
        check_probability("weapon_pool.base_six_probability", self.base_six_probability)?;
        check_sum(
            "weapon_pool rarity probabilities",
            self.five_star_probability + self.base_six_probability,
        )?;
        check_table("weapon_pool.six_star_pool", &self.six_star_pool, &self.limited)?;
        if !self.only_ten_pull {
            return Err(ConfigError::UnsupportedRule {
                field: "weapon_pool.only_ten_pull".to_string(),
                message: "the weapon pool only resolves ten-draw batches".to_string(),
            });
        }
        Ok(())
    }
}

/// What the player already has and what they are aiming for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerIntent {
    /// "Guaranteed 6★ within N draws" as shown in game
    pub guaranteed_six_star_within: u32,
    /// "Guaranteed 5★ or better within N draws" as shown in game
    pub guaranteed_five_star_within: u32,
    pub character_pulls_used: u32,
    pub character_limited_obtained: bool,
    pub free_ten_pulls: u32,
    pub urgent_ten_pulls: u32,
    pub initial_weapon_quota: u64,

    pub character_goals: Goals,
    pub character_always_pull_ten: bool,
    /// 0 = no ceiling
    pub character_pull_limit: u32,
    pub character_pull_minimum: u32,

    /// Batches already drawn in the weapon pool
    pub weapon_batches_used: u32,
    pub weapon_limited_obtained: bool,
    pub weapon_six_star_obtained: bool,

    pub weapon_goals: Goals,
    /// 0 = no ceiling, counted in batches
    pub weapon_pull_limit: u32,
    pub weapon_pull_minimum: u32,
    /// Draw from the character pool when weapon quota runs short, instead of buying quota
    pub borrow_from_character_pool: bool,
}

impl Default for PlayerIntent {
    fn default() -> Self {
        let mut character_goals = HashMap::new();
        character_goals.insert("Limited".to_string(), 1);
        let mut weapon_goals = HashMap::new();
        weapon_goals.insert("Limited Weapon".to_string(), 1);
        Self {
            guaranteed_six_star_within: 80,
            guaranteed_five_star_within: FORCED_FIVE_STAR_WINDOW,
            character_pulls_used: 0,
            character_limited_obtained: false,
            free_ten_pulls: 0,
            urgent_ten_pulls: 0,
            initial_weapon_quota: 0,
            character_goals,
            character_always_pull_ten: false,
            character_pull_limit: 0,
            character_pull_minimum: 0,
            weapon_batches_used: 0,
            weapon_limited_obtained: false,
            weapon_six_star_obtained: false,
            weapon_goals,
            weapon_pull_limit: 0,
            weapon_pull_minimum: 0,
            borrow_from_character_pool: true,
        }
    }
}

impl PlayerIntent {
    /// Soft-pity accumulator implied by "guaranteed 6★ within N"
    pub fn starting_soft_pity(&self, pool: &CharacterPoolConfig) -> Result<u32, ConfigError> {
        derive_soft_pity(self.guaranteed_six_star_within, pool.soft_pity)
    }

    pub fn validate(
        &self,
        character_pool: &CharacterPoolConfig,
        weapon_pool: &WeaponPoolConfig,
    ) -> Result<(), ConfigError> {
        if self.guaranteed_six_star_within == 0 {
            return Err(ConfigError::InvalidIntent {
                field: "guaranteed_six_star_within".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        self.starting_soft_pity(character_pool)?;

        check_limits(
            "character_pull_minimum",
            self.character_pull_minimum,
            self.character_pull_limit,
        )?;
        check_limits("weapon_pull_minimum", self.weapon_pull_minimum, self.weapon_pull_limit)?;

        for name in self.character_goals.keys() {
            check_goal(
                "character_goals",
                name,
                character_pool.prize_probability(name),
                name == &character_pool.limited,
            )?;
        }
        for name in self.weapon_goals.keys() {
            let is_limited = name == &weapon_pool.limited;
            check_goal("weapon_goals", name, weapon_pool.prize_probability(name), is_limited)?;
            // Without a per-draw six-star rate, a standard weapon only comes from the
            // batch-4 guarantee, which must re-arm to be drawn more than once.
            if !is_limited && weapon_pool.base_six_probability <= 0.0 && !weapon_pool.guarantees_rearm {
                return Err(ConfigError::UnreachableGoal {
                    field: "weapon_goals".to_string(),
                    name: name.clone(),
                });
            }
        }

        if self.borrow_from_character_pool
            && self.character_pull_limit == 0
            && weapon_pool.quota_cost_per_batch > 0
            && !character_pool.quota_awards.any_positive()
        {
            return Err(ConfigError::NoQuotaSource);
        }
        Ok(())
    }
}

/// Initial soft-pity accumulator: `soft_pity - guaranteed_within`, rejected when negative
pub fn derive_soft_pity(guaranteed_within: u32, soft_pity: u32) -> Result<u32, ConfigError> {
    soft_pity
        .checked_sub(guaranteed_within)
        .ok_or(ConfigError::NegativeStartingPity {
            guaranteed_within,
            soft_pity,
        })
}

/// Full scenario: both pools, the player, and the trial count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub character_pool: CharacterPoolConfig,
    pub weapon_pool: WeaponPoolConfig,
    pub player: PlayerIntent,
    pub simulation_runs: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            character_pool: CharacterPoolConfig::default(),
            weapon_pool: WeaponPoolConfig::default(),
            player: PlayerIntent::default(),
            simulation_runs: 10_000,
        }
    }
}

impl SimulationConfig {
    /// Load a scenario from a YAML or JSON file (chosen by extension)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(&path)?;
        let path_str = path.as_ref().to_string_lossy().to_lowercase();

        if path_str.ends_with(".json") {
            let config: SimulationConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            let config: SimulationConfig = serde_yaml::from_str(&content)?;
            Ok(config)
        }
    }

    /// Load from JSON string (for Python interop)
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.character_pool.validate()?;
        self.weapon_pool.validate()?;
        self.player.validate(&self.character_pool, &self.weapon_pool)?;
        validate_trial_count(self.simulation_runs)
    }
}

pub fn validate_trial_count(count: usize) -> Result<(), ConfigError> {
    if count == 0 {
        return Err(ConfigError::InvalidTrialCount(count));
    }
    Ok(())
}

fn check_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidProbability {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn check_sum(field: &str, sum: f64) -> Result<(), ConfigError> {
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(ConfigError::ProbabilitySum {
            field: field.to_string(),
            sum,
        });
    }
    Ok(())
}

fn check_table(field: &str, table: &[PrizeEntry], limited: &str) -> Result<(), ConfigError> {
    for entry in table {
        check_probability(&format!("{}.{}", field, entry.name), entry.probability)?;
    }
    check_sum(field, table.iter().map(|e| e.probability).sum())?;
    if !table.iter().any(|e| e.name == limited) {
        return Err(ConfigError::UnknownPrize {
            field: field.to_string(),
            name: limited.to_string(),
        });
    }
    Ok(())
}

fn check_limits(field: &str, minimum: u32, limit: u32) -> Result<(), ConfigError> {
    if limit > 0 && minimum > limit {
        return Err(ConfigError::InvalidIntent {
            field: field.to_string(),
            message: format!("minimum {} exceeds limit {}", minimum, limit),
        });
    }
    Ok(())
}

// The limited entry is always reachable through pity awards, so only other
// goals need a positive table weight.
fn check_goal(field: &str, name: &str, probability: Option<f64>, is_limited: bool) -> Result<(), ConfigError> {
    match probability {
        None => Err(ConfigError::UnknownPrize {
            field: field.to_string(),
            name: name.to_string(),
        }),
        Some(p) if p <= 0.0 && !is_limited => Err(ConfigError::UnreachableGoal {
            field: field.to_string(),
            name: name.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

/// Configuration and input validation failures. Fatal; surfaced before any trial runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidProbability { field: String, value: f64 },
    ProbabilitySum { field: String, sum: f64 },
    PityOrder { soft: u32, hard: u32, loop_pity: u32 },
    UnknownPrize { field: String, name: String },
    InvalidBoost { index: usize, message: String },
    UnsupportedRule { field: String, message: String },
    NegativeStartingPity { guaranteed_within: u32, soft_pity: u32 },
    InvalidIntent { field: String, message: String },
    UnreachableGoal { field: String, name: String },
    NoQuotaSource,
    InvalidTrialCount(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidProbability { field, value } => {
                write!(f, "Invalid probability in '{}': {} is not within [0, 1]", field, value)
            }
            ConfigError::ProbabilitySum { field, sum } => {
                write!(f, "Probabilities in '{}' sum to {}, expected 1.0", field, sum)
            }
            ConfigError::PityOrder { soft, hard, loop_pity } => write!(
                f,
                "Pity thresholds must satisfy 0 < soft < hard < loop, got soft={} hard={} loop={}",
                soft, hard, loop_pity
            ),
            ConfigError::UnknownPrize { field, name } => {
                write!(f, "'{}' names prize '{}' which is not in the six-star table", field, name)
            }
            ConfigError::InvalidBoost { index, message } => {
                write!(f, "Invalid probability boost #{}: {}", index, message)
            }
            ConfigError::UnsupportedRule { field, message } => {
                write!(f, "Unsupported rule '{}': {}", field, message)
            }
            ConfigError::NegativeStartingPity { guaranteed_within, soft_pity } => write!(
                f,
                "'guaranteed 6★ within {}' is inconsistent with soft pity {}: derived accumulator would be negative",
                guaranteed_within, soft_pity
            ),
            ConfigError::InvalidIntent { field, message } => {
                write!(f, "Invalid player input '{}': {}", field, message)
            }
            ConfigError::UnreachableGoal { field, name } => {
                write!(f, "Goal '{}' in '{}' has zero probability and can never be met", name, field)
            }
            ConfigError::NoQuotaSource => write!(
                f,
                "Borrowing from the character pool is enabled but no rarity awards weapon quota"
            ),
            ConfigError::InvalidTrialCount(count) => {
                write!(f, "Trial count must be positive, got {}", count)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
