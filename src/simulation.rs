//! Combined simulator - character phase, then weapon phase, one outcome record per trial

use crate::character::{self, CharacterRuntimeState};
use crate::config::{
    validate_trial_count, CharacterPoolConfig, ConfigError, Goals, PlayerIntent, SimulationConfig,
    WeaponPoolConfig, BATCH_SIZE,
};
use crate::stats::{AggregatedStats, FailureCause, OutcomeRecord};
use crate::weapon::{self, WeaponRuntimeState};
use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;

/// Uniform random values in [0, 1). Every draw takes one explicitly.
pub trait RandomSource {
    fn f64(&mut self) -> f64;
}

/// Fast RNG wrapper for better performance
#[derive(Clone)]
pub struct FastRng {
    inner: fastrand::Rng,
}

impl FastRng {
    #[inline(always)]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: fastrand::Rng::with_seed(seed),
        }
    }
}

impl RandomSource for FastRng {
    #[inline(always)]
    fn f64(&mut self) -> f64 {
        self.inner.f64()
    }
}

/// Seed drawn from OS entropy, for runs that do not pin one
pub fn fresh_seed() -> u64 {
    SmallRng::from_entropy().gen()
}

/// Draw counters owned by the orchestrator for one trial
#[derive(Debug, Default)]
struct TrialCounters {
    paid: u32,
    free: u32,
    urgent: u32,
    weapon_batches: u32,
    purchased: u64,
}

impl TrialCounters {
    /// Draws that count against the character limit and minimum (urgent excluded)
    fn character_pulls(&self) -> u32 {
        self.paid + self.free
    }

    fn outcome(
        &self,
        character: &CharacterRuntimeState,
        quota_remaining: u64,
        supply_containers: u32,
        weapon_pool: &WeaponPoolConfig,
        failure_cause: Option<FailureCause>,
    ) -> OutcomeRecord {
        OutcomeRecord {
            character_paid_pulls: self.paid,
            character_free_pulls: self.free,
            character_pulls_excluding_urgent: self.character_pulls(),
            character_urgent_pulls: self.urgent,
            character_pulls_total: self.character_pulls() + self.urgent,
            weapon_batches: self.weapon_batches,
            weapon_pulls: self.weapon_batches * BATCH_SIZE,
            weapon_quota_consumed: self.weapon_batches as u64 * weapon_pool.quota_cost_per_batch,
            quota_earned: character.quota_earned,
            quota_remaining,
            supply_containers,
            quota_purchased: self.purchased,
            success: failure_cause.is_none(),
            failure_cause,
        }
    }
}

fn goals_achieved(progress: &HashMap<String, u32>, goals: &Goals) -> bool {
    goals
        .iter()
        .all(|(name, &required)| progress.get(name).copied().unwrap_or(0) >= required)
}

fn record_prizes(progress: &mut HashMap<String, u32>, prizes: &[String]) {
    for prize in prizes {
        *progress.entry(prize.clone()).or_insert(0) += 1;
    }
}

/// One step in the character pool: a voucher batch when one is held (urgent first),
/// otherwise a paid batch or a paid single draw.
fn character_step<R: RandomSource>(
    pool: &CharacterPoolConfig,
    state: &mut CharacterRuntimeState,
    progress: &mut HashMap<String, u32>,
    counters: &mut TrialCounters,
    always_ten: bool,
    rng: &mut R,
) {
    state.grant_urgent_if_due(pool);

    if state.has_batch_voucher() {
        let using_urgent = state.urgent_batches > 0;
        let prizes = character::draw_ten_batch(pool, state, rng);
        record_prizes(progress, &prizes);
        if using_urgent {
            counters.urgent += BATCH_SIZE;
        } else {
            counters.free += BATCH_SIZE;
        }
    } else if always_ten {
        let prizes = character::draw_ten_batch(pool, state, rng);
        record_prizes(progress, &prizes);
        counters.paid += BATCH_SIZE;
    } else {
        let mut prizes = Vec::new();
        character::draw_one(pool, state, &mut prizes, rng);
        record_prizes(progress, &prizes);
        counters.paid += 1;
    }
}

/// Reject configurations that would panic or never finish a trial
pub fn validate_trial_inputs(
    character_pool: &CharacterPoolConfig,
    weapon_pool: &WeaponPoolConfig,
    intent: &PlayerIntent,
) -> Result<(), ConfigError> {
    character_pool.validate()?;
    weapon_pool.validate()?;
    intent.validate(character_pool, weapon_pool)
}

/// Run a single trial with a fresh random seed
pub fn simulate(
    character_pool: &CharacterPoolConfig,
    weapon_pool: &WeaponPoolConfig,
    intent: &PlayerIntent,
) -> Result<OutcomeRecord, ConfigError> {
    let mut rng = FastRng::new(fresh_seed());
    simulate_with_rng(character_pool, weapon_pool, intent, &mut rng)
}

/// Run a single trial with a specific seed
pub fn simulate_with_seed(
    character_pool: &CharacterPoolConfig,
    weapon_pool: &WeaponPoolConfig,
    intent: &PlayerIntent,
    seed: u64,
) -> Result<OutcomeRecord, ConfigError> {
    let mut rng = FastRng::new(seed);
    simulate_with_rng(character_pool, weapon_pool, intent, &mut rng)
}

/// Run a single trial against the given random source.
///
/// Phase 1 draws the character pool until its goal and minimum are met. Phase 2
/// draws weapon batches, topping up quota from the character pool (or by purchase)
/// whenever a batch is short. Hitting a configured ceiling ends the trial with a
/// failure record rather than an error. Invalid pools or intent are rejected
/// before any draw.
pub fn simulate_with_rng<R: RandomSource>(
    character_pool: &CharacterPoolConfig,
    weapon_pool: &WeaponPoolConfig,
    intent: &PlayerIntent,
    rng: &mut R,
) -> Result<OutcomeRecord, ConfigError> {
    validate_trial_inputs(character_pool, weapon_pool, intent)?;
    simulate_unchecked(character_pool, weapon_pool, intent, rng)
}

/// Trial body for inputs that already passed `validate_trial_inputs`
fn simulate_unchecked<R: RandomSource>(
    character_pool: &CharacterPoolConfig,
    weapon_pool: &WeaponPoolConfig,
    intent: &PlayerIntent,
    rng: &mut R,
) -> Result<OutcomeRecord, ConfigError> {
    let mut character = CharacterRuntimeState::from_intent(intent, character_pool)?;
    let mut weapon = WeaponRuntimeState::from_intent(intent);
    let mut character_progress: HashMap<String, u32> = HashMap::new();
    let mut weapon_progress: HashMap<String, u32> = HashMap::new();
    let mut counters = TrialCounters::default();

    let character_limit = intent.character_pull_limit;
    let weapon_limit = intent.weapon_pull_limit;
    let batch_cost = weapon_pool.quota_cost_per_batch;

    // === Phase 1: character goal ===
    loop {
        if goals_achieved(&character_progress, &intent.character_goals)
            && counters.character_pulls() >= intent.character_pull_minimum
        {
            break;
        }
        if character_limit > 0 && counters.character_pulls() >= character_limit {
            debug!("character limit {} reached before goal", character_limit);
            return Ok(counters.outcome(
                &character,
                character.quota,
                0,
                weapon_pool,
                Some(FailureCause::CharacterLimitBeforeGoal),
            ));
        }
        character_step(
            character_pool,
            &mut character,
            &mut character_progress,
            &mut counters,
            intent.character_always_pull_ten,
            rng,
        );
    }

    debug!(
        "character goal met after {} draws ({} urgent), quota {}",
        counters.character_pulls(),
        counters.urgent,
        character.quota
    );
    weapon.quota = character.quota;

    // === Phase 2: weapon goal ===
    loop {
        if goals_achieved(&weapon_progress, &intent.weapon_goals)
            && counters.weapon_batches >= intent.weapon_pull_minimum
        {
            break;
        }
        if weapon_limit > 0 && counters.weapon_batches >= weapon_limit {
            debug!("weapon limit {} reached before goal", weapon_limit);
            return Ok(counters.outcome(
                &character,
                weapon.quota,
                weapon.supply_containers,
                weapon_pool,
                Some(FailureCause::WeaponLimitBeforeGoal),
            ));
        }

        while weapon.quota < batch_cost {
            if !intent.borrow_from_character_pool {
                let needed = batch_cost - weapon.quota;
                weapon.quota += needed;
                counters.purchased += needed;
                break;
            }
            if character_limit > 0 && counters.character_pulls() >= character_limit {
                debug!("character limit {} reached while topping up quota", character_limit);
                return Ok(counters.outcome(
                    &character,
                    weapon.quota,
                    weapon.supply_containers,
                    weapon_pool,
                    Some(FailureCause::CharacterLimitDuringQuotaTopup),
                ));
            }

            character.quota = weapon.quota;
            character_step(
                character_pool,
                &mut character,
                &mut character_progress,
                &mut counters,
                false,
                rng,
            );
            weapon.quota = character.quota;
        }

        if weapon.quota < batch_cost {
            debug!("quota {} short of batch cost {}", weapon.quota, batch_cost);
            return Ok(counters.outcome(
                &character,
                weapon.quota,
                weapon.supply_containers,
                weapon_pool,
                Some(FailureCause::QuotaExhausted),
            ));
        }

        let prizes = weapon::draw_ten_batch(weapon_pool, &mut weapon, rng);
        record_prizes(&mut weapon_progress, &prizes);
        counters.weapon_batches += 1;
    }

    Ok(counters.outcome(
        &character,
        weapon.quota,
        weapon.supply_containers,
        weapon_pool,
        None,
    ))
}

/// Run multiple trials in parallel, seeding trial `i` with `base_seed + i`
pub fn run_simulations_parallel(
    scenario: &SimulationConfig,
    count: usize,
    base_seed: u64,
) -> Result<Vec<OutcomeRecord>, ConfigError> {
    validate_trial_inputs(&scenario.character_pool, &scenario.weapon_pool, &scenario.player)?;
    (0..count)
        .into_par_iter()
        .with_min_len(64)
        .map(|i| {
            let mut rng = FastRng::new(base_seed.wrapping_add(i as u64));
            simulate_unchecked(
                &scenario.character_pool,
                &scenario.weapon_pool,
                &scenario.player,
                &mut rng,
            )
        })
        .collect()
}

/// Run multiple trials sequentially on one random stream
pub fn run_simulations_sequential(
    scenario: &SimulationConfig,
    count: usize,
    seed: u64,
) -> Result<Vec<OutcomeRecord>, ConfigError> {
    validate_trial_inputs(&scenario.character_pool, &scenario.weapon_pool, &scenario.player)?;
    let mut rng = FastRng::new(seed);
    (0..count)
        .map(|_| {
            simulate_unchecked(
                &scenario.character_pool,
                &scenario.weapon_pool,
                &scenario.player,
                &mut rng,
            )
        })
        .collect()
}

/// Validate the trial count, then run `count` trials. A random seed is picked when none is given.
pub fn run_trials(
    scenario: &SimulationConfig,
    count: usize,
    parallel: bool,
    seed: Option<u64>,
) -> Result<Vec<OutcomeRecord>, ConfigError> {
    validate_trial_count(count)?;

    let seed = seed.unwrap_or_else(fresh_seed);
    info!(
        "running {} trials ({}, seed {})",
        count,
        if parallel { "parallel" } else { "sequential" },
        seed
    );
    if parallel {
        run_simulations_parallel(scenario, count, seed)
    } else {
        run_simulations_sequential(scenario, count, seed)
    }
}

/// Run trials and return aggregated stats
pub fn run_and_aggregate(
    scenario: &SimulationConfig,
    count: usize,
    parallel: bool,
    seed: Option<u64>,
) -> Result<AggregatedStats, ConfigError> {
    let results = run_trials(scenario, count, parallel, seed)?;
    Ok(AggregatedStats::from_results(&results))
}


#[cfg(test)]
mod tests {
    use super::test_support::FixedRoll;
    use super::*;

    const MISS: f64 = 0.999;

    fn goals(name: &str, count: u32) -> Goals {
        let mut goals = HashMap::new();
        goals.insert(name.to_string(), count);
        goals
    }

    #[test]
    fn test_goals_achieved_requires_every_entry() {
        let mut progress = HashMap::new();
        let mut wanted = goals("a", 2);
        wanted.insert("b".to_string(), 1);
        assert!(!goals_achieved(&progress, &wanted));
        record_prizes(&mut progress, &["a".to_string(), "a".to_string()]);
        assert!(!goals_achieved(&progress, &wanted));
        record_prizes(&mut progress, &["b".to_string()]);
        assert!(goals_achieved(&progress, &wanted));
        assert!(goals_achieved(&progress, &Goals::new()));
    }

    #[test]
    fn test_character_limit_before_goal() {
        let intent = PlayerIntent {
            character_pull_limit: 5,
            ..Default::default()
        };
        let outcome = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            &mut FixedRoll(MISS),
        )
        .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.failure_cause, Some(FailureCause::CharacterLimitBeforeGoal));
        assert_eq!(outcome.character_paid_pulls, 5);
        assert_eq!(outcome.weapon_quota_consumed, 0);
        assert_eq!(outcome.supply_containers, 0);
        assert_eq!(outcome.quota_remaining, 5 * 200);
    }

    #[test]
    fn test_missing_everything_still_succeeds_through_pity() {
        let character_pool = CharacterPoolConfig::default();
        let weapon_pool = WeaponPoolConfig::default();
        let intent = PlayerIntent::default();
        let outcome =
            simulate_with_rng(&character_pool, &weapon_pool, &intent, &mut FixedRoll(MISS)).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.failure_cause, None);
        // hard pity at 120; the urgent voucher at 30 runs 10 frozen draws
        assert_eq!(outcome.character_pulls_excluding_urgent, 120);
        assert_eq!(outcome.character_urgent_pulls, 10);
        assert_eq!(outcome.character_pulls_total, 130);
        // weapon limited guarantee at batch 8
        assert_eq!(outcome.weapon_batches, 8);
        assert_eq!(outcome.weapon_pulls, 80);
        assert_eq!(
            outcome.quota_remaining,
            outcome.quota_earned + outcome.quota_purchased - outcome.weapon_quota_consumed
        );
    }

    #[test]
    fn test_urgent_draws_do_not_count_toward_limit() {
        let intent = PlayerIntent {
            character_pull_limit: 40,
            ..Default::default()
        };
        let outcome = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            &mut FixedRoll(MISS),
        )
        .unwrap();
        assert_eq!(outcome.failure_cause, Some(FailureCause::CharacterLimitBeforeGoal));
        assert_eq!(outcome.character_pulls_excluding_urgent, 40);
        assert_eq!(outcome.character_urgent_pulls, 10);
    }

    #[test]
    fn test_free_vouchers_are_spent_first() {
        let intent = PlayerIntent {
            free_ten_pulls: 2,
            character_pull_limit: 25,
            ..Default::default()
        };
        let outcome = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            &mut FixedRoll(MISS),
        )
        .unwrap();
        assert_eq!(outcome.character_free_pulls, 20);
        assert_eq!(outcome.character_paid_pulls, 5);
    }

    #[test]
    fn test_always_ten_pays_in_batches() {
        let intent = PlayerIntent {
            character_always_pull_ten: true,
            character_pull_limit: 25,
            ..Default::default()
        };
        let outcome = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            &mut FixedRoll(MISS),
        )
        .unwrap();
        assert_eq!(outcome.character_paid_pulls, 30);
        assert_eq!(outcome.character_pulls_excluding_urgent, 30);
    }

    #[test]
    fn test_weapon_limit_before_goal() {
        let intent = PlayerIntent {
            weapon_pull_limit: 3,
            initial_weapon_quota: 100_000,
            ..Default::default()
        };
        let outcome = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            &mut FixedRoll(MISS),
        )
        .unwrap();
        assert_eq!(outcome.failure_cause, Some(FailureCause::WeaponLimitBeforeGoal));
        assert_eq!(outcome.weapon_batches, 3);
        assert_eq!(outcome.weapon_quota_consumed, 3 * 1980);
    }

    #[test]
    fn test_character_limit_during_top_up() {
        // empty character goal, so the ceiling only bites while borrowing quota
        let intent = PlayerIntent {
            character_goals: Goals::new(),
            character_pull_limit: 3,
            ..Default::default()
        };
        let outcome = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            &mut FixedRoll(MISS),
        )
        .unwrap();
        assert_eq!(
            outcome.failure_cause,
            Some(FailureCause::CharacterLimitDuringQuotaTopup)
        );
        assert_eq!(outcome.character_paid_pulls, 3);
        assert_eq!(outcome.weapon_batches, 0);
    }

    #[test]
    fn test_purchase_instead_of_borrowing() {
        let intent = PlayerIntent {
            character_goals: Goals::new(),
            borrow_from_character_pool: false,
            ..Default::default()
        };
        let outcome = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            &mut FixedRoll(MISS),
        )
        .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.character_pulls_total, 0);
        assert_eq!(outcome.weapon_batches, 8);
        assert_eq!(outcome.quota_purchased, 8 * 1980);
        assert_eq!(outcome.quota_remaining, 0);
    }

    #[test]
    fn test_weapon_minimum_keeps_drawing() {
        let intent = PlayerIntent {
            character_goals: Goals::new(),
            borrow_from_character_pool: false,
            weapon_pull_minimum: 12,
            ..Default::default()
        };
        let outcome = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            &mut FixedRoll(MISS),
        )
        .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.weapon_batches, 12);
        assert_eq!(outcome.supply_containers, 1);
    }

    #[test]
    fn test_inconsistent_starting_pity_is_an_error() {
        let intent = PlayerIntent {
            guaranteed_six_star_within: 95,
            ..Default::default()
        };
        let result = simulate_with_seed(
            &CharacterPoolConfig::default(),
            &WeaponPoolConfig::default(),
            &intent,
            1,
        );
        assert!(matches!(result, Err(ConfigError::NegativeStartingPity { .. })));
    }

    #[test]
    fn test_single_trial_validates_pools() {
        let character_pool = CharacterPoolConfig {
            loop_pity: 0,
            ..Default::default()
        };
        let result = simulate_with_seed(
            &character_pool,
            &WeaponPoolConfig::default(),
            &PlayerIntent::default(),
            1,
        );
        assert!(matches!(result, Err(ConfigError::PityOrder { loop_pity: 0, .. })));

        let scenario = SimulationConfig {
            character_pool,
            ..Default::default()
        };
        assert!(run_simulations_parallel(&scenario, 4, 1).is_err());
        assert!(run_simulations_sequential(&scenario, 4, 1).is_err());
    }

    #[test]
    fn test_single_trial_rejects_unreachable_weapon_goal() {
        let weapon_pool = WeaponPoolConfig {
            five_star_probability: 1.0,
            base_six_probability: 0.0,
            ..Default::default()
        };
        let mut intent = PlayerIntent::default();
        intent.weapon_goals.insert("Standard Weapon 1".to_string(), 2);
        let result = simulate_with_rng(
            &CharacterPoolConfig::default(),
            &weapon_pool,
            &intent,
            &mut FixedRoll(MISS),
        );
        assert!(matches!(result, Err(ConfigError::UnreachableGoal { .. })));
    }

    #[test]
    fn test_run_trials_rejects_zero_count() {
        let scenario = SimulationConfig::default();
        assert_eq!(
            run_trials(&scenario, 0, false, Some(1)),
            Err(ConfigError::InvalidTrialCount(0))
        );
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let scenario = SimulationConfig::default();
        let a = run_trials(&scenario, 50, false, Some(99)).unwrap();
        let b = run_trials(&scenario, 50, false, Some(99)).unwrap();
        assert_eq!(a, b);
        let c = run_trials(&scenario, 50, true, Some(99)).unwrap();
        let d = run_trials(&scenario, 50, true, Some(99)).unwrap();
        assert_eq!(c, d);
    }
}
