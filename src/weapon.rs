//! Weapon pool engine - batch-only draws paid for with weapon quota

use crate::config::{pick_prize, PlayerIntent, WeaponPoolConfig, BATCH_SIZE};
use crate::simulation::RandomSource;
use log::trace;

/// Batch that pays out the first supply container
pub const SUPPLY_CONTAINER_BATCH: u32 = 10;
/// Batch that pays out the first unconditional limited weapon
pub const FIRST_LIMITED_BONUS_BATCH: u32 = 18;
/// After the first limited bonus, container and limited alternate on this cycle
pub const BONUS_CYCLE: u32 = 8;
/// Batch by which the limited weapon is guaranteed
pub const LIMITED_GUARANTEE_BATCH: u32 = 8;
/// Batch by which some six-star weapon is guaranteed
pub const SIX_STAR_GUARANTEE_BATCH: u32 = 4;

/// Mutable weapon pool state for one trial
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeaponRuntimeState {
    /// Batches drawn in this pool, including those before the trial started
    pub total_batches: u32,
    pub limited_obtained: bool,
    pub six_star_obtained: bool,
    pub quota: u64,
    pub supply_containers: u32,
    // Window flags, only consulted when guarantees re-arm
    pub limited_in_cycle: bool,
    pub six_star_in_cycle: bool,
}

impl WeaponRuntimeState {
    pub fn from_intent(intent: &PlayerIntent) -> Self {
        Self {
            total_batches: intent.weapon_batches_used,
            limited_obtained: intent.weapon_limited_obtained,
            six_star_obtained: intent.weapon_six_star_obtained,
            quota: intent.initial_weapon_quota,
            supply_containers: 0,
            limited_in_cycle: intent.weapon_limited_obtained,
            six_star_in_cycle: intent.weapon_six_star_obtained,
        }
    }

    fn mark_limited(&mut self) {
        self.limited_obtained = true;
        self.limited_in_cycle = true;
    }

    fn mark_six_star(&mut self) {
        self.six_star_obtained = true;
        self.six_star_in_cycle = true;
    }
}

/// Extra payout attached to a batch position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchBonus {
    SupplyContainer,
    Limited,
}

/// Bonus for the given (1-based) batch number:
/// 10 -> container, 18 -> limited, then every 8 batches container and limited alternate.
pub fn batch_bonus(batch: u32) -> Option<BatchBonus> {
    match batch {
        SUPPLY_CONTAINER_BATCH => Some(BatchBonus::SupplyContainer),
        FIRST_LIMITED_BONUS_BATCH => Some(BatchBonus::Limited),
        b if b > FIRST_LIMITED_BONUS_BATCH && (b - FIRST_LIMITED_BONUS_BATCH) % BONUS_CYCLE == 0 => {
            let cycle = (b - FIRST_LIMITED_BONUS_BATCH) / BONUS_CYCLE;
            if cycle % 2 == 1 {
                Some(BatchBonus::SupplyContainer)
            } else {
                Some(BatchBonus::Limited)
            }
        }
        _ => None,
    }
}

/// Draw one ten-draw batch. Returns the six-star weapons obtained; an empty list
/// and no state change when quota is short of the batch cost.
pub fn draw_ten_batch<R: RandomSource>(
    pool: &WeaponPoolConfig,
    state: &mut WeaponRuntimeState,
    rng: &mut R,
) -> Vec<String> {
    if state.quota < pool.quota_cost_per_batch {
        return Vec::new();
    }

    state.quota -= pool.quota_cost_per_batch;
    state.total_batches += 1;
    let batch = state.total_batches;
    let mut obtained = Vec::new();

    match batch_bonus(batch) {
        Some(BatchBonus::SupplyContainer) => {
            trace!("supply container at batch {}", batch);
            state.supply_containers += 1;
        }
        Some(BatchBonus::Limited) => {
            trace!("bonus limited weapon at batch {}", batch);
            obtained.push(pool.limited.clone());
            state.mark_limited();
        }
        None => {}
    }

    for _ in 0..BATCH_SIZE {
        if rng.f64() < pool.base_six_probability {
            let weapon = pick_prize(&pool.six_star_pool, rng.f64());
            state.mark_six_star();
            if weapon == pool.limited {
                state.mark_limited();
            }
            obtained.push(weapon.to_string());
        }
    }

    apply_guarantees(pool, state, &mut obtained, rng);
    obtained
}

fn award_guaranteed_limited(pool: &WeaponPoolConfig, state: &mut WeaponRuntimeState, obtained: &mut Vec<String>) {
    trace!("limited weapon guarantee at batch {}", state.total_batches);
    obtained.push(pool.limited.clone());
    state.mark_limited();
    state.mark_six_star();
}

fn award_guaranteed_six_star<R: RandomSource>(
    pool: &WeaponPoolConfig,
    state: &mut WeaponRuntimeState,
    obtained: &mut Vec<String>,
    rng: &mut R,
) {
    let weapon = pick_prize(&pool.six_star_pool, rng.f64());
    trace!("six-star weapon guarantee at batch {}: {}", state.total_batches, weapon);
    state.mark_six_star();
    if weapon == pool.limited {
        state.mark_limited();
    }
    obtained.push(weapon.to_string());
}

// Limited guarantee takes priority over the six-star guarantee.
fn apply_guarantees<R: RandomSource>(
    pool: &WeaponPoolConfig,
    state: &mut WeaponRuntimeState,
    obtained: &mut Vec<String>,
    rng: &mut R,
) {
    let batch = state.total_batches;

    if !pool.guarantees_rearm {
        if batch == LIMITED_GUARANTEE_BATCH && !state.limited_obtained {
            award_guaranteed_limited(pool, state, obtained);
        } else if batch == SIX_STAR_GUARANTEE_BATCH && !state.six_star_obtained {
            award_guaranteed_six_star(pool, state, obtained, rng);
        }
        return;
    }

    let limited_window_ends = batch % LIMITED_GUARANTEE_BATCH == 0;
    let six_star_window_ends = batch % SIX_STAR_GUARANTEE_BATCH == 0;
    if limited_window_ends && !state.limited_in_cycle {
        award_guaranteed_limited(pool, state, obtained);
    } else if six_star_window_ends && !state.six_star_in_cycle {
        award_guaranteed_six_star(pool, state, obtained, rng);
    }
    if limited_window_ends {
        state.limited_in_cycle = false;
    }
    if six_star_window_ends {
        state.six_star_in_cycle = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::test_support::{FixedRoll, ScriptedRolls};

    // Misses every six-star roll; prize picks land on the last standard weapon
    const MISS: f64 = 0.999;

    fn funded(batches: u32, pool: &WeaponPoolConfig) -> WeaponRuntimeState {
        WeaponRuntimeState {
            quota: pool.quota_cost_per_batch * batches as u64,
            ..Default::default()
        }
    }

    #[test]
    fn test_insufficient_quota_draws_nothing() {
        let pool = WeaponPoolConfig::default();
        let mut state = WeaponRuntimeState {
            quota: pool.quota_cost_per_batch - 1,
            ..Default::default()
        };
        let before = state.clone();
        let prizes = draw_ten_batch(&pool, &mut state, &mut FixedRoll(0.0));
        assert!(prizes.is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_batch_deducts_cost() {
        let pool = WeaponPoolConfig::default();
        let mut state = WeaponRuntimeState {
            quota: 5000,
            ..Default::default()
        };
        draw_ten_batch(&pool, &mut state, &mut FixedRoll(MISS));
        assert_eq!(state.quota, 5000 - pool.quota_cost_per_batch);
        assert_eq!(state.total_batches, 1);
    }

    #[test]
    fn test_batch_bonus_schedule() {
        assert_eq!(batch_bonus(9), None);
        assert_eq!(batch_bonus(10), Some(BatchBonus::SupplyContainer));
        assert_eq!(batch_bonus(18), Some(BatchBonus::Limited));
        assert_eq!(batch_bonus(22), None);
        assert_eq!(batch_bonus(26), Some(BatchBonus::SupplyContainer));
        assert_eq!(batch_bonus(34), Some(BatchBonus::Limited));
        assert_eq!(batch_bonus(42), Some(BatchBonus::SupplyContainer));
        assert_eq!(batch_bonus(50), Some(BatchBonus::Limited));
        assert_eq!(batch_bonus(58), Some(BatchBonus::SupplyContainer));
    }

    #[test]
    fn test_position_bonuses_over_a_long_run() {
        let pool = WeaponPoolConfig::default();
        let mut state = funded(42, &pool);
        let mut rng = FixedRoll(MISS);
        let mut per_batch = Vec::new();
        let mut containers = Vec::new();
        for _ in 0..42 {
            let before = state.supply_containers;
            per_batch.push(draw_ten_batch(&pool, &mut state, &mut rng));
            containers.push(state.supply_containers - before);
        }

        let limited = |i: usize| per_batch[i - 1].iter().filter(|w| w.as_str() == "Limited Weapon").count();
        assert_eq!(containers[9], 1);
        assert_eq!(limited(18), 1);
        assert_eq!(containers[25], 1);
        assert_eq!(limited(26), 0);
        assert_eq!(limited(34), 1);
        assert_eq!(containers[33], 0);
        assert_eq!(containers[41], 1);
        assert_eq!(state.supply_containers, 3);
        assert_eq!(state.quota, 0);
    }

    #[test]
    fn test_guarantees_fire_when_every_roll_misses() {
        let pool = WeaponPoolConfig::default();
        let mut state = funded(8, &pool);
        let mut rng = FixedRoll(MISS);
        let mut per_batch = Vec::new();
        for _ in 0..8 {
            per_batch.push(draw_ten_batch(&pool, &mut state, &mut rng));
        }
        assert!(per_batch[..3].iter().all(|p| p.is_empty()));
        assert_eq!(per_batch[3], vec!["Standard Weapon 6".to_string()]);
        assert!(per_batch[4..7].iter().all(|p| p.is_empty()));
        assert_eq!(per_batch[7], vec!["Limited Weapon".to_string()]);
        assert!(state.six_star_obtained);
        assert!(state.limited_obtained);
    }

    #[test]
    fn test_limited_guarantee_skipped_when_owned() {
        let pool = WeaponPoolConfig::default();
        let mut state = WeaponRuntimeState {
            total_batches: 7,
            limited_obtained: true,
            six_star_obtained: true,
            quota: pool.quota_cost_per_batch,
            ..Default::default()
        };
        let prizes = draw_ten_batch(&pool, &mut state, &mut FixedRoll(MISS));
        assert!(prizes.is_empty());
    }

    #[test]
    fn test_guarantees_fire_once_by_default() {
        let pool = WeaponPoolConfig::default();
        let mut state = funded(16, &pool);
        let mut rng = FixedRoll(MISS);
        let mut six_stars = 0;
        for _ in 0..16 {
            six_stars += draw_ten_batch(&pool, &mut state, &mut rng).len();
        }
        // batch 4 and batch 8 only; batch 10 gives a container
        assert_eq!(six_stars, 2);
    }

    #[test]
    fn test_guarantees_rearm_each_window() {
        let pool = WeaponPoolConfig {
            guarantees_rearm: true,
            ..Default::default()
        };
        let mut state = funded(16, &pool);
        let mut rng = FixedRoll(MISS);
        let mut per_batch = Vec::new();
        for _ in 0..16 {
            per_batch.push(draw_ten_batch(&pool, &mut state, &mut rng));
        }
        assert_eq!(per_batch[3], vec!["Standard Weapon 6".to_string()]);
        assert_eq!(per_batch[7], vec!["Limited Weapon".to_string()]);
        assert_eq!(per_batch[11], vec!["Standard Weapon 6".to_string()]);
        assert_eq!(per_batch[15], vec!["Limited Weapon".to_string()]);
        assert!(!state.limited_in_cycle);
        assert!(!state.six_star_in_cycle);
    }

    #[test]
    fn test_natural_limited_marks_both_flags() {
        let pool = WeaponPoolConfig::default();
        let mut state = funded(1, &pool);
        // first draw hits six-star and picks the limited entry, the rest miss
        let mut rolls = vec![0.0, 0.1];
        rolls.extend(std::iter::repeat(MISS).take(9));
        let prizes = draw_ten_batch(&pool, &mut state, &mut ScriptedRolls::new(rolls));
        assert_eq!(prizes, vec!["Limited Weapon".to_string()]);
        assert!(state.limited_obtained);
        assert!(state.six_star_obtained);
    }

    #[test]
    fn test_from_intent_copies_history() {
        let intent = PlayerIntent {
            weapon_batches_used: 5,
            weapon_six_star_obtained: true,
            initial_weapon_quota: 3000,
            ..Default::default()
        };
        let state = WeaponRuntimeState::from_intent(&intent);
        assert_eq!(state.total_batches, 5);
        assert!(state.six_star_obtained);
        assert!(!state.limited_obtained);
        assert_eq!(state.quota, 3000);
    }
}
