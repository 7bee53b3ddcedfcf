//! Character pool engine - single draws, ten-draw batches, and the pity counters they drive

use crate::config::{
    pick_prize, CharacterPoolConfig, ConfigError, PlayerIntent, Rarity, BATCH_SIZE,
    FORCED_FIVE_STAR_WINDOW,
};
use crate::simulation::RandomSource;
use log::trace;

/// Mutable character pool state for one trial
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterRuntimeState {
    /// Draws since the last six-star
    pub soft_pity: u32,
    /// Draws made in this pool, including those before the trial started
    pub total_pulls: u32,
    pub limited_obtained: bool,
    /// Weapon quota balance
    pub quota: u64,
    /// Quota awarded by draws during this trial
    pub quota_earned: u64,
    pub free_batches: u32,
    pub urgent_batches: u32,
    pub urgent_granted: bool,
    /// Draws left before a 5★-or-better is forced
    pub forced_five_star_in: u32,
}

impl CharacterRuntimeState {
    pub fn from_intent(intent: &PlayerIntent, pool: &CharacterPoolConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            soft_pity: intent.starting_soft_pity(pool)?,
            total_pulls: intent.character_pulls_used,
            limited_obtained: intent.character_limited_obtained,
            quota: intent.initial_weapon_quota,
            quota_earned: 0,
            free_batches: intent.free_ten_pulls,
            urgent_batches: intent.urgent_ten_pulls,
            urgent_granted: intent.character_pulls_used >= pool.urgent_recruitment_pity
                || intent.urgent_ten_pulls > 0,
            forced_five_star_in: intent.guaranteed_five_star_within,
        })
    }

    pub fn has_batch_voucher(&self) -> bool {
        self.free_batches > 0 || self.urgent_batches > 0
    }

    /// Grant the one-off urgent voucher once total draws cross the threshold
    pub fn grant_urgent_if_due(&mut self, pool: &CharacterPoolConfig) -> bool {
        if !self.urgent_granted && self.total_pulls >= pool.urgent_recruitment_pity {
            self.urgent_batches += 1;
            self.urgent_granted = true;
            trace!("urgent voucher granted at draw {}", self.total_pulls);
            return true;
        }
        false
    }

    fn award_quota(&mut self, pool: &CharacterPoolConfig, rarity: Rarity) {
        let amount = pool.quota_awards.for_rarity(rarity);
        self.quota += amount;
        self.quota_earned += amount;
    }

    fn reset_after_six_star(&mut self) {
        self.soft_pity = 0;
        self.forced_five_star_in = FORCED_FIVE_STAR_WINDOW;
    }
}

/// Roll a rarity: six-star with `six_star_probability`, otherwise 4★ vs 5★
/// by the relative weight of their configured rates.
fn roll_rarity<R: RandomSource>(pool: &CharacterPoolConfig, six_star_probability: f64, rng: &mut R) -> Rarity {
    if rng.f64() < six_star_probability {
        return Rarity::Six;
    }
    let lower = pool.four_star_probability + pool.five_star_probability;
    if lower <= 0.0 {
        return Rarity::Five;
    }
    if rng.f64() < pool.four_star_probability / lower {
        Rarity::Four
    } else {
        Rarity::Five
    }
}

/// One ordinary draw. Six-star prize names are appended to `obtained`.
pub fn draw_one<R: RandomSource>(
    pool: &CharacterPoolConfig,
    state: &mut CharacterRuntimeState,
    obtained: &mut Vec<String>,
    rng: &mut R,
) {
    state.soft_pity += 1;
    state.total_pulls += 1;
    state.forced_five_star_in = state.forced_five_star_in.saturating_sub(1);

    // Loop pity is a bonus on top of the normal resolution below and awards no quota
    if state.total_pulls >= pool.loop_pity && state.total_pulls % pool.loop_pity == 0 {
        trace!("loop pity at draw {}", state.total_pulls);
        obtained.push(pool.limited.clone());
        state.soft_pity = 0;
    }

    if !state.limited_obtained && state.total_pulls == pool.hard_pity {
        trace!("hard pity at draw {}", state.total_pulls);
        obtained.push(pool.limited.clone());
        state.award_quota(pool, Rarity::Six);
        state.limited_obtained = true;
        if pool.hard_pity_resets_soft_pity {
            state.soft_pity = 0;
        }
        state.forced_five_star_in = FORCED_FIVE_STAR_WINDOW;
    } else if state.soft_pity == pool.soft_pity {
        let prize = pick_prize(&pool.six_star_pool, rng.f64());
        trace!("soft pity at draw {}: {}", state.total_pulls, prize);
        if prize == pool.limited {
            state.limited_obtained = true;
        }
        obtained.push(prize.to_string());
        state.award_quota(pool, Rarity::Six);
        state.reset_after_six_star();
    } else {
        let probability = pool.six_star_probability_at(state.soft_pity);
        let mut rarity = roll_rarity(pool, probability, rng);
        if state.forced_five_star_in == 0 && rarity == Rarity::Four {
            rarity = Rarity::Five;
        }
        state.award_quota(pool, rarity);

        match rarity {
            Rarity::Four => {}
            Rarity::Five => state.forced_five_star_in = FORCED_FIVE_STAR_WINDOW,
            Rarity::Six => {
                let prize = pick_prize(&pool.six_star_pool, rng.f64());
                if prize == pool.limited {
                    state.limited_obtained = true;
                }
                obtained.push(prize.to_string());
                state.reset_after_six_star();
            }
        }
    }
}

/// Ten draws at once. An urgent voucher, when held, is spent first and its draws
/// use the base six-star rate with every pity counter frozen.
pub fn draw_ten_batch<R: RandomSource>(
    pool: &CharacterPoolConfig,
    state: &mut CharacterRuntimeState,
    rng: &mut R,
) -> Vec<String> {
    let mut obtained = Vec::new();
    let use_urgent = state.urgent_batches > 0;

    for _ in 0..BATCH_SIZE {
        if use_urgent {
            let rarity = roll_rarity(pool, pool.base_six_probability, rng);
            state.award_quota(pool, rarity);
            if rarity == Rarity::Six {
                obtained.push(pick_prize(&pool.six_star_pool, rng.f64()).to_string());
            }
        } else {
            draw_one(pool, state, &mut obtained, rng);
        }
    }

    if use_urgent {
        state.urgent_batches -= 1;
    } else if state.free_batches > 0 {
        state.free_batches -= 1;
    }
    obtained
}
