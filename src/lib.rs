//! Monte Carlo simulator for a two-pool gacha: a character pool with pity rules
//! and a weapon pool paid for with quota earned in the character pool.

pub mod character;
pub mod config;
pub mod simulation;
pub mod stats;
pub mod weapon;

#[cfg(feature = "python")]
mod python;
