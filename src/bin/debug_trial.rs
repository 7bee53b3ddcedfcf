//! Debug script to print the derived runtime state and one seeded trial

use gacha_sim::character::CharacterRuntimeState;
use gacha_sim::config::SimulationConfig;
use gacha_sim::simulation::simulate_with_seed;
use gacha_sim::weapon::WeaponRuntimeState;
use std::env;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    let args: Vec<String> = env::args().collect();

    // debug-trial [config] [seed]
    let scenario = match args.get(1) {
        Some(path) => match SimulationConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };
    let seed = match args.get(2).map(|s| s.parse::<u64>()) {
        Some(Ok(seed)) => seed,
        Some(Err(e)) => {
            eprintln!("Invalid seed: {}", e);
            std::process::exit(1);
        }
        None => 42,
    };

    if let Err(e) = scenario.validate() {
        eprintln!("Invalid scenario: {}", e);
        std::process::exit(1);
    }

    let character = match CharacterRuntimeState::from_intent(&scenario.player, &scenario.character_pool) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Invalid player state: {}", e);
            std::process::exit(1);
        }
    };
    let weapon = WeaponRuntimeState::from_intent(&scenario.player);

    println!("\n=== CHARACTER POOL START ===");
    println!("  soft_pity:        {}", character.soft_pity);
    println!("  total_pulls:      {}", character.total_pulls);
    println!("  limited_obtained: {}", character.limited_obtained);
    println!("  quota:            {}", character.quota);
    println!("  free_batches:     {}", character.free_batches);
    println!("  urgent_batches:   {}", character.urgent_batches);
    println!("  urgent_granted:   {}", character.urgent_granted);
    println!("  forced 5★ in:     {}", character.forced_five_star_in);
    println!(
        "  6★ rate now:      {:.4}",
        scenario.character_pool.six_star_probability_at(character.soft_pity + 1)
    );

    println!("\n=== WEAPON POOL START ===");
    println!("  total_batches:     {}", weapon.total_batches);
    println!("  limited_obtained:  {}", weapon.limited_obtained);
    println!("  six_star_obtained: {}", weapon.six_star_obtained);

    println!("\n=== TRIAL (seed {}) ===", seed);
    match simulate_with_seed(&scenario.character_pool, &scenario.weapon_pool, &scenario.player, seed) {
        Ok(outcome) => match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing outcome: {}", e),
        },
        Err(e) => {
            eprintln!("Trial failed: {}", e);
            std::process::exit(1);
        }
    }
}
