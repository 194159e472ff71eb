use std::collections::BTreeMap;

use log::{debug, info};
use percload_core::{Condition, ExperimentError, Trial};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::assets::AssetPool;
use crate::config::{ExperimentConfig, TargetBalance};
use crate::letters::LetterGenerator;

/// Seeded when a seed is given, otherwise from the OS.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Builds and shuffles the full trial list for a session.
///
/// Every `(load, category)` cell gets exactly `trials_per_cell` trials. Each
/// trial's background, search string and fixation jitter are resolved here,
/// so a fixed `rng_seed` reproduces the whole session.
pub fn generate_trial_list(
    config: &ExperimentConfig,
    pool: &AssetPool,
) -> Result<Vec<Trial>, ExperimentError> {
    let mut rng = seeded_rng(config.rng_seed);
    generate_trial_list_with(config, pool, &mut rng)
}

pub fn generate_trial_list_with<R: Rng + ?Sized>(
    config: &ExperimentConfig,
    pool: &AssetPool,
    rng: &mut R,
) -> Result<Vec<Trial>, ExperimentError> {
    config.validate()?;
    pool.validate(&config.background_categories)?;
    let letters = LetterGenerator::new(&config.filler_alphabet)?;
    let (fix_min, fix_max) = config.fixation_range_ms;

    let mut trials = Vec::with_capacity(config.total_trials());
    for condition in Condition::cartesian(&config.loads, &config.background_categories) {
        for target_present in target_schedule(&config.target_balance, config.trials_per_cell, rng)
        {
            let background_asset =
                pool.select(condition.category, &config.asset_selection, rng)?;
            let letter_string = letters.generate(condition.load, target_present, rng);
            let fixation_ms = rng.random_range(fix_min..=fix_max);
            trials.push(Trial {
                index: 0,
                load: condition.load,
                background_category: condition.category,
                background_asset,
                target_present,
                letter_string,
                fixation_ms,
            });
        }
    }

    trials.shuffle(rng);
    for (i, trial) in trials.iter_mut().enumerate() {
        trial.index = i + 1;
        debug!(
            "Trial {:>3}: {} {} '{}' on {}",
            trial.index,
            trial.load,
            trial.background_category,
            trial.letter_string,
            trial.background_asset
        );
    }
    info!(
        "Generated {} trials ({} cells x {})",
        trials.len(),
        config.loads.len() * config.background_categories.len(),
        config.trials_per_cell
    );

    Ok(trials)
}

/// Target presence for one cell, in presentation-independent order.
fn target_schedule<R: Rng + ?Sized>(
    balance: &TargetBalance,
    trials_per_cell: usize,
    rng: &mut R,
) -> Vec<bool> {
    match *balance {
        TargetBalance::Independent { p_present } => (0..trials_per_cell)
            .map(|_| rng.random_bool(p_present))
            .collect(),
        TargetBalance::PerCell { present } => {
            let mut cell: Vec<bool> = (0..trials_per_cell).map(|i| i < present).collect();
            cell.shuffle(rng);
            cell
        }
    }
}

pub fn count_by_condition(trials: &[Trial]) -> BTreeMap<Condition, usize> {
    let mut counts = BTreeMap::new();
    for trial in trials {
        *counts.entry(trial.condition()).or_insert(0) += 1;
    }
    counts
}
