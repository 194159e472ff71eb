use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use log::info;
use percload_core::{BackgroundCategory, Condition, ExperimentError, Load, TrialResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub load: Load,
    pub background_category: BackgroundCategory,
    pub trials: usize,
    pub correct: usize,
    pub timeouts: usize,
    pub accuracy: f64,
    pub mean_correct_rt_ms: Option<f64>,
}

/// Per-session descriptive statistics, written next to the CSV log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub participant: String,
    pub session: String,
    pub planned_trials: usize,
    pub completed_trials: usize,
    pub aborted: bool,
    pub timeouts: usize,
    pub accuracy: f64,
    pub mean_correct_rt_ms: Option<f64>,
    pub conditions: Vec<ConditionSummary>,
}

fn accuracy(correct: usize, trials: usize) -> f64 {
    if trials == 0 {
        0.0
    } else {
        correct as f64 / trials as f64
    }
}

fn mean_correct_rt<'a>(results: impl Iterator<Item = &'a TrialResult>) -> Option<f64> {
    let rts: Vec<f64> = results
        .filter(|r| r.correct)
        .filter_map(|r| r.reaction_time_ms)
        .collect();
    if rts.is_empty() {
        None
    } else {
        Some(rts.iter().sum::<f64>() / rts.len() as f64)
    }
}

impl SessionSummary {
    pub fn from_results(
        participant: &str,
        session: &str,
        planned_trials: usize,
        aborted: bool,
        results: &[TrialResult],
    ) -> Self {
        let mut cells: BTreeMap<Condition, Vec<&TrialResult>> = BTreeMap::new();
        for r in results {
            cells.entry(r.condition()).or_default().push(r);
        }

        let conditions = cells
            .into_iter()
            .map(|(condition, rs)| {
                let correct = rs.iter().filter(|r| r.correct).count();
                ConditionSummary {
                    load: condition.load,
                    background_category: condition.category,
                    trials: rs.len(),
                    correct,
                    timeouts: rs.iter().filter(|r| r.timed_out()).count(),
                    accuracy: accuracy(correct, rs.len()),
                    mean_correct_rt_ms: mean_correct_rt(rs.iter().copied()),
                }
            })
            .collect();

        let correct = results.iter().filter(|r| r.correct).count();
        Self {
            participant: participant.to_string(),
            session: session.to_string(),
            planned_trials,
            completed_trials: results.len(),
            aborted,
            timeouts: results.iter().filter(|r| r.timed_out()).count(),
            accuracy: accuracy(correct, results.len()),
            mean_correct_rt_ms: mean_correct_rt(results.iter()),
            conditions,
        }
    }

    pub fn log(&self) {
        info!(
            "Trials: {}/{}, accuracy {:.1}%, timeouts {}{}",
            self.completed_trials,
            self.planned_trials,
            self.accuracy * 100.0,
            self.timeouts,
            if self.aborted { " (aborted)" } else { "" }
        );
        for c in &self.conditions {
            info!(
                "  {:<4} {:<8} n={:<2} acc {:>5.1}%  mean RT {}",
                c.load.as_str(),
                c.background_category.as_str(),
                c.trials,
                c.accuracy * 100.0,
                c.mean_correct_rt_ms
                    .map(|rt| format!("{rt:.1} ms"))
                    .unwrap_or_else(|| "-".into())
            );
        }
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ExperimentError> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| ExperimentError::Log(e.to_string()))?;
        info!("Summary saved to {}", path.as_ref().display());
        Ok(())
    }
}
