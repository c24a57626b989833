//! Scale scorer and selector.
//!
//! score = 0.3·quality − 50·[splitting] − 5·violations + 30·[success]
//!         − 0.1·max(0, render_ms − 100) + strategy bonus
//!
//! Strategy bonus: conservative +20 when the candidate does not split text,
//! quality +0.2·quality, balanced none.

use serde::{Deserialize, Serialize};

use crate::fitting::search::ScaleTestResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleStrategy {
    #[default]
    Conservative,
    Balanced,
    Quality,
}

pub fn score_result(result: &ScaleTestResult, strategy: ScaleStrategy) -> f32 {
    let mut score = result.quality * 0.3;
    if result.has_text_splitting {
        score -= 50.0;
    }
    score -= result.page_break_violations as f32 * 5.0;
    if result.success {
        score += 30.0;
    }
    score -= (result.render_time_ms - 100.0).max(0.0) * 0.1;

    match strategy {
        ScaleStrategy::Conservative if !result.has_text_splitting => score + 20.0,
        ScaleStrategy::Quality => score + result.quality * 0.2,
        _ => score,
    }
}

/// Highest-scoring result; ties keep the earliest. `None` only for an empty slice.
pub fn select_best(results: &[ScaleTestResult], strategy: ScaleStrategy) -> Option<&ScaleTestResult> {
    let mut best: Option<(&ScaleTestResult, f32)> = None;
    for result in results {
        let score = score_result(result, strategy);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((result, score)),
        }
    }
    best.map(|(result, _)| result)
}
