//! Realized and composite score rules
//!
//! Pure functions; the quantification engine loads the inputs and persists
//! the results.

use praise_common::db::Quantification;

/// Effective score of one quantification
///
/// - dismissed: 0
/// - duplicate: the same quantifier's raw score on the original times the
///   duplicate percentage, or 0 when that quantifier never scored the original
/// - otherwise: the raw score
pub fn realized_score(
    quantification: &Quantification,
    original_score: Option<i64>,
    duplicate_percentage: f64,
) -> f64 {
    if quantification.dismissed {
        0.0
    } else if quantification.duplicate_praise_id.is_some() {
        original_score
            .map(|score| score as f64 * duplicate_percentage)
            .unwrap_or(0.0)
    } else {
        quantification.score as f64
    }
}

/// Aggregate score of a praise item: mean realized score over completed
/// quantifications, rounded to two decimals (0 when none are completed)
pub fn composite_score(quantifications: &[Quantification]) -> f64 {
    let completed: Vec<f64> = quantifications
        .iter()
        .filter(|q| q.is_completed())
        .map(|q| q.score_realized)
        .collect();

    if completed.is_empty() {
        return 0.0;
    }

    round2(completed.iter().sum::<f64>() / completed.len() as f64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
