//! # Top-N selection of pose estimates

use std::cmp::Reverse;

use derive_more::Display;
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::data::{EstId, PoseEstimate};
use crate::error::EvalError;

/// How many estimates per (image, object) pair are evaluated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum NTop {
    /// Every estimate
    #[display(fmt = "0")]
    All,
    /// As many as there are ground-truth poses of the object in the image
    #[display(fmt = "-1")]
    GtCount,
    /// At most this many
    #[display(fmt = "{}", _0)]
    Top(usize),
}

impl TryFrom<i64> for NTop {
    type Error = EvalError;

    fn try_from(n_top: i64) -> Result<Self, Self::Error> {
        match n_top {
            0 => Ok(NTop::All),
            -1 => Ok(NTop::GtCount),
            n if n > 0 => Ok(NTop::Top(n as usize)),
            n => Err(EvalError::InvalidNTop(n)),
        }
    }
}

/// NaN scores rank below every real score
#[inline]
fn score_key(score: f64) -> Reverse<OrderedFloat<f64>> {
    Reverse(OrderedFloat(if score.is_nan() { f64::NEG_INFINITY } else { score }))
}

/// Picks the estimates to evaluate, best score first
///
/// Each estimate keeps its position in `ests` so reports refer to the source file,
/// not to the rank. Equal scores keep their file order.
pub fn select_estimates(
    ests: &[PoseEstimate],
    n_top: NTop,
    n_gt: usize,
) -> Vec<(EstId, &PoseEstimate)> {
    let limit = match n_top {
        NTop::All => ests.len(),
        NTop::GtCount => n_gt,
        NTop::Top(n) => n,
    };

    ests.iter()
        .enumerate()
        .sorted_by_key(|(_, est)| score_key(est.score))
        .take(limit)
        .collect()
}
