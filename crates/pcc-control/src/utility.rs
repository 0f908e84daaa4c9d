//! PCC utility function.
//!
//! Maps the throughput and loss rate measured over one monitoring interval to
//! a single score. The sender is "happier" with more throughput, up to the
//! point where loss crosses [`LOSS_THRESHOLD`]; past it the steep sigmoid
//! discounts nearly all of the throughput and the loss penalty dominates.

/// Steepness of the loss sigmoid.
pub const ALPHA: f64 = 100.0;

/// Loss rate around which the sigmoid flips from reward to penalty (5%).
pub const LOSS_THRESHOLD: f64 = 0.05;

/// Compute the utility of an interval.
///
/// `utility = T·(1−L)·sigmoid(L − LOSS_THRESHOLD) − T·L`
///
/// Defined for any finite `loss`, including values outside `[0, 1]`.
pub fn utility(throughput: f64, loss: f64) -> f64 {
    throughput * (1.0 - loss) * sigmoid(loss - LOSS_THRESHOLD) - throughput * loss
}

/// Logistic function `1 / (1 + e^(ALPHA·x))`, decreasing in `x`.
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (ALPHA * x).exp())
}
