use crate::history::History;

/// Aggregate statistics of a completed probe session.
///
/// All durations are expressed in seconds.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Statistics {
    pub average: f64,
    pub stddev: f64,
    pub loss: f64,
}

/// Compute session statistics from the history window.
///
/// Only positive samples contribute to the sums, but both the average and the
/// standard deviation are normalized by `received` rather than by the number
/// of positive samples. Loss is `1 - received / sent`.
///
/// Returns `None` if nothing was received.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute(history: &History, sent: usize, received: usize) -> Option<Statistics> {
    if received == 0 || sent == 0 {
        return None;
    }
    let received_f = received as f64;
    let average = history.positive().sum::<f64>() / received_f;
    let variance = history
        .positive()
        .map(|sample| (sample - average).powi(2))
        .sum::<f64>()
        / received_f;
    Some(Statistics {
        average,
        stddev: variance.sqrt(),
        loss: 1.0 - received_f / sent as f64,
    })
}
