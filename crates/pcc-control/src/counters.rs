//! Per-interval transmit and loss accounting.

/// Operations sent and lost since the last interval boundary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IntervalCounters {
    tx_count: u64,
    loss_count: u64,
}

/// Counters captured at an interval boundary, with derived throughput and loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IntervalSample {
    pub(crate) tx_count: u64,
    pub(crate) loss_count: u64,
    /// Payload bytes per millisecond.
    pub(crate) throughput: f64,
    /// Lost / sent. Not capped at 1.0: loss reports may outnumber sends in a window.
    pub(crate) loss: f64,
}

impl IntervalCounters {
    pub(crate) fn record_tx(&mut self) {
        self.tx_count = self.tx_count.saturating_add(1);
    }

    pub(crate) fn record_loss(&mut self, count: u64) {
        self.loss_count = self.loss_count.saturating_add(count);
    }

    /// Snapshot the counters and reset them for the next interval.
    ///
    /// An interval with no transmissions is idle: throughput and loss are both 0.
    /// Without a known interval length throughput is reported as 0.
    pub(crate) fn take(&mut self, payload_size: usize, interval_millis: f64) -> IntervalSample {
        let IntervalCounters {
            tx_count,
            loss_count,
        } = std::mem::take(self);

        if tx_count == 0 {
            return IntervalSample {
                tx_count,
                loss_count,
                throughput: 0.0,
                loss: 0.0,
            };
        }

        let throughput = if interval_millis > 0.0 {
            tx_count as f64 * payload_size as f64 / interval_millis
        } else {
            0.0
        };
        let loss = loss_count as f64 / tx_count as f64;

        IntervalSample {
            tx_count,
            loss_count,
            throughput,
            loss,
        }
    }

    #[cfg(test)]
    pub(crate) fn tx_count(&self) -> u64 {
        self.tx_count
    }

    #[cfg(test)]
    pub(crate) fn loss_count(&self) -> u64 {
        self.loss_count
    }
}
