//! Deciding whether a successful cycle left backlog on either side.

/// Record counts of one successful exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeCounts {
    /// QSOs sent.
    pub qsos_sent: usize,
    /// Operations sent.
    pub operations_sent: usize,
    /// QSOs received.
    pub qsos_received: usize,
    /// Operations received.
    pub operations_received: usize,
}

/// Whether the local and remote backlogs were drained.
///
/// A batch that comes back short is taken as the last one. A batch that
/// is exactly full looks like more data is pending and costs one extra,
/// empty cycle; it never causes a missed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Everything dirty fit into this cycle.
    pub sent_all_updates: bool,
    /// The service has nothing newer to hand out.
    pub received_all_updates: bool,
}

impl Completion {
    /// Evaluates the counts against the batch limits.
    pub fn evaluate(counts: ExchangeCounts, batch_size: u32, operation_ratio: u32) -> Self {
        let qso_limit = batch_size as usize;
        let operation_limit = batch_size.saturating_mul(operation_ratio) as usize;

        Self {
            sent_all_updates: counts.qsos_sent < qso_limit
                && counts.operations_sent < operation_limit,
            received_all_updates: counts.operations_received < operation_limit
                && counts.qsos_received < qso_limit,
        }
    }

    /// Returns true when both sides are drained.
    pub fn is_complete(&self) -> bool {
        self.sent_all_updates && self.received_all_updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_batches_are_complete() {
        let completion = Completion::evaluate(
            ExchangeCounts {
                qsos_sent: 2,
                operations_sent: 1,
                qsos_received: 0,
                operations_received: 0,
            },
            5,
            5,
        );
        assert!(completion.is_complete());
    }

    #[test]
    fn full_qso_batch_is_not_complete() {
        let completion = Completion::evaluate(
            ExchangeCounts {
                qsos_sent: 5,
                ..ExchangeCounts::default()
            },
            5,
            5,
        );
        assert!(!completion.sent_all_updates);
        assert!(completion.received_all_updates);
        assert!(!completion.is_complete());
    }

    #[test]
    fn full_inbound_window_is_not_complete() {
        let completion = Completion::evaluate(
            ExchangeCounts {
                operations_received: 25,
                ..ExchangeCounts::default()
            },
            5,
            5,
        );
        assert!(completion.sent_all_updates);
        assert!(!completion.received_all_updates);

        let completion = Completion::evaluate(
            ExchangeCounts {
                qsos_received: 5,
                ..ExchangeCounts::default()
            },
            5,
            5,
        );
        assert!(!completion.received_all_updates);
    }
}
