//! Run report accumulated across all delivery records

use std::fmt;

/// Per-run totals sent to the administrator once the CSV is processed.
///
/// Counters only ever grow, and `success + failed == total` holds after
/// every update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total: u32,
    pub success: u32,
    pub failed: u32,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one row whose notification was accepted
    pub fn record_success(&mut self) {
        self.total += 1;
        self.success += 1;
    }

    /// Count one row that was not (or could not be) notified
    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} success={} failed={}",
            self.total, self.success, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_stay_consistent() {
        let mut report = RunReport::new();
        report.record_success();
        report.record_failure();
        report.record_failure();

        assert_eq!(report.total, 3);
        assert_eq!(report.success, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.success + report.failed, report.total);
    }

    #[test]
    fn test_display() {
        let report = RunReport {
            total: 2,
            success: 1,
            failed: 1,
        };
        assert_eq!(report.to_string(), "total=2 success=1 failed=1");
    }
}
