//! Run summary printed by rank 0.
use std::fmt;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub max_flow: i32,
    pub partition_secs: f64,
    pub runtime_secs: f64,
}

impl JobReport {
    pub fn new(max_flow: i32, partition: Duration, runtime: Duration) -> Self {
        Self {
            max_flow,
            partition_secs: partition.as_secs_f64(),
            runtime_secs: runtime.as_secs_f64(),
        }
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Partition time: {}", self.partition_secs)?;
        writeln!(f)?;
        writeln!(f, "Max flow: {}", self.max_flow)?;
        write!(f, "Runtime: {}", self.runtime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_the_answer_line() {
        let report = JobReport {
            max_flow: 42,
            partition_secs: 0.25,
            runtime_secs: 1.5,
        };
        let text = report.to_string();
        assert!(text.contains("Max flow: 42"));
        assert!(text.starts_with("Partition time: 0.25"));
        assert!(text.ends_with("Runtime: 1.5"));
    }
}
