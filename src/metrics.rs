//! Metrics describing a feature conversion run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Summary captured after a conversion completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionMetrics {
    /// Number of feature records produced.
    pub records: usize,
    /// Size of the worker pool used for the run.
    pub workers: usize,
    /// Wall-clock duration of the conversion.
    pub elapsed: Duration,
    /// Resident set size sample captured from `/proc/self/status` on Linux.
    pub rss_kb: Option<usize>,
}

impl ConversionMetrics {
    /// Records converted per second, or zero for an instantaneous run.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for ConversionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records with {} workers in {:.2?} ({:.1} records/s)",
            self.records,
            self.workers,
            self.elapsed,
            self.throughput()
        )?;
        if let Some(rss) = self.rss_kb {
            write!(f, ", rss {rss} KiB")?;
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn current_rss_kb() -> Option<usize> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let file = File::open("/proc/self/status").ok()?;
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let value = rest
                .split_whitespace()
                .find_map(|part| part.parse::<usize>().ok());
            return value;
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn current_rss_kb() -> Option<usize> {
    None
}

/// Samples the current resident set size (RSS) on supported platforms.
pub fn sample_rss_kb() -> Option<usize> {
    current_rss_kb()
}
