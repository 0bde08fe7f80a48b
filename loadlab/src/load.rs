//! Synthetic CPU load.
//!
//! A request asks for `factor` units of work; one unit is [`ITERATIONS_PER_FACTOR`] counter
//! increments performed synchronously. Nothing else happens: no allocation, no I/O, no sleeping.
//!
//! Where the loop runs is decided by [`LoadExecution`]. `Isolated` moves it to tokio's blocking
//! pool so the accept path and other handlers keep running; `Inline` runs it on the request task
//! and holds that runtime worker until the count completes, the way a single-threaded server
//! would stall.
//!
//! The factor has no upper bound unless `load.max_factor` is configured. A caller can therefore
//! request arbitrarily long busy loops; with `Inline` execution that also stalls unrelated requests.

use std::hint::black_box;
use std::time::{Duration, Instant};

use crate::config::{LoadConfig, LoadExecution};
use crate::errors::{Error, Result};

/// Counter increments performed per unit of factor
pub const ITERATIONS_PER_FACTOR: u64 = 10_000_000;

/// Factor used when the caller supplies nothing usable
pub const DEFAULT_FACTOR: u64 = 10;

/// Caller-supplied multiplier for the amount of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadFactor(u64);

impl LoadFactor {
    pub fn new(factor: u64) -> Option<Self> {
        (factor > 0).then_some(Self(factor))
    }

    /// Lenient parse of a raw path segment.
    ///
    /// Leading whitespace and a sign are accepted, then the leading run of digits is used
    /// (`"3abc"` is 3). Anything that yields no positive integer (missing, empty, non-numeric,
    /// zero, negative) becomes [`DEFAULT_FACTOR`]. Values too large for `u64` saturate.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse_leading).unwrap_or_default()
    }

    fn parse_leading(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_start();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
        let digits = &digits[..end];
        if digits.is_empty() || negative {
            return None;
        }

        let value = digits
            .bytes()
            .try_fold(0u64, |acc, d| acc.checked_mul(10)?.checked_add(u64::from(d - b'0')))
            .unwrap_or(u64::MAX);
        Self::new(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Total counter increments this factor asks for.
    ///
    /// Saturates at `u64::MAX` for factors above `u64::MAX / ITERATIONS_PER_FACTOR`, so for those
    /// the count is below `factor × ITERATIONS_PER_FACTOR`. Such a loop would not finish anyway.
    pub fn iterations(self) -> u64 {
        self.0.saturating_mul(ITERATIONS_PER_FACTOR)
    }
}

impl Default for LoadFactor {
    fn default() -> Self {
        Self(DEFAULT_FACTOR)
    }
}

/// Outcome of one busy loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub factor: LoadFactor,
    pub iterations: u64,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn message(&self) -> String {
        format!("CPU load generated for {} factor.", self.factor.get())
    }
}

/// Count to `factor × ITERATIONS_PER_FACTOR` on the calling thread.
///
/// Returns the number of increments performed. `black_box` keeps the compiler from folding the
/// loop into a constant.
pub fn burn(factor: LoadFactor) -> u64 {
    let target = factor.iterations();
    let mut counter: u64 = 0;
    while black_box(counter) < target {
        counter = black_box(counter + 1);
    }
    counter
}

/// Runs busy loops according to the configured execution mode and ceiling
#[derive(Debug, Clone)]
pub struct LoadGenerator {
    execution: LoadExecution,
    max_factor: Option<u64>,
}

impl LoadGenerator {
    pub fn new(config: &LoadConfig) -> Self {
        Self {
            execution: config.execution,
            max_factor: config.max_factor,
        }
    }

    /// Perform the work for `factor` and report how much was done.
    pub async fn generate(&self, factor: LoadFactor) -> Result<LoadReport> {
        if let Some(max) = self.max_factor
            && factor.get() > max
        {
            return Err(Error::BadRequest {
                message: format!("Load factor {} exceeds the configured maximum of {max}", factor.get()),
            });
        }

        tracing::info!(factor = factor.get(), execution = ?self.execution, "Generating CPU load");

        let start = Instant::now();
        let iterations = match self.execution {
            LoadExecution::Inline => burn(factor),
            LoadExecution::Isolated => tokio::task::spawn_blocking(move || burn(factor))
                .await
                .map_err(|e| Error::Internal {
                    operation: format!("run CPU load worker: {e}"),
                })?,
        };

        let report = LoadReport {
            factor,
            iterations,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            factor = factor.get(),
            iterations,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "CPU load finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        assert_eq!(LoadFactor::parse(None).get(), 10);
        assert_eq!(LoadFactor::parse(Some("")).get(), 10);
        assert_eq!(LoadFactor::parse(Some("abc")).get(), 10);
        assert_eq!(LoadFactor::parse(Some("0")).get(), 10);
        assert_eq!(LoadFactor::parse(Some("-4")).get(), 10);
        assert_eq!(LoadFactor::parse(Some("-")).get(), 10);
    }

    #[test]
    fn test_parse_leading_digits() {
        assert_eq!(LoadFactor::parse(Some("3")).get(), 3);
        assert_eq!(LoadFactor::parse(Some("3abc")).get(), 3);
        assert_eq!(LoadFactor::parse(Some(" +7")).get(), 7);
        assert_eq!(LoadFactor::parse(Some("2.9")).get(), 2);
        assert_eq!(LoadFactor::parse(Some("007")).get(), 7);
    }

    #[test]
    fn test_parse_saturates_huge_values() {
        assert_eq!(LoadFactor::parse(Some("99999999999999999999999")).get(), u64::MAX);
        assert_eq!(LoadFactor::parse(Some("99999999999999999999999")).iterations(), u64::MAX);
    }

    #[test]
    fn test_burn_counts_exactly() {
        let factor = LoadFactor::new(1).unwrap();
        assert_eq!(burn(factor), ITERATIONS_PER_FACTOR);

        let factor = LoadFactor::new(3).unwrap();
        assert_eq!(burn(factor), 30_000_000);
    }

    #[test]
    fn test_message() {
        let report = LoadReport {
            factor: LoadFactor::new(3).unwrap(),
            iterations: 30_000_000,
            elapsed: Duration::ZERO,
        };
        assert_eq!(report.message(), "CPU load generated for 3 factor.");
    }

    #[tokio::test]
    async fn test_inline_and_isolated_do_the_same_work() {
        let factor = LoadFactor::new(2).unwrap();

        for execution in [LoadExecution::Inline, LoadExecution::Isolated] {
            let generator = LoadGenerator::new(&LoadConfig {
                execution,
                max_factor: None,
            });
            let report = generator.generate(factor).await.unwrap();
            assert_eq!(report.iterations, 20_000_000);
            assert_eq!(report.factor, factor);
        }
    }

    #[tokio::test]
    async fn test_max_factor_rejects_not_clamps() {
        let generator = LoadGenerator::new(&LoadConfig {
            execution: LoadExecution::Inline,
            max_factor: Some(2),
        });

        let err = generator.generate(LoadFactor::new(3).unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert!(err.to_string().contains("maximum of 2"));

        let report = generator.generate(LoadFactor::new(2).unwrap()).await.unwrap();
        assert_eq!(report.iterations, 20_000_000);
    }

    /// Spawn a load on a single-threaded runtime, give it the thread, then report whether it had
    /// already completed by the time this task got control back.
    async fn finished_before_timer(execution: LoadExecution, factor: u64) -> (bool, LoadReport) {
        let generator = LoadGenerator::new(&LoadConfig {
            execution,
            max_factor: None,
        });
        let load = tokio::spawn(async move { generator.generate(LoadFactor::new(factor).unwrap()).await });

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        let finished = load.is_finished();

        (finished, load.await.unwrap().unwrap())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_isolated_load_leaves_runtime_responsive() {
        let (finished, report) = finished_before_timer(LoadExecution::Isolated, 30).await;

        // The timer fired while the loop was still counting on the blocking pool
        assert!(!finished);
        assert_eq!(report.iterations, 300_000_000);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_inline_load_holds_the_runtime() {
        let (finished, report) = finished_before_timer(LoadExecution::Inline, 2).await;

        // The only runtime thread was busy counting, so the timer could not fire before the end
        assert!(finished);
        assert_eq!(report.iterations, 20_000_000);
    }
}
