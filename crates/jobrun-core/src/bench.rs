//! Benchmark mode: run a synthetic batch at several concurrency levels and
//! report elapsed time, throughput, and a recommended level.
//!
//! Each run uses a fresh owner context and runner so levels don't interfere.
//! The synthetic job sleeps in small slices and honours cancellation, which
//! also makes it a convenient smoke-load for the scheduler.

use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant};

use crate::job::{Job, JobContext};
use crate::owner::Owner;
use crate::runner::Runner;

/// Concurrency levels exercised by `run_bench`.
const BENCH_LEVELS: [usize; 4] = [1, 2, 4, 8];

/// Sliced sleep standing in for real work.
pub struct SyntheticJob {
    weight: f32,
    work: Duration,
}

impl SyntheticJob {
    pub fn new(weight: f32, work: Duration) -> Self {
        Self { weight, work }
    }
}

impl Job for SyntheticJob {
    type Output = Duration;

    fn do_job(&self, cx: &JobContext) -> Duration {
        let start = Instant::now();
        let slice = (self.work / 10).max(Duration::from_millis(1));
        let mut remaining = self.work;
        while remaining > Duration::ZERO {
            if cx.is_cancelled() {
                break;
            }
            let s = slice.min(remaining);
            thread::sleep(s);
            remaining -= s;
        }
        start.elapsed()
    }

    fn progress_weight(&self) -> f32 {
        self.weight
    }
}

/// Result of one bench run at a given concurrency level.
#[derive(Debug, Clone)]
pub struct BenchResult {
    pub max_concurrent: usize,
    pub jobs: usize,
    pub elapsed_secs: f64,
    pub throughput_jobs_s: f64,
    /// Aggregate progress at drain; ~1.0 when every job completed.
    pub final_progress: f32,
}

/// Runs `jobs` synthetic jobs of `work` duration each at every level in
/// [1, 2, 4, 8].
pub fn run_bench(jobs: usize, work: Duration) -> Result<Vec<BenchResult>> {
    anyhow::ensure!(jobs > 0, "job count must be positive");

    let mut results = Vec::with_capacity(BENCH_LEVELS.len());
    for &level in &BENCH_LEVELS {
        let owner = Owner::spawn("jobrun-bench");
        let runner = Runner::new(owner.handle(), level);
        let weight = 1.0 / jobs as f32;

        let start = Instant::now();
        for _ in 0..jobs {
            runner.submit(SyntheticJob::new(weight, work));
        }
        runner.wait_all_done();
        let elapsed = start.elapsed().as_secs_f64();

        tracing::debug!(level, elapsed, "bench run drained");
        results.push(BenchResult {
            max_concurrent: level,
            jobs,
            elapsed_secs: elapsed,
            throughput_jobs_s: if elapsed > 0.0 { jobs as f64 / elapsed } else { 0.0 },
            final_progress: runner.progress(),
        });
    }
    Ok(results)
}

/// Picks the smallest concurrency level within 10% of the best throughput;
/// more lanes than that buy nothing for this workload.
pub fn recommend_concurrency(results: &[BenchResult]) -> Option<usize> {
    let best = results
        .iter()
        .map(|r| r.throughput_jobs_s)
        .fold(f64::MIN, f64::max);
    results
        .iter()
        .find(|r| r.throughput_jobs_s >= best * 0.9)
        .map(|r| r.max_concurrent)
}
