use anyhow::Result;
use std::time::Duration;

use jobrun_core::bench;

pub fn run(jobs: usize, work_ms: u64) -> Result<()> {
    let results = bench::run_bench(jobs, Duration::from_millis(work_ms))?;

    println!("{:>6} {:>10} {:>10} {:>10}", "level", "elapsed", "jobs/s", "progress");
    for r in &results {
        println!(
            "{:>6} {:>9.2}s {:>10.1} {:>10.2}",
            r.max_concurrent, r.elapsed_secs, r.throughput_jobs_s, r.final_progress
        );
    }
    if let Some(level) = bench::recommend_concurrency(&results) {
        println!("recommended max_concurrent: {}", level);
    }
    Ok(())
}
