use anyhow::{Context, Result};
use std::sync::{mpsc, Mutex};
use std::time::Duration;

use jobrun_core::config::JobrunConfig;
use jobrun_core::fetch::{FetchHelper, SearchArg};
use jobrun_core::owner::Owner;

pub fn run(cfg: &JobrunConfig, query: String, start: usize, max: usize) -> Result<()> {
    let owner = Owner::spawn("jobrun-cli");
    let helper = FetchHelper::open(owner.handle(), cfg);

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    helper.set_search_done_receiver(move |arg, result| {
        let _ = tx.lock().unwrap().send((arg, result));
    });
    helper.search_async(SearchArg {
        tag: 0,
        query,
        start: start.max(1),
        max: max.clamp(1, cfg.search_max_results),
    });

    let (_arg, result) = rx
        .recv_timeout(Duration::from_secs(cfg.request_timeout_secs + 5))
        .context("search timed out")?;
    let feed = result.context("search failed")?;

    println!("{} result(s)", feed.entries.len());
    for e in &feed.entries {
        match &e.author {
            Some(author) => println!("{}  {}  ({})", e.id, e.title, author),
            None => println!("{}  {}", e.id, e.title),
        }
    }
    Ok(())
}
