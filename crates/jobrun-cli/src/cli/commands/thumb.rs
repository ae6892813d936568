use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::time::Duration;

use jobrun_core::config::JobrunConfig;
use jobrun_core::fetch::{FetchHelper, ThumbnailArg};
use jobrun_core::owner::Owner;

pub fn run(cfg: &JobrunConfig, url: String, out: &Path) -> Result<()> {
    let owner = Owner::spawn("jobrun-cli");
    let helper = FetchHelper::open(owner.handle(), cfg);

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    helper.set_thumbnail_done_receiver(move |arg, result| {
        let _ = tx.lock().unwrap().send((arg, result));
    });
    helper.load_thumbnail_async(ThumbnailArg { tag: 0, url });

    let (_arg, result) = rx
        .recv_timeout(Duration::from_secs(cfg.request_timeout_secs + 5))
        .context("thumbnail fetch timed out")?;
    let bytes = result.context("thumbnail fetch failed")?;

    fs::write(out, &bytes).with_context(|| format!("write {}", out.display()))?;
    println!("wrote {} bytes to {}", bytes.len(), out.display());
    Ok(())
}
