//! Streams a remote file through the cache, the way a proxied descriptor
//! would, and prints what was fetched.
//!
//! Run with:
//! ```bash
//! cargo run -p core-service --example stream_url -- https://media.example.com/track.mp3
//!
//! # Seek to 1 MiB first, with debug logs
//! cargo run -p core-service --example stream_url -- https://media.example.com/track.mp3 1048576 debug
//! ```

use anyhow::{bail, Context};
use bridge_traits::ProxyFileCallback;
use core_async::runtime::background_runtime;
use core_runtime::logging::{init_logging, redact_url, LogFormat, LogLevel, LoggingConfig};
use core_service::{bootstrap_desktop, FetchConfig};
use std::env;
use std::time::Instant;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some(url) = args.get(1) else {
        bail!("usage: stream_url <url> [seek-offset] [trace|debug|info]");
    };
    let seek: u64 = args
        .get(2)
        .map(|s| s.parse())
        .transpose()
        .context("seek offset must be a number")?
        .unwrap_or(0);
    let level = match args.get(3).map(String::as_str) {
        Some("trace") => LogLevel::Trace,
        Some("debug") => LogLevel::Debug,
        _ => LogLevel::Info,
    };

    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(level),
    )?;

    let runtime = background_runtime(2, "media-vfs")?;
    let _guard = runtime.enter();

    let vfs = bootstrap_desktop(FetchConfig::default())?;
    // Keys end up in logs, so keep tokens in the query out of them.
    let key = redact_url(url);
    let proxy = vfs.open_url(&key, url, &[])?;

    let started = Instant::now();
    let mut buf = vec![0u8; 64 * 1024];
    let mut offset = seek;
    let mut total = 0u64;
    loop {
        let read = proxy.read_at(offset, &mut buf);
        if read == 0 {
            break;
        }
        offset += read as u64;
        total += read as u64;
    }

    let stats = proxy.handle().stats();
    info!(
        bytes = total,
        size = proxy.on_get_size(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        launches = stats.fetch_launches,
        commits = stats.chunk_commits,
        retries = stats.retries,
        "Read complete"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    proxy.on_release();
    vfs.shutdown();
    Ok(())
}
