//! Copies the same data with every strategy and compares the reports.
//!
//! Demonstrates that the engines agree on the output and differ only in how
//! much transfer memory they allocate.
//!
//! Run with:
//!     cargo run --example compare_strategies

use std::sync::Arc;

use pipecopy::{BufferPool, CopyConfig, CopyEngine, PooledQueueEngine, Strategy, copy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data: Vec<u8> = (0..8 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    println!("Copying {} bytes with each strategy...\n", data.len());

    for config in [CopyConfig::default(), CopyConfig::wide_segments()] {
        for strategy in Strategy::ALL {
            let mut out = Vec::with_capacity(data.len());
            let report = copy(strategy, &data[..], &mut out, &config).await?;
            assert_eq!(out, data);
            println!("{}", report);
        }
        println!();
    }

    // A pool outlives one session: the second run reuses every buffer
    let pool = Arc::new(BufferPool::new(
        CopyConfig::default().buffer_size(),
        CopyConfig::default().pool_retention(),
    ));
    let engine = PooledQueueEngine::with_pool(CopyConfig::default(), pool.clone());
    for run in 1..=2 {
        let mut out = Vec::with_capacity(data.len());
        let report = engine.copy(&data[..], &mut out).await?;
        println!(
            "pooled run {}: {} buffers allocated, {} reused so far",
            run,
            report.buffers_allocated,
            pool.stats().reused
        );
    }

    Ok(())
}
