use anyhow::Result;
use callgate::RateLimiter;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("callgate=info".parse()?),
        )
        .init();

    let warnings = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&warnings);

    // Warn once less than 30% of the quota is left
    let limiter = RateLimiter::builder()
        .capacity(10)
        .period(Duration::from_secs(60))
        .threshold(0.3)
        .on_threshold(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            tracing::warn!("API quota running low");
        })
        .raise_on_limit(false)
        .build()?;

    for i in 1..=12 {
        let outcome = limiter.call(|| format!("response {i}"))?;
        println!(
            "Call #{:>2}: {:<12} remaining {}",
            i,
            outcome.as_deref().unwrap_or("skipped"),
            limiter.snapshot().remaining
        );
    }

    println!();
    println!(
        "Threshold callback fired {} times",
        warnings.load(Ordering::SeqCst)
    );

    Ok(())
}
