use anyhow::Result;
use callgate::RateLimiter;
use std::time::Duration;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("callgate=debug".parse()?),
        )
        .init();

    // Allow 5 calls every 2 seconds
    let capacity = 5;
    let period = Duration::from_secs(2);
    let limiter = RateLimiter::new(capacity, period);

    println!("Rate limit: {} calls per {:?}", capacity, period);
    println!();

    for i in 1..=8 {
        match limiter.call(|| i * i) {
            Ok(Some(square)) => {
                let snapshot = limiter.snapshot();
                println!(
                    "Call #{}: ✓ Allowed (result: {}, remaining: {})",
                    i, square, snapshot.remaining
                );
            }
            Ok(None) => println!("Call #{}: skipped", i),
            Err(err) => println!(
                "Call #{}: ✗ Denied (window resets in {:.1}s)",
                i,
                err.period_remaining_secs()
            ),
        }
    }

    println!();
    println!("Waiting out the rest of the calls...");

    let square = limiter.guard(|x: u64| x * x).sleep_and_retry();
    for i in 9..=12 {
        println!("Call #{}: ✓ {:?}", i, square.call_with(i));
    }

    Ok(())
}
