use anyhow::Result;
use callgate::{RateLimiter, TokioClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("callgate=debug".parse()?),
        )
        .init();

    // 3 requests per second shared by 10 concurrent tasks
    let fetch = Arc::new(
        RateLimiter::builder()
            .capacity(3)
            .period(Duration::from_secs(1))
            .clock(TokioClock::new())
            .build()?
            .guard(|| async { Instant::now() })
            .sleep_and_retry(),
    );

    let start = Instant::now();
    let mut handles = vec![];
    for task in 0..10 {
        let fetch = Arc::clone(&fetch);
        handles.push(tokio::spawn(async move {
            let ran_at = fetch.call_async().await;
            (task, ran_at)
        }));
    }

    for handle in handles {
        let (task, ran_at) = handle.await?;
        if let Some(ran_at) = ran_at {
            println!(
                "Task #{}: ran after {:.2}s",
                task,
                (ran_at - start).as_secs_f64()
            );
        }
    }

    Ok(())
}
