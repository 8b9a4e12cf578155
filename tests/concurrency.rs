use callgate::{ManualClock, RateLimiter};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_threads_admit_exactly_capacity() {
    let clock = ManualClock::new();
    let limiter = Arc::new(
        RateLimiter::builder()
            .capacity(100)
            .period(Duration::from_secs(60))
            .clock(clock)
            .build()
            .unwrap(),
    );
    let ran = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let ran = Arc::clone(&ran);
            thread::spawn(move || {
                let mut admitted = 0u64;
                for _ in 0..50 {
                    if let Ok(Some(())) = limiter.call(|| {
                        ran.fetch_add(1, Ordering::SeqCst);
                    }) {
                        admitted += 1;
                    }
                }
                admitted
            })
        })
        .collect();

    let admitted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    // Should allow exactly the window capacity
    assert_eq!(admitted, 100);
    assert_eq!(ran.load(Ordering::SeqCst), 100);
    assert_eq!(limiter.snapshot().call_count, 400);
}

#[test]
fn test_threshold_fires_once_per_attempt_under_contention() {
    let fired = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&fired);
    let limiter = Arc::new(
        RateLimiter::builder()
            .capacity(10)
            .period(Duration::from_secs(60))
            .clock(ManualClock::new())
            .threshold(0.5)
            .on_threshold(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || {
                for _ in 0..10 {
                    let _ = limiter.attempt();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 40 attempts, remaining allowance is under 5 from the 6th attempt on
    assert_eq!(fired.load(Ordering::SeqCst), 35);
}

#[test]
fn test_threshold_callbacks_never_overlap() {
    let active = Arc::new(AtomicU64::new(0));
    let max_active = Arc::new(AtomicU64::new(0));
    let (now_active, peak) = (Arc::clone(&active), Arc::clone(&max_active));
    let limiter = Arc::new(
        RateLimiter::builder()
            .capacity(1)
            .period(Duration::from_secs(60))
            .clock(ManualClock::new())
            .threshold(0.5)
            .on_threshold(move || {
                let running = now_active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(running, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                now_active.fetch_sub(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || limiter.attempt())
        })
        .collect();
    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|admission| admission.is_permitted())
        .count();

    // Every attempt is under threshold, but the callbacks ran one at a time
    assert_eq!(admitted, 1);
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    assert_eq!(limiter.snapshot().call_count, 4);
}

#[test]
fn test_threshold_callbacks_follow_admission_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let limiter = Arc::new_cyclic(|weak: &Weak<RateLimiter>| {
        let weak = weak.clone();
        RateLimiter::builder()
            .capacity(100)
            .period(Duration::from_secs(60))
            .clock(ManualClock::new())
            .threshold(0.999)
            .on_threshold(move || {
                if let Some(limiter) = weak.upgrade() {
                    record.lock().push(limiter.snapshot().call_count);
                }
            })
            .build()
            .unwrap()
    });

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || {
                for _ in 0..25 {
                    let _ = limiter.attempt();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Each callback sees the count of its own attempt, never a later one
    let expected: Vec<u64> = (1..=200).collect();
    assert_eq!(*seen.lock(), expected);
}

#[test]
fn test_operation_may_reenter_its_limiter() {
    let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(60)));
    let inner = Arc::clone(&limiter);

    // The outer call holds no lock while running, so the nested attempt
    // is counted instead of deadlocking
    let nested = limiter.call(|| inner.call(|| "nested")).unwrap();
    assert_eq!(nested, Some(Ok(Some("nested"))));
    assert!(limiter.call(|| ()).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_admit_exactly_capacity() {
    let limiter = Arc::new(
        RateLimiter::builder()
            .capacity(25)
            .period(Duration::from_secs(60))
            .clock(ManualClock::new())
            .build()
            .unwrap(),
    );

    let mut handles = vec![];
    for i in 0..100u64 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            limiter
                .call_async(|| async move {
                    tokio::task::yield_now().await;
                    i
                })
                .await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if let Ok(Some(_)) = handle.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 25);
}
