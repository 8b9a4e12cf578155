use callgate::{Clock, ManualClock, RateLimiter};
use std::cell::RefCell;
use std::time::Duration;

fn limiter(capacity: u64, period: Duration, clock: &ManualClock) -> RateLimiter {
    RateLimiter::builder()
        .capacity(capacity)
        .period(period)
        .clock(clock.clone())
        .build()
        .unwrap()
}

#[test]
fn test_guarded_keeps_signature() {
    let clock = ManualClock::new();
    let add = limiter(2, Duration::from_secs(60), &clock).guard(|(a, b): (i32, i32)| a + b);

    assert_eq!(add.call_with((1, 2)), Ok(Some(3)));
    assert_eq!(add.call_with((5, 5)), Ok(Some(10)));
    assert!(add.call_with((0, 0)).is_err());
    assert_eq!(add.limiter().snapshot().call_count, 3);
}

#[test]
fn test_guarded_nullary_call() {
    let clock = ManualClock::new();
    let hello = limiter(1, Duration::from_secs(5), &clock).guard(|| "hello");

    assert_eq!(hello.call(), Ok(Some("hello")));
    let err = hello.call().unwrap_err();
    assert_eq!(err.period_remaining(), Duration::from_secs(5));

    clock.advance(Duration::from_secs(5));
    assert_eq!(hello.call(), Ok(Some("hello")));
}

#[test]
fn test_retry_waits_one_period_for_second_call() {
    let period = Duration::from_millis(100);
    let clock = ManualClock::new();
    let slept = RefCell::new(Vec::new());

    // The sleep only moves the injected clock forward
    let sleeper = |d: Duration| {
        slept.borrow_mut().push(d);
        clock.advance(d);
    };
    let fetch = limiter(1, period, &clock)
        .guard(|| true)
        .sleep_and_retry_with(sleeper);

    assert_eq!(fetch.call(), Some(true));
    assert!(slept.borrow().is_empty());

    assert_eq!(fetch.call(), Some(true));
    assert_eq!(*slept.borrow(), vec![period]);
    assert_eq!(clock.now(), period);
}

#[test]
fn test_retry_with_argument() {
    let clock = ManualClock::new();
    let sleeper = |d: Duration| clock.advance(d);
    let double = limiter(2, Duration::from_secs(1), &clock)
        .guard(|x: u64| x * 2)
        .sleep_and_retry_with(sleeper);

    let results: Vec<_> = (0..5).map(|x| double.call_with(x)).collect();
    assert_eq!(results, vec![Some(0), Some(2), Some(4), Some(6), Some(8)]);

    // Five calls at two per second need two resets
    assert_eq!(clock.now(), Duration::from_secs(2));
}

#[test]
fn test_retry_never_sleeps_when_limiter_is_silent() {
    let clock = ManualClock::new();
    let sleeps = RefCell::new(0);
    let sleeper = |_: Duration| *sleeps.borrow_mut() += 1;
    let op = RateLimiter::builder()
        .capacity(1)
        .period(Duration::from_secs(60))
        .clock(clock.clone())
        .raise_on_limit(false)
        .build()
        .unwrap()
        .guard(|| 1)
        .sleep_and_retry_with(sleeper);

    assert_eq!(op.call(), Some(1));
    assert_eq!(op.call(), None);
    assert_eq!(*sleeps.borrow(), 0);
}

#[test]
fn test_retry_with_thread_sleep() {
    let ping = RateLimiter::new(1, Duration::from_millis(20))
        .guard(|| "pong")
        .sleep_and_retry();

    let start = std::time::Instant::now();
    assert_eq!(ping.call(), Some("pong"));
    assert_eq!(ping.call(), Some("pong"));
    assert!(start.elapsed() >= Duration::from_millis(15));
    assert_eq!(ping.limiter().capacity(), 1);
}
