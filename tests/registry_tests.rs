//! In-flight registry: test-and-set claims, idempotent release, concurrent callers.

use datawatch::InFlightRegistry;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_claim_then_second_claim_fails() {
    let reg = InFlightRegistry::new();
    let p = Path::new("/data/a.csv");
    assert!(reg.try_claim(p));
    assert!(!reg.try_claim(p));
    assert_eq!(reg.size(), 1);
    assert!(reg.contains(p));
    assert!(reg.claimed_at(p).is_some());
}

#[test]
fn test_release_is_idempotent_and_safe_for_unclaimed() {
    let reg = InFlightRegistry::new();
    let p = Path::new("/data/a.csv");
    reg.release(p);
    assert!(reg.try_claim(p));
    reg.release(p);
    reg.release(p);
    assert!(!reg.contains(p));
    assert_eq!(reg.size(), 0);
    assert!(reg.try_claim(p));
}

#[test]
fn test_distinct_paths_claim_independently() {
    let reg = InFlightRegistry::new();
    assert!(reg.try_claim(Path::new("/d/a.csv")));
    assert!(reg.try_claim(Path::new("/d/b.csv")));
    assert_eq!(reg.size(), 2);
}

#[test]
fn test_concurrent_burst_yields_exactly_one_claim() {
    let reg = Arc::new(InFlightRegistry::new());
    let n = 32;
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let reg = Arc::clone(&reg);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                reg.try_claim(Path::new("/data/hot.csv"))
            })
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(wins, 1);
    assert_eq!(reg.size(), 1);
}

#[test]
fn test_wait_idle_wakes_on_last_release() {
    let reg = Arc::new(InFlightRegistry::new());
    assert!(reg.try_claim(Path::new("/d/a.csv")));
    let releaser = {
        let reg = Arc::clone(&reg);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            reg.release(Path::new("/d/a.csv"));
        })
    };
    assert!(reg.wait_idle(Duration::from_secs(5)));
    releaser.join().unwrap();
}
