use jobtree::JobSystem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const LEAVES: usize = 100_000;
const PRODUCERS: usize = 4;

#[test]
fn test_hundred_thousand_leaves_from_four_producers() {
    let job_system = JobSystem::new(8).unwrap();
    let invocations = Arc::new(AtomicUsize::new(0));

    let inv = invocations.clone();
    let root = job_system
        .create_job(
            move |_| {
                inv.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let js = job_system.clone();
            let inv = invocations.clone();
            thread::spawn(move || {
                for _ in 0..LEAVES / PRODUCERS {
                    let inv = inv.clone();
                    let leaf = js
                        .create_job(
                            move |_| {
                                inv.fetch_add(1, Ordering::Relaxed);
                            },
                            Some(root),
                        )
                        .unwrap();
                    js.submit(leaf).unwrap();
                    js.release(leaf).unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    job_system.submit(root).unwrap();
    job_system.wait(root).unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), LEAVES + 1);
    job_system.release(root).unwrap();
    job_system.shutdown().expect("Shutdown failed");
    assert_eq!(job_system.live_jobs(), 0);
}

#[test]
fn test_root_submitted_before_producers_finish() {
    let job_system = JobSystem::new(8).unwrap();
    let invocations = Arc::new(AtomicUsize::new(0));

    let root = job_system.create_job(|_| {}, None).unwrap();
    // Hold the root open with a gate child until every producer is done
    let gate = job_system.create_job(|_| {}, Some(root)).unwrap();
    job_system.submit(root).unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let js = job_system.clone();
            let inv = invocations.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    let inv = inv.clone();
                    js.run(
                        move |_| {
                            inv.fetch_add(1, Ordering::Relaxed);
                        },
                        Some(root),
                    )
                    .and_then(|leaf| js.release(leaf))
                    .unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    job_system.submit(gate).unwrap();
    job_system.release(gate).unwrap();

    job_system.wait(root).unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 40_000);
    job_system.shutdown().expect("Shutdown failed");
}
