use jobtree::{JobSystem, Params};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_concurrent_submitters_lose_no_jobs() {
    let job_system = JobSystem::new(4).unwrap();
    let executed = Arc::new(AtomicUsize::new(0));
    let submitted = Arc::new(AtomicUsize::new(0));

    let root = job_system.create_job(|_| {}, None).unwrap();

    let producers: Vec<_> = (0..8)
        .map(|_| {
            let js = job_system.clone();
            let executed = executed.clone();
            let submitted = submitted.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let executed = executed.clone();
                    let job = js
                        .create_job(
                            move |_| {
                                executed.fetch_add(1, Ordering::SeqCst);
                            },
                            Some(root),
                        )
                        .unwrap();
                    js.submit(job).unwrap();
                    submitted.fetch_add(1, Ordering::SeqCst);
                    js.release(job).unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    job_system.submit(root).unwrap();
    job_system.wait(root).unwrap();

    assert_eq!(
        executed.load(Ordering::SeqCst),
        submitted.load(Ordering::SeqCst)
    );
    assert_eq!(executed.load(Ordering::SeqCst), 4000);
    job_system.shutdown().expect("Shutdown failed");
}

#[test]
fn test_producer_consumer_pattern() {
    let job_system = JobSystem::new(2).unwrap();
    let items_produced = Arc::new(AtomicUsize::new(0));
    let items_consumed = Arc::new(AtomicUsize::new(0));

    let js = job_system.clone();
    let produced = items_produced.clone();
    let consumed = items_consumed.clone();

    let producer = job_system
        .run(
            move |_| {
                let batch = js.create_job(|_| {}, None).unwrap();
                for i in 0..20 {
                    produced.fetch_add(1, Ordering::SeqCst);
                    let consumed = consumed.clone();
                    let consumer = js
                        .create_job(
                            move |params: &Params| {
                                assert_eq!(params.double(0), Some(i as f64));
                                consumed.fetch_add(1, Ordering::SeqCst);
                            },
                            Some(batch),
                        )
                        .unwrap();
                    js.add_param(consumer, i as f64).unwrap();
                    js.submit(consumer).unwrap();
                    js.release(consumer).unwrap();
                }
                js.submit(batch).unwrap();
                js.wait(batch).unwrap();
                js.release(batch).unwrap();
            },
            None,
        )
        .unwrap();

    job_system.wait(producer).unwrap();
    assert_eq!(items_produced.load(Ordering::SeqCst), 20);
    assert_eq!(items_consumed.load(Ordering::SeqCst), 20);
    job_system.shutdown().expect("Shutdown failed");
}
