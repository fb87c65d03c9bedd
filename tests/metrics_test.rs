#![cfg(feature = "metrics")]

use jobtree::JobSystem;

#[test]
fn test_metrics_track_tree_execution() {
    let job_system = JobSystem::new(2).unwrap();

    let root = job_system.create_job(|_| {}, None).unwrap();
    for i in 0..20 {
        let child = job_system
            .create_job(
                move |_| {
                    if i % 5 == 0 {
                        return Err("odd one out");
                    }
                    Ok(())
                },
                Some(root),
            )
            .unwrap();
        job_system.submit(child).unwrap();
        job_system.release(child).unwrap();
    }
    job_system.submit(root).unwrap();
    job_system.wait(root).unwrap();
    job_system.release(root).unwrap();
    job_system.shutdown().unwrap();

    let snapshot = job_system.metrics();
    assert_eq!(snapshot.jobs_created, 21);
    assert_eq!(snapshot.jobs_submitted, 21);
    assert_eq!(snapshot.jobs_executed, 21);
    assert_eq!(snapshot.jobs_failed, 4);
    assert_eq!(snapshot.slots_reclaimed, 21);
    assert_eq!(snapshot.queue_depth(), 0);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["jobs_executed"], 21);
}
