use jobtree::{JobHandle, JobSystem};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[test]
fn test_three_level_chain_grandparent_reaches_zero_once() {
    let job_system = JobSystem::new(2).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let make = |parent: Option<JobHandle>| {
        let runs = runs.clone();
        job_system
            .create_job(
                move |_| {
                    runs.fetch_add(1, Ordering::SeqCst);
                },
                parent,
            )
            .unwrap()
    };

    let grandparent = make(None);
    let parent = make(Some(grandparent));
    let child = make(Some(parent));

    // Only the child and the parent run
    job_system.submit(child).unwrap();
    job_system.submit(parent).unwrap();
    job_system.wait(parent).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(job_system.unfinished_count(child).unwrap(), 0);
    assert_eq!(job_system.unfinished_count(parent).unwrap(), 0);
    // The grandparent still owes its own entry: not zero, not negative
    assert_eq!(job_system.unfinished_count(grandparent).unwrap(), 1);
    assert!(!job_system.is_complete(grandparent).unwrap());

    job_system.submit(grandparent).unwrap();
    job_system.wait(grandparent).unwrap();
    assert_eq!(job_system.unfinished_count(grandparent).unwrap(), 0);
    assert_eq!(runs.load(Ordering::SeqCst), 3);

    job_system.shutdown().expect("Shutdown failed");
}

#[test]
fn test_hierarchical_job_tree() {
    let job_system = JobSystem::new(2).unwrap();
    let total_work = Arc::new(AtomicUsize::new(0));

    let root = job_system.create_job(|_| {}, None).unwrap();
    for _ in 0..3 {
        let work = total_work.clone();
        let child = job_system
            .create_job(
                move |_| {
                    work.fetch_add(1, Ordering::SeqCst);
                },
                Some(root),
            )
            .unwrap();

        for _ in 0..2 {
            let work = total_work.clone();
            let grandchild = job_system
                .create_job(
                    move |_| {
                        work.fetch_add(1, Ordering::SeqCst);
                    },
                    Some(child),
                )
                .unwrap();
            job_system.submit(grandchild).unwrap();
            job_system.release(grandchild).unwrap();
        }

        job_system.submit(child).unwrap();
        job_system.release(child).unwrap();
    }

    job_system.submit(root).unwrap();
    job_system.wait(root).unwrap();

    assert_eq!(total_work.load(Ordering::SeqCst), 9);
    job_system.shutdown().expect("Shutdown failed");
}

/// Builds a random tree where every entry checks that all of its children
/// already ran, and counts invocations.
#[test]
fn test_random_trees_run_children_before_parents() {
    let job_system = JobSystem::new(4).unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..20 {
        let invocations = Arc::new(AtomicUsize::new(0));
        let violations = Arc::new(AtomicUsize::new(0));

        // Node 0 is the root; every other node picks an earlier node as parent
        let node_count = rng.gen_range(2..200);
        let parents: Vec<usize> = (1..node_count).map(|i| rng.gen_range(0..i)).collect();
        let done: Vec<Arc<AtomicBool>> = (0..node_count)
            .map(|_| Arc::new(AtomicBool::new(false)))
            .collect();

        let mut handles: Vec<JobHandle> = Vec::with_capacity(node_count);
        for node in 0..node_count {
            let parent = (node > 0).then(|| handles[parents[node - 1]]);
            let children: Vec<Arc<AtomicBool>> = parents
                .iter()
                .enumerate()
                .filter(|&(_, &p)| p == node)
                .map(|(i, _)| done[i + 1].clone())
                .collect();
            let me = done[node].clone();
            let inv = invocations.clone();
            let bad = violations.clone();

            let handle = job_system
                .create_job(
                    move |_| {
                        if children.iter().any(|c| !c.load(Ordering::SeqCst)) {
                            bad.fetch_add(1, Ordering::SeqCst);
                        }
                        inv.fetch_add(1, Ordering::SeqCst);
                        me.store(true, Ordering::SeqCst);
                    },
                    parent,
                )
                .unwrap();
            handles.push(handle);
        }

        // Submit in random order; parents may be queued before children
        let mut order: Vec<usize> = (0..node_count).collect();
        for i in (1..order.len()).rev() {
            order.swap(i, rng.gen_range(0..=i));
        }
        for &node in &order {
            job_system.submit(handles[node]).unwrap();
        }

        job_system.wait(handles[0]).unwrap();

        assert_eq!(invocations.load(Ordering::SeqCst), node_count);
        assert_eq!(violations.load(Ordering::SeqCst), 0);

        for handle in handles {
            job_system.release(handle).unwrap();
        }
    }

    job_system.shutdown().expect("Shutdown failed");
    assert_eq!(job_system.live_jobs(), 0);
}
