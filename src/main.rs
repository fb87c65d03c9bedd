use jobtree::{BufferRef, JobStatus, JobSystem, JobSystemConfig, Params};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> jobtree::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("jobtree - Hierarchical Job Scheduler\n");

    let job_system = JobSystem::new_with_config(JobSystemConfig::with_workers(4))?;
    println!(
        "Initialized job system with {} worker threads\n",
        job_system.num_workers()
    );

    // Example 1: Parameterised children under one root
    println!("Example 1: Scaling a buffer in parallel");
    let chunks: Vec<BufferRef> = (0..8u8)
        .map(|i| BufferRef::new(vec![i; 16]))
        .collect();
    let root = job_system.create_job(|_| println!("  Root runs after all chunks"), None)?;
    for chunk in &chunks {
        let child = job_system.create_job(
            |params: &Params| {
                let factor = params.float(0).unwrap_or(1.0);
                if let Some(buffer) = params.buffer(1) {
                    for byte in buffer.lock().iter_mut() {
                        *byte = (*byte as f32 * factor) as u8;
                    }
                }
            },
            Some(root),
        )?;
        job_system.add_param(child, 3.0f32)?;
        job_system.add_param(child, chunk.clone())?;
        job_system.submit(child)?;
        job_system.release(child)?;
    }
    job_system.submit(root)?;
    job_system.wait(root)?;
    job_system.release(root)?;
    let total: usize = chunks
        .iter()
        .map(|c| c.lock().iter().map(|&b| b as usize).sum::<usize>())
        .sum();
    println!("  Sum of scaled buffers: {} (expected: {})\n", total, 3 * 16 * 28);

    // Example 2: A job that builds and waits on its own subtree
    println!("Example 2: Nested tree with wait inside a job");
    let leaves = Arc::new(AtomicUsize::new(0));
    let js = job_system.clone();
    let l = leaves.clone();
    let outer = job_system.run(
        move |_| -> jobtree::Result<()> {
            let group = js.create_job(|_| {}, None)?;
            for _ in 0..32 {
                let l = l.clone();
                let leaf = js.create_job(
                    move |_| {
                        l.fetch_add(1, Ordering::SeqCst);
                    },
                    Some(group),
                )?;
                js.submit(leaf)?;
                js.release(leaf)?;
            }
            js.submit(group)?;
            js.wait(group)?;
            js.release(group)
        },
        None,
    )?;
    job_system.wait(outer)?;
    println!(
        "  Outer job {:?} after {} leaves\n",
        job_system.status(outer)?,
        leaves.load(Ordering::SeqCst)
    );
    job_system.release(outer)?;

    // Example 3: Failures are recorded per job
    println!("Example 3: Failing entry");
    let failing = job_system.run(|_| Err::<(), _>("checksum mismatch"), None)?;
    job_system.wait(failing)?;
    if job_system.status(failing)? == JobStatus::Failed {
        println!(
            "  Job failed: {}\n",
            job_system.failure(failing)?.unwrap_or_default()
        );
    }
    job_system.release(failing)?;

    // Example 4: Throughput
    println!("Example 4: High-throughput run");
    let num_jobs = 100_000;
    let start = Instant::now();
    let root = job_system.create_job(|_| {}, None)?;
    for i in 0..num_jobs {
        let child = job_system.create_job(
            move |_| {
                std::hint::black_box(i * 2);
            },
            Some(root),
        )?;
        job_system.submit(child)?;
        job_system.release(child)?;
    }
    job_system.submit(root)?;
    job_system.wait(root)?;
    job_system.release(root)?;
    let duration = start.elapsed();
    println!(
        "  Executed {} jobs in {:?} ({:.0} jobs/sec)\n",
        num_jobs,
        duration,
        num_jobs as f64 / duration.as_secs_f64()
    );

    info!(live_jobs = job_system.live_jobs(), "Shutting down");
    job_system.shutdown()?;
    println!("Job system shut down successfully");
    Ok(())
}
