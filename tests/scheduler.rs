use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use deferred::{Error, Executor, Promise, Scheduler, Task};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An executor that refuses every task
struct Refusing;

impl Executor for Refusing {
    fn execute(&self, _task: Task) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "no capacity"))
    }
}

#[test]
fn test_spawn_on_scheduler_uses_workers() {
    init_logger();

    let sched = Scheduler::new().with_workers(4).name_prefix("agg");
    let names: Vec<_> = (0..64)
        .map(|_| Promise::spawn_on(&sched, || Ok(thread::current().name().map(str::to_owned))))
        .collect();

    let names = deferred::all(names).join().unwrap();
    let distinct: HashSet<_> = names.into_iter().map(|n| n.unwrap()).collect();

    assert!(!distinct.is_empty() && distinct.len() <= 4);
    assert!(distinct.iter().all(|n| n.starts_with("agg-")));
}

#[test]
fn test_refused_task_rejects_abandoned() {
    init_logger();

    let p: Promise<u8> = Promise::spawn_on(&Refusing, || Ok(1));
    assert_eq!(p.join(), Err(Error::Abandoned));
}

#[test]
fn test_shared_scheduler_through_arc() {
    init_logger();

    let sched = Arc::new(Scheduler::new().with_workers(2));
    let results: Vec<_> = (0..10u32)
        .map(|i| Promise::spawn_on(&sched, move || Ok(i * i)))
        .collect();

    assert_eq!(deferred::all(results).join(), Ok((0..10u32).map(|i| i * i).collect()));
}

#[test]
fn test_queued_work_finishes_after_drop() {
    init_logger();

    let promises: Vec<_> = {
        let sched = Scheduler::new().with_workers(1);
        (0..20u32).map(|i| Promise::spawn_on(&sched, move || Ok(i))).collect()
    };

    assert!(promises.iter().all(|p| p.is_settled()));
    assert_eq!(deferred::all(promises).join(), Ok((0..20).collect()));
}

#[test]
fn test_after_shutdown_rejects() {
    init_logger();

    let sched = Scheduler::new().with_workers(1);
    sched.shutdown();

    let p: Promise<u8> = Promise::spawn_on(&sched, || Ok(1));
    assert_eq!(p.join(), Err(Error::Abandoned));
}
