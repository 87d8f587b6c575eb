use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mediasort_scheduler::{JobAction, JobScheduler, action};

const EVERY_SECOND: &str = "* * * * * *";

fn counting(counter: &Arc<AtomicUsize>) -> JobAction {
    let counter = counter.clone();
    action(move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), anyhow::Error>(())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn runs_on_schedule_and_records_last_run() {
    let scheduler = JobScheduler::new();
    let runs = Arc::new(AtomicUsize::new(0));
    scheduler.schedule("tick", EVERY_SECOND, counting(&runs)).unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(runs.load(Ordering::SeqCst) >= 1);
    let jobs = scheduler.list();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "tick");
    assert!(jobs[0].last_run.is_some());
    assert!(jobs[0].next_run.is_some());
    assert!(!jobs[0].running);
}

#[tokio::test(start_paused = true)]
async fn rescheduling_a_name_replaces_the_old_loop() {
    let scheduler = JobScheduler::new();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    scheduler.schedule("scan", EVERY_SECOND, counting(&first)).unwrap();
    scheduler.schedule("scan", EVERY_SECOND, counting(&second)).unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert!(second.load(Ordering::SeqCst) >= 1);
    assert_eq!(scheduler.list().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_job_never_runs_again() {
    let scheduler = JobScheduler::new();
    let runs = Arc::new(AtomicUsize::new(0));
    scheduler.schedule("sweep", EVERY_SECOND, counting(&runs)).unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(scheduler.cancel("sweep"));
    let seen = runs.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(runs.load(Ordering::SeqCst), seen);
    assert!(scheduler.list().is_empty());
    assert!(!scheduler.cancel("sweep"));
}

#[tokio::test(start_paused = true)]
async fn failing_action_keeps_its_schedule() {
    let scheduler = JobScheduler::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    scheduler
        .schedule(
            "flaky",
            EVERY_SECOND,
            action(move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow::anyhow!("boom"))
                }
            }),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert!(attempts.load(Ordering::SeqCst) >= 2);
    assert!(scheduler.contains("flaky"));
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_job() {
    let scheduler = JobScheduler::new();
    let runs = Arc::new(AtomicUsize::new(0));
    scheduler.schedule("a", EVERY_SECOND, counting(&runs)).unwrap();
    scheduler.schedule("b", EVERY_SECOND, counting(&runs)).unwrap();

    scheduler.shutdown().await;
    assert!(scheduler.list().is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}
