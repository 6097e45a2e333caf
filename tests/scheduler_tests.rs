//! Registration, run lock and cadence of the persisted schedule

mod common;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{DIX_JOBS, Pipeline, default_test_sources, elementor_item, page, pipeline};
use opportunity_harvester::application::{
    OpportunityCycle, Reconciler, Scheduler, SchedulerError, SourceRunner,
};
use opportunity_harvester::domain::{
    FetchError, PageFetcher, PostingFilter, PostingKind, PostingRepository, TaskRegistry,
};
use opportunity_harvester::infrastructure::config::SchedulerConfig;

fn config(initial_delay_seconds: u64) -> SchedulerConfig {
    SchedulerConfig {
        task_name: "scrape_all_opportunities".to_string(),
        initial_delay_seconds,
        repeat_every_seconds: 86_400,
        poll_interval_seconds: 1,
        stale_lock_seconds: 3_600,
    }
}

fn scheduler(p: &Pipeline, initial_delay_seconds: u64) -> Scheduler {
    Scheduler::new(p.registry.clone(), p.cycle.clone(), config(initial_delay_seconds))
}

#[tokio::test]
async fn second_registration_keeps_single_entry() {
    let p = pipeline(default_test_sources()).await;
    let scheduler = scheduler(&p, 35);

    let first = scheduler.register().await.unwrap();
    let second = scheduler.register().await.unwrap();

    assert!(first.was_created());
    assert!(!second.was_created());
    assert_eq!(first.task().run_at, second.task().run_at);
    assert_eq!(p.registry.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn first_run_is_delayed_and_repeats_daily() {
    let p = pipeline(default_test_sources()).await;
    let before = Utc::now();

    let registration = scheduler(&p, 35).register().await.unwrap();

    let task = registration.task();
    assert!(task.run_at >= before + TimeDelta::seconds(35));
    assert_eq!(task.repeat_every_seconds, 86_400);
    assert_eq!(task.run_count, 0);
}

#[tokio::test]
async fn run_now_requires_registration() {
    let p = pipeline(default_test_sources()).await;

    let result = scheduler(&p, 0).run_now().await;

    assert!(matches!(result, Err(SchedulerError::NotRegistered(_))));
}

#[tokio::test]
async fn run_now_stores_postings_without_moving_the_schedule() {
    let p = pipeline(default_test_sources()).await;
    p.pages.set_page(DIX_JOBS, &page(&[elementor_item("https://dix.test/jobs/1", "Trainee", None)]));
    let scheduler = scheduler(&p, 35);
    let registered = scheduler.register().await.unwrap().task().clone();

    let report = scheduler.run_now().await.unwrap();

    assert_eq!(report.created(), 1);
    let task = p.registry.find(scheduler.task_name()).await.unwrap().unwrap();
    assert_eq!(task.run_at, registered.run_at);
    assert_eq!(task.run_count, 1);
    assert!(!task.is_locked());
    assert!(task.last_run_at.is_some());
    // The two other sources have no canned page
    assert!(task.last_error.unwrap_or_default().contains("404"));
}

#[tokio::test]
async fn run_now_is_busy_while_another_runner_holds_a_fresh_lock() {
    let p = pipeline(default_test_sources()).await;
    let scheduler = scheduler(&p, 0);
    scheduler.register().await.unwrap();
    let stale_after = Duration::from_secs(3_600);

    assert!(p.registry.try_lock(scheduler.task_name(), "other", Utc::now(), stale_after).await.unwrap());

    let result = scheduler.run_now().await;
    assert!(matches!(result, Err(SchedulerError::Busy(_))));
    let task = p.registry.find(scheduler.task_name()).await.unwrap().unwrap();
    assert_eq!(task.locked_by.as_deref(), Some("other"));
    assert_eq!(task.run_count, 0);
}

#[tokio::test]
async fn stale_lock_is_taken_over() {
    let p = pipeline(default_test_sources()).await;
    let scheduler = scheduler(&p, 0);
    scheduler.register().await.unwrap();
    let long_ago = Utc::now() - TimeDelta::hours(2);

    assert!(
        p.registry
            .try_lock(scheduler.task_name(), "crashed", long_ago, Duration::from_secs(3_600))
            .await
            .unwrap()
    );

    scheduler.run_now().await.unwrap();
    let task = p.registry.find(scheduler.task_name()).await.unwrap().unwrap();
    assert_eq!(task.run_count, 1);
    assert!(!task.is_locked());
}

#[tokio::test]
async fn due_task_runs_once_and_advances_one_period() {
    let p = pipeline(default_test_sources()).await;
    p.pages.set_page(DIX_JOBS, &page(&[elementor_item("https://dix.test/jobs/1", "Trainee", None)]));
    let scheduler = Arc::new(scheduler(&p, 0));
    let registered = scheduler.register().await.unwrap().task().clone();

    let shutdown = CancellationToken::new();
    let handle = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    let mut task = registered.clone();
    for _ in 0..100 {
        task = p.registry.find(scheduler.task_name()).await.unwrap().unwrap();
        if task.run_count > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler stops on cancel")
        .unwrap()
        .unwrap();

    assert_eq!(task.run_count, 1);
    assert_eq!(task.run_at, registered.run_at + TimeDelta::days(1));
    assert_eq!(
        p.postings.count(PostingKind::Job, &PostingFilter::default()).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn run_stops_immediately_when_cancelled_before_due() {
    let p = pipeline(default_test_sources()).await;
    let scheduler = scheduler(&p, 3_600);
    scheduler.register().await.unwrap();

    let shutdown = CancellationToken::new();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(2), scheduler.run(shutdown))
        .await
        .expect("cancelled scheduler returns")
        .unwrap();
    let task = p.registry.find(scheduler.task_name()).await.unwrap().unwrap();
    assert_eq!(task.run_count, 0);
}

struct PanickingFetcher;

#[async_trait]
impl PageFetcher for PanickingFetcher {
    async fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
        panic!("parser blew up");
    }
}

#[tokio::test]
async fn panicking_cycle_is_recorded_and_lock_released() {
    let p = pipeline(default_test_sources()).await;
    let runner = SourceRunner::new(Arc::new(PanickingFetcher), Reconciler::new(p.postings.clone()), 1).unwrap();
    let cycle = Arc::new(OpportunityCycle::new(runner, default_test_sources()));
    let scheduler = Scheduler::new(p.registry.clone(), cycle, config(0));
    scheduler.register().await.unwrap();

    let result = scheduler.run_now().await;

    assert!(matches!(result, Err(SchedulerError::CycleFailed { .. })));
    let task = p.registry.find(scheduler.task_name()).await.unwrap().unwrap();
    assert!(!task.is_locked());
    assert_eq!(task.run_count, 1);
    assert!(task.last_error.is_some());

    // The scheduler stays usable after a contained panic
    assert!(matches!(
        scheduler.run_now().await,
        Err(SchedulerError::CycleFailed { .. })
    ));
}

/// Answers every URL after a fixed delay
struct SlowFetcher(Duration);

#[async_trait]
impl PageFetcher for SlowFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        tokio::time::sleep(self.0).await;
        Ok(page(&[elementor_item(&format!("{url}item"), "Slow", None)]))
    }
}

#[tokio::test]
async fn long_cycle_keeps_its_lock_fresh() {
    let p = pipeline(default_test_sources()).await;
    let runner = SourceRunner::new(
        Arc::new(SlowFetcher(Duration::from_millis(2_500))),
        Reconciler::new(p.postings.clone()),
        1,
    )
    .unwrap();
    let sources = default_test_sources().into_iter().take(1).collect();
    let cycle = Arc::new(OpportunityCycle::new(runner, sources));
    let scheduler = Arc::new(Scheduler::new(
        p.registry.clone(),
        cycle,
        SchedulerConfig {
            stale_lock_seconds: 3,
            ..config(0)
        },
    ));
    scheduler.register().await.unwrap();

    let run = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run_now().await })
    };

    let mut first_locked_at = None;
    for _ in 0..50 {
        let task = p.registry.find(scheduler.task_name()).await.unwrap().unwrap();
        if task.locked_at.is_some() {
            first_locked_at = task.locked_at;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let first_locked_at = first_locked_at.expect("run takes the lock");

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let task = p.registry.find(scheduler.task_name()).await.unwrap().unwrap();
    assert_eq!(task.locked_by.as_deref(), Some(scheduler.owner()));
    assert!(task.locked_at.unwrap() > first_locked_at);

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.created(), 1);
    assert!(!p.registry.find(scheduler.task_name()).await.unwrap().unwrap().is_locked());
}
