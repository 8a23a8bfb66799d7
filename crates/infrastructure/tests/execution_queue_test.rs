use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use task_scheduler_core::{
    models::{ExecutionOptions, JobExecution, JobOutcome, JobState},
    traits::{ExecutorRegistry, JobQueue},
    DefaultExecutorRegistry, SchedulerError,
};
use task_scheduler_infrastructure::{ExecutionQueue, ExecutionQueueConfig};
use task_scheduler_testing_utils::RecordingExecutor;
use tokio::sync::mpsc;

fn queue_config(concurrency: usize) -> ExecutionQueueConfig {
    ExecutionQueueConfig {
        environment: "develop".to_string(),
        concurrency,
        completed_retention: Duration::from_secs(3_600),
        failed_retention: Duration::from_secs(3_600),
    }
}

async fn registry_with(executors: Vec<(&str, Arc<RecordingExecutor>)>) -> Arc<dyn ExecutorRegistry> {
    let mut registry = DefaultExecutorRegistry::new();
    for (task_type, executor) in executors {
        registry.register(task_type.to_string(), executor).await.unwrap();
    }
    Arc::new(registry)
}

fn job(code: &str, attempts: u32, backoff_ms: u64, ttl_ms: Option<u64>) -> JobExecution {
    JobExecution::new("develop", code, 5).with_options(
        ExecutionOptions {
            attempts,
            ttl_ms,
            backoff_ms,
        },
        None,
    )
}

async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<JobOutcome>) -> JobOutcome {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for job outcome")
        .expect("outcome channel closed")
}

#[tokio::test]
async fn test_successful_job_reports_completed_once() {
    let executor = RecordingExecutor::new("cleanup")
        .with_result(serde_json::json!({ "removed": 3 }))
        .into_arc();
    let registry = registry_with(vec![("cleanup", executor.clone())]).await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(2), registry);
    queue.start();

    let job_id = queue
        .enqueue(job("cleanup", 3, 10, None).with_generation(7))
        .await
        .unwrap();
    let outcome = next_outcome(&mut outcomes).await;

    assert_eq!(
        outcome,
        JobOutcome::Completed {
            job_id,
            task_code: "cleanup".to_string(),
            generation: 7,
            result: serde_json::json!({ "removed": 3 }),
        }
    );
    assert_eq!(executor.call_count(), 1);
    let record = queue.job(job_id).unwrap();
    assert_eq!(record.state, JobState::Complete);
    assert_eq!(record.attempts_made, 1);
    assert!(record.terminal_at.is_some());

    queue.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_attempts_are_retried_after_backoff() {
    let executor = RecordingExecutor::new("report").failing_first(2).into_arc();
    let registry = registry_with(vec![("report", executor.clone())]).await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(1), registry);
    queue.start();

    let job_id = queue.enqueue(job("report", 3, 1_000, None)).await.unwrap();

    match next_outcome(&mut outcomes).await {
        JobOutcome::FailedAttempt { attempt, .. } => assert_eq!(attempt, 1),
        other => panic!("unexpected outcome {other:?}"),
    }
    match next_outcome(&mut outcomes).await {
        JobOutcome::FailedAttempt { attempt, .. } => assert_eq!(attempt, 2),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(matches!(
        next_outcome(&mut outcomes).await,
        JobOutcome::Completed { .. }
    ));
    assert_eq!(executor.call_count(), 3);
    assert_eq!(queue.job(job_id).unwrap().attempts_made, 3);

    queue.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_attempts_report_failed_final() {
    let executor = RecordingExecutor::new("sync").always_failing().into_arc();
    let registry = registry_with(vec![("sync", executor.clone())]).await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(1), registry);
    queue.start();

    let job_id = queue.enqueue(job("sync", 2, 500, None)).await.unwrap();

    assert!(matches!(
        next_outcome(&mut outcomes).await,
        JobOutcome::FailedAttempt { attempt: 1, .. }
    ));
    match next_outcome(&mut outcomes).await {
        JobOutcome::FailedFinal {
            job_id: id,
            attempts,
            error,
            ..
        } => {
            assert_eq!(id, job_id);
            assert_eq!(attempts, 2);
            assert!(error.contains("第2次执行失败"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(queue.job(job_id).unwrap().state, JobState::Failed);

    queue.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_attempt_exceeding_ttl_fails_with_timeout() {
    let executor = RecordingExecutor::new("slow")
        .with_delay(Duration::from_secs(60))
        .into_arc();
    let registry = registry_with(vec![("slow", executor)]).await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(1), registry);
    queue.start();

    queue.enqueue(job("slow", 1, 0, Some(50))).await.unwrap();

    match next_outcome(&mut outcomes).await {
        JobOutcome::FailedFinal { attempts, error, .. } => {
            assert_eq!(attempts, 1);
            assert_eq!(error, SchedulerError::ExecutionTimeout { ttl_ms: 50 }.to_string());
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    queue.stop().await;
}

#[tokio::test]
async fn test_missing_executor_and_panics_count_as_failures() {
    let panicking = RecordingExecutor::new("boom").panicking().into_arc();
    let registry = registry_with(vec![("boom", panicking)]).await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(1), registry);
    queue.start();

    queue.enqueue(job("unknown", 1, 0, None)).await.unwrap();
    match next_outcome(&mut outcomes).await {
        JobOutcome::FailedFinal { task_code, error, .. } => {
            assert_eq!(task_code, "unknown");
            assert!(error.contains("unknown"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    queue.enqueue(job("boom", 1, 0, None)).await.unwrap();
    assert!(matches!(
        next_outcome(&mut outcomes).await,
        JobOutcome::FailedFinal { attempts: 1, .. }
    ));

    queue.stop().await;
}

#[tokio::test]
async fn test_duplicate_queue_name_is_rejected_until_terminal() {
    let executor = RecordingExecutor::new("dup").into_arc();
    let registry = registry_with(vec![("dup", executor)]).await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(1), registry);

    queue.enqueue(job("dup", 1, 0, None)).await.unwrap();
    let err = queue.enqueue(job("dup", 1, 0, None)).await.unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateJob { ref queue_name } if queue_name == "develop:dup"));

    queue.start();
    assert!(matches!(
        next_outcome(&mut outcomes).await,
        JobOutcome::Completed { .. }
    ));
    assert!(queue.enqueue(job("dup", 1, 0, None)).await.is_ok());

    queue.stop().await;
}

#[tokio::test]
async fn test_higher_priority_runs_first() {
    let executor = RecordingExecutor::new("shared").into_arc();
    let registry = registry_with(vec![
        ("low", executor.clone()),
        ("normal", executor.clone()),
        ("high", executor.clone()),
    ])
    .await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(1), registry);

    queue.enqueue(JobExecution::new("develop", "low", 1)).await.unwrap();
    queue.enqueue(JobExecution::new("develop", "high", 10)).await.unwrap();
    queue.enqueue(JobExecution::new("develop", "normal", 5)).await.unwrap();
    assert_eq!(queue.pending_count(), 3);

    queue.start();
    for _ in 0..3 {
        next_outcome(&mut outcomes).await;
    }

    let order: Vec<String> = executor
        .executions()
        .into_iter()
        .map(|job| job.task_code)
        .collect();
    assert_eq!(order, vec!["high", "normal", "low"]);

    queue.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_limits_concurrency() {
    let executor = RecordingExecutor::new("pool")
        .with_delay(Duration::from_millis(100))
        .into_arc();
    let codes = ["a", "b", "c", "d"];
    let registry = registry_with(
        codes
            .iter()
            .map(|code| (*code, executor.clone()))
            .collect(),
    )
    .await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(2), registry);
    queue.start();

    for code in codes {
        queue.enqueue(JobExecution::new("develop", code, 1)).await.unwrap();
    }
    for _ in 0..codes.len() {
        next_outcome(&mut outcomes).await;
    }

    assert_eq!(executor.max_concurrent(), 2);
    assert_eq!(queue.jobs_in_state(JobState::Complete).len(), 4);

    queue.stop().await;
}

#[tokio::test]
async fn test_sweep_only_touches_own_namespace() {
    let executor = RecordingExecutor::new("sweep").into_arc();
    let registry = registry_with(vec![
        ("a", executor.clone()),
        ("b", executor.clone()),
        ("c", executor.clone()),
    ])
    .await;
    let (queue, mut outcomes) = ExecutionQueue::new(queue_config(1), registry);
    queue.start();

    queue.enqueue(JobExecution::new("develop", "a", 1)).await.unwrap();
    queue.enqueue(JobExecution::new("develop-old", "b", 1)).await.unwrap();
    queue.enqueue(JobExecution::new("staging", "c", 1)).await.unwrap();
    for _ in 0..3 {
        next_outcome(&mut outcomes).await;
    }

    let window = Duration::from_secs(60);
    assert_eq!(queue.sweep_terminal_jobs(JobState::Complete, window, Utc::now()), 0);

    let later = Utc::now() + chrono::Duration::seconds(61);
    assert_eq!(queue.sweep_terminal_jobs(JobState::Complete, window, later), 1);

    let remaining: Vec<String> = queue
        .jobs_in_state(JobState::Complete)
        .into_iter()
        .map(|record| record.job.queue_name)
        .collect();
    assert_eq!(remaining, vec!["develop-old:b", "staging:c"]);

    queue.stop().await;
}

#[tokio::test]
async fn test_stopped_queue_rejects_new_jobs() {
    let registry = registry_with(Vec::new()).await;
    let (queue, _outcomes) = ExecutionQueue::new(queue_config(1), registry);
    queue.start();
    queue.stop().await;

    let err = queue.enqueue(JobExecution::new("develop", "late", 1)).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Queue(_)));
}
