use std::sync::Arc;
use std::time::Duration;

use scanner_core::ScannerError;
use scanner_domain::entities::ScanStatus;
use scanner_domain::services::ScanService;
use scanner_testing_utils::{InMemoryScanStore, ScanBuilder, ScriptedWorkUnit};
use scanner_worker::{
    start_background, BackgroundHandle, BackgroundOptions, InlineExecutor, JobExecutor,
    SteppedWorkUnit, WorkUnit,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Harness {
    store: InMemoryScanStore,
    service: ScanService,
    executor: Arc<JobExecutor>,
    shutdown: CancellationToken,
}

impl Harness {
    fn new(work_unit: Arc<dyn WorkUnit>) -> Self {
        let store = InMemoryScanStore::new();
        let service = ScanService::new(Arc::new(store.clone()), Arc::new(store.clone()));
        let executor = Arc::new(JobExecutor::new(Arc::new(store.clone()), work_unit));
        Self {
            store,
            service,
            executor,
            shutdown: CancellationToken::new(),
        }
    }

    fn inline(&self) -> InlineExecutor {
        InlineExecutor::new(Arc::clone(&self.executor), self.shutdown.clone())
    }

    fn background(&self, concurrency: usize) -> BackgroundHandle {
        start_background(
            Arc::clone(&self.executor),
            BackgroundOptions::new(concurrency, Duration::from_millis(50)),
            self.shutdown.clone(),
        )
    }

    async fn enqueue(&self, path: &str) -> Uuid {
        self.service
            .enqueue(&format!("https://example.com/{path}"))
            .await
            .unwrap()
    }

    /// 等待所有扫描进入终态，超过时限则失败
    async fn wait_until_terminal(&self, scan_ids: &[Uuid]) {
        for _ in 0..2000 {
            let done = scan_ids.iter().all(|id| {
                self.store
                    .scan(*id)
                    .map(|scan| scan.status.is_terminal())
                    .unwrap_or(false)
            });
            if done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("扫描未在时限内结束");
    }

    fn status(&self, scan_id: Uuid) -> (ScanStatus, f64) {
        let scan = self.store.scan(scan_id).unwrap();
        (scan.status, scan.progress)
    }
}

#[tokio::test(start_paused = true)]
async fn test_background_scan_completes_with_monotonic_progress() {
    let harness = Harness::new(Arc::new(SteppedWorkUnit::new(4, Duration::from_millis(150))));
    let scan_id = harness.enqueue("page").await;

    let snapshot = harness.service.status(scan_id).await.unwrap();
    assert_eq!(snapshot.status, ScanStatus::Queued);
    assert_eq!(snapshot.progress, 0.0);

    let started = tokio::time::Instant::now();
    let handle = harness.background(1);
    assert!(handle.is_active());
    harness.wait_until_terminal(&[scan_id]).await;

    assert_eq!(harness.status(scan_id), (ScanStatus::Completed, 1.0));
    assert!(started.elapsed() >= Duration::from_millis(600));
    assert_eq!(
        harness.store.progress_history(scan_id),
        vec![0.0, 0.25, 0.5, 0.75, 1.0]
    );

    let job = harness.store.job_for_scan(scan_id).unwrap();
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.is_none());

    harness.shutdown.cancel();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_inline_timeout_marks_job_failed() {
    let harness = Harness::new(Arc::new(SteppedWorkUnit::new(4, Duration::from_millis(150))));
    let scan_id = harness.enqueue("page").await;

    let err = harness
        .inline()
        .run(scan_id, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(matches!(err, ScannerError::ExecutionTimeout { timeout_ms: 100 }));
    assert_eq!(harness.status(scan_id), (ScanStatus::Failed, 0.0));

    let job = harness.store.job_for_scan(scan_id).unwrap();
    assert_eq!(job.status, ScanStatus::Failed);
    assert_eq!(job.last_error, Some(err.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_inline_success_and_reclaim_rules() {
    let harness = Harness::new(Arc::new(SteppedWorkUnit::new(4, Duration::from_millis(150))));
    let scan_id = harness.enqueue("page").await;
    let inline = harness.inline();

    inline.run(scan_id, Duration::from_secs(30)).await.unwrap();
    assert_eq!(harness.status(scan_id), (ScanStatus::Completed, 1.0));

    let err = inline.run(scan_id, Duration::from_secs(30)).await.unwrap_err();
    assert!(matches!(err, ScannerError::NotClaimable { .. }));
    assert_eq!(harness.status(scan_id), (ScanStatus::Completed, 1.0));

    let err = inline
        .run(Uuid::new_v4(), Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(matches!(err, ScannerError::ScanNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_inline_rejects_scan_already_running() {
    let harness = Harness::new(Arc::new(ScriptedWorkUnit::succeeding()));
    let (scan, job) = ScanBuilder::new().running(0.4).build();
    let scan_id = scan.id;
    harness.store.seed(scan, job);

    let err = harness
        .inline()
        .run(scan_id, Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_contention());
    assert_eq!(harness.status(scan_id), (ScanStatus::Running, 0.4));
    assert_eq!(harness.store.job_for_scan(scan_id).unwrap().attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_and_inline_paths_are_equivalent() {
    let unit = ScriptedWorkUnit::failing("目标返回 503");
    let harness = Harness::new(Arc::new(unit.clone()));

    let inline_scan = harness.enqueue("inline").await;
    let inline_err = harness
        .inline()
        .run(inline_scan, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(inline_err, ScannerError::WorkUnit(_)));

    let background_scan = harness.enqueue("background").await;
    let handle = harness.background(1);
    harness.wait_until_terminal(&[background_scan]).await;

    assert_eq!(harness.status(inline_scan), harness.status(background_scan));
    assert_eq!(harness.status(inline_scan), (ScanStatus::Failed, 0.75));

    let inline_job = harness.store.job_for_scan(inline_scan).unwrap();
    let background_job = harness.store.job_for_scan(background_scan).unwrap();
    assert_eq!(inline_job.last_error, background_job.last_error);
    assert_eq!(inline_job.last_error.as_deref(), Some("扫描执行失败: 目标返回 503"));
    assert_eq!(unit.execution_count(), 2);

    harness.shutdown.cancel();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_worker_failure_does_not_stop_the_loop() {
    let harness = Harness::new(Arc::new(ScriptedWorkUnit::succeeding()));
    let first = harness.enqueue("1").await;
    let second = harness.enqueue("2").await;
    let third = harness.enqueue("3").await;

    let unit = ScriptedWorkUnit::succeeding().fail_for(second, "连接被重置");
    let executor = Arc::new(JobExecutor::new(
        Arc::new(harness.store.clone()),
        Arc::new(unit.clone()),
    ));
    let handle = start_background(
        executor,
        BackgroundOptions::new(1, Duration::from_millis(20)),
        harness.shutdown.clone(),
    );

    harness.wait_until_terminal(&[first, second, third]).await;

    assert_eq!(harness.status(first), (ScanStatus::Completed, 1.0));
    assert_eq!(harness.status(second).0, ScanStatus::Failed);
    assert_eq!(harness.status(third), (ScanStatus::Completed, 1.0));
    assert_eq!(unit.executed(), vec![first, second, third]);

    harness.shutdown.cancel();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_pool_drains_queue_with_each_job_run_once() {
    let unit = ScriptedWorkUnit::succeeding().with_step_delay(Duration::from_millis(40));
    let harness = Harness::new(Arc::new(unit.clone()));

    let mut scan_ids = Vec::new();
    for i in 0..10 {
        scan_ids.push(harness.enqueue(&i.to_string()).await);
    }

    let handle = harness.background(3);
    assert_eq!(handle.worker_count(), 3);
    harness.wait_until_terminal(&scan_ids).await;

    assert_eq!(harness.store.count_with_status(ScanStatus::Completed), 10);
    assert_eq!(unit.execution_count(), 10);
    for scan_id in &scan_ids {
        assert_eq!(harness.store.job_for_scan(*scan_id).unwrap().attempts, 1);
    }

    harness.shutdown.cancel();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispatcher_survives_claim_errors() {
    let harness = Harness::new(Arc::new(ScriptedWorkUnit::succeeding()));
    harness.store.fail_next_claims(3);
    let scan_id = harness.enqueue("page").await;

    let handle = harness.background(1);
    harness.wait_until_terminal(&[scan_id]).await;

    assert_eq!(harness.status(scan_id), (ScanStatus::Completed, 1.0));
    assert!(harness.store.claim_calls() > 3);

    harness.shutdown.cancel();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_worker_continues_after_finalize_error() {
    let unit = ScriptedWorkUnit::succeeding();
    let harness = Harness::new(Arc::new(unit.clone()));
    harness.store.set_fail_finalize(true);

    let first = harness.enqueue("1").await;
    let second = harness.enqueue("2").await;
    let handle = harness.background(1);

    for _ in 0..500 {
        if unit.execution_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(unit.executed(), vec![first, second]);

    // 终态写入失败时任务保持运行中
    assert_eq!(harness.status(first).0, ScanStatus::Running);

    harness.shutdown.cancel();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_background_job_timeout_drops_hanging_work_unit() {
    let harness = Harness::new(Arc::new(ScriptedWorkUnit::hanging()));
    let scan_id = harness.enqueue("page").await;

    let handle = start_background(
        Arc::clone(&harness.executor),
        BackgroundOptions::new(1, Duration::from_millis(20))
            .with_job_timeout(Some(Duration::from_millis(500))),
        harness.shutdown.clone(),
    );
    harness.wait_until_terminal(&[scan_id]).await;

    assert_eq!(harness.status(scan_id), (ScanStatus::Failed, 0.75));
    let job = harness.store.job_for_scan(scan_id).unwrap();
    assert_eq!(job.last_error.as_deref(), Some("扫描执行超时: 500ms"));

    harness.shutdown.cancel();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_in_flight_work_and_stops_loops() {
    let harness = Harness::new(Arc::new(SteppedWorkUnit::new(10, Duration::from_secs(1))));
    let scan_id = harness.enqueue("slow").await;
    let handle = harness.background(2);

    for _ in 0..200 {
        if harness.status(scan_id).0 == ScanStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.status(scan_id).0, ScanStatus::Running);

    harness.shutdown.cancel();
    handle.wait().await;

    assert_eq!(harness.status(scan_id), (ScanStatus::Failed, 0.0));
    let job = harness.store.job_for_scan(scan_id).unwrap();
    assert_eq!(job.last_error.as_deref(), Some("扫描执行已取消"));

    // 关闭后新入队的扫描保持排队
    let later = harness.enqueue("later").await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.status(later), (ScanStatus::Queued, 0.0));
}

#[tokio::test]
async fn test_zero_concurrency_disables_background_processing() {
    let harness = Harness::new(Arc::new(ScriptedWorkUnit::succeeding()));
    let scan_id = harness.enqueue("page").await;

    let handle = harness.background(0);
    assert!(!handle.is_active());
    assert_eq!(handle.worker_count(), 0);
    handle.wait().await;

    assert_eq!(harness.status(scan_id), (ScanStatus::Queued, 0.0));
    assert_eq!(harness.store.claim_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_inline_caller_still_finalizes_job() {
    let harness = Harness::new(Arc::new(SteppedWorkUnit::new(4, Duration::from_millis(150))));
    let scan_id = harness.enqueue("page").await;
    let inline = harness.inline();

    // 调用方在执行途中放弃等待
    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        inline.run(scan_id, Duration::from_secs(5)),
    )
    .await;
    assert!(outcome.is_err());

    harness.wait_until_terminal(&[scan_id]).await;
    assert_eq!(harness.status(scan_id), (ScanStatus::Failed, 0.0));
    let job = harness.store.job_for_scan(scan_id).unwrap();
    assert_eq!(job.status, ScanStatus::Failed);
    assert_eq!(job.last_error.as_deref(), Some("扫描执行已取消"));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_inline_caller_with_hanging_unit_fails_at_deadline() {
    let harness = Harness::new(Arc::new(ScriptedWorkUnit::hanging()));
    let scan_id = harness.enqueue("page").await;
    let inline = harness.inline();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        inline.run(scan_id, Duration::from_secs(5)),
    )
    .await;
    assert!(outcome.is_err());

    tokio::time::sleep(Duration::from_secs(10)).await;

    let job = harness.store.job_for_scan(scan_id).unwrap();
    assert_eq!(job.status, ScanStatus::Failed);
    assert_eq!(job.last_error.as_deref(), Some("扫描执行超时: 5000ms"));
    assert_eq!(harness.status(scan_id).0, ScanStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_execution_does_not_depend_on_mark_running() {
    let harness = Harness::new(Arc::new(ScriptedWorkUnit::succeeding()));
    harness.store.set_fail_mark_running(true);

    let inline_scan = harness.enqueue("inline").await;
    harness
        .inline()
        .run(inline_scan, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(harness.status(inline_scan), (ScanStatus::Completed, 1.0));

    let background_scan = harness.enqueue("background").await;
    let handle = harness.background(1);
    harness.wait_until_terminal(&[background_scan]).await;
    assert_eq!(harness.status(background_scan), (ScanStatus::Completed, 1.0));

    harness.shutdown.cancel();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_is_clamped() {
    let harness = Harness::new(Arc::new(ScriptedWorkUnit::succeeding()));
    let scan_id = harness.enqueue("page").await;

    let handle = start_background(
        Arc::clone(&harness.executor),
        BackgroundOptions::new(1, Duration::ZERO),
        harness.shutdown.clone(),
    );
    harness.wait_until_terminal(&[scan_id]).await;
    assert_eq!(harness.status(scan_id), (ScanStatus::Completed, 1.0));

    harness.shutdown.cancel();
    handle.wait().await;
}
