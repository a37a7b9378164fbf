//! Cancellation policy. Under `Enforce` (default) the scheduler checks the signal
//! before every `produce` call and every step; under `Cooperative` it never does.

use super::test_utils::{CountingPlan, Labeled, Recorder, Sleeper};
use planner::{
    boxed, CancellationPolicy, Context, FnProcedure, OneShotPlan, PlanError, Procedure,
    RunContext, Scheduler, Steps,
};
use std::time::Duration;

fn two_sleepers(seq: &Recorder) -> Steps {
    vec![
        boxed(Sleeper {
            label: "first".to_string(),
            duration: Duration::from_millis(210),
            seq: seq.clone(),
        }),
        boxed(Sleeper {
            label: "second".to_string(),
            duration: Duration::from_millis(210),
            seq: seq.clone(),
        }),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_enforced_deadline_stops_before_next_step() {
    let seq = Recorder::default();
    let ctx = Context::background().with_timeout(Duration::from_millis(200));
    let mut plan = OneShotPlan::new("fake", two_sleepers(&seq));
    let mut scheduler = Scheduler::new();

    let err = scheduler.execute(&ctx, &mut plan).await.unwrap_err();

    assert!(matches!(err, PlanError::DeadlineExceeded));
    assert_eq!(seq.entries(), vec!["first"]);
    assert_eq!(scheduler.steps_executed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cooperative_policy_ignores_deadline() {
    let seq = Recorder::default();
    let ctx = Context::background().with_timeout(Duration::from_millis(200));
    let mut plan = OneShotPlan::new("fake", two_sleepers(&seq));
    let mut scheduler = Scheduler::new().with_cancellation_policy(CancellationPolicy::Cooperative);

    let summary = scheduler.execute(&ctx, &mut plan).await.unwrap();

    assert_eq!(seq.entries(), vec!["first", "second"]);
    assert_eq!(summary.steps_executed, 2);
}

#[tokio::test]
async fn test_cancel_from_inside_a_step_stops_the_run() {
    let seq = Recorder::default();
    let ctx = Context::background();
    let canceller = ctx.clone();
    let cancel_step = FnProcedure::new("cancel", move |_ctx: &RunContext| {
        canceller.cancel();
        Ok(Vec::new())
    });
    let mut plan = CountingPlan::new(vec![
        vec![boxed(cancel_step), boxed(Labeled::new("skipped", &seq))],
        vec![boxed(Labeled::new("never", &seq))],
    ]);
    let mut scheduler = Scheduler::new();

    let err = scheduler.execute(&ctx, &mut plan).await.unwrap_err();

    assert!(matches!(err, PlanError::Cancelled));
    assert!(seq.entries().is_empty());
    assert_eq!(plan.calls(), 1);
}

#[tokio::test]
async fn test_cancellation_between_batches_skips_produce() {
    let seq = Recorder::default();
    let ctx = Context::background();
    let canceller = ctx.clone();
    let mut plan = CountingPlan::new(vec![
        vec![boxed(FnProcedure::new("cancel", move |_ctx: &RunContext| {
            canceller.cancel();
            Ok(Vec::new())
        }))],
        vec![boxed(Labeled::new("never", &seq))],
    ]);
    let mut scheduler = Scheduler::new();

    let err = scheduler.execute(&ctx, &mut plan).await.unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(plan.calls(), 1);
    assert_eq!(scheduler.steps_executed(), 1);
}

#[tokio::test]
async fn test_cooperative_policy_leaves_cancellation_to_steps() {
    struct Checking {
        seq: Recorder,
    }

    #[async_trait::async_trait]
    impl Procedure for Checking {
        fn name(&self) -> &str {
            "checking"
        }

        async fn execute(&mut self, ctx: &RunContext) -> Result<Steps, PlanError> {
            ctx.check()?;
            self.seq.record("checked");
            Ok(Vec::new())
        }
    }

    let seq = Recorder::default();
    let ctx = Context::background();
    ctx.cancel();
    let mut plan = OneShotPlan::new(
        "fake",
        vec![
            boxed(Labeled::new("unaware", &seq)),
            boxed(Checking { seq: seq.clone() }),
            boxed(Labeled::new("skipped", &seq)),
        ],
    );
    let mut scheduler = Scheduler::new().with_cancellation_policy(CancellationPolicy::Cooperative);

    let err = scheduler.execute(&ctx, &mut plan).await.unwrap_err();

    assert!(matches!(err, PlanError::Cancelled));
    assert_eq!(seq.entries(), vec!["unaware"]);
    assert_eq!(scheduler.steps_executed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_step_can_race_its_work_against_the_signal() {
    struct Waiting;

    #[async_trait::async_trait]
    impl Procedure for Waiting {
        fn name(&self) -> &str {
            "waiting"
        }

        async fn execute(&mut self, ctx: &RunContext) -> Result<Steps, PlanError> {
            ctx.run_until_cancelled(tokio::time::sleep(Duration::from_secs(3600)))
                .await?;
            Ok(Vec::new())
        }
    }

    let ctx = Context::background().with_timeout(Duration::from_millis(50));
    let mut plan = OneShotPlan::new("fake", vec![boxed(Waiting)]);
    let mut scheduler = Scheduler::new().with_cancellation_policy(CancellationPolicy::Cooperative);

    let err = scheduler.execute(&ctx, &mut plan).await.unwrap_err();

    assert!(matches!(err, PlanError::DeadlineExceeded));
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_applies_without_caller_deadline() {
    let seq = Recorder::default();
    let mut plan = OneShotPlan::new("fake", two_sleepers(&seq));
    let mut scheduler = Scheduler::new().with_run_timeout(Some(Duration::from_millis(100)));

    let err = scheduler
        .execute(&Context::background(), &mut plan)
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::DeadlineExceeded));
    assert_eq!(seq.entries(), vec!["first"]);
}

#[tokio::test]
async fn test_unbounded_caller_timeout_runs_to_completion() {
    let ctx = Context::background().with_timeout(Duration::MAX);
    let mut plan = OneShotPlan::new("fake", Vec::new());
    let mut scheduler = Scheduler::new();

    let summary = scheduler.execute(&ctx, &mut plan).await.unwrap();

    assert_eq!(summary.steps_executed, 0);
    assert_eq!(summary.batches, 0);
}

#[tokio::test]
async fn test_unbounded_run_timeout_runs_to_completion() {
    let seq = Recorder::default();
    let mut plan = OneShotPlan::new("fake", vec![boxed(Labeled::new("only", &seq))]);
    let mut scheduler = Scheduler::new().with_run_timeout(Some(Duration::MAX));

    let summary = scheduler
        .execute(&Context::background(), &mut plan)
        .await
        .unwrap();

    assert_eq!(summary.steps_executed, 1);
    assert_eq!(seq.entries(), vec!["only"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancelling_caller_token_stops_child_run() {
    let seq = Recorder::default();
    let parent = tokio_util::sync::CancellationToken::new();
    let ctx = Context::background().with_token(parent.child_token());
    let mut plan = OneShotPlan::new("fake", two_sleepers(&seq));
    let mut scheduler = Scheduler::new();

    let run = scheduler.execute(&ctx, &mut plan);
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        parent.cancel();
    };
    let (result, ()) = tokio::join!(run, cancel);

    assert!(matches!(result, Err(PlanError::Cancelled)));
    assert_eq!(seq.entries(), vec!["first"]);
}
