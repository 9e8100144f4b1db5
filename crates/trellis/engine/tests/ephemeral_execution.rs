use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use trellis_engine::{
    bind_instance, instance_state, instance_summaries_for_run, publish_workflow, resolve_run,
    test_execute, CaptureSink, CreationMode, DebuggerHook, DebuggerRegistry, EngineError,
    EngineResult, HarnessContext, TestRunOptions, WorkflowRegistry,
};
use trellis_store::{InMemoryStore, RunStore};
use trellis_types::{
    canonical, RunId, RunState, TaskContext, TaskDefinition, TaskFailure, TaskHandler, TaskId,
    TaskInstanceState, TriggerChannel, TriggerMeta, WorkflowDefinition, WorkflowError, WorkflowId,
    NOT_MAPPED,
};

struct EchoBody;

#[async_trait]
impl TaskHandler for EchoBody {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskFailure> {
        ctx.print("echo done");
        Ok(())
    }
}

struct LeakyBody;

#[async_trait]
impl TaskHandler for LeakyBody {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskFailure> {
        ctx.print("uploading with api_key=sk-live-12345");
        ctx.print("upload complete");
        Ok(())
    }
}

struct FailingBody;

#[async_trait]
impl TaskHandler for FailingBody {
    async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskFailure> {
        Err(TaskFailure::new("shard checksum mismatch"))
    }
}

struct ShardBody;

#[async_trait]
impl TaskHandler for ShardBody {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskFailure> {
        ctx.print(format!("processing shard {}", ctx.map_index));
        Ok(())
    }
}

struct FlagHook {
    available: bool,
    entered: Arc<AtomicBool>,
}

impl DebuggerHook for FlagHook {
    fn name(&self) -> &str {
        "flag"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn enter(&self) -> EngineResult<()> {
        self.entered.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn make_workflow() -> WorkflowDefinition {
    let mut workflow = WorkflowDefinition::new("billing", "Billing Export");
    workflow
        .add_task(TaskDefinition::new("echo", EchoBody))
        .expect("task registration must succeed");
    workflow
        .add_task(TaskDefinition::new("leaky", LeakyBody))
        .expect("task registration must succeed");
    workflow
        .add_task(TaskDefinition::new("flaky", FailingBody))
        .expect("task registration must succeed");
    workflow
        .add_task(TaskDefinition::new("shard", ShardBody).with_fan_out())
        .expect("task registration must succeed");
    workflow
}

async fn setup() -> (Arc<InMemoryStore>, WorkflowRegistry, WorkflowId) {
    let store = Arc::new(InMemoryStore::new());
    let workflow = make_workflow();
    publish_workflow(store.clone(), &workflow)
        .await
        .expect("publish must succeed");

    let mut registry = WorkflowRegistry::new();
    let id = registry
        .register(workflow)
        .expect("registration must succeed");
    (store, registry, id)
}

async fn seed_run(store: &InMemoryStore, workflow_id: &WorkflowId, run_id: &str) {
    store
        .get_or_create_run(
            workflow_id,
            &RunId::new(run_id),
            None,
            None,
            chrono::Utc::now(),
            TriggerMeta::manual(TriggerChannel::Cli, None),
        )
        .await
        .expect("seeding a run must succeed");
}

fn quiet_context() -> HarnessContext {
    HarnessContext::new().with_sink(Box::new(CaptureSink::new()))
}

#[tokio::test]
async fn execution_cleans_up_transient_run() {
    let (store, registry, id) = setup().await;
    let mut ctx = quiet_context();

    let report = test_execute(
        &mut ctx,
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        TestRunOptions::default(),
    )
    .await
    .expect("execution must succeed");

    assert!(report.run_created);
    assert!(report.run_id.0.starts_with("__trellis_temporary_run_"));
    assert_eq!(report.state, Some(TaskInstanceState::Success));
    assert_eq!(report.output, vec!["echo done"]);
    assert_eq!(store.run_count(), 0);
    assert_eq!(store.instance_count(), 0);
}

#[tokio::test]
async fn execution_cleans_up_after_failure() {
    let (store, registry, id) = setup().await;
    let mut ctx = quiet_context();

    let error = test_execute(
        &mut ctx,
        store.clone(),
        &registry,
        &id,
        &TaskId::new("flaky"),
        TestRunOptions::default(),
    )
    .await
    .expect_err("the task failure must surface");

    assert!(error.is_task_failure());
    assert!(error.to_string().contains("shard checksum mismatch"));
    assert_eq!(store.run_count(), 0);
    assert_eq!(store.instance_count(), 0);
}

#[tokio::test]
async fn binding_failure_still_deletes_the_transient_run() {
    // Registered but never published: instance creation has no version
    // to bind against and fails after the run exists.
    let store = Arc::new(InMemoryStore::new());
    let mut registry = WorkflowRegistry::new();
    let id = registry
        .register(make_workflow())
        .expect("registration must succeed");
    let mut ctx = quiet_context();

    let error = test_execute(
        &mut ctx,
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        TestRunOptions::default(),
    )
    .await
    .expect_err("binding must fail without a published version");

    assert!(matches!(
        error,
        EngineError::Workflow(WorkflowError::InvalidState(_))
    ));
    assert_eq!(store.run_count(), 0);
    assert_eq!(store.instance_count(), 0);
}

#[tokio::test]
async fn named_run_is_reused_and_survives() {
    let (store, registry, id) = setup().await;
    let mut ctx = quiet_context();
    seed_run(&store, &id, "nightly").await;

    let report = test_execute(
        &mut ctx,
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        TestRunOptions {
            identifier: Some("nightly".to_string()),
            ..TestRunOptions::default()
        },
    )
    .await
    .expect("execution must succeed");

    assert!(!report.run_created);
    assert_eq!(report.run_id, RunId::new("nightly"));
    assert_eq!(store.run_count(), 1);

    // The surviving instance is observable through the state query.
    let state = instance_state(
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        NOT_MAPPED,
        "nightly",
    )
    .await
    .expect("state lookup must succeed");
    assert_eq!(state, Some(TaskInstanceState::Success));
}

#[tokio::test]
async fn memory_resolution_leaves_store_untouched() {
    let (store, registry, id) = setup().await;

    let (record, created) = resolve_run(
        store.clone(),
        &registry,
        &id,
        Some("2026-04-01T00:00:00"),
        CreationMode::Memory,
        TriggerChannel::Cli,
    )
    .await
    .expect("memory resolution must succeed");

    assert!(created);
    assert_eq!(record.state, RunState::Running);
    assert_eq!(
        record.logical_instant.map(|instant| instant.to_rfc3339()),
        Some("2026-04-01T00:00:00+00:00".to_string())
    );
    assert_eq!(store.run_count(), 0);
}

#[tokio::test]
async fn missing_identifier_with_disabled_creation_fails() {
    let (store, registry, id) = setup().await;

    let error = resolve_run(
        store,
        &registry,
        &id,
        None,
        CreationMode::Disabled,
        TriggerChannel::Cli,
    )
    .await
    .expect_err("resolution must fail");

    assert!(matches!(
        error,
        EngineError::Workflow(WorkflowError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn binding_is_idempotent_for_named_runs() {
    let (store, registry, id) = setup().await;
    seed_run(&store, &id, "batch").await;

    let (first, first_created) = bind_instance(
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        NOT_MAPPED,
        Some("batch"),
        CreationMode::Durable,
        None,
    )
    .await
    .expect("first bind must succeed");

    let (second, second_created) = bind_instance(
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        NOT_MAPPED,
        Some("batch"),
        CreationMode::Durable,
        None,
    )
    .await
    .expect("second bind must succeed");

    assert!(!first_created);
    assert!(!second_created);
    assert_eq!(store.instance_count(), 1);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.version_id, first.version_id);
    assert_eq!(second.created_at, first.created_at);

    // Bound but never executed: no state yet.
    let state = instance_state(
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        NOT_MAPPED,
        "batch",
    )
    .await
    .expect("state lookup must succeed");
    assert_eq!(state, None);
}

#[tokio::test]
async fn canonical_round_trip_preserves_task_lookup() {
    let (store, registry, id) = setup().await;
    seed_run(&store, &id, "golden").await;

    let original = registry.get(&id).expect("workflow must be registered");
    let encoded = canonical::encode_workflow(original).expect("encoding must succeed");
    let decoded = canonical::decode_workflow(&encoded).expect("decoding must succeed");

    assert_eq!(decoded.id, original.id);
    assert_eq!(decoded.task_ids(), original.task_ids());
    let shard = decoded
        .task(&TaskId::new("shard"))
        .expect("shard must survive the round trip");
    assert!(shard.fan_out);
    assert!(!shard.handler.is_bound());

    // Resolving through the decoded definition finds the same run.
    let mut second_registry = WorkflowRegistry::new();
    let decoded_id = second_registry
        .register(decoded)
        .expect("decoded registration must succeed");
    let (via_original, _) = resolve_run(
        store.clone(),
        &registry,
        &id,
        Some("golden"),
        CreationMode::Disabled,
        TriggerChannel::Cli,
    )
    .await
    .expect("resolution must succeed");
    let (via_decoded, _) = resolve_run(
        store.clone(),
        &second_registry,
        &decoded_id,
        Some("golden"),
        CreationMode::Disabled,
        TriggerChannel::Cli,
    )
    .await
    .expect("resolution must succeed");

    assert_eq!(via_original.run_id, via_decoded.run_id);
    assert_eq!(via_original.created_at, via_decoded.created_at);
}

#[tokio::test]
async fn output_is_masked_and_marker_applied() {
    let (store, registry, id) = setup().await;
    let capture = CaptureSink::new();
    let mut ctx = HarnessContext::new().with_sink(Box::new(capture.clone()));
    let mut env = BTreeMap::new();
    env.insert("TRELLIS_E2E_TEST_ONLY".to_string(), "yes".to_string());

    let report = test_execute(
        &mut ctx,
        store,
        &registry,
        &id,
        &TaskId::new("leaky"),
        TestRunOptions {
            env_overrides: env,
            ..TestRunOptions::default()
        },
    )
    .await
    .expect("execution must succeed");

    assert_eq!(
        report.output,
        vec!["uploading with api_key=[REDACTED]", "upload complete"]
    );
    assert_eq!(capture.lines(), report.output);
    assert_eq!(std::env::var("TRELLIS_TEST_MODE").unwrap(), "true");
    assert_eq!(std::env::var("TRELLIS_E2E_TEST_ONLY").unwrap(), "yes");
}

#[tokio::test]
async fn post_mortem_uses_first_available_debugger() {
    let (store, registry, id) = setup().await;
    let mut ctx = quiet_context();
    let entered = Arc::new(AtomicBool::new(false));
    let skipped = Arc::new(AtomicBool::new(false));
    let mut debuggers = DebuggerRegistry::new();
    debuggers.register(Box::new(FlagHook {
        available: false,
        entered: skipped.clone(),
    }));
    debuggers.register(Box::new(FlagHook {
        available: true,
        entered: entered.clone(),
    }));
    ctx.set_debuggers(debuggers);

    let error = test_execute(
        &mut ctx,
        store.clone(),
        &registry,
        &id,
        &TaskId::new("flaky"),
        TestRunOptions {
            post_mortem: true,
            ..TestRunOptions::default()
        },
    )
    .await
    .expect_err("the task failure must surface");

    assert!(error.is_task_failure());
    assert!(entered.load(Ordering::SeqCst));
    assert!(!skipped.load(Ordering::SeqCst));
    assert_eq!(store.run_count(), 0);
}

#[tokio::test]
async fn post_mortem_without_usable_debugger_is_fatal() {
    let (store, registry, id) = setup().await;
    let mut ctx = quiet_context();
    let mut debuggers = DebuggerRegistry::new();
    debuggers.register(Box::new(FlagHook {
        available: false,
        entered: Arc::new(AtomicBool::new(false)),
    }));
    ctx.set_debuggers(debuggers);

    let error = test_execute(
        &mut ctx,
        store.clone(),
        &registry,
        &id,
        &TaskId::new("flaky"),
        TestRunOptions {
            post_mortem: true,
            ..TestRunOptions::default()
        },
    )
    .await
    .expect_err("debugger resolution must fail");

    assert!(matches!(error, EngineError::DebuggerUnavailable(_)));
    // Cleanup is not skipped by the debugger failure.
    assert_eq!(store.run_count(), 0);
}

#[tokio::test]
async fn summaries_show_map_index_only_for_mapped_runs() {
    let (store, registry, id) = setup().await;
    seed_run(&store, &id, "mapped-run").await;
    seed_run(&store, &id, "plain-run").await;

    for map_index in [0, 1] {
        bind_instance(
            store.clone(),
            &registry,
            &id,
            &TaskId::new("shard"),
            map_index,
            Some("mapped-run"),
            CreationMode::Durable,
            None,
        )
        .await
        .expect("bind must succeed");
    }
    bind_instance(
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        NOT_MAPPED,
        Some("mapped-run"),
        CreationMode::Durable,
        None,
    )
    .await
    .expect("bind must succeed");
    bind_instance(
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        NOT_MAPPED,
        Some("plain-run"),
        CreationMode::Durable,
        None,
    )
    .await
    .expect("bind must succeed");

    let mapped = instance_summaries_for_run(store.clone(), &id, "mapped-run")
        .await
        .expect("summaries must succeed");
    assert_eq!(mapped.len(), 3);
    let echo = mapped
        .iter()
        .find(|summary| summary.task_id == TaskId::new("echo"))
        .expect("echo summary must exist");
    assert_eq!(echo.map_index, None);
    let shard_indexes: Vec<_> = mapped
        .iter()
        .filter(|summary| summary.task_id == TaskId::new("shard"))
        .map(|summary| summary.map_index)
        .collect();
    assert_eq!(shard_indexes, vec![Some(0), Some(1)]);

    let plain = instance_summaries_for_run(store.clone(), &id, "plain-run")
        .await
        .expect("summaries must succeed");
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].map_index, None);
}

#[tokio::test]
async fn map_index_contract_is_enforced() {
    let (store, registry, id) = setup().await;
    seed_run(&store, &id, "batch-2").await;

    let fan_out_without_index = bind_instance(
        store.clone(),
        &registry,
        &id,
        &TaskId::new("shard"),
        NOT_MAPPED,
        Some("batch-2"),
        CreationMode::Durable,
        None,
    )
    .await
    .expect_err("fan-out task without a map index must fail");
    assert!(matches!(
        fan_out_without_index,
        EngineError::Workflow(WorkflowError::RuntimeFault(_))
    ));

    let plain_with_index = bind_instance(
        store.clone(),
        &registry,
        &id,
        &TaskId::new("echo"),
        0,
        Some("batch-2"),
        CreationMode::Durable,
        None,
    )
    .await
    .expect_err("plain task with a map index must fail");
    assert!(matches!(
        plain_with_index,
        EngineError::Workflow(WorkflowError::RuntimeFault(_))
    ));
}
