//! Stories about state surviving a controller restart

use std::sync::Arc;

use warden_controller::status::RecordingStatusSink;
use warden_controller::store::{JsonFileStore, StateStore};
use warden_controller::supervisor::{InMemorySupervisor, SupervisorCall};
use warden_controller::{
    Context, Controller, ControllerSettings, ControllerStatus, DesiredConfig, Trigger,
    WorkloadKind,
};

use super::helpers::*;

fn controller_over(
    supervisor: Arc<InMemorySupervisor>,
    desired: DesiredConfig,
    store: JsonFileStore,
) -> Controller {
    let ctx = Context::new(
        supervisor,
        Arc::new(mongodb_relations("mongo://test_uri:12345/")),
    )
    .with_status_sink(Arc::new(RecordingStatusSink::new()));
    Controller::new(
        ControllerSettings::for_unit("spring-app/0"),
        desired,
        ctx,
        Box::new(store),
    )
    .expect("controller should be created")
}

/// Story: A restarted controller picks up where the previous one left off
///
/// The controller process restarts while the workload keeps running. The new
/// controller loads the persisted classification, environment, and file
/// hashes, so its first pass neither re-pushes files nor restarts the workload.
#[tokio::test]
async fn story_restarted_controller_does_not_disturb_workload() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let state_path = dir.path().join("warden-state.json");
    let properties = "/workspace/application.properties";
    let desired = DesiredConfig {
        environment: vec![env("SPRING_DATA_MONGODB_URI", MONGODB_URI_TEMPLATE)],
        files: vec![file(properties, "server.port=8080\n")],
    };
    let supervisor = Arc::new(spring_boot_container());

    let mut first = controller_over(
        supervisor.clone(),
        desired.clone(),
        JsonFileStore::new(&state_path),
    );
    assert_eq!(
        first.handle(Trigger::Start).await.status,
        ControllerStatus::Active
    );
    drop(first);

    let persisted = JsonFileStore::new(&state_path)
        .load()
        .expect("state should load");
    assert_eq!(persisted.workload_kind, Some(WorkloadKind::SpringBoot));
    assert!(persisted.applied.rendered_file_hashes.contains_key(properties));

    let calls_before = supervisor.calls().await.len();
    let mut second = controller_over(supervisor.clone(), desired, JsonFileStore::new(&state_path));
    assert_eq!(second.workload_kind(), Some(WorkloadKind::SpringBoot));

    let outcome = second.handle(Trigger::Start).await;
    assert_eq!(outcome.status, ControllerStatus::Active);

    let calls = supervisor.calls().await;
    assert_eq!(
        calls[calls_before..].to_vec(),
        vec![SupervisorCall::AddLayer("cnb_lifecycle".to_string())]
    );
}
