//! Stories about how the controller learns what kind of workload it runs

use warden_controller::relations::StaticRelations;
use warden_controller::status::messages;
use warden_controller::supervisor::{InMemorySupervisor, Supervisor};
use warden_controller::{ControllerStatus, DesiredConfig, Trigger, WorkloadKind};

use super::helpers::*;

/// Story: An image built without buildpacks is flagged and left alone
///
/// The launch descriptor does not exist, so the workload is classified as
/// not packaged. The status is Blocked and the trigger is not deferred since
/// redelivering it cannot change the image.
#[tokio::test]
async fn story_image_without_descriptor_is_blocked() {
    let mut harness = Harness::new(
        InMemorySupervisor::new(),
        StaticRelations::new(),
        DesiredConfig::default(),
    );

    let outcome = harness.controller.handle(Trigger::WorkloadReady).await;

    assert_eq!(
        outcome.status,
        ControllerStatus::blocked("Application not packaged with Cloud Native Buildpacks")
    );
    assert!(!outcome.deferred);
    assert_eq!(
        harness.controller.workload_kind(),
        Some(WorkloadKind::NotPackaged)
    );
    assert!(harness.supervisor.calls().await.is_empty());
}

/// Story: A plain java process is a JVM workload, a Spring launcher makes it Spring Boot
#[tokio::test]
async fn story_java_processes_are_classified() {
    let mut jvm = Harness::new(
        InMemorySupervisor::new().with_file(METADATA_PATH, JVM_DESCRIPTOR),
        StaticRelations::new(),
        DesiredConfig::default(),
    );
    let outcome = jvm.controller.handle(Trigger::Start).await;
    assert_eq!(outcome.status, ControllerStatus::Active);
    assert_eq!(jvm.controller.workload_kind(), Some(WorkloadKind::Jvm));

    let mut spring = Harness::new(
        spring_boot_container(),
        StaticRelations::new(),
        DesiredConfig::default(),
    );
    spring.controller.handle(Trigger::Start).await;
    assert_eq!(
        spring.controller.workload_kind(),
        Some(WorkloadKind::SpringBoot)
    );
}

/// Story: Classification waits for the supervisor instead of guessing
///
/// While the supervisor is unreachable the controller reports that it is
/// waiting and asks for the trigger to be redelivered. Once the supervisor
/// comes up, the next pass classifies and converges.
#[tokio::test]
async fn story_classification_waits_for_supervisor() {
    let supervisor = InMemorySupervisor::unavailable().with_file(METADATA_PATH, JVM_DESCRIPTOR);
    let mut harness = Harness::new(supervisor, StaticRelations::new(), DesiredConfig::default());

    let outcome = harness.controller.handle(Trigger::Start).await;
    assert!(outcome.deferred);
    assert_eq!(
        outcome.status,
        ControllerStatus::maintenance(messages::WAITING_FOR_SUPERVISOR)
    );
    assert_eq!(harness.controller.workload_kind(), None);

    harness.supervisor.set_available(true).await;
    let outcome = harness.controller.handle(Trigger::WorkloadReady).await;
    assert!(!outcome.deferred);
    assert_eq!(outcome.status, ControllerStatus::Active);
    assert_eq!(harness.controller.workload_kind(), Some(WorkloadKind::Jvm));
}

/// Story: A corrupt descriptor never produces a classification
#[tokio::test]
async fn story_corrupt_descriptor_leaves_workload_unclassified() {
    let supervisor = InMemorySupervisor::new().with_file(METADATA_PATH, "[[processes]\ncommand=");
    let mut harness = Harness::new(supervisor, StaticRelations::new(), DesiredConfig::default());

    let outcome = harness.controller.handle(Trigger::Start).await;

    assert!(outcome.deferred);
    assert_eq!(harness.controller.workload_kind(), None);
    assert_eq!(harness.starts().await, 0);
}

/// Story: The classification is memoized until a new container generation
///
/// Once classified, swapping the descriptor has no effect on ordinary
/// triggers. A workload-ready trigger signals a new container and forces
/// the descriptor to be read again.
#[tokio::test]
async fn story_classification_is_memoized_until_workload_ready() {
    let mut harness = Harness::new(
        InMemorySupervisor::new().with_file(METADATA_PATH, JVM_DESCRIPTOR),
        StaticRelations::new(),
        DesiredConfig::default(),
    );
    harness.controller.handle(Trigger::Start).await;
    assert_eq!(harness.controller.workload_kind(), Some(WorkloadKind::Jvm));

    harness
        .supervisor
        .push(METADATA_PATH, SPRING_BOOT_DESCRIPTOR.as_bytes())
        .await
        .expect("descriptor should be replaced");

    harness.controller.handle(Trigger::ConfigChanged).await;
    assert_eq!(harness.controller.workload_kind(), Some(WorkloadKind::Jvm));

    harness.controller.handle(Trigger::WorkloadReady).await;
    assert_eq!(
        harness.controller.workload_kind(),
        Some(WorkloadKind::SpringBoot)
    );
}
