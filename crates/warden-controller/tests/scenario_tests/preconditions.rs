//! Stories about passes that cannot converge yet

use std::sync::Arc;

use warden_controller::relations::StaticRelations;
use warden_controller::{ControllerStatus, Trigger, WorkloadKind};

use super::helpers::*;

/// Story: A required relation with no peer blocks the pass and defers it
///
/// The database relation is declared but nothing has joined. The controller
/// reports exactly which relations are missing and asks for the trigger to be
/// redelivered, without touching the workload.
#[tokio::test]
async fn story_missing_relation_blocks_and_defers() {
    let mut harness = Harness::new(
        spring_boot_container(),
        StaticRelations::new().require("database"),
        mongodb_config(),
    );

    let outcome = harness.controller.handle(Trigger::Start).await;

    assert_eq!(
        outcome.status,
        ControllerStatus::blocked("Required consumed relations are missing: database")
    );
    assert!(outcome.deferred);
    assert!(harness.supervisor.calls().await.is_empty());
    // Relations are checked before the descriptor is read
    assert_eq!(harness.controller.workload_kind(), None);
}

/// Story: Missing relations are listed in declaration order
#[tokio::test]
async fn story_missing_relations_are_listed_in_order() {
    let mut harness = Harness::new(
        spring_boot_container(),
        StaticRelations::new()
            .require("mongodb")
            .require("tracing")
            .require("cache")
            .join("mongodb", mongodb_peer("mongo://a:1/")),
        mongodb_config(),
    );

    let outcome = harness.controller.handle(Trigger::Start).await;
    assert_eq!(
        outcome.status,
        ControllerStatus::blocked("Required consumed relations are missing: tracing, cache")
    );
}

/// Story: Redelivered triggers see the same verdict and cause no side effects
#[tokio::test]
async fn story_guard_is_idempotent_across_redeliveries() {
    let mut harness = Harness::new(
        spring_boot_container(),
        StaticRelations::new().require("database"),
        mongodb_config(),
    );

    let first = harness.controller.handle(Trigger::Start).await;
    let second = harness.controller.handle(Trigger::Start).await;
    let third = harness.controller.handle(Trigger::UpdateStatus).await;

    assert_eq!(first, second);
    assert_eq!(second.status, third.status);
    assert!(harness.supervisor.calls().await.is_empty());
    assert_eq!(harness.sink.published().await.len(), 3);
}

/// Story: Once the peer joins, the deferred trigger converges
#[tokio::test]
async fn story_relation_joining_unblocks_convergence() {
    let mut harness = Harness::new(
        spring_boot_container(),
        StaticRelations::new().require("mongodb"),
        mongodb_config(),
    );

    let outcome = harness.controller.handle(Trigger::Start).await;
    assert!(outcome.deferred);

    harness
        .controller
        .set_relation_source(Arc::new(mongodb_relations("mongo://test_uri:12345/")));
    let outcome = harness
        .controller
        .handle(Trigger::RelationJoined("mongodb".to_string()))
        .await;

    assert_eq!(outcome.status, ControllerStatus::Active);
    assert_eq!(
        harness.controller.workload_kind(),
        Some(WorkloadKind::SpringBoot)
    );
    assert_eq!(harness.starts().await, 1);
}

/// Story: A broken relation blocks again but leaves the workload running
#[tokio::test]
async fn story_broken_relation_blocks_without_stopping_workload() {
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        mongodb_config(),
    );
    harness.controller.handle(Trigger::Start).await;

    let mut relations = mongodb_relations("mongo://test_uri:12345/");
    relations.break_relation("mongodb");
    harness.controller.set_relation_source(Arc::new(relations));

    let outcome = harness
        .controller
        .handle(Trigger::RelationBroken("mongodb".to_string()))
        .await;

    assert_eq!(
        outcome.status,
        ControllerStatus::blocked("Required consumed relations are missing: mongodb")
    );
    assert_eq!(harness.stops().await, 0);
    assert_eq!(
        harness
            .supervisor
            .running_environment("application")
            .await
            .map(|env| env["SPRING_DATA_MONGODB_URI"].clone()),
        Some("mongo://test_uri:12345/".to_string())
    );
}
