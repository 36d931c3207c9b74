//! Stories about converging the workload container
//!
//! Rendering, file pushes, and the start/restart decision. The common thread:
//! the workload is only disturbed when what it would observe has changed.

use std::sync::Arc;

use warden_controller::relations::{RelationPeer, StaticRelations};
use warden_controller::status::messages;
use warden_controller::supervisor::SupervisorCall;
use warden_controller::{ControllerStatus, DesiredConfig, Trigger};

use super::helpers::*;

/// Story: Relation data flows into the workload environment
///
/// mongodb publishes its replica set URI; the desired configuration maps it
/// to SPRING_DATA_MONGODB_URI. The first pass starts the service with that
/// environment and ends Active.
#[tokio::test]
async fn story_relation_data_reaches_started_workload() {
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        mongodb_config(),
    );

    let outcome = harness.controller.handle(Trigger::Start).await;

    assert_eq!(outcome.status, ControllerStatus::Active);
    assert!(!outcome.deferred);
    assert_eq!(
        outcome.transitions,
        vec![
            ControllerStatus::maintenance(messages::EVALUATING_RESTART),
            ControllerStatus::maintenance(messages::STARTING),
            ControllerStatus::Active,
        ]
    );

    let env = harness
        .supervisor
        .running_environment("application")
        .await
        .expect("application should be running");
    assert_eq!(env["SPRING_DATA_MONGODB_URI"], "mongo://test_uri:12345/");

    let service = harness
        .supervisor
        .service("application")
        .await
        .expect("layer should declare the service");
    assert_eq!(service.command, "/cnb/process/web");
    assert_eq!(harness.sink.last().await, Some(ControllerStatus::Active));
}

/// Story: A template referencing missing data blocks without touching the workload
#[tokio::test]
async fn story_undefined_field_blocks_render() {
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        DesiredConfig {
            environment: vec![env(
                "MONGODB_PASSWORD",
                "{{ relations.consumed.mongodb.app.password }}",
            )],
            files: vec![],
        },
    );

    let outcome = harness.controller.handle(Trigger::ConfigChanged).await;

    assert_eq!(
        outcome.status,
        ControllerStatus::blocked("Cannot render environment variables")
    );
    assert!(!outcome.deferred);
    assert_eq!(harness.starts().await, 0);
    assert_eq!(harness.stops().await, 0);
    assert!(harness.controller.applied().current_environment.is_empty());
}

/// Story: A broken file template is reported separately from environment failures
#[tokio::test]
async fn story_malformed_file_template_blocks_render() {
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        DesiredConfig {
            environment: vec![env("SPRING_DATA_MONGODB_URI", MONGODB_URI_TEMPLATE)],
            files: vec![file("/workspace/application.properties", "uri={{ ")],
        },
    );

    let outcome = harness.controller.handle(Trigger::ConfigChanged).await;

    assert_eq!(outcome.status, ControllerStatus::blocked("Cannot render files"));
    assert!(harness.supervisor.calls().await.is_empty());
}

/// Story: Repeated triggers with unchanged inputs do not restart the workload
#[tokio::test]
async fn story_unchanged_inputs_cause_no_restart() {
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        mongodb_config(),
    );

    for trigger in [
        Trigger::Start,
        Trigger::ConfigChanged,
        Trigger::UpdateStatus,
        Trigger::RelationChanged("mongodb".to_string()),
    ] {
        let outcome = harness.controller.handle(trigger).await;
        assert_eq!(outcome.status, ControllerStatus::Active);
    }

    assert_eq!(harness.starts().await, 1);
    assert_eq!(harness.stops().await, 0);
}

/// Story: A changed relation value restarts the workload exactly once
#[tokio::test]
async fn story_changed_environment_restarts_once() {
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://old:1/"),
        mongodb_config(),
    );
    harness.controller.handle(Trigger::Start).await;

    harness
        .controller
        .set_relation_source(Arc::new(mongodb_relations("mongo://new:2/")));
    let outcome = harness
        .controller
        .handle(Trigger::RelationChanged("mongodb".to_string()))
        .await;

    assert_eq!(outcome.status, ControllerStatus::Active);
    assert!(outcome
        .transitions
        .contains(&ControllerStatus::maintenance(messages::RESTARTING)));

    let calls = harness.supervisor.calls().await;
    let lifecycle: Vec<&SupervisorCall> = calls
        .iter()
        .filter(|c| matches!(c, SupervisorCall::Start(_) | SupervisorCall::Stop(_)))
        .collect();
    assert_eq!(
        lifecycle,
        vec![
            &SupervisorCall::Start("application".to_string()),
            &SupervisorCall::Stop("application".to_string()),
            &SupervisorCall::Start("application".to_string()),
        ]
    );
    assert_eq!(
        harness.controller.applied().current_environment["SPRING_DATA_MONGODB_URI"],
        "mongo://new:2/"
    );
}

/// Story: Identical file content is pushed once across passes
#[tokio::test]
async fn story_identical_files_are_pushed_once() {
    let properties = "/workspace/application.properties";
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        DesiredConfig {
            environment: vec![],
            files: vec![file(
                properties,
                "spring.data.mongodb.uri={{ relations.consumed.mongodb.app.replica_set_uri }}\n",
            )],
        },
    );

    harness.controller.handle(Trigger::Start).await;
    harness.controller.handle(Trigger::ConfigChanged).await;
    harness.controller.handle(Trigger::UpdateStatus).await;

    assert_eq!(harness.pushes_to(properties).await, 1);
    assert_eq!(
        harness.supervisor.file(properties).await,
        Some(b"spring.data.mongodb.uri=mongo://test_uri:12345/".to_vec())
    );
}

/// Story: Changed file content is pushed but does not restart the workload
#[tokio::test]
async fn story_changed_file_is_pushed_without_restart() {
    let properties = "/workspace/application.properties";
    let desired = DesiredConfig {
        environment: vec![env("SPRING_DATA_MONGODB_URI", MONGODB_URI_TEMPLATE)],
        files: vec![file(
            properties,
            "uri={{ relations.consumed.mongodb.units[0].host }}\n",
        )],
    };
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        desired,
    );
    harness.controller.handle(Trigger::Start).await;

    let moved = StaticRelations::new().require("mongodb").join(
        "mongodb",
        RelationPeer::new("mongodb")
            .with_app_data("replica_set_uri", "mongo://test_uri:12345/")
            .with_unit("mongodb/0", [("host", "10.1.0.99")]),
    );
    harness.controller.set_relation_source(Arc::new(moved));
    harness
        .controller
        .handle(Trigger::RelationChanged("mongodb".to_string()))
        .await;

    assert_eq!(harness.pushes_to(properties).await, 2);
    assert_eq!(
        harness.supervisor.file(properties).await,
        Some(b"uri=10.1.0.99".to_vec())
    );
    assert_eq!(harness.stops().await, 0);
}

/// Story: A failed push surfaces as a container problem and is retried
///
/// The push error is reported with the offending path, the pass is deferred,
/// and nothing about the file is recorded as applied.
#[tokio::test]
async fn story_push_failure_defers_and_records_nothing() {
    let properties = "/workspace/application.properties";
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        DesiredConfig {
            environment: vec![],
            files: vec![file(properties, "server.port=8080\n")],
        },
    );
    harness.supervisor.fail_pushes_to(properties).await;

    let outcome = harness.controller.handle(Trigger::Start).await;

    assert!(outcome.deferred);
    assert_eq!(outcome.status.level(), "waiting");
    assert!(outcome
        .status
        .message()
        .starts_with("Cannot push file '/workspace/application.properties'"));
    assert!(harness
        .controller
        .applied()
        .rendered_file_hashes
        .is_empty());
    assert_eq!(harness.starts().await, 0);
}

/// Story: A workload that exited is started again even with the same environment
#[tokio::test]
async fn story_exited_workload_is_started_again() {
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        mongodb_config(),
    );
    harness.controller.handle(Trigger::Start).await;

    harness.supervisor.crash("application").await;
    let outcome = harness.controller.handle(Trigger::UpdateStatus).await;

    assert_eq!(outcome.status, ControllerStatus::Active);
    assert_eq!(harness.starts().await, 2);
    assert_eq!(harness.stops().await, 0);
}

/// Story: Hyphenated relation names are reachable from templates
#[tokio::test]
async fn story_hyphenated_relation_renders() {
    let relations = StaticRelations::new().require("distributed-tracing").join(
        "distributed-tracing",
        RelationPeer::new("jaeger")
            .with_unit("jaeger/0", [("agent-address", "10.1.241.157"), ("port", "6831")]),
    );
    let mut harness = Harness::new(
        spring_boot_container(),
        relations,
        DesiredConfig {
            environment: vec![
                env(
                    "JAEGER_AGENT_HOST",
                    "{{ relations.consumed.distributed-tracing.units[0]['agent-address'] }}",
                ),
                env(
                    "JAEGER_AGENT_PORT",
                    "{{ relations.consumed.distributed_tracing.units[0].port }}",
                ),
            ],
            files: vec![],
        },
    );

    let outcome = harness.controller.handle(Trigger::Start).await;
    assert_eq!(outcome.status, ControllerStatus::Active);

    let env = harness
        .supervisor
        .running_environment("application")
        .await
        .expect("application should be running");
    assert_eq!(env["JAEGER_AGENT_HOST"], "10.1.241.157");
    assert_eq!(env["JAEGER_AGENT_PORT"], "6831");
}

/// Story: Invalid desired configuration blocks until it is fixed
#[tokio::test]
async fn story_invalid_configuration_blocks_until_fixed() {
    let mut harness = Harness::new(
        spring_boot_container(),
        mongodb_relations("mongo://test_uri:12345/"),
        DesiredConfig {
            environment: vec![],
            files: vec![file("relative/app.yaml", "port: 8080")],
        },
    );

    let outcome = harness.controller.handle(Trigger::Start).await;
    assert_eq!(outcome.status.level(), "blocked");
    assert!(!outcome.deferred);

    harness.controller.set_desired_config(mongodb_config());
    let outcome = harness.controller.handle(Trigger::ConfigChanged).await;
    assert_eq!(outcome.status, ControllerStatus::Active);
}
