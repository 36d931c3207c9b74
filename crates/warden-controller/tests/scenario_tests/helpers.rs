//! Shared fixtures for scenario tests

use std::sync::Arc;

use warden_controller::relations::{RelationPeer, StaticRelations};
use warden_controller::status::RecordingStatusSink;
use warden_controller::store::{MemoryStore, StateStore};
use warden_controller::supervisor::{InMemorySupervisor, SupervisorCall};
use warden_controller::{
    Context, Controller, ControllerSettings, DesiredConfig, EnvironmentTemplate, FileTemplate,
};

pub const METADATA_PATH: &str = "/layers/config/metadata.toml";

pub const SPRING_BOOT_DESCRIPTOR: &str = r#"
[[processes]]
type = "web"
command = "java"
args = ["org.springframework.boot.loader.JarLauncher"]
direct = true
"#;

pub const JVM_DESCRIPTOR: &str = r#"
[[processes]]
type = "web"
command = "java"
args = ["-jar", "app.jar"]
"#;

pub const MONGODB_URI_TEMPLATE: &str = "{{relations.consumed.mongodb.app.replica_set_uri}}";

/// A packaged Spring Boot workload container
pub fn spring_boot_container() -> InMemorySupervisor {
    InMemorySupervisor::new().with_file(METADATA_PATH, SPRING_BOOT_DESCRIPTOR)
}

/// A mongodb peer publishing its replica set URI
pub fn mongodb_peer(uri: &str) -> RelationPeer {
    RelationPeer::new("mongodb")
        .with_app_data("replica_set_uri", uri)
        .with_unit("mongodb/0", [("host", "10.1.0.10")])
}

/// Relations with mongodb required and joined
pub fn mongodb_relations(uri: &str) -> StaticRelations {
    StaticRelations::new()
        .require("mongodb")
        .join("mongodb", mongodb_peer(uri))
}

pub fn env(name: &str, template: &str) -> EnvironmentTemplate {
    EnvironmentTemplate {
        name: name.to_string(),
        template: template.to_string(),
    }
}

pub fn file(path: &str, template: &str) -> FileTemplate {
    FileTemplate {
        path: path.to_string(),
        template: template.to_string(),
    }
}

/// Desired config exporting the mongodb URI
pub fn mongodb_config() -> DesiredConfig {
    DesiredConfig {
        environment: vec![env("SPRING_DATA_MONGODB_URI", MONGODB_URI_TEMPLATE)],
        files: vec![],
    }
}

/// A controller wired to an in-memory container
pub struct Harness {
    pub controller: Controller,
    pub supervisor: Arc<InMemorySupervisor>,
    pub sink: Arc<RecordingStatusSink>,
}

impl Harness {
    pub fn new(
        supervisor: InMemorySupervisor,
        relations: StaticRelations,
        desired: DesiredConfig,
    ) -> Self {
        Self::with_store(supervisor, relations, desired, Box::new(MemoryStore::new()))
    }

    pub fn with_store(
        supervisor: InMemorySupervisor,
        relations: StaticRelations,
        desired: DesiredConfig,
        store: Box<dyn StateStore>,
    ) -> Self {
        let supervisor = Arc::new(supervisor);
        let sink = Arc::new(RecordingStatusSink::new());
        let ctx = Context::new(supervisor.clone(), Arc::new(relations))
            .with_status_sink(sink.clone());
        let controller = Controller::new(
            ControllerSettings::for_unit("spring-app/0"),
            desired,
            ctx,
            store,
        )
        .expect("controller should be created");

        Self {
            controller,
            supervisor,
            sink,
        }
    }

    pub async fn starts(&self) -> usize {
        self.supervisor
            .count(|c| matches!(c, SupervisorCall::Start(_)))
            .await
    }

    pub async fn stops(&self) -> usize {
        self.supervisor
            .count(|c| matches!(c, SupervisorCall::Stop(_)))
            .await
    }

    pub async fn pushes_to(&self, path: &str) -> usize {
        self.supervisor
            .count(|c| matches!(c, SupervisorCall::Push(p) if p == path))
            .await
    }
}
