//! Relation data aggregation
//!
//! Peers related to this controller publish flat string maps at two levels:
//! once per application and once per unit. Templates see them as
//! `relations.consumed.<name>.app` and `relations.consumed.<name>.units`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_common::template::{RelationData, TemplateGlobals};
use warden_common::Error;

/// Data published by one unit of a peer application
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RelationUnit {
    /// Unit name, e.g. `mongodb/0`
    pub name: String,
    /// Published key/value pairs
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// A peer application joined on a relation
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelationPeer {
    /// Peer application name
    pub app: String,
    /// Application-level data; `None` when the peer has not published any
    #[serde(default)]
    pub app_data: Option<BTreeMap<String, String>>,
    /// Units of the peer, in join order
    #[serde(default)]
    pub units: Vec<RelationUnit>,
}

impl RelationPeer {
    /// A peer with no data yet
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            ..Default::default()
        }
    }

    /// Set one application data field
    pub fn with_app_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.app_data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Add a unit with its data
    pub fn with_unit<K, V>(
        mut self,
        name: impl Into<String>,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.units.push(RelationUnit {
            name: name.into(),
            data: data.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        });
        self
    }
}

/// Where relation data comes from
pub trait RelationSource: Send + Sync {
    /// Relations this controller requires, in declaration order
    fn required_relations(&self) -> Vec<String>;

    /// Peers currently joined on a relation, in join order
    fn joined_peers(&self, relation: &str) -> Vec<RelationPeer>;
}

/// A fixed snapshot of relation data
///
/// Loaded from YAML or JSON by the CLI, and built in code by tests.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StaticRelations {
    /// Required relation names, in declaration order
    #[serde(default)]
    pub required: Vec<String>,
    /// Joined peers per relation
    #[serde(default)]
    pub joined: BTreeMap<String, Vec<RelationPeer>>,
}

impl StaticRelations {
    /// An empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required relation
    pub fn require(mut self, relation: impl Into<String>) -> Self {
        self.required.push(relation.into());
        self
    }

    /// Join a peer on a relation
    pub fn join(mut self, relation: impl Into<String>, peer: RelationPeer) -> Self {
        self.joined.entry(relation.into()).or_default().push(peer);
        self
    }

    /// Remove every peer of a relation
    pub fn break_relation(&mut self, relation: &str) {
        self.joined.remove(relation);
    }

    /// Parse a snapshot from YAML or JSON text
    pub fn parse(content: &str) -> Result<Self, Error> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::serialization_for_kind("StaticRelations", e.to_string()))
    }

    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::serialization_for_kind(
                "StaticRelations",
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        Self::parse(&content)
    }
}

impl RelationSource for StaticRelations {
    fn required_relations(&self) -> Vec<String> {
        self.required.clone()
    }

    fn joined_peers(&self, relation: &str) -> Vec<RelationPeer> {
        self.joined.get(relation).cloned().unwrap_or_default()
    }
}

/// Required relations with no joined peer, in declaration order
pub fn missing_relations(source: &dyn RelationSource) -> Vec<String> {
    source
        .required_relations()
        .into_iter()
        .filter(|name| source.joined_peers(name).is_empty())
        .collect()
}

/// Build the template globals from every required relation
///
/// `own_unit` is excluded from unit data. A relation with no joined peer is
/// a `NotYetReady` error; callers normally run the precondition guard first.
pub fn aggregate(source: &dyn RelationSource, own_unit: &str) -> Result<TemplateGlobals, Error> {
    let mut globals = TemplateGlobals::builder();

    for name in source.required_relations() {
        let peers = source.joined_peers(&name);
        let Some(first) = peers.first() else {
            return Err(Error::not_yet_ready(format!(
                "No remote application is joined on the {} relation, cannot look up application data",
                name
            )));
        };

        let app = first.app_data.clone().unwrap_or_default();
        let units: Vec<BTreeMap<String, String>> = peers
            .iter()
            .flat_map(|peer| peer.units.iter())
            .filter(|unit| unit.name != own_unit)
            .map(|unit| unit.data.clone())
            .collect();

        debug!(
            relation = %name,
            peers = peers.len(),
            units = units.len(),
            "aggregated relation data"
        );
        globals = globals.relation(name, RelationData { app, units });
    }

    Ok(globals.build())
}
