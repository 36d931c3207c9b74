//! Template globals built from relation data
//!
//! Templates see a single tree:
//! - `{{ relations.consumed.NAME.app.KEY }}` - application data of the first joined peer
//! - `{{ relations.consumed.NAME.units[i].KEY }}` - data of every remote unit, in join order

use std::collections::BTreeMap;

use minijinja::Value;
use serde::Serialize;

/// Data published over one consumed relation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationData {
    /// Application-scoped data of the first joined peer
    pub app: BTreeMap<String, String>,
    /// Unit-scoped data of every remote unit
    pub units: Vec<BTreeMap<String, String>>,
}

impl RelationData {
    /// Create a new builder
    pub fn builder() -> RelationDataBuilder {
        RelationDataBuilder::default()
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("app".to_string(), aliased_map(&self.app));
        map.insert(
            "units".to_string(),
            Value::from(self.units.iter().map(aliased_map).collect::<Vec<_>>()),
        );
        Value::from_iter(map)
    }
}

/// Builder for RelationData
#[derive(Debug, Default)]
pub struct RelationDataBuilder {
    app: BTreeMap<String, String>,
    units: Vec<BTreeMap<String, String>>,
}

impl RelationDataBuilder {
    /// Add an application data field
    pub fn app(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.app.insert(key.into(), value.into());
        self
    }

    /// Append a remote unit's data
    pub fn unit<K, V>(mut self, data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.units
            .push(data.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Build the RelationData
    pub fn build(self) -> RelationData {
        RelationData {
            app: self.app,
            units: self.units,
        }
    }
}

/// Relations section of the template globals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationsContext {
    /// Consumed relations by name
    pub consumed: BTreeMap<String, RelationData>,
}

/// Everything a template can reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateGlobals {
    /// `{{ relations.* }}`
    pub relations: RelationsContext,
}

impl TemplateGlobals {
    /// Create a new builder for TemplateGlobals
    pub fn builder() -> TemplateGlobalsBuilder {
        TemplateGlobalsBuilder::default()
    }

    /// Convert to minijinja Value for rendering
    ///
    /// Keys containing hyphens are also exposed with underscores so that
    /// `relations.consumed.distributed-tracing` (normalized by the engine to
    /// `distributed_tracing`) resolves.
    pub fn to_value(&self) -> Value {
        let mut consumed = BTreeMap::new();
        for (name, data) in &self.relations.consumed {
            let value = data.to_value();
            if name.contains('-') {
                consumed.insert(name.replace('-', "_"), value.clone());
            }
            consumed.insert(name.clone(), value);
        }

        let mut relations = BTreeMap::new();
        relations.insert("consumed".to_string(), Value::from_iter(consumed));

        let mut map = BTreeMap::new();
        map.insert("relations".to_string(), Value::from_iter(relations));
        Value::from_iter(map)
    }

    /// JSON view of the globals, as shown to operators
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Builder for TemplateGlobals
#[derive(Debug, Default)]
pub struct TemplateGlobalsBuilder {
    consumed: BTreeMap<String, RelationData>,
}

impl TemplateGlobalsBuilder {
    /// Add a consumed relation with its data
    pub fn relation(mut self, name: impl Into<String>, data: RelationData) -> Self {
        self.consumed.insert(name.into(), data);
        self
    }

    /// Build the TemplateGlobals
    pub fn build(self) -> TemplateGlobals {
        TemplateGlobals {
            relations: RelationsContext {
                consumed: self.consumed,
            },
        }
    }
}

fn aliased_map(data: &BTreeMap<String, String>) -> Value {
    let mut map: BTreeMap<String, Value> = BTreeMap::new();
    for (key, value) in data {
        if key.contains('-') {
            map.insert(key.replace('-', "_"), Value::from(value.clone()));
        }
        map.insert(key.clone(), Value::from(value.clone()));
    }
    Value::from_iter(map)
}
