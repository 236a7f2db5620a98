use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Build, Pod};

/// Full listing of one resource type at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ObjectList<T> {
    /// Version marker to start a watch from.
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub items: Vec<T>,
}

impl<T> Default for ObjectList<T> {
    fn default() -> Self {
        Self {
            resource_version: String::new(),
            items: Vec::new(),
        }
    }
}

/// Listing of Builds.
pub type BuildList = ObjectList<Build>;

/// Listing of Pods.
pub type PodList = ObjectList<Pod>;

/// One change observed on a watch subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "object", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchEvent<T> {
    /// Object created.
    Added(T),
    /// Object changed.
    Modified(T),
    /// Object removed; carries its last known state.
    Deleted(T),
}

impl<T> WatchEvent<T> {
    /// The object carried by the event.
    pub fn object(&self) -> &T {
        match self {
            Self::Added(o) | Self::Modified(o) | Self::Deleted(o) => o,
        }
    }
}

/// Label selector. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: BTreeMap<String, String>,
}

impl Selector {
    /// Selector matching every object.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Adds an equality requirement.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.insert(key.into(), value.into());
        self
    }

    /// True if the selector places no constraint.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Checks a label set against the selector.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|have| have == v))
    }

    /// Query-string form, `k1=v1,k2=v2`.
    pub fn to_query(&self) -> String {
        self.requirements
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}
