use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity and bookkeeping shared by every remote resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Unique identifier assigned by the authority.
    pub id: String,
    /// Opaque version marker of the last write seen for this object.
    #[serde(default)]
    pub resource_version: String,
    /// Creation time (unix ms).
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Metadata carrying only an identifier.
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Anything the authority hands out with an identity.
pub trait Resource: Clone + Send + Sync + 'static {
    /// Object metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Identity used by caches and queues.
    fn id(&self) -> &str {
        &self.meta().id
    }

    /// Version marker of this snapshot.
    fn resource_version(&self) -> &str {
        &self.meta().resource_version
    }
}

/// Discriminant selecting which build strategy materializes a Build.
///
/// Tags the controller does not know are kept verbatim in `Other` so the
/// dispatcher can name them when it refuses the Build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildStrategyType {
    /// Build from a Dockerfile in the source repository.
    #[serde(rename = "Docker")]
    Docker,
    /// Source-to-image build on top of a builder image.
    #[serde(rename = "STI")]
    Sti,
    /// Unrecognised tag.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for BuildStrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => f.write_str("Docker"),
            Self::Sti => f.write_str("STI"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// Strategy selection plus the parameters of the selected strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildStrategy {
    #[serde(rename = "type")]
    pub kind: BuildStrategyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_strategy: Option<DockerStrategyOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sti_strategy: Option<StiStrategyOptions>,
}

impl BuildStrategy {
    /// Strategy of the given kind with no parameters.
    pub fn of(kind: BuildStrategyType) -> Self {
        Self {
            kind,
            docker_strategy: None,
            sti_strategy: None,
        }
    }
}

/// Docker strategy parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockerStrategyOptions {
    /// Build without the layer cache.
    #[serde(default)]
    pub no_cache: bool,
    /// Directory containing the Dockerfile, relative to the source root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
}

/// Source-to-image strategy parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StiStrategyOptions {
    /// Builder image to run the source through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_image: Option<String>,
    /// Skip incremental artifact reuse.
    #[serde(default)]
    pub clean: bool,
}

/// Where the source lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildSource {
    pub git_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
}

/// Where the built image goes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOutput {
    pub image_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

/// Everything the requester declared about a Build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildParameters {
    pub source: BuildSource,
    pub strategy: BuildStrategy,
    pub output: BuildOutput,
}

/// Lifecycle status of a Build. Owned by the reconciliation loop.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[default]
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
}

/// One requested build job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Build {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub parameters: BuildParameters,
    #[serde(default)]
    pub status: BuildStatus,
    /// Pod running this build, once one was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_id: Option<String>,
}

impl Resource for Build {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }
}

/// One container of a pod.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub privileged: bool,
}

/// Restart behaviour of a pod.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    #[default]
    Never,
    OnFailure,
    Always,
}

/// Desired state of a pod.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodSpec {
    pub containers: Vec<Container>,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
}

/// Observed phase of a pod.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// One unit of remote compute.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pod {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub spec: PodSpec,
    #[serde(default)]
    pub phase: PodPhase,
}

impl Resource for Pod {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }
}
