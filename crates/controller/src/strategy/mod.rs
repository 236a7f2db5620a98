//! Build strategies and the kind-based dispatcher.
//!
//! A strategy turns a Build into the pod that performs it. The dispatcher
//! picks the strategy registered for the Build's declared kind; the table is
//! fixed once built.

mod docker;
mod sti;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use buildflow_core::model::{Build, BuildStrategyType, Pod};

pub use docker::DockerBuildStrategy;
pub use sti::StiBuildStrategy;

use crate::error::{Error, Result};

/// Produces the pod specification for a Build.
pub trait BuildStrategy: Send + Sync {
    fn create_build_pod(&self, build: &Build) -> Result<Pod>;
}

/// Closed kind → strategy table.
#[derive(Clone, Default)]
pub struct TypeBasedStrategy {
    strategies: HashMap<BuildStrategyType, Arc<dyn BuildStrategy>>,
}

impl fmt::Debug for TypeBasedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.strategies.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("TypeBasedStrategy")
            .field("kinds", &kinds)
            .finish()
    }
}

impl TypeBasedStrategy {
    pub fn builder() -> TypeBasedStrategyBuilder {
        TypeBasedStrategyBuilder::default()
    }

    /// True if `kind` has a registered strategy.
    pub fn supports(&self, kind: &BuildStrategyType) -> bool {
        self.strategies.contains_key(kind)
    }
}

impl BuildStrategy for TypeBasedStrategy {
    /// Delegates to the strategy registered for the Build's kind and returns
    /// its result as is.
    fn create_build_pod(&self, build: &Build) -> Result<Pod> {
        let kind = &build.parameters.strategy.kind;
        match self.strategies.get(kind) {
            Some(strategy) => strategy.create_build_pod(build),
            None => Err(Error::UnconfiguredStrategy { kind: kind.clone() }),
        }
    }
}

/// Registers strategies before the table is frozen.
#[derive(Default)]
pub struct TypeBasedStrategyBuilder {
    strategies: HashMap<BuildStrategyType, Arc<dyn BuildStrategy>>,
}

impl TypeBasedStrategyBuilder {
    /// Registers `strategy` for `kind`, replacing an earlier registration.
    pub fn register(mut self, kind: BuildStrategyType, strategy: Arc<dyn BuildStrategy>) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    pub fn build(self) -> TypeBasedStrategy {
        TypeBasedStrategy {
            strategies: self.strategies,
        }
    }
}

/// Name of the pod that runs `build`.
pub(crate) fn build_pod_name(build: &Build) -> String {
    format!("build-{}", build.meta.id)
}
