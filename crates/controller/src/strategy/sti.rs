use std::collections::BTreeMap;

use buildflow_core::model::{Build, Container, ObjectMeta, Pod, PodSpec, RestartPolicy};

use super::{build_pod_name, BuildStrategy};
use crate::error::{Error, Result};

/// Runs source-to-image: the runner image assembles the source on top of the
/// builder image named by the Build.
#[derive(Debug, Clone)]
pub struct StiBuildStrategy {
    runner_image: String,
}

impl StiBuildStrategy {
    pub fn new(runner_image: impl Into<String>) -> Self {
        Self {
            runner_image: runner_image.into(),
        }
    }
}

impl BuildStrategy for StiBuildStrategy {
    fn create_build_pod(&self, build: &Build) -> Result<Pod> {
        let params = &build.parameters;
        let opts = params.strategy.sti_strategy.clone().unwrap_or_default();
        let builder_image = opts
            .builder_image
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| Error::InvalidBuild {
                build_id: build.meta.id.clone(),
                reason: "STI build does not name a builder image".to_string(),
            })?;

        let mut env = BTreeMap::new();
        env.insert("BUILD".to_string(), serde_json::to_string(build)?);
        env.insert("BUILDER_IMAGE".to_string(), builder_image);
        env.insert("SOURCE_URI".to_string(), params.source.git_uri.clone());
        if let Some(git_ref) = &params.source.git_ref {
            env.insert("SOURCE_REF".to_string(), git_ref.clone());
        }
        env.insert("OUTPUT_IMAGE".to_string(), params.output.image_tag.clone());
        if let Some(registry) = &params.output.registry {
            env.insert("OUTPUT_REGISTRY".to_string(), registry.clone());
        }
        env.insert("CLEAN".to_string(), opts.clean.to_string());

        let mut meta = ObjectMeta::named(build_pod_name(build));
        meta.labels.insert("build".to_string(), build.meta.id.clone());

        Ok(Pod {
            meta,
            spec: PodSpec {
                containers: vec![Container {
                    name: "sti-build".to_string(),
                    image: self.runner_image.clone(),
                    command: Vec::new(),
                    env,
                    privileged: true,
                }],
                restart_policy: RestartPolicy::Never,
            },
            ..Default::default()
        })
    }
}
