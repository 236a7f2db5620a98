use std::collections::BTreeMap;

use buildflow_core::model::{Build, Container, ObjectMeta, Pod, PodSpec, RestartPolicy};

use super::{build_pod_name, BuildStrategy};
use crate::error::Result;

/// Runs the Dockerfile build inside a privileged builder container.
#[derive(Debug, Clone)]
pub struct DockerBuildStrategy {
    builder_image: String,
}

impl DockerBuildStrategy {
    pub fn new(builder_image: impl Into<String>) -> Self {
        Self {
            builder_image: builder_image.into(),
        }
    }
}

impl BuildStrategy for DockerBuildStrategy {
    fn create_build_pod(&self, build: &Build) -> Result<Pod> {
        let params = &build.parameters;
        let mut env = BTreeMap::new();
        env.insert("BUILD".to_string(), serde_json::to_string(build)?);
        env.insert("SOURCE_URI".to_string(), params.source.git_uri.clone());
        if let Some(git_ref) = &params.source.git_ref {
            env.insert("SOURCE_REF".to_string(), git_ref.clone());
        }
        env.insert("OUTPUT_IMAGE".to_string(), params.output.image_tag.clone());
        if let Some(registry) = &params.output.registry {
            env.insert("OUTPUT_REGISTRY".to_string(), registry.clone());
        }
        if let Some(opts) = &params.strategy.docker_strategy {
            if opts.no_cache {
                env.insert("NO_CACHE".to_string(), "true".to_string());
            }
            if let Some(dir) = &opts.context_dir {
                env.insert("CONTEXT_DIR".to_string(), dir.clone());
            }
        }

        let mut meta = ObjectMeta::named(build_pod_name(build));
        meta.labels.insert("build".to_string(), build.meta.id.clone());

        Ok(Pod {
            meta,
            spec: PodSpec {
                containers: vec![Container {
                    name: "docker-build".to_string(),
                    image: self.builder_image.clone(),
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
