//! Wires sources, sinks and background tasks into a [`BuildController`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use buildflow_core::api::{PodList, Selector};
use buildflow_core::model::{Build, BuildStrategyType, Pod};
use tokio::task::JoinHandle;
use tracing::info;

use crate::client::http::HttpAuthority;
use crate::client::{BuildClient, PodClient};
use crate::config::{ControllerConfig, DEFAULT_POD_POLL_INTERVAL, DEFAULT_RELIST_BACKOFF};
use crate::error::Result;
use crate::fifo::Fifo;
use crate::poller::{Enumerator, PollSource, Poller};
use crate::reflector::Reflector;
use crate::source::BuildListWatch;
use crate::store::{Cache, StoreReader};
use crate::strategy::{BuildStrategy, DockerBuildStrategy, StiBuildStrategy, TypeBasedStrategy};

/// Everything the reconciliation loop consumes.
pub struct BuildController {
    /// Latest known Builds, by id.
    pub build_store: Arc<dyn StoreReader<Build>>,
    /// Writes Build status back to the authority.
    pub build_updater: Arc<dyn BuildClient>,
    /// Creates pods on the authority.
    pub pod_creator: Arc<dyn PodClient>,
    /// Newly observed Builds, one at a time.
    pub next_build: NextItem<Build>,
    /// Newly observed Pods, one at a time.
    pub next_pod: NextItem<Pod>,
    /// Resolves the pod for a Build.
    pub build_strategy: Arc<dyn BuildStrategy>,
    tasks: Vec<JoinHandle<()>>,
}

impl BuildController {
    /// Aborts the background synchronization tasks.
    pub fn stop_sync(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Blocking accessor bound to one work queue.
pub struct NextItem<T> {
    queue: Arc<Fifo<T>>,
}

impl<T> NextItem<T> {
    fn new(queue: Arc<Fifo<T>>) -> Self {
        Self { queue }
    }

    /// Waits for and removes the next item.
    pub async fn next(&self) -> T {
        self.queue.pop().await
    }

    /// Items currently waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Builds a [`BuildController`] with its synchronization tasks running.
pub struct ControllerFactory {
    build_client: Arc<dyn BuildClient>,
    pod_client: Arc<dyn PodClient>,
    strategy: TypeBasedStrategy,
    pod_poll_interval: Duration,
    relist_backoff: Duration,
}

impl ControllerFactory {
    pub fn new(
        build_client: Arc<dyn BuildClient>,
        pod_client: Arc<dyn PodClient>,
        strategy: TypeBasedStrategy,
    ) -> Self {
        Self {
            build_client,
            pod_client,
            strategy,
            pod_poll_interval: DEFAULT_POD_POLL_INTERVAL,
            relist_backoff: DEFAULT_RELIST_BACKOFF,
        }
    }

    /// Factory talking to the authority over HTTP with the built-in Docker
    /// and STI strategies.
    ///
    /// Fails when the authority client cannot be constructed, e.g. a
    /// malformed URL or a required token that is missing, or when a timing
    /// setting is zero.
    pub fn from_config(cfg: &ControllerConfig) -> Result<Self> {
        cfg.validate()?;
        let authority = Arc::new(HttpAuthority::from_config(cfg)?);
        let strategy = TypeBasedStrategy::builder()
            .register(
                BuildStrategyType::Docker,
                Arc::new(DockerBuildStrategy::new(cfg.docker_builder_image.clone())),
            )
            .register(
                BuildStrategyType::Sti,
                Arc::new(StiBuildStrategy::new(cfg.sti_runner_image.clone())),
            )
            .build();
        Ok(Self::new(authority.clone(), authority, strategy)
            .with_pod_poll_interval(cfg.pod_poll_interval)
            .with_relist_backoff(cfg.relist_backoff))
    }

    pub fn with_pod_poll_interval(mut self, interval: Duration) -> Self {
        self.pod_poll_interval = interval;
        self
    }

    pub fn with_relist_backoff(mut self, backoff: Duration) -> Self {
        self.relist_backoff = backoff;
        self
    }

    /// Starts the Build cache reflector, the Build queue reflector and the
    /// pod poller, then returns the controller handles.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(&self) -> BuildController {
        let build_store: Arc<Cache<Build>> = Arc::new(Cache::new());
        let cache_sync = Reflector::new(
            "build-cache",
            Arc::new(BuildListWatch::new(Arc::clone(&self.build_client))),
            Arc::clone(&build_store),
            self.relist_backoff,
        )
        .run();

        let build_queue: Arc<Fifo<Build>> = Arc::new(Fifo::new());
        let queue_sync = Reflector::new(
            "build-queue",
            Arc::new(BuildListWatch::new(Arc::clone(&self.build_client))),
            Arc::clone(&build_queue),
            self.relist_backoff,
        )
        .run();

        let pod_queue: Arc<Fifo<Pod>> = Arc::new(Fifo::new());
        let pod_sync = Poller::new(
            "pods",
            Arc::new(PodPollSource {
                client: Arc::clone(&self.pod_client),
            }),
            Arc::clone(&pod_queue),
            self.pod_poll_interval,
        )
        .run();

        info!(strategies = ?self.strategy, "build controller composed");

        BuildController {
            build_store,
            build_updater: Arc::clone(&self.build_client),
            pod_creator: Arc::clone(&self.pod_client),
            next_build: NextItem::new(build_queue),
            next_pod: NextItem::new(pod_queue),
            build_strategy: Arc::new(self.strategy.clone()),
            tasks: vec![cache_sync, queue_sync, pod_sync],
        }
    }
}

/// Lists every pod for the poller.
struct PodPollSource {
    client: Arc<dyn PodClient>,
}

#[async_trait]
impl PollSource<Pod> for PodPollSource {
    type Enum = PodEnumerator;

    async fn poll(&self) -> Result<PodEnumerator> {
        let list = self.client.list_pods(&Selector::everything()).await?;
        Ok(PodEnumerator::new(Some(list)))
    }
}

/// Indexed view over a pod listing that may be absent.
#[derive(Debug, Clone, Default)]
pub struct PodEnumerator {
    list: Option<PodList>,
}

impl PodEnumerator {
    pub fn new(list: Option<PodList>) -> Self {
        Self { list }
    }

    fn items(&self) -> &[Pod] {
        match &self.list {
            Some(list) => &list.items,
            None => &[],
        }
    }
}

impl Enumerator<Pod> for PodEnumerator {
    fn len(&self) -> usize {
        self.items().len()
    }

    fn get(&self, index: usize) -> (String, Pod) {
        let pod = &self.items()[index];
        (pod.meta.id.clone(), pod.clone())
    }
}
