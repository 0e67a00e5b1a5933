use crate::declarations::{AcknowledgeMode, ConsumerSettings};
use std::collections::BTreeMap;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Appended to the queue name to build the name a binding is published under.
pub const CONTAINER_SUFFIX: &str = "Container";

/// The name a binding for `queue_name` is published under - e.g. `ordersContainer`.
pub fn container_name(queue_name: &str) -> String {
    format!("{queue_name}{CONTAINER_SUFFIX}")
}

/// Resolves once the owning [`ConsumerBinding`] is asked to stop.
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub async fn recv(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            // The binding was dropped without being stopped.
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// A running consumer: one queue, one handler, one channel.
///
/// A binding owns its consumer task. [`ConsumerBinding::stop`] cancels the consumer, waits
/// for every in-flight message to be processed and releases the channel: once it returns no
/// handler callback is running, nor will one start, for this binding.
pub struct ConsumerBinding {
    container_name: String,
    queue_name: String,
    handler_name: String,
    settings: ConsumerSettings,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), anyhow::Error>>,
}

impl ConsumerBinding {
    /// Spawn the consumer task for `queue_name` on the current tokio runtime.
    ///
    /// `run` receives the signal it must observe to stop consuming.
    pub fn spawn<F, Fut>(
        queue_name: &str,
        handler_name: &str,
        settings: ConsumerSettings,
        run: F,
    ) -> Self
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(run(ShutdownSignal(signal)));
        Self {
            container_name: container_name(queue_name),
            queue_name: queue_name.to_owned(),
            handler_name: handler_name.to_owned(),
            settings,
            shutdown,
            task,
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn acknowledge_mode(&self) -> AcknowledgeMode {
        self.settings.acknowledge_mode
    }

    pub fn prefetch_count(&self) -> u16 {
        self.settings.prefetch_count
    }

    pub fn concurrent_consumers(&self) -> usize {
        self.settings.concurrent_consumers
    }

    /// `false` once the consumer task has exited, e.g. because the channel was closed.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop consuming and wait until the consumer has released its resources.
    ///
    /// Returns the error the consumer exited with, if any.
    #[tracing::instrument(
        skip_all,
        name = "consumer_binding_stop",
        fields(container_name = %self.container_name)
    )]
    pub async fn stop(self) -> Result<(), anyhow::Error> {
        self.shutdown.send_replace(true);
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!(
                "The consumer task of `{}` did not complete: {e}",
                self.container_name
            )),
        }
    }
}

/// The bindings started by the process, keyed by container name.
///
/// Owned by the host and filled by
/// [`BindingOrchestrator::run`](crate::orchestrator::BindingOrchestrator::run).
/// There is at most one binding per queue.
#[derive(Default)]
pub struct ConsumerBindings {
    bindings: BTreeMap<String, ConsumerBinding>,
}

impl ConsumerBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, binding: ConsumerBinding) {
        self.bindings
            .insert(binding.container_name.clone(), binding);
    }

    pub fn get(&self, container_name: &str) -> Option<&ConsumerBinding> {
        self.bindings.get(container_name)
    }

    pub fn get_by_queue(&self, queue_name: &str) -> Option<&ConsumerBinding> {
        self.get(&container_name(queue_name))
    }

    pub fn contains_queue(&self, queue_name: &str) -> bool {
        self.get_by_queue(queue_name).is_some()
    }

    pub fn container_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsumerBinding> {
        self.bindings.values()
    }

    /// The bindings whose consumer is still running.
    pub fn running(&self) -> impl Iterator<Item = &ConsumerBinding> {
        self.iter().filter(|binding| binding.is_running())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Stop and remove the binding published under `container_name`.
    ///
    /// Returns `Ok(false)` if there is no such binding.
    pub async fn stop(&mut self, container_name: &str) -> Result<bool, anyhow::Error> {
        match self.bindings.remove(container_name) {
            Some(binding) => binding.stop().await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Stop every binding, one at a time.
    ///
    /// All bindings are stopped even if some of them fail; the first failure is returned.
    #[tracing::instrument(
        skip_all,
        name = "consumer_bindings_shutdown",
        fields(bindings = self.bindings.len())
    )]
    pub async fn shutdown_all(&mut self) -> Result<(), anyhow::Error> {
        let mut first_error = None;
        for (container_name, binding) in std::mem::take(&mut self.bindings) {
            if let Err(e) = binding.stop().await {
                tracing::error!(
                    container_name = %container_name,
                    error = ?e,
                    "Consumer exited with an error"
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
