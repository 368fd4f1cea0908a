//! Channel provisioning: one shared multiplexed channel plus dedicated channels
//! leased for the lifetime of a single blocking call.

use std::{fmt, sync::Arc};

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use tracing::debug;

use crate::{commands::CommandError, native::NativeStreamCommands};

#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// The pooled channel. Safe for any number of concurrent non-blocking calls.
    fn shared(&self) -> Arc<dyn NativeStreamCommands>;

    /// Leases a channel for exclusive use. Fails with
    /// `CommandError::ResourceExhaustion` when none can be acquired.
    async fn acquire_dedicated(&self) -> Result<DedicatedChannel, CommandError>;
}

/// An exclusively owned channel. Dropping the lease gives the channel back.
pub struct DedicatedChannel {
    channel: Arc<dyn NativeStreamCommands>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl DedicatedChannel {
    pub fn new(
        channel: Arc<dyn NativeStreamCommands>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            channel,
            release: Some(Box::new(release)),
        }
    }

    pub fn channel(&self) -> Arc<dyn NativeStreamCommands> {
        Arc::clone(&self.channel)
    }
}

impl fmt::Debug for DedicatedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedicatedChannel")
            .field("released", &self.release.is_none())
            .finish()
    }
}

impl Drop for DedicatedChannel {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Runs `f` against the shared channel once the returned stream is first polled.
pub fn execute_shared<T, F>(
    provider: Arc<dyn ConnectionProvider>,
    f: F,
) -> BoxStream<'static, Result<T, CommandError>>
where
    T: Send + 'static,
    F: FnOnce(Arc<dyn NativeStreamCommands>) -> BoxStream<'static, Result<T, CommandError>>
        + Send
        + 'static,
{
    try_stream! {
        let mut results = f(provider.shared());

        while let Some(result) = results.next().await {
            yield result?;
        }
    }
    .boxed()
}

/// Leases a dedicated channel, runs `f` against it and keeps the lease until the
/// returned stream completes, fails or is dropped.
pub fn execute_dedicated<T, F>(
    provider: Arc<dyn ConnectionProvider>,
    f: F,
) -> BoxStream<'static, Result<T, CommandError>>
where
    T: Send + 'static,
    F: FnOnce(Arc<dyn NativeStreamCommands>) -> BoxStream<'static, Result<T, CommandError>>
        + Send
        + 'static,
{
    try_stream! {
        let lease = provider.acquire_dedicated().await?;
        debug!("dedicated channel acquired");

        let mut results = f(lease.channel());

        while let Some(result) = results.next().await {
            yield result?;
        }

        drop(lease);
        debug!("dedicated channel released");
    }
    .boxed()
}
