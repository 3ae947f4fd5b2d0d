use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{Channel, ChannelId, Guild, GuildId, Member, Message, MessageRef, RoleId, UserId},
    platform::port::{ChannelAdminPort, DirectoryPort, MessagingPort, Platform},
    Result,
};

/// Default spacing between mutating platform calls.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// Serializes outbound mutating calls with a fixed minimum spacing.
///
/// One queue is shared by every caller in the process. Callers wait their turn on a
/// fair mutex, so dispatches happen one at a time and in arrival order, and two
/// consecutive dispatches never start closer than `min_interval` apart.
#[derive(Debug)]
pub struct ActionQueue {
    limiter: Mutex<IntervalLimiter>,
}

impl ActionQueue {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            limiter: Mutex::new(IntervalLimiter::new(min_interval)),
        }
    }

    pub async fn min_interval(&self) -> Duration {
        self.limiter.lock().await.interval
    }

    /// Run `action` once the queue grants it a slot.
    pub async fn dispatch<T, Fut>(&self, operation: &'static str, action: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let mut limiter = self.limiter.lock().await;
        let wait = limiter.reserve();
        if wait > Duration::from_millis(0) {
            tracing::trace!(operation, wait_ms = wait.as_millis() as u64, "pacing");
            sleep(wait).await;
        }
        let out = action.await;
        drop(limiter);
        out
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

/// Platform decorator that routes every mutating call through an [`ActionQueue`].
///
/// Reads (directory lookups, message fetches) pass straight through.
pub struct PacedPlatform {
    inner: Arc<dyn Platform>,
    queue: Arc<ActionQueue>,
}

impl PacedPlatform {
    pub fn new(inner: Arc<dyn Platform>, queue: Arc<ActionQueue>) -> Self {
        Self { inner, queue }
    }

    pub fn queue(&self) -> &Arc<ActionQueue> {
        &self.queue
    }
}

#[async_trait]
impl DirectoryPort for PacedPlatform {
    async fn current_user(&self) -> Result<UserId> {
        self.inner.current_user().await
    }

    async fn list_servers(&self) -> Result<Vec<Guild>> {
        self.inner.list_servers().await
    }

    async fn server(&self, guild_id: GuildId) -> Result<Guild> {
        self.inner.server(guild_id).await
    }

    async fn list_voice_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        self.inner.list_voice_channels(guild_id).await
    }

    async fn list_text_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        self.inner.list_text_channels(guild_id).await
    }

    async fn channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Channel> {
        self.inner.channel(guild_id, channel_id).await
    }

    async fn occupants(&self, channel: &Channel) -> Result<Vec<Member>> {
        self.inner.occupants(channel).await
    }

    async fn membership(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<ChannelId>> {
        self.inner.membership(guild_id, user_id).await
    }
}

#[async_trait]
impl MessagingPort for PacedPlatform {
    async fn fetch_messages(&self, channel_id: ChannelId) -> Result<Vec<Message>> {
        self.inner.fetch_messages(channel_id).await
    }

    async fn fetch_message(&self, msg: MessageRef) -> Result<Message> {
        self.inner.fetch_message(msg).await
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<Message> {
        self.queue
            .dispatch("send_message", self.inner.send_message(channel_id, text))
            .await
    }

    async fn add_reaction(&self, msg: MessageRef, marker: &str) -> Result<()> {
        self.queue
            .dispatch("add_reaction", self.inner.add_reaction(msg, marker))
            .await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.queue
            .dispatch("delete_message", self.inner.delete_message(msg))
            .await
    }

    async fn reactors(&self, msg: MessageRef, marker: &str) -> Result<Vec<UserId>> {
        self.inner.reactors(msg, marker).await
    }
}

#[async_trait]
impl ChannelAdminPort for PacedPlatform {
    async fn create_text_channel(&self, guild_id: GuildId, name: &str) -> Result<Channel> {
        self.queue
            .dispatch(
                "create_text_channel",
                self.inner.create_text_channel(guild_id, name),
            )
            .await
    }

    async fn set_permission(
        &self,
        channel_id: ChannelId,
        role: RoleId,
        deny_all: bool,
    ) -> Result<()> {
        self.queue
            .dispatch(
                "set_permission",
                self.inner.set_permission(channel_id, role, deny_all),
            )
            .await
    }

    async fn rename_voice_channel(&self, channel_id: ChannelId, name: &str) -> Result<()> {
        self.queue
            .dispatch(
                "rename_voice_channel",
                self.inner.rename_voice_channel(channel_id, name),
            )
            .await
    }
}
