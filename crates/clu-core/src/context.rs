//! The one object that owns the bot's process-wide state.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    domain::{ChannelId, GuildId, MessageRef, UserId},
    labeling::{ChannelLabelEngine, RelabelOutcome},
    platform::{
        throttled::{ActionQueue, PacedPlatform, DEFAULT_MIN_INTERVAL},
        DirectoryPort, Platform,
    },
    settings::{
        reconcile::DEFAULT_SETTINGS_CHANNEL, BallotMarkers, GuildReconciler, ReconcileReport,
        SettingSchema, SettingStore,
    },
    Result,
};

#[derive(Clone, Debug)]
pub struct ContextOptions {
    pub settings_channel: String,
    pub markers: BallotMarkers,
    pub pacing_interval: Duration,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            settings_channel: DEFAULT_SETTINGS_CHANNEL.to_string(),
            markers: BallotMarkers::default(),
            pacing_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl From<&Config> for ContextOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            settings_channel: cfg.settings_channel.clone(),
            markers: cfg.markers.clone(),
            pacing_interval: cfg.pacing_interval,
        }
    }
}

/// Schema, settings index, pacing queue and the two engines, built once per process
/// and passed by reference to whatever handles platform events.
pub struct BotContext {
    platform: Arc<dyn Platform>,
    store: Arc<SettingStore>,
    reconciler: GuildReconciler,
    labeler: ChannelLabelEngine,
}

impl BotContext {
    /// `platform` is the raw adapter; mutating calls get paced here.
    pub fn new(schema: Arc<SettingSchema>, platform: Arc<dyn Platform>, opts: ContextOptions) -> Self {
        let queue = Arc::new(ActionQueue::new(opts.pacing_interval));
        let platform: Arc<dyn Platform> = Arc::new(PacedPlatform::new(platform, queue));
        let store = Arc::new(SettingStore::new(schema, opts.markers));
        let reconciler =
            GuildReconciler::new(platform.clone(), store.clone(), opts.settings_channel);
        let labeler = ChannelLabelEngine::new(platform.clone(), store.clone());
        Self {
            platform,
            store,
            reconciler,
            labeler,
        }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn store(&self) -> &Arc<SettingStore> {
        &self.store
    }

    pub fn reconciler(&self) -> &GuildReconciler {
        &self.reconciler
    }

    pub fn labeler(&self) -> &ChannelLabelEngine {
        &self.labeler
    }

    /// Reconcile every server the bot is in. One server failing does not stop the rest.
    pub async fn reconcile_all(&self) {
        let guilds = match self.platform.list_servers().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to list servers for reconciliation");
                return;
            }
        };
        for guild in guilds {
            let _ = self.reconcile_guild(guild.id).await;
        }
    }

    pub async fn reconcile_guild(&self, guild_id: GuildId) -> Result<ReconcileReport> {
        let outcome = async {
            let guild = self.platform.server(guild_id).await?;
            let bot = self.platform.current_user().await?;
            self.reconciler.reconcile(&guild, bot).await
        }
        .await;
        if let Err(e) = &outcome {
            warn!(guild_id = %guild_id, error = %e, "settings reconciliation aborted");
        }
        outcome
    }

    pub async fn relabel_all(&self) {
        let guilds = match self.platform.list_servers().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to list servers for relabeling");
                return;
            }
        };
        for guild in guilds {
            self.relabel_guild(guild.id).await;
        }
    }

    pub async fn relabel_guild(&self, guild_id: GuildId) -> Vec<RelabelOutcome> {
        let outcome = async {
            let guild = self.platform.server(guild_id).await?;
            self.labeler.relabel_guild(&guild).await
        }
        .await;
        match outcome {
            Ok(v) => v,
            Err(e) => {
                warn!(guild_id = %guild_id, error = %e, "failed to relabel server voice channels");
                Vec::new()
            }
        }
    }

    pub async fn relabel_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> RelabelOutcome {
        let lookup = async {
            let guild = self.platform.server(guild_id).await?;
            let channel = self.platform.channel(guild_id, channel_id).await?;
            Ok::<_, crate::Error>((guild, channel))
        }
        .await;
        match lookup {
            Ok((guild, channel)) => self.labeler.relabel(&guild, &channel).await,
            Err(e) => {
                warn!(guild_id = %guild_id, channel_id = %channel_id, error = %e, "failed to look up voice channel");
                RelabelOutcome::Failed
            }
        }
    }

    /// Activity transition of a member; only matters while they sit in voice.
    pub async fn on_member_updated(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        old_activity: Option<&str>,
        new_activity: Option<&str>,
    ) -> Option<RelabelOutcome> {
        if old_activity == new_activity {
            return None;
        }
        let seated = match self.platform.membership(guild_id, user_id).await {
            Ok(v) => v,
            Err(e) => {
                warn!(guild_id = %guild_id, user_id = %user_id, error = %e, "failed to look up voice membership");
                return None;
            }
        };
        let channel_id = seated?;
        Some(self.relabel_channel(guild_id, channel_id).await)
    }

    /// Voice membership change. Mute/deafen pings that keep the channel are ignored.
    pub async fn on_voice_state_updated(
        &self,
        guild_id: GuildId,
        old_channel: Option<ChannelId>,
        new_channel: Option<ChannelId>,
    ) -> Vec<RelabelOutcome> {
        if old_channel == new_channel {
            return Vec::new();
        }
        let mut outcomes = Vec::new();
        for channel_id in [old_channel, new_channel].into_iter().flatten() {
            outcomes.push(self.relabel_channel(guild_id, channel_id).await);
        }
        outcomes
    }

    pub async fn on_reaction_changed(&self, msg: MessageRef) {
        if let Err(e) = self.store.on_reaction_changed(&*self.platform, msg).await {
            warn!(message_id = %msg.message_id, error = %e, "failed to refresh setting message");
        }
    }

    /// Startup: settings first so labeling sees each server's real preference.
    pub async fn on_ready(&self) {
        info!("reconciling all servers");
        self.reconcile_all().await;
        self.relabel_all().await;
        debug!("startup pass finished");
    }

    pub async fn on_guild_joined(&self, guild_id: GuildId) {
        info!(guild_id = %guild_id, "joined server");
        let _ = self.reconcile_guild(guild_id).await;
        self.relabel_guild(guild_id).await;
    }

    /// Forget everything held for a server the bot was removed from.
    pub async fn on_guild_left(&self, guild_id: GuildId) {
        let evicted = self.store.evict_guild(guild_id).await;
        info!(guild_id = %guild_id, evicted, "left server");
    }
}
