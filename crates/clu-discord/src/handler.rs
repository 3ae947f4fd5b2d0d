//! Gateway event handler: translates serenity events into core `PlatformEvent`s.

use std::{collections::HashMap, sync::Arc};

use anyhow::Context as _;
use serenity::{
    all::{ChannelId as DiscordChannelId, GuildId as DiscordGuildId, MessageId as DiscordMessageId},
    async_trait,
    client::{Context, EventHandler},
    model::{
        channel::Reaction,
        gateway::{GatewayIntents, Presence, Ready},
        guild::{Guild as DiscordGuild, Member as DiscordMember, UnavailableGuild},
        user::User,
        voice::VoiceState,
    },
    Client,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use clu_core::{
    config::Config,
    context::{BotContext, ContextOptions},
    domain::{ChannelId, GuildId, MessageId, MessageRef, UserId},
    platform::types::PlatformEvent,
    router::EventRouter,
    settings::SettingSchema,
};

use crate::{playing_activity, DiscordPlatform};

/// Last "Playing" activity seen per member.
///
/// Presence updates only carry the new state; the previous one is remembered here
/// so the core can tell real transitions from repeats.
#[derive(Default)]
pub struct ActivityTracker {
    last: Mutex<HashMap<(GuildId, UserId), Option<String>>>,
}

impl ActivityTracker {
    /// Record `activity` and return what was known before (`None` if nothing was).
    pub async fn observe(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        activity: Option<String>,
    ) -> Option<String> {
        let mut last = self.last.lock().await;
        last.insert((guild_id, user_id), activity).flatten()
    }

    pub async fn forget_member(&self, guild_id: GuildId, user_id: UserId) {
        self.last.lock().await.remove(&(guild_id, user_id));
    }

    pub async fn forget_guild(&self, guild_id: GuildId) {
        self.last.lock().await.retain(|(g, _), _| *g != guild_id);
    }

    pub async fn tracked(&self) -> usize {
        self.last.lock().await.len()
    }
}

fn presence_activity(presence: &Presence) -> Option<String> {
    playing_activity(presence.activities.iter().map(|a| (a.kind, a.name.as_str())))
}

fn message_ref(channel_id: DiscordChannelId, message_id: DiscordMessageId) -> MessageRef {
    MessageRef {
        channel_id: ChannelId(channel_id.get()),
        message_id: MessageId(message_id.get()),
    }
}

pub struct Handler {
    schema: Arc<SettingSchema>,
    opts: ContextOptions,
    router: OnceCell<Arc<EventRouter>>,
    activities: ActivityTracker,
}

impl Handler {
    pub fn new(schema: Arc<SettingSchema>, opts: ContextOptions) -> Self {
        Self {
            schema,
            opts,
            router: OnceCell::new(),
            activities: ActivityTracker::default(),
        }
    }

    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_PRESENCES
            | GatewayIntents::GUILD_VOICE_STATES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
    }

    /// The router is built on the first event, once serenity hands out its http + cache.
    async fn router(&self, ctx: &Context) -> Arc<EventRouter> {
        self.router
            .get_or_init(|| async {
                let platform = Arc::new(DiscordPlatform::new(ctx.http.clone(), ctx.cache.clone()));
                let bot = BotContext::new(self.schema.clone(), platform, self.opts.clone());
                Arc::new(EventRouter::new(Arc::new(bot)))
            })
            .await
            .clone()
    }

    async fn dispatch(&self, ctx: &Context, event: PlatformEvent) {
        debug!(kind = ?event.kind(), "dispatching event");
        self.router(ctx).await.dispatch(event).await;
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "connected to discord");
    }

    async fn cache_ready(&self, ctx: Context, guilds: Vec<DiscordGuildId>) {
        info!(guilds = guilds.len(), "gateway cache ready");
        self.dispatch(&ctx, PlatformEvent::Ready).await;
    }

    async fn guild_create(&self, ctx: Context, guild: DiscordGuild, is_new: Option<bool>) {
        let guild_id = GuildId(guild.id.get());
        for (user_id, presence) in &guild.presences {
            self.activities
                .observe(guild_id, UserId(user_id.get()), presence_activity(presence))
                .await;
        }
        if is_new == Some(true) {
            self.dispatch(&ctx, PlatformEvent::GuildJoined { guild_id }).await;
        }
    }

    async fn guild_delete(
        &self,
        ctx: Context,
        incomplete: UnavailableGuild,
        _full: Option<DiscordGuild>,
    ) {
        // An outage also arrives as a delete; only a real removal drops state.
        if incomplete.unavailable {
            return;
        }
        let guild_id = GuildId(incomplete.id.get());
        self.activities.forget_guild(guild_id).await;
        self.dispatch(&ctx, PlatformEvent::GuildLeft { guild_id }).await;
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: DiscordGuildId,
        user: User,
        _member: Option<DiscordMember>,
    ) {
        self.activities
            .forget_member(GuildId(guild_id.get()), UserId(user.id.get()))
            .await;
    }

    async fn presence_update(&self, ctx: Context, presence: Presence) {
        let Some(guild_id) = presence.guild_id else {
            return;
        };
        let guild_id = GuildId(guild_id.get());
        let user_id = UserId(presence.user.id.get());
        let new_activity = presence_activity(&presence);
        let old_activity = self
            .activities
            .observe(guild_id, user_id, new_activity.clone())
            .await;
        self.dispatch(
            &ctx,
            PlatformEvent::MemberUpdated {
                guild_id,
                user_id,
                old_activity,
                new_activity,
            },
        )
        .await;
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        self.dispatch(
            &ctx,
            PlatformEvent::VoiceStateUpdated {
                guild_id: GuildId(guild_id.get()),
                user_id: UserId(new.user_id.get()),
                old_channel: old
                    .and_then(|vs| vs.channel_id)
                    .map(|id| ChannelId(id.get())),
                new_channel: new.channel_id.map(|id| ChannelId(id.get())),
            },
        )
        .await;
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let message = message_ref(reaction.channel_id, reaction.message_id);
        self.dispatch(&ctx, PlatformEvent::ReactionAdded { message })
            .await;
    }

    async fn reaction_remove(&self, ctx: Context, reaction: Reaction) {
        let message = message_ref(reaction.channel_id, reaction.message_id);
        self.dispatch(&ctx, PlatformEvent::ReactionRemoved { message })
            .await;
    }

    async fn reaction_remove_all(
        &self,
        ctx: Context,
        channel_id: DiscordChannelId,
        message_id: DiscordMessageId,
    ) {
        let message = message_ref(channel_id, message_id);
        self.dispatch(&ctx, PlatformEvent::ReactionsCleared { message })
            .await;
    }

    async fn reaction_remove_emoji(&self, ctx: Context, reaction: Reaction) {
        let message = message_ref(reaction.channel_id, reaction.message_id);
        self.dispatch(&ctx, PlatformEvent::ReactionsCleared { message })
            .await;
    }
}

/// Connect to Discord and serve events until the client stops.
pub async fn run(cfg: &Config, schema: SettingSchema) -> anyhow::Result<()> {
    let handler = Handler::new(Arc::new(schema), ContextOptions::from(cfg));

    info!(intents = ?Handler::intents(), "building discord client");
    let mut client = Client::builder(&cfg.discord_token, Handler::intents())
        .event_handler(handler)
        .await
        .context("failed to build discord client")?;

    client.start().await.context("discord client stopped")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracker_reports_previous_activity() {
        let tracker = ActivityTracker::default();
        let (g, u) = (GuildId(1), UserId(2));

        assert_eq!(tracker.observe(g, u, Some("Chess".into())).await, None);
        assert_eq!(
            tracker.observe(g, u, Some("Go".into())).await,
            Some("Chess".to_string())
        );
        assert_eq!(tracker.observe(g, u, None).await, Some("Go".to_string()));
        assert_eq!(tracker.observe(g, u, None).await, None);
    }

    #[tokio::test]
    async fn tracker_is_per_server() {
        let tracker = ActivityTracker::default();
        tracker.observe(GuildId(1), UserId(2), Some("Chess".into())).await;
        assert_eq!(tracker.observe(GuildId(3), UserId(2), None).await, None);
    }

    #[tokio::test]
    async fn departed_members_and_servers_are_forgotten() {
        let tracker = ActivityTracker::default();
        tracker.observe(GuildId(1), UserId(2), Some("Chess".into())).await;
        tracker.observe(GuildId(1), UserId(3), Some("Go".into())).await;
        tracker.observe(GuildId(4), UserId(2), None).await;

        tracker.forget_member(GuildId(1), UserId(2)).await;
        assert_eq!(tracker.tracked().await, 2);
        assert_eq!(tracker.observe(GuildId(1), UserId(2), None).await, None);

        tracker.forget_guild(GuildId(1)).await;
        assert_eq!(tracker.tracked().await, 1);
        assert_eq!(tracker.observe(GuildId(1), UserId(3), None).await, None);
    }

    #[test]
    fn intents_cover_presence_voice_and_reactions() {
        let intents = Handler::intents();
        assert!(intents.contains(GatewayIntents::GUILD_PRESENCES));
        assert!(intents.contains(GatewayIntents::GUILD_VOICE_STATES));
        assert!(intents.contains(GatewayIntents::GUILD_MESSAGE_REACTIONS));
    }
}
