//! Explicit routing table from platform events to core reactions.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use tracing::debug;

use crate::{
    context::BotContext,
    platform::types::{EventKind, PlatformEvent},
};

pub type RouteFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// One reaction to one kind of event. Routes never fail; they log and move on.
pub type Route = for<'a> fn(&'a BotContext, &'a PlatformEvent) -> RouteFuture<'a>;

pub struct EventRouter {
    ctx: Arc<BotContext>,
    routes: HashMap<EventKind, Vec<Route>>,
}

impl EventRouter {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self::with_routes(ctx, default_routes())
    }

    pub fn with_routes(ctx: Arc<BotContext>, routes: HashMap<EventKind, Vec<Route>>) -> Self {
        Self { ctx, routes }
    }

    pub fn context(&self) -> &Arc<BotContext> {
        &self.ctx
    }

    /// Run every route registered for the event's kind, in registration order.
    pub async fn dispatch(&self, event: PlatformEvent) {
        let Some(routes) = self.routes.get(&event.kind()) else {
            debug!(kind = ?event.kind(), "no route for event");
            return;
        };
        for route in routes {
            route(&self.ctx, &event).await;
        }
    }
}

fn on_server_lifecycle<'a>(ctx: &'a BotContext, event: &'a PlatformEvent) -> RouteFuture<'a> {
    Box::pin(async move {
        match event {
            PlatformEvent::Ready => ctx.on_ready().await,
            PlatformEvent::GuildJoined { guild_id } => ctx.on_guild_joined(*guild_id).await,
            PlatformEvent::GuildLeft { guild_id } => ctx.on_guild_left(*guild_id).await,
            _ => {}
        }
    })
}

fn on_activity<'a>(ctx: &'a BotContext, event: &'a PlatformEvent) -> RouteFuture<'a> {
    Box::pin(async move {
        if let PlatformEvent::MemberUpdated {
            guild_id,
            user_id,
            old_activity,
            new_activity,
        } = event
        {
            ctx.on_member_updated(
                *guild_id,
                *user_id,
                old_activity.as_deref(),
                new_activity.as_deref(),
            )
            .await;
        }
    })
}

fn on_voice<'a>(ctx: &'a BotContext, event: &'a PlatformEvent) -> RouteFuture<'a> {
    Box::pin(async move {
        if let PlatformEvent::VoiceStateUpdated {
            guild_id,
            old_channel,
            new_channel,
            ..
        } = event
        {
            ctx.on_voice_state_updated(*guild_id, *old_channel, *new_channel)
                .await;
        }
    })
}

fn on_reaction<'a>(ctx: &'a BotContext, event: &'a PlatformEvent) -> RouteFuture<'a> {
    Box::pin(async move {
        match event {
            PlatformEvent::ReactionAdded { message }
            | PlatformEvent::ReactionRemoved { message }
            | PlatformEvent::ReactionsCleared { message } => {
                ctx.on_reaction_changed(*message).await
            }
            _ => {}
        }
    })
}

pub fn default_routes() -> HashMap<EventKind, Vec<Route>> {
    let mut routes: HashMap<EventKind, Vec<Route>> = HashMap::new();
    routes.insert(EventKind::Ready, vec![on_server_lifecycle as Route]);
    routes.insert(EventKind::GuildJoined, vec![on_server_lifecycle as Route]);
    routes.insert(EventKind::GuildLeft, vec![on_server_lifecycle as Route]);
    routes.insert(EventKind::MemberUpdated, vec![on_activity as Route]);
    routes.insert(EventKind::VoiceStateUpdated, vec![on_voice as Route]);
    for kind in [
        EventKind::ReactionAdded,
        EventKind::ReactionRemoved,
        EventKind::ReactionsCleared,
    ] {
        routes.insert(kind, vec![on_reaction as Route]);
    }
    routes
}
