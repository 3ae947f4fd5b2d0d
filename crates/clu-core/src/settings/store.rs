use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::{
    domain::{GuildId, Message, MessageId, MessageRef},
    platform::MessagingPort,
    settings::{
        instance::{BallotMarkers, SettingInstance},
        schema::SettingSchema,
        ALLOW_EXTRA_COMMANDS, RENAME_VOICE_CHANNELS,
    },
    Error, Result,
};

/// Live settings per server plus the ids of every message backing one.
#[derive(Debug, Default)]
struct GuildConfigurationIndex {
    guilds: HashMap<GuildId, HashMap<String, SettingInstance>>,
    known_messages: HashMap<MessageId, (GuildId, String)>,
}

/// Index of live [`SettingInstance`]s, keyed by (server, identifier).
///
/// At most one instance exists per key; attaching a new one supersedes the old.
pub struct SettingStore {
    schema: Arc<SettingSchema>,
    markers: BallotMarkers,
    index: RwLock<GuildConfigurationIndex>,
}

impl SettingStore {
    pub fn new(schema: Arc<SettingSchema>, markers: BallotMarkers) -> Self {
        Self {
            schema,
            markers,
            index: RwLock::new(GuildConfigurationIndex::default()),
        }
    }

    pub fn schema(&self) -> &Arc<SettingSchema> {
        &self.schema
    }

    pub fn markers(&self) -> &BallotMarkers {
        &self.markers
    }

    /// Register `instance`, returning the one it superseded, if any.
    ///
    /// A message backs at most one setting. Binding a message that is already indexed
    /// for another (server, identifier) fails and leaves the index untouched.
    pub async fn attach(&self, instance: SettingInstance) -> Result<Option<SettingInstance>> {
        let guild_id = instance.guild_id();
        let identifier = instance.identifier().to_string();
        let message_id = instance.message().id;

        let mut index = self.index.write().await;
        if let Some((owner_guild, owner)) = index.known_messages.get(&message_id) {
            if *owner_guild != guild_id || *owner != identifier {
                return Err(Error::InvariantViolation(format!(
                    "message {message_id} already backs {owner} in guild {owner_guild}, cannot bind {identifier}"
                )));
            }
        }

        let previous = index
            .guilds
            .entry(guild_id)
            .or_default()
            .insert(identifier.clone(), instance);
        if let Some(prev) = &previous {
            index.known_messages.remove(&prev.message().id);
        }
        index
            .known_messages
            .insert(message_id, (guild_id, identifier));
        Ok(previous)
    }

    /// Drop every instance of a server the bot no longer belongs to.
    ///
    /// Returns how many instances were removed.
    pub async fn evict_guild(&self, guild_id: GuildId) -> usize {
        let mut index = self.index.write().await;
        let Some(removed) = index.guilds.remove(&guild_id) else {
            return 0;
        };
        index.known_messages.retain(|_, (owner, _)| *owner != guild_id);
        removed.len()
    }

    /// Cheap membership test used to drop irrelevant reaction notifications.
    pub async fn is_known(&self, message_id: MessageId) -> bool {
        self.index.read().await.known_messages.contains_key(&message_id)
    }

    /// Replace the bound snapshot of whichever instance owns `message`.
    ///
    /// Returns false when no live instance is bound to it (anymore).
    pub async fn refresh(&self, message: Message) -> Result<bool> {
        let mut index = self.index.write().await;
        let Some((guild_id, identifier)) = index.known_messages.get(&message.id).cloned() else {
            return Ok(false);
        };
        let instance = index
            .guilds
            .get_mut(&guild_id)
            .and_then(|g| g.get_mut(&identifier))
            .ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "message {} is indexed for {identifier} in guild {guild_id} but has no instance",
                    message.id
                ))
            })?;
        instance.refresh(message)?;
        Ok(true)
    }

    /// Reaction add/remove/clear on any message, anywhere.
    ///
    /// Unknown messages are ignored without touching the network. Known ones are
    /// re-fetched, since reaction state carried by the notification may be stale.
    pub async fn on_reaction_changed<M>(&self, messaging: &M, msg: MessageRef) -> Result<()>
    where
        M: MessagingPort + ?Sized,
    {
        if !self.is_known(msg.message_id).await {
            return Ok(());
        }
        let fresh = messaging.fetch_message(msg).await?;
        if self.refresh(fresh).await? {
            tracing::debug!(message_id = %msg.message_id, "refreshed setting message");
        }
        Ok(())
    }

    /// Boolean value of `identifier` in `guild_id`.
    ///
    /// A server that was never reconciled (or predates the setting) gets the schema default.
    pub async fn bool_value(&self, guild_id: GuildId, identifier: &str) -> Result<bool> {
        {
            let index = self.index.read().await;
            if let Some(instance) = index.guilds.get(&guild_id).and_then(|g| g.get(identifier)) {
                return instance.bool_value(&self.markers);
            }
        }

        let def = self
            .schema
            .get(identifier)
            .ok_or_else(|| Error::UnknownSetting(identifier.to_string()))?;
        def.default_bool().ok_or_else(|| {
            Error::InvariantViolation(format!("setting {identifier} is {}, not a boolean", def.kind))
        })
    }

    pub async fn rename_voice_channels(&self, guild_id: GuildId) -> Result<bool> {
        self.bool_value(guild_id, RENAME_VOICE_CHANNELS).await
    }

    pub async fn allow_extra_commands(&self, guild_id: GuildId) -> Result<bool> {
        self.bool_value(guild_id, ALLOW_EXTRA_COMMANDS).await
    }

    pub async fn instance_count(&self, guild_id: GuildId) -> usize {
        self.index
            .read()
            .await
            .guilds
            .get(&guild_id)
            .map(|g| g.len())
            .unwrap_or(0)
    }

    pub async fn bound_message(&self, guild_id: GuildId, identifier: &str) -> Option<MessageRef> {
        self.index
            .read()
            .await
            .guilds
            .get(&guild_id)
            .and_then(|g| g.get(identifier))
            .map(|i| i.message_ref())
    }

    pub async fn known_message_count(&self) -> usize {
        self.index.read().await.known_messages.len()
    }
}
