use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{
    domain::{Channel, Guild, GuildId, Message, MessageId, UserId},
    platform::{ChannelAdminPort, DirectoryPort, MessagingPort, Platform},
    settings::{
        instance::{SettingBinding, SettingInstance},
        schema::SettingDefinition,
        store::SettingStore,
    },
    Result,
};

/// Well-known name of the bot-owned configuration channel.
pub const DEFAULT_SETTINGS_CHANNEL: &str = "clu-bot-settings";

/// Serializes reconciliation per server so overlapping startup/join runs never
/// create the channel or a settings message twice.
#[derive(Default)]
pub struct GuildLocks {
    inner: Mutex<HashMap<GuildId, Arc<Mutex<()>>>>,
}

impl GuildLocks {
    pub async fn lock_guild(&self, guild_id: GuildId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(guild_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// What one reconciliation pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub channel_created: bool,
    pub foreign_deleted: usize,
    pub created: usize,
    pub adopted: usize,
    /// Identifiers whose reconciliation failed; siblings were still processed.
    pub failed: Vec<String>,
}

enum SettingOutcome {
    Created,
    Adopted,
}

/// Converges a server's settings channel and messages onto the schema.
pub struct GuildReconciler {
    platform: Arc<dyn Platform>,
    store: Arc<SettingStore>,
    channel_name: String,
    locks: GuildLocks,
}

impl GuildReconciler {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Arc<SettingStore>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            store,
            channel_name: channel_name.into(),
            locks: GuildLocks::default(),
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Idempotent: safe on every startup and every join.
    ///
    /// Fails as a whole only when the channel or its history cannot be read;
    /// per-setting failures are logged and reported.
    pub async fn reconcile(&self, guild: &Guild, bot: UserId) -> Result<ReconcileReport> {
        let _guard = self.locks.lock_guild(guild.id).await;
        let mut report = ReconcileReport::default();

        let channel = self.settings_channel(guild, &mut report).await?;
        let history = self.platform.fetch_messages(channel.id).await?;

        let mut own = Vec::with_capacity(history.len());
        for msg in history {
            if msg.author_id == bot {
                own.push(msg);
                continue;
            }
            match self.platform.delete_message(msg.reference()).await {
                Ok(()) => report.foreign_deleted += 1,
                Err(e) => warn!(
                    guild_id = %guild.id,
                    message_id = %msg.id,
                    error = %e,
                    "failed to delete foreign message from settings channel"
                ),
            }
        }

        let schema = self.store.schema().clone();
        let matched = match_messages(schema.definitions(), &own);
        for (def, existing) in schema.definitions().iter().zip(matched) {
            match self
                .reconcile_setting(guild.id, &channel, def, bot, existing)
                .await
            {
                Ok(SettingOutcome::Created) => report.created += 1,
                Ok(SettingOutcome::Adopted) => report.adopted += 1,
                Err(e) => {
                    warn!(
                        guild_id = %guild.id,
                        setting = %def.identifier,
                        error = %e,
                        "failed to reconcile setting"
                    );
                    report.failed.push(def.identifier.clone());
                }
            }
        }

        info!(
            guild_id = %guild.id,
            guild = %guild.name,
            created = report.created,
            adopted = report.adopted,
            failed = report.failed.len(),
            foreign_deleted = report.foreign_deleted,
            "reconciled settings"
        );
        Ok(report)
    }

    async fn settings_channel(&self, guild: &Guild, report: &mut ReconcileReport) -> Result<Channel> {
        let existing = self
            .platform
            .list_text_channels(guild.id)
            .await?
            .into_iter()
            .find(|c| c.name == self.channel_name);
        if let Some(channel) = existing {
            return Ok(channel);
        }

        let channel = self
            .platform
            .create_text_channel(guild.id, &self.channel_name)
            .await?;
        report.channel_created = true;
        info!(guild_id = %guild.id, channel_id = %channel.id, "created settings channel");

        // A channel without the overwrite is still usable; admins can lock it down by hand.
        if let Err(e) = self
            .platform
            .set_permission(channel.id, guild.everyone_role, true)
            .await
        {
            warn!(
                guild_id = %guild.id,
                channel_id = %channel.id,
                error = %e,
                "failed to restrict settings channel"
            );
        }
        Ok(channel)
    }

    async fn reconcile_setting(
        &self,
        guild_id: GuildId,
        channel: &Channel,
        def: &SettingDefinition,
        bot: UserId,
        existing: Option<&Message>,
    ) -> Result<SettingOutcome> {
        let binding = SettingBinding::for_definition(def)?;
        let markers = self.store.markers().clone();

        let (message, outcome) = match existing {
            None => {
                let body = settings_message_body(def);
                let sent = self.platform.send_message(channel.id, &body).await?;
                for marker in markers.all() {
                    self.platform.add_reaction(sent.reference(), marker).await?;
                }
                let fresh = self.platform.fetch_message(sent.reference()).await?;
                (fresh, SettingOutcome::Created)
            }
            Some(found) => {
                let mut added = false;
                for marker in markers.all() {
                    let reactors = self.platform.reactors(found.reference(), marker).await?;
                    if !reactors.contains(&bot) {
                        self.platform.add_reaction(found.reference(), marker).await?;
                        added = true;
                    }
                }
                let message = if added {
                    self.platform.fetch_message(found.reference()).await?
                } else {
                    found.clone()
                };
                (message, SettingOutcome::Adopted)
            }
        };

        debug!(guild_id = %guild_id, setting = %def.identifier, message_id = %message.id, "bound setting");
        let instance = SettingInstance::new(def, guild_id, message, binding)?;
        self.store.attach(instance).await?;
        Ok(outcome)
    }
}

/// Pair every definition with the bot message that already persists it, if any.
///
/// A message whose first line is the description wins over one that merely contains
/// it, and no message is handed out twice, so overlapping descriptions keep their
/// own messages from one run to the next.
fn match_messages<'m>(defs: &[SettingDefinition], own: &'m [Message]) -> Vec<Option<&'m Message>> {
    let mut claimed: HashSet<MessageId> = HashSet::new();
    let mut matched: Vec<Option<&Message>> = vec![None; defs.len()];

    for (slot, def) in matched.iter_mut().zip(defs) {
        let exact = own.iter().find(|m| {
            !claimed.contains(&m.id) && m.content.lines().next() == Some(def.description.as_str())
        });
        if let Some(m) = exact {
            claimed.insert(m.id);
            *slot = Some(m);
        }
    }

    for (slot, def) in matched.iter_mut().zip(defs) {
        if slot.is_some() {
            continue;
        }
        let loose = own
            .iter()
            .find(|m| !claimed.contains(&m.id) && m.content.contains(&def.description));
        if let Some(m) = loose {
            claimed.insert(m.id);
            *slot = Some(m);
        }
    }
    matched
}

/// Body of a freshly posted settings message.
pub fn settings_message_body(def: &SettingDefinition) -> String {
    format!("{}\n{}", def.description, def.default_annotation())
}
