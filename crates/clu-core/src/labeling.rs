//! Voice channel names that follow what the occupants are playing.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    domain::{Channel, Guild, Member},
    platform::{ChannelAdminPort, DirectoryPort, Platform},
    settings::SettingStore,
    Result,
};

pub const GENERAL_LABEL: &str = "General";
pub const MULTIPLE_LABEL: &str = "Multiple games";

/// Platform limits on channel names, in characters.
pub const MAX_LABEL_LEN: usize = 99;
pub const MIN_LABEL_LEN: usize = 2;

/// Label for a voice channel given its occupants.
///
/// A game becomes the label only when more than one occupant plays it, unless
/// the lone player is the only one playing anything at all.
///
/// A blank or whitespace-only activity counts as not playing; it can never become
/// a valid channel name.
pub fn consensus_label(occupants: &[Member]) -> String {
    let playing: Vec<&str> = occupants
        .iter()
        .filter_map(|m| m.activity.as_deref())
        .filter(|a| !a.trim().is_empty())
        .collect();
    if playing.is_empty() {
        return GENERAL_LABEL.to_string();
    }

    // First-seen order keeps the result deterministic.
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for &name in &playing {
        match tally.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => tally.push((name, 1)),
        }
    }
    let popular: Vec<&str> = tally
        .iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| *name)
        .collect();

    match popular.as_slice() {
        [only] => clamp_label(only),
        [] if playing.len() == 1 => playing[0].to_string(),
        [] => GENERAL_LABEL.to_string(),
        _ => MULTIPLE_LABEL.to_string(),
    }
}

/// Truncate to [`MAX_LABEL_LEN`] and pad with spaces up to [`MIN_LABEL_LEN`].
pub fn clamp_label(name: &str) -> String {
    let mut out: String = name.chars().take(MAX_LABEL_LEN).collect();
    let len = out.chars().count();
    if len < MIN_LABEL_LEN {
        out.extend(std::iter::repeat(' ').take(MIN_LABEL_LEN - len));
    }
    out
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelabelOutcome {
    Renamed(String),
    /// Already carries the computed label.
    Unchanged,
    SkippedAway,
    SkippedDisabled,
    /// Logged; sibling channels are unaffected.
    Failed,
}

/// Applies consensus labels to voice channels, gated by the server's
/// `RenameVoiceChannels` setting.
pub struct ChannelLabelEngine {
    platform: Arc<dyn Platform>,
    store: Arc<SettingStore>,
}

impl ChannelLabelEngine {
    pub fn new(platform: Arc<dyn Platform>, store: Arc<SettingStore>) -> Self {
        Self { platform, store }
    }

    /// Recompute and apply one channel's label. Never fails; problems are logged.
    pub async fn relabel(&self, guild: &Guild, channel: &Channel) -> RelabelOutcome {
        if guild.afk_channel == Some(channel.id) {
            debug!(guild_id = %guild.id, channel_id = %channel.id, "skipping away channel");
            return RelabelOutcome::SkippedAway;
        }

        match self.store.rename_voice_channels(guild.id).await {
            Ok(true) => {}
            Ok(false) => return RelabelOutcome::SkippedDisabled,
            Err(e) => {
                warn!(guild_id = %guild.id, error = %e, "cannot read rename setting");
                return RelabelOutcome::Failed;
            }
        }

        let occupants = match self.platform.occupants(channel).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    guild_id = %guild.id,
                    channel_id = %channel.id,
                    error = %e,
                    "failed to list voice occupants"
                );
                return RelabelOutcome::Failed;
            }
        };

        let label = consensus_label(&occupants);
        // Discord trims trailing spaces, so a padded label comes back shorter.
        if label.trim_end() == channel.name.trim_end() {
            return RelabelOutcome::Unchanged;
        }

        match self.platform.rename_voice_channel(channel.id, &label).await {
            Ok(()) => {
                info!(guild_id = %guild.id, channel_id = %channel.id, label = %label, "renamed voice channel");
                RelabelOutcome::Renamed(label)
            }
            Err(e) => {
                warn!(
                    guild_id = %guild.id,
                    channel_id = %channel.id,
                    label = %label,
                    error = %e,
                    "failed to rename voice channel"
                );
                RelabelOutcome::Failed
            }
        }
    }

    /// Relabel every voice channel of `guild`; fails only if they cannot be listed.
    pub async fn relabel_guild(&self, guild: &Guild) -> Result<Vec<RelabelOutcome>> {
        let channels = self.platform.list_voice_channels(guild.id).await?;
        let mut outcomes = Vec::with_capacity(channels.len());
        for channel in &channels {
            outcomes.push(self.relabel(guild, channel).await);
        }
        Ok(outcomes)
    }
}
