use crate::{
    domain::{GuildId, Message, MessageRef},
    settings::schema::{DefaultValue, SettingDefinition, ValueKind},
    Error, Result,
};

/// The two emoji used as a yes/no ballot on a settings message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BallotMarkers {
    pub affirm: String,
    pub deny: String,
}

impl BallotMarkers {
    pub fn new(affirm: impl Into<String>, deny: impl Into<String>) -> Self {
        Self {
            affirm: affirm.into(),
            deny: deny.into(),
        }
    }

    /// Markers in the order they are added to a fresh message.
    pub fn all(&self) -> [&str; 2] {
        [self.affirm.as_str(), self.deny.as_str()]
    }
}

impl Default for BallotMarkers {
    fn default() -> Self {
        Self::new("✔️", "❌")
    }
}

/// Boolean value of a ballot. Ties (including the bot's own pair of reactions) keep the default.
pub fn ballot_value(affirm: u32, deny: u32, default: bool) -> bool {
    if affirm > deny {
        true
    } else if affirm < deny {
        false
    } else {
        default
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BooleanSetting {
    pub default: bool,
}

impl BooleanSetting {
    pub fn from_definition(def: &SettingDefinition) -> Result<Self> {
        match (def.kind, &def.default) {
            (ValueKind::Boolean, DefaultValue::Boolean(default)) => Ok(Self { default: *default }),
            _ => Err(Error::InvariantViolation(format!(
                "cannot bind setting {} of kind {} as a boolean",
                def.identifier, def.kind
            ))),
        }
    }

    pub fn value(&self, message: &Message, markers: &BallotMarkers) -> bool {
        ballot_value(
            message.reaction_count(&markers.affirm),
            message.reaction_count(&markers.deny),
            self.default,
        )
    }
}

/// Kind-specific behaviour of a live setting. Only booleans are implemented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingBinding {
    Boolean(BooleanSetting),
    Role,
    Roles,
    User,
    Users,
}

impl SettingBinding {
    /// Binding for `def`, failing fast for kinds without an implementation.
    pub fn for_definition(def: &SettingDefinition) -> Result<Self> {
        match def.kind {
            ValueKind::Boolean => Ok(Self::Boolean(BooleanSetting::from_definition(def)?)),
            ValueKind::Role | ValueKind::Roles | ValueKind::User | ValueKind::Users => {
                Err(Error::UnsupportedSettingKind {
                    identifier: def.identifier.clone(),
                    kind: def.kind.to_string(),
                })
            }
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Role => ValueKind::Role,
            Self::Roles => ValueKind::Roles,
            Self::User => ValueKind::User,
            Self::Users => ValueKind::Users,
        }
    }
}

/// A setting as it lives in one server, bound to the message that persists it.
///
/// Only the message snapshot is kept; the value is derived from its reactions on read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingInstance {
    identifier: String,
    description: String,
    guild_id: GuildId,
    message: Message,
    binding: SettingBinding,
}

impl SettingInstance {
    pub fn new(
        def: &SettingDefinition,
        guild_id: GuildId,
        message: Message,
        binding: SettingBinding,
    ) -> Result<Self> {
        if binding.kind() != def.kind {
            return Err(Error::InvariantViolation(format!(
                "binding of kind {} used for setting {} of kind {}",
                binding.kind(),
                def.identifier,
                def.kind
            )));
        }
        Ok(Self {
            identifier: def.identifier.clone(),
            description: def.description.clone(),
            guild_id,
            message,
            binding,
        })
    }

    pub fn bind(def: &SettingDefinition, guild_id: GuildId, message: Message) -> Result<Self> {
        let binding = SettingBinding::for_definition(def)?;
        Self::new(def, guild_id, message, binding)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn kind(&self) -> ValueKind {
        self.binding.kind()
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn message_ref(&self) -> MessageRef {
        self.message.reference()
    }

    pub fn bool_value(&self, markers: &BallotMarkers) -> Result<bool> {
        match &self.binding {
            SettingBinding::Boolean(b) => Ok(b.value(&self.message, markers)),
            other => Err(Error::InvariantViolation(format!(
                "setting {} is {}, not a boolean",
                self.identifier,
                other.kind()
            ))),
        }
    }

    /// Swap in a fresher snapshot of the bound message.
    pub fn refresh(&mut self, message: Message) -> Result<()> {
        if message.id != self.message.id {
            return Err(Error::InvariantViolation(format!(
                "setting {} is bound to message {}, got {}",
                self.identifier, self.message.id, message.id
            )));
        }
        self.message = message;
        Ok(())
    }
}
