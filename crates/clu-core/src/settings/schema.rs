use std::{collections::HashSet, fmt, fs, path::Path, str::FromStr};

use serde::Deserialize;

use crate::{Error, Result};

/// Value kind a setting is declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Role,
    Roles,
    User,
    Users,
}

impl FromStr for ValueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Boolean),
            "role" => Ok(Self::Role),
            "roles" => Ok(Self::Roles),
            "user" => Ok(Self::User),
            "users" => Ok(Self::Users),
            other => Err(Error::SchemaParse(format!("unrecognized value kind {other:?}"))),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Boolean => "Bool",
            Self::Role => "Role",
            Self::Roles => "Roles",
            Self::User => "User",
            Self::Users => "Users",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefaultValue {
    Boolean(bool),
    /// Default of a kind we cannot interpret yet, kept verbatim.
    Unparsed(String),
}

/// One declared setting. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingDefinition {
    pub identifier: String,
    pub description: String,
    pub kind: ValueKind,
    pub default: DefaultValue,
}

impl SettingDefinition {
    pub fn default_bool(&self) -> Option<bool> {
        match self.default {
            DefaultValue::Boolean(b) => Some(b),
            DefaultValue::Unparsed(_) => None,
        }
    }

    /// Human readable default shown under the description.
    pub fn default_annotation(&self) -> String {
        match &self.default {
            DefaultValue::Boolean(true) => "(default: Yes)".to_string(),
            DefaultValue::Boolean(false) => "(default: No)".to_string(),
            DefaultValue::Unparsed(raw) => format!("(default: {raw})"),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSchema {
    settings: Vec<RawSetting>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSetting {
    identifier: String,
    description: String,
    value_type_string: String,
    default_value_str: String,
}

/// The declared set of settings, loaded once at startup and shared read-only.
#[derive(Clone, Debug, Default)]
pub struct SettingSchema {
    definitions: Vec<SettingDefinition>,
}

impl SettingSchema {
    /// Parse a schema document. Any malformed entry rejects the whole document.
    pub fn load(source: &str) -> Result<Self> {
        let raw: RawSchema = serde_json::from_str(source)
            .map_err(|e| Error::SchemaParse(format!("malformed schema document: {e}")))?;

        let mut seen = HashSet::new();
        let mut definitions = Vec::with_capacity(raw.settings.len());
        for entry in raw.settings {
            let def = parse_definition(entry)?;
            if !seen.insert(def.identifier.clone()) {
                return Err(Error::SchemaParse(format!(
                    "duplicate setting identifier {:?}",
                    def.identifier
                )));
            }
            definitions.push(def);
        }

        Ok(Self { definitions })
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(&source)
    }

    pub fn definitions(&self) -> &[SettingDefinition] {
        &self.definitions
    }

    pub fn get(&self, identifier: &str) -> Option<&SettingDefinition> {
        self.definitions.iter().find(|d| d.identifier == identifier)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn parse_definition(raw: RawSetting) -> Result<SettingDefinition> {
    let identifier = raw.identifier.trim().to_string();
    if identifier.is_empty() {
        return Err(Error::SchemaParse("setting with empty identifier".to_string()));
    }
    // The description is how a persisted message is recognized, so it cannot be blank.
    if raw.description.trim().is_empty() {
        return Err(Error::SchemaParse(format!(
            "setting {identifier} has an empty description"
        )));
    }

    let kind: ValueKind = raw.value_type_string.parse()?;
    let default = match kind {
        ValueKind::Boolean => DefaultValue::Boolean(parse_bool(&raw.default_value_str).ok_or_else(
            || {
                Error::SchemaParse(format!(
                    "setting {identifier} has non-boolean default {:?}",
                    raw.default_value_str
                ))
            },
        )?),
        _ => DefaultValue::Unparsed(raw.default_value_str),
    };

    Ok(SettingDefinition {
        identifier,
        description: raw.description,
        kind,
        default,
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIPPED: &str = include_str!("../../../../data/DefaultSettings.json");

    #[test]
    fn loads_shipped_schema() {
        let schema = SettingSchema::load(SHIPPED).unwrap();
        let rename = schema.get("RenameVoiceChannels").unwrap();
        assert_eq!(rename.kind, ValueKind::Boolean);
        assert_eq!(rename.default_bool(), Some(true));
        assert!(schema.get("AllowExtraCommands").is_some());
        assert!(schema.get("Nope").is_none());
    }

    #[test]
    fn parses_kinds_case_insensitively() {
        let src = r#"{"Settings":[
            {"Identifier":"A","Description":"a","ValueTypeString":"Bool","DefaultValueStr":"False"},
            {"Identifier":"B","Description":"b","ValueTypeString":"roles","DefaultValueStr":""}
        ]}"#;
        let schema = SettingSchema::load(src).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("A").unwrap().default, DefaultValue::Boolean(false));
        let b = schema.get("B").unwrap();
        assert_eq!(b.kind, ValueKind::Roles);
        assert_eq!(b.default, DefaultValue::Unparsed(String::new()));
    }

    #[test]
    fn rejects_unknown_kind() {
        let src = r#"{"Settings":[
            {"Identifier":"A","Description":"a","ValueTypeString":"Colour","DefaultValueStr":"red"}
        ]}"#;
        let err = SettingSchema::load(src).unwrap_err();
        assert!(matches!(err, Error::SchemaParse(_)), "{err}");
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            SettingSchema::load("{not json"),
            Err(Error::SchemaParse(_))
        ));
        assert!(matches!(
            SettingSchema::load(r#"{"Settings":[{"Identifier":"A"}]}"#),
            Err(Error::SchemaParse(_))
        ));
    }

    #[test]
    fn rejects_bad_boolean_default_and_duplicates() {
        let bad_default = r#"{"Settings":[
            {"Identifier":"A","Description":"a","ValueTypeString":"Bool","DefaultValueStr":"maybe"}
        ]}"#;
        assert!(matches!(
            SettingSchema::load(bad_default),
            Err(Error::SchemaParse(_))
        ));

        let dup = r#"{"Settings":[
            {"Identifier":"A","Description":"a","ValueTypeString":"Bool","DefaultValueStr":"true"},
            {"Identifier":"A","Description":"b","ValueTypeString":"Bool","DefaultValueStr":"true"}
        ]}"#;
        assert!(matches!(SettingSchema::load(dup), Err(Error::SchemaParse(_))));
    }

    #[test]
    fn annotation_reads_naturally() {
        let schema = SettingSchema::load(SHIPPED).unwrap();
        assert_eq!(
            schema.get("RenameVoiceChannels").unwrap().default_annotation(),
            "(default: Yes)"
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SettingSchema::load_file(Path::new("/nonexistent/clu/schema.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
