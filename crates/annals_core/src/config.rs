//! Run configuration.
//!
//! # Responsibility
//! - Load tunables (id format, defaults, honorifics, aliases, audit scope)
//!   from an optional TOML file.
//! - Build the configured `Normalizer` and `IdAllocator`.
//!
//! # Invariants
//! - Every field has a default; an empty file equals `CoreConfig::default()`.
//! - Invalid combinations are rejected by `validate` before any data is read.

use crate::model::entity::YearRange;
use crate::normalize::name_key::{
    Normalizer, DEFAULT_HONORIFIC_PREFIXES, DEFAULT_HONORIFIC_SUFFIXES,
};
use crate::store::id_allocator::{IdAllocator, DEFAULT_ID_PREFIX, DEFAULT_ID_WIDTH};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const DEFAULT_ROLE: &str = "unspecified historical figure";
pub const DEFAULT_PLACEHOLDER_BIOGRAPHY: &str = "No biography recorded.";
pub const DEFAULT_AVATAR_TEMPLATE: &str = "/images/characters/{slug}.jpg";

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: String,
        source: std::io::Error,
    },
    Parse {
        path: String,
        message: String,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "failed to read config `{path}`: {source}"),
            Self::Parse { path, message } => write!(f, "failed to parse config `{path}`: {message}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Audit policy section (`[audit]`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub scope_start: Option<i32>,
    pub scope_end: Option<i32>,
    /// Names retained regardless of the link/lifespan rule. Reported as
    /// overrides in every audit.
    pub pinned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub id_prefix: String,
    pub id_width: usize,
    pub default_role: String,
    pub placeholder_biography: String,
    /// `{slug}` is replaced with the normalized, dash-joined name. Empty disables.
    pub avatar_template: Option<String>,
    pub honorific_prefixes: Vec<String>,
    pub honorific_suffixes: Vec<String>,
    /// Variant spelling -> canonical spelling.
    pub aliases: BTreeMap<String, String>,
    /// Corrupted substring -> correct substring, applied before the built-in table.
    pub extra_repairs: BTreeMap<String, String>,
    pub audit: AuditConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            id_width: DEFAULT_ID_WIDTH,
            default_role: DEFAULT_ROLE.to_string(),
            placeholder_biography: DEFAULT_PLACEHOLDER_BIOGRAPHY.to_string(),
            avatar_template: Some(DEFAULT_AVATAR_TEMPLATE.to_string()),
            honorific_prefixes: DEFAULT_HONORIFIC_PREFIXES
                .iter()
                .map(|value| value.to_string())
                .collect(),
            honorific_suffixes: DEFAULT_HONORIFIC_SUFFIXES
                .iter()
                .map(|value| value.to_string())
                .collect(),
            aliases: BTreeMap::new(),
            extra_repairs: BTreeMap::new(),
            audit: AuditConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Loads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        IdAllocator::new(&self.id_prefix, self.id_width)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if self.default_role.trim().is_empty() {
            return Err(ConfigError::Invalid("default_role must not be blank".into()));
        }
        if let Some(template) = &self.avatar_template {
            if !template.is_empty() && !template.contains("{slug}") {
                return Err(ConfigError::Invalid(format!(
                    "avatar_template `{template}` must contain `{{slug}}`"
                )));
            }
        }
        self.audit_scope()?;
        Ok(())
    }

    /// Configured audit scope, if both bounds are set.
    pub fn audit_scope(&self) -> Result<Option<YearRange>, ConfigError> {
        match (self.audit.scope_start, self.audit.scope_end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => YearRange::new(start, end).map(Some).ok_or_else(|| {
                ConfigError::Invalid(format!("audit scope {start}..{end} is reversed"))
            }),
            _ => Err(ConfigError::Invalid(
                "audit.scope_start and audit.scope_end must be set together".into(),
            )),
        }
    }

    pub fn normalizer(&self) -> Normalizer {
        let mut normalizer = Normalizer::new(
            self.honorific_prefixes.as_slice(),
            self.honorific_suffixes.as_slice(),
        );
        for (corrupted, correct) in &self.extra_repairs {
            normalizer.add_repair(corrupted.clone(), correct.clone());
        }
        for (variant, canonical) in &self.aliases {
            normalizer.add_alias(variant, canonical);
        }
        normalizer
    }

    pub fn allocator(&self) -> Result<IdAllocator, ConfigError> {
        IdAllocator::new(&self.id_prefix, self.id_width)
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}
