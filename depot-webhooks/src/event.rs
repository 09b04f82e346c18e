//! Artifact lifecycle events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of artifact lifecycle change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An artifact was added to a repository
    Add,

    /// An artifact was removed from a repository
    Remove,

    /// An existing artifact changed
    Change,
}

impl EventKind {
    /// All kinds, in canonical order
    pub const ALL: [EventKind; 3] = [EventKind::Add, EventKind::Remove, EventKind::Change];

    /// Canonical name, as serialized and sent in the event header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Change => "change",
        }
    }

    /// Parse a kind name, case-insensitively.
    ///
    /// Besides the canonical names this accepts the past-tense forms
    /// (`added`) and the prefixed forms (`artifact.added`, `artifact_added`).
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let bare = name
            .strip_prefix("artifact.")
            .or_else(|| name.strip_prefix("artifact_"))
            .unwrap_or(&name);

        match bare {
            "add" | "added" => Some(Self::Add),
            "remove" | "removed" => Some(Self::Remove),
            "change" | "changed" => Some(Self::Change),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable fact describing an artifact lifecycle change.
///
/// Events are produced outside the dispatcher and are never mutated by it.
/// The `with_*` methods consume the event and return a new one, so an event
/// can only be shaped before it is handed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// What happened to the artifact
    kind: EventKind,

    /// Repository the artifact lives in
    repository: String,

    /// Artifact path within the repository
    path: String,

    /// Artifact name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// Artifact version, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    /// Artifact group, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,

    /// When the event occurred
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(kind: EventKind, repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            repository: repository.into(),
            path: path.into(),
            name: None,
            version: None,
            group: None,
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for an `Add` event
    pub fn added(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(EventKind::Add, repository, path)
    }

    /// Shorthand for a `Remove` event
    pub fn removed(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(EventKind::Remove, repository, path)
    }

    /// Shorthand for a `Change` event
    pub fn changed(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(EventKind::Change, repository, path)
    }

    /// Set the artifact name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the artifact version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the artifact group (Maven group id, npm scope, ...)
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set a custom timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Event kind
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Repository name
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Artifact path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Artifact name, if set
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Artifact version, if set
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Artifact group, if set
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// When the event occurred
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Canonical JSON encoding, used whenever no template applies
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Template context: the canonical keys, with absent fields as `null`
    pub(crate) fn template_context(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind.as_str(),
            "repository": self.repository,
            "path": self.path,
            "name": self.name,
            "version": self.version,
            "group": self.group,
            "timestamp": self.timestamp,
        })
    }
}
