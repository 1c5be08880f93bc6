//! Ticket data model.
//!
//! Tickets are owned by the import/sync layer; ranking only reads them and
//! fills in the embedding field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_embeddings::{Embeddable, Embedding};

/// A person a ticket can be assigned to or reported by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Display name as shown by the tracker.
    pub display_name: String,

    /// Email address, when the tracker exposes it.
    #[serde(default)]
    pub email: Option<String>,
}

impl Person {
    /// Create a person with only a display name.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            email: None,
        }
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A work item to rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Stable id from the tracker.
    pub id: String,

    /// Human key, e.g. `PROJ-42`.
    pub key: String,

    pub summary: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub assignee: Option<Person>,

    #[serde(default)]
    pub reporter: Option<Person>,

    /// Id of the parent ticket, if any.
    #[serde(default)]
    pub parent_id: Option<String>,

    pub created: DateTime<Utc>,

    pub updated: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
}

impl Ticket {
    /// Create a ticket with the given id, key and summary. Both timestamps
    /// are set to now.
    pub fn new(id: impl Into<String>, key: impl Into<String>, summary: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            key: key.into(),
            summary: summary.into(),
            description: None,
            labels: Vec::new(),
            assignee: None,
            reporter: None,
            parent_id: None,
            created: now,
            updated: now,
            embedding: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_assignee(mut self, person: Person) -> Self {
        self.assignee = Some(person);
        self
    }

    pub fn with_reporter(mut self, person: Person) -> Self {
        self.reporter = Some(person);
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    pub fn with_updated(mut self, updated: DateTime<Utc>) -> Self {
        self.updated = updated;
        self
    }

    pub fn with_embedding(mut self, embedding: Embedding) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text sent to the embedding provider.
    ///
    /// Key, summary, description (when non-empty) and labels (when any),
    /// one per line.
    pub fn text_representation(&self) -> String {
        let mut text = format!("{}\n{}", self.key, self.summary);
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            text.push('\n');
            text.push_str(description);
        }
        if !self.labels.is_empty() {
            text.push_str("\nLabels: ");
            text.push_str(&self.labels.join(", "));
        }
        text
    }
}

impl Embeddable for Ticket {
    fn embedding_id(&self) -> &str {
        &self.id
    }

    fn stored_embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref()
    }

    fn embedding_text(&self) -> String {
        self.text_representation()
    }
}
