//! Locally persisted drafts.

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EncryptedFile, StoreResult};

const DRAFTS_FILE: &str = "drafts.json";

/// Attachment carried by a draft: inline bytes or a file path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAttachment {
    /// File name shown to recipients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Inline content, base64 on disk.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub content: Option<Vec<u8>>,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Path read at send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Content id for inline parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// A saved draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    /// Locally generated id (`draft-<millis>-<suffix>`).
    pub id: String,
    /// Comma-separated recipients.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<DraftAttachment>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last save time.
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when saving. `id` selects an existing draft to update.
#[derive(Debug, Clone, Default)]
pub struct DraftInput {
    /// Existing draft id, if any.
    pub id: Option<String>,
    /// Comma-separated recipients.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Attachments.
    pub attachments: Vec<DraftAttachment>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DraftsDocument {
    #[serde(default)]
    drafts: Vec<Draft>,
}

/// Generate a draft id: millisecond timestamp plus nine base-36 characters.
#[must_use]
pub fn generate_draft_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .filter_map(|_| std::char::from_digit(rng.gen_range(0..36), 36))
        .collect();
    format!("draft-{}-{suffix}", Utc::now().timestamp_millis())
}

/// Encrypted `drafts.json` in the config directory.
#[derive(Debug)]
pub struct DraftStore {
    file: EncryptedFile<DraftsDocument>,
}

impl DraftStore {
    /// Open the store in `dir` with the user's passphrase.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    pub fn open(dir: &Path, passphrase: &str) -> StoreResult<Self> {
        Ok(Self {
            file: EncryptedFile::open(dir.join(DRAFTS_FILE), passphrase)?,
        })
    }

    fn document(&self) -> StoreResult<DraftsDocument> {
        Ok(self.file.load()?.unwrap_or_default())
    }

    /// Create a draft, or update the one named by `input.id`.
    ///
    /// Updating keeps `created_at` and bumps `updated_at`. An id that matches
    /// nothing creates a new draft under that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub fn save(&self, input: DraftInput) -> StoreResult<Draft> {
        let mut doc = self.document()?;
        let now = Utc::now();

        if let Some(id) = input.id.as_deref()
            && let Some(existing) = doc.drafts.iter_mut().find(|d| d.id == id)
        {
            existing.to = input.to;
            existing.subject = input.subject;
            existing.body = input.body;
            existing.attachments = input.attachments;
            existing.updated_at = now;
            let updated = existing.clone();
            self.file.save(&doc)?;
            debug!(id = %updated.id, "Updated draft");
            return Ok(updated);
        }

        let id = match input.id {
            Some(id) => id,
            None => loop {
                let candidate = generate_draft_id();
                if !doc.drafts.iter().any(|d| d.id == candidate) {
                    break candidate;
                }
            },
        };
        let draft = Draft {
            id,
            to: input.to,
            subject: input.subject,
            body: input.body,
            attachments: input.attachments,
            created_at: now,
            updated_at: now,
        };
        doc.drafts.push(draft.clone());
        self.file.save(&doc)?;
        debug!(id = %draft.id, "Created draft");
        Ok(draft)
    }

    /// All drafts in save order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn list(&self) -> StoreResult<Vec<Draft>> {
        Ok(self.document()?.drafts)
    }

    /// Look up one draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn get(&self, id: &str) -> StoreResult<Option<Draft>> {
        Ok(self.document()?.drafts.into_iter().find(|d| d.id == id))
    }

    /// Delete a draft; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut doc = self.document()?;
        let before = doc.drafts.len();
        doc.drafts.retain(|d| d.id != id);
        if doc.drafts.len() == before {
            return Ok(false);
        }
        self.file.save(&doc)?;
        debug!(id, "Deleted draft");
        Ok(true)
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
