//! The unit of schema change.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Read;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MigrateResult, MigrationError};

/// One versioned change.
///
/// Equality, hashing and ordering only consider [`id`](Change::id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    /// Version of the change (usually a `yyyyMMddHHmmss` timestamp).
    pub id: Decimal,
    /// Human readable description.
    pub description: String,
    /// When the change was applied, `None` while pending.
    pub applied_timestamp: Option<String>,
    /// Locator the catalog uses to find the scripts of this change.
    pub filename: Option<String>,
}

impl Change {
    /// Create a pending change.
    pub fn new(id: Decimal, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            applied_timestamp: None,
            filename: None,
        }
    }

    /// Create a change as read back from the changelog.
    pub fn applied(
        id: Decimal,
        applied_timestamp: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            applied_timestamp: Some(applied_timestamp.into()),
            filename: None,
        }
    }

    /// Set the filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Whether the change has been applied.
    pub fn is_applied(&self) -> bool {
        self.applied_timestamp.is_some()
    }

    /// Name used when reporting on this change: the filename, or the id.
    pub fn display_name(&self) -> String {
        self.filename.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// SHA-256 of the file this change was loaded from, as lowercase hex.
    pub fn file_hash(&self) -> MigrateResult<String> {
        let filename = self.filename.as_deref().ok_or_else(|| {
            MigrationError::resource(format!("change {} has no file to hash", self.id))
        })?;

        let mut file = std::fs::File::open(filename)
            .map_err(|e| MigrationError::io(format!("unable to open {}", filename), e))?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let read = file
                .read(&mut buf)
                .map_err(|e| MigrationError::io(format!("unable to read {}", filename), e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

impl PartialEq for Change {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Change {}

impl Hash for Change {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.normalize().hash(state);
    }
}

impl PartialOrd for Change {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Change {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self
            .applied_timestamp
            .as_deref()
            .unwrap_or("   ...pending...   ");
        write!(
            f,
            "{} {} {} {}",
            self.id,
            ts,
            self.description,
            self.filename.as_deref().unwrap_or("")
        )
    }
}
