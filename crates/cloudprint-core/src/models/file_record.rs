use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Opaque numeric identifier of a file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRecordId(pub i64);

impl FileRecordId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for FileRecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileRecordId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(FileRecordId)
            .map_err(|e| anyhow::anyhow!("Invalid file record id {:?}: {}", s, e))
    }
}

/// Processing status of a file. The numeric codes are what the store persists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    Created = 0,
    Hashing = 1,
    Analyzing = 2,
    Done = 3,
    Failed = 4,
}

impl FileStatus {
    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(FileStatus::Created),
            1 => Some(FileStatus::Hashing),
            2 => Some(FileStatus::Analyzing),
            3 => Some(FileStatus::Done),
            4 => Some(FileStatus::Failed),
            _ => None,
        }
    }

    /// Forward-only transitions within one processing attempt.
    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        use FileStatus::*;
        matches!(
            (self, next),
            (Created, Hashing)
                | (Created, Analyzing)
                | (Created, Failed)
                | (Hashing, Analyzing)
                | (Hashing, Failed)
                | (Analyzing, Done)
                | (Analyzing, Failed)
        )
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileStatus::Created => write!(f, "CREATED"),
            FileStatus::Hashing => write!(f, "HASHING"),
            FileStatus::Analyzing => write!(f, "ANALYZING"),
            FileStatus::Done => write!(f, "DONE"),
            FileStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for FileStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(FileStatus::Created),
            "HASHING" => Ok(FileStatus::Hashing),
            "ANALYZING" => Ok(FileStatus::Analyzing),
            "DONE" => Ok(FileStatus::Done),
            "FAILED" => Ok(FileStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid file status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal status transition {from} -> {to} for file {id}")]
pub struct TransitionError {
    pub id: FileRecordId,
    pub from: FileStatus,
    pub to: FileStatus,
}

/// Identity and content fields supplied by the upload collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub owner_id: i64,
    pub original_name: String,
    pub stored_path: String,
    pub byte_size: i64,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub id: FileRecordId,
    pub owner_id: i64,
    pub original_name: String,
    pub stored_path: String,
    pub byte_size: i64,
    pub content_type: String,
    pub digest: Option<String>,
    /// Meaningful only once `status` is `DONE`.
    pub page_count: i32,
    pub preview_path: Option<String>,
    /// Outcome of preview normalization when it did not produce a real preview.
    pub preview_note: Option<String>,
    pub status: FileStatus,
    /// Set only while `status` is `FAILED`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Build a fresh `CREATED` record. Timestamps are stamped here, never by the store.
    pub fn create(id: FileRecordId, new: NewFileRecord, now: DateTime<Utc>) -> Self {
        FileRecord {
            id,
            owner_id: new.owner_id,
            original_name: new.original_name,
            stored_path: new.stored_path,
            byte_size: new.byte_size,
            content_type: new.content_type,
            digest: None,
            page_count: 0,
            preview_path: None,
            preview_note: None,
            status: FileStatus::Created,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: FileStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_hashing(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(FileStatus::Hashing, now)
    }

    /// Enter `ANALYZING`, recording the digest when the hashing stage produced one.
    pub fn mark_analyzing(
        &mut self,
        digest: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(FileStatus::Analyzing, now)?;
        if digest.is_some() {
            self.digest = digest;
        }
        Ok(())
    }

    pub fn mark_done(
        &mut self,
        digest: Option<String>,
        page_count: i32,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(FileStatus::Done, now)?;
        if digest.is_some() {
            self.digest = digest;
        }
        self.page_count = page_count;
        self.error = None;
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(FileStatus::Failed, now)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// Record the preview outcome. Never touches `status` or `error`.
    pub fn set_preview(&mut self, path: String, note: Option<String>, now: DateTime<Utc>) {
        self.preview_path = Some(path);
        self.preview_note = note;
        self.updated_at = now;
    }

    /// Record that no preview document could be produced at all.
    pub fn note_preview_failure(&mut self, note: String, now: DateTime<Utc>) {
        self.preview_note = Some(note);
        self.updated_at = now;
    }

    /// Start a new processing attempt from `CREATED`. Derived fields from the
    /// abandoned attempt are cleared; preview fields belong to the preview job.
    pub fn reset_for_reprocessing(&mut self, now: DateTime<Utc>) {
        self.status = FileStatus::Created;
        self.digest = None;
        self.page_count = 0;
        self.error = None;
        self.updated_at = now;
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for FileRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let status_code: i16 = row.try_get("status")?;
        let status = FileStatus::from_code(status_code).ok_or_else(|| {
            sqlx::Error::Decode(format!("Invalid file status code: {}", status_code).into())
        })?;
        Ok(FileRecord {
            id: FileRecordId(row.try_get("id")?),
            owner_id: row.try_get("owner_id")?,
            original_name: row.try_get("original_name")?,
            stored_path: row.try_get("stored_path")?,
            byte_size: row.try_get("byte_size")?,
            content_type: row.try_get("content_type")?,
            digest: row.try_get("digest")?,
            page_count: row.try_get("page_count")?,
            preview_path: row.try_get("preview_path")?,
            preview_note: row.try_get("preview_note")?,
            status,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
