// Several record types are shared between the CLI, the TUI and the service layer;
// not every accessor is used by every front end.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tree::{Collection, Keyed};

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// === Aggregate root ===

// The user document is persisted as one unit: credentials plus every class tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(default)]
    pub classes: Collection<Class>,
    // Optimistic concurrency token, bumped by every successful save
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str, email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password_hash,
            classes: Collection::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
}

// === Tree nodes ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub files: Collection<File>,
    #[serde(default)]
    pub flashcard_sets: Collection<FlashcardSet>,
    #[serde(default)]
    pub folders: Collection<Folder>,
    pub created_at: DateTime<Utc>,
}

impl Class {
    pub fn new(name: &str) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            files: Collection::new(),
            flashcard_sets: Collection::new(),
            folders: Collection::new(),
            created_at: Utc::now(),
        }
    }
}

impl Keyed for Class {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub files: Collection<File>,
    #[serde(default)]
    pub flashcard_sets: Collection<FlashcardSet>,
    #[serde(default)]
    pub folders: Collection<Folder>,
    pub created_at: DateTime<Utc>,
}

impl Keyed for Folder {
    fn id(&self) -> &str {
        &self.id
    }
}

// === Leaves ===

// Where the bytes of an uploaded file live; the tree only keeps this reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub storage_path: String,
    pub size: u64,
    pub media_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub name: String,
    pub content: Option<String>,
    pub blob: Option<BlobRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Keyed for File {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
    pub front_image: Option<String>,
    pub back_image: Option<String>,
    pub front_math: Option<String>,
    pub back_math: Option<String>,
}

impl Keyed for Flashcard {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRecallRecord {
    pub card_id: String,
    pub knowledge_level: i32,
    pub last_reviewed: DateTime<Utc>,
    pub review_count: u32,
}

impl Keyed for ActiveRecallRecord {
    fn id(&self) -> &str {
        &self.card_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cards: Collection<Flashcard>,
    #[serde(default)]
    pub active_recall_data: Collection<ActiveRecallRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Keyed for FlashcardSet {
    fn id(&self) -> &str {
        &self.id
    }
}

// === Request payloads ===
//
// Every field is optional at the wire level. Required fields are checked when a
// record is built; for updates `None` means "leave as is" while `Some("")`
// overwrites.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClass {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFolder {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub blob: Option<BlobRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardInput {
    // Present when an edited card should keep its identity (and recall history)
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub front: Option<String>,
    #[serde(default)]
    pub back: Option<String>,
    #[serde(default)]
    pub front_image: Option<String>,
    #[serde(default)]
    pub back_image: Option<String>,
    #[serde(default)]
    pub front_math: Option<String>,
    #[serde(default)]
    pub back_math: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFlashcardSet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cards: Option<Vec<CardInput>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashcardSetUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cards: Option<Vec<CardInput>>,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
            raw_response: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            kind: None,
            raw_response: None,
        }
    }
}

impl JsonOutput<()> {
    pub fn from_error(err: &crate::error::Error) -> Self {
        Self {
            kind: Some(err.kind()),
            raw_response: err.raw_response().map(str::to_string),
            ..Self::err(err.to_string())
        }
    }
}
