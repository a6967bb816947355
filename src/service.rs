//! The request pipeline: every operation authenticates the caller, loads their
//! aggregate, applies one change to the in-memory copy and saves it whole.
//! A failure at any step saves nothing.

use std::io::Write;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{Auth, Principal, Registration, Session};
use crate::db::{Accounts, AggregateStore};
use crate::error::{Error, Result};
use crate::feynman::{Analyzer, FeynmanReport, PingReport, ScoringModel};
use crate::models::{
    ActiveRecallRecord, BlobRef, Class, ClassUpdate, File, FlashcardSet, FlashcardSetUpdate,
    NewClass, NewFile, User, UserProfile,
};
use crate::recall::{self, SetProgress};
use crate::storage::BlobStore;
use crate::tree::{self, Child, FolderPath, TreeStats};

/// A flashcard set together with where it was found.
#[derive(Debug, Clone, Serialize)]
pub struct LocatedSet {
    pub folder_path: FolderPath,
    pub set: FlashcardSet,
    pub progress: SetProgress,
}

pub struct StudyService<S> {
    store: S,
    auth: Auth,
    blobs: Option<Box<dyn BlobStore>>,
    analyzer: Option<Analyzer<Box<dyn ScoringModel>>>,
}

impl<S: AggregateStore + Accounts> StudyService<S> {
    pub fn new(store: S, auth: Auth) -> Self {
        Self {
            store,
            auth,
            blobs: None,
            analyzer: None,
        }
    }

    pub fn with_blob_store(mut self, blobs: Box<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer<Box<dyn ScoringModel>>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // === Accounts ===

    pub fn register(&self, req: Registration) -> Result<Session> {
        self.auth.register(&self.store, req)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        self.auth.login(&self.store, email, password)
    }

    pub fn authenticate(&self, token: Option<&str>) -> Result<Principal> {
        self.auth.authenticate(token)
    }

    pub fn whoami(&self, principal: &Principal) -> Result<UserProfile> {
        Ok(self.store.load(&principal.user_id)?.profile())
    }

    // === Pipeline ===

    fn read<T>(&self, principal: &Principal, op: impl FnOnce(&User) -> Result<T>) -> Result<T> {
        let user = self.store.load(&principal.user_id)?;
        op(&user)
    }

    fn mutate<T>(&self, principal: &Principal, op: impl FnOnce(&mut User) -> Result<T>) -> Result<T> {
        let mut user = self.store.load(&principal.user_id)?;
        let out = op(&mut user)?;
        self.store.save(&mut user)?;
        Ok(out)
    }

    // Runs after the save that dropped the references; never fails the request
    fn release(&self, blobs: Vec<BlobRef>) {
        if blobs.is_empty() {
            return;
        }
        let Some(store) = &self.blobs else {
            warn!(count = blobs.len(), "No blob store configured; stored files left in place");
            return;
        };
        for blob in &blobs {
            if let Err(e) = store.delete(blob) {
                warn!(path = %blob.storage_path, error = %e, "Failed to release stored file");
            }
        }
        debug!(count = blobs.len(), "Released stored files");
    }

    fn blob_store(&self) -> Result<&dyn BlobStore> {
        self.blobs
            .as_deref()
            .ok_or_else(|| Error::Internal("no blob store configured".into()))
    }

    // === Classes ===

    pub fn list_classes(&self, principal: &Principal) -> Result<Vec<Class>> {
        self.read(principal, |user| Ok(user.classes.as_slice().to_vec()))
    }

    pub fn get_class(&self, principal: &Principal, class_id: &str) -> Result<Class> {
        self.read(principal, |user| Ok(class(user, class_id)?.clone()))
    }

    pub fn create_class(&self, principal: &Principal, payload: NewClass) -> Result<Class> {
        let name = payload
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::validation("Class name is required"))?;

        let created = self.mutate(principal, |user| Ok(user.classes.push(Class::new(&name)).clone()))?;
        info!(class_id = %created.id, name = %created.name, "Created class");
        Ok(created)
    }

    pub fn update_class(&self, principal: &Principal, class_id: &str, payload: ClassUpdate) -> Result<Class> {
        self.mutate(principal, |user| {
            let class = class_mut(user, class_id)?;
            if let Some(name) = payload.name {
                class.name = name;
            }
            Ok(class.clone())
        })
    }

    pub fn delete_class(&self, principal: &Principal, class_id: &str) -> Result<Class> {
        let removed = self.mutate(principal, |user| {
            user.classes
                .remove(class_id)
                .ok_or_else(|| Error::not_found("Class"))
        })?;
        info!(class_id = %removed.id, "Deleted class");
        self.release(tree::blobs_in(&removed));
        Ok(removed)
    }

    pub fn class_stats(&self, principal: &Principal, class_id: &str) -> Result<TreeStats> {
        self.read(principal, |user| Ok(tree::summarize(class(user, class_id)?)))
    }

    // === Folders, files and flashcard sets at a path ===

    pub fn list<K: Child>(&self, principal: &Principal, class_id: &str, path: &FolderPath) -> Result<Vec<K>> {
        self.read(principal, |user| {
            let node = tree::locate(class(user, class_id)?, path)?;
            Ok(tree::list::<K, _>(node).to_vec())
        })
    }

    pub fn create<K: Child>(
        &self,
        principal: &Principal,
        class_id: &str,
        path: &FolderPath,
        payload: K::New,
    ) -> Result<K> {
        let created = self.mutate(principal, |user| {
            let node = tree::locate_mut(class_mut(user, class_id)?, path)?;
            tree::create::<K, _>(node, payload)
        })?;
        info!(kind = K::LABEL, id = created.id(), path = %path, "Created");
        Ok(created)
    }

    pub fn update<K: Child>(
        &self,
        principal: &Principal,
        class_id: &str,
        path: &FolderPath,
        id: &str,
        payload: K::Update,
    ) -> Result<K> {
        self.mutate(principal, |user| {
            let node = tree::locate_mut(class_mut(user, class_id)?, path)?;
            tree::update::<K, _>(node, id, payload)
        })
    }

    /// Removes the record and, for folders, everything beneath it. Stored
    /// binaries of removed files are released once the removal is saved.
    pub fn delete<K: Child>(&self, principal: &Principal, class_id: &str, path: &FolderPath, id: &str) -> Result<K> {
        let removed = self.mutate(principal, |user| {
            let node = tree::locate_mut(class_mut(user, class_id)?, path)?;
            tree::delete::<K, _>(node, id)
        })?;
        info!(kind = K::LABEL, id, path = %path, "Deleted");
        self.release(removed.blobs());
        Ok(removed)
    }

    // === Stored files ===

    pub fn upload_file(
        &self,
        principal: &Principal,
        class_id: &str,
        path: &FolderPath,
        name: &str,
        bytes: &[u8],
    ) -> Result<File> {
        let store = self.blob_store()?;
        let blob = store.put(name, bytes)?;

        let payload = NewFile {
            name: Some(name.to_string()),
            content: None,
            blob: Some(blob.clone()),
        };
        match self.create::<File>(principal, class_id, path, payload) {
            Ok(file) => Ok(file),
            Err(e) => {
                // Nothing references the blob yet
                self.release(vec![blob]);
                Err(e)
            }
        }
    }

    /// Streams a file's bytes: the stored binary when there is one, otherwise
    /// its inline text content.
    pub fn read_file(
        &self,
        principal: &Principal,
        class_id: &str,
        path: &FolderPath,
        file_id: &str,
        out: &mut dyn Write,
    ) -> Result<u64> {
        let file = self.read(principal, |user| {
            let node = tree::locate(class(user, class_id)?, path)?;
            node.files()
                .get(file_id)
                .cloned()
                .ok_or_else(|| Error::not_found(File::LABEL))
        })?;

        match (&file.blob, &file.content) {
            (Some(blob), _) => self.blob_store()?.copy_to(blob, out),
            (None, Some(content)) => {
                out.write_all(content.as_bytes())?;
                Ok(content.len() as u64)
            }
            (None, None) => Ok(0),
        }
    }

    // === Flashcard sets by id, anywhere in the class ===

    pub fn get_set(&self, principal: &Principal, class_id: &str, set_id: &str) -> Result<LocatedSet> {
        self.read(principal, |user| {
            let (folder_path, set) =
                tree::find_set(class(user, class_id)?, set_id).ok_or_else(|| Error::not_found(FlashcardSet::LABEL))?;
            Ok(LocatedSet {
                folder_path,
                progress: SetProgress::of(set),
                set: set.clone(),
            })
        })
    }

    pub fn update_set(
        &self,
        principal: &Principal,
        class_id: &str,
        set_id: &str,
        payload: FlashcardSetUpdate,
    ) -> Result<FlashcardSet> {
        self.mutate(principal, |user| {
            let (_, set) = tree::find_set_mut(class_mut(user, class_id)?, set_id)?;
            set.apply(payload)?;
            Ok(set.clone())
        })
    }

    pub fn delete_set(&self, principal: &Principal, class_id: &str, set_id: &str) -> Result<FlashcardSet> {
        self.mutate(principal, |user| {
            let class = class_mut(user, class_id)?;
            let (path, _) = tree::find_set(class, set_id).ok_or_else(|| Error::not_found(FlashcardSet::LABEL))?;
            let node = tree::locate_mut(class, &path)?;
            tree::delete::<FlashcardSet, _>(node, set_id)
        })
    }

    // === Active recall ===

    pub fn record_review(
        &self,
        principal: &Principal,
        class_id: &str,
        set_id: &str,
        card_id: &str,
        knowledge_level: i32,
    ) -> Result<ActiveRecallRecord> {
        let record = self.mutate(principal, |user| {
            let (_, set) = tree::find_set_mut(class_mut(user, class_id)?, set_id)?;
            recall::record_review(set, card_id, knowledge_level)
        })?;
        debug!(set_id, card_id, level = record.knowledge_level, "Recorded review");
        Ok(record)
    }

    pub fn reset_recall(&self, principal: &Principal, class_id: &str, set_id: &str) -> Result<FlashcardSet> {
        self.mutate(principal, |user| {
            let (_, set) = tree::find_set_mut(class_mut(user, class_id)?, set_id)?;
            recall::reset(set);
            Ok(set.clone())
        })
    }

    // === Explanation scoring ===

    fn analyzer(&self) -> Result<&Analyzer<Box<dyn ScoringModel>>> {
        self.analyzer
            .as_ref()
            .ok_or_else(|| Error::validation("GEMINI_API_KEY is not set"))
    }

    pub fn explain(&self, principal: &Principal, topic: &str, explanation: &str) -> Result<FeynmanReport> {
        debug!(user_id = %principal.user_id, topic, "Scoring explanation");
        self.analyzer()?.analyze(topic, explanation)
    }

    pub fn ping(&self, principal: &Principal) -> Result<PingReport> {
        debug!(user_id = %principal.user_id, "Pinging model");
        self.analyzer()?.ping()
    }
}

fn class<'a>(user: &'a User, class_id: &str) -> Result<&'a Class> {
    user.classes.get(class_id).ok_or_else(|| Error::not_found("Class"))
}

fn class_mut<'a>(user: &'a mut User, class_id: &str) -> Result<&'a mut Class> {
    user.classes
        .get_mut(class_id)
        .ok_or_else(|| Error::not_found("Class"))
}
