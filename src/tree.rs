//! Folder-tree addressing and mutation.
//!
//! A class is the root of a tree of folders; every folder (and the class
//! itself) owns three child collections: files, flashcard sets and folders.
//! Resources are addressed by the ordered ids of the folders leading to them,
//! starting directly under the class root. The empty path is the class root.

#![allow(dead_code)]

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::models::{
    new_id, BlobRef, CardInput, Class, File, FileUpdate, Flashcard, FlashcardSet,
    FlashcardSetUpdate, Folder, FolderUpdate, NewFile, NewFlashcardSet, NewFolder,
};

// === Keyed collections ===

pub trait Keyed {
    fn id(&self) -> &str;
}

// An ordered sequence of records with lookup by id. Order is insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Keyed> Collection<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn push(&mut self, item: T) -> &T {
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    // Rebuilds the sequence without the matching record
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let position = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(position))
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// === Folder paths ===

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FolderPath(Vec<String>);

impl FolderPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // Blank segments are kept so that resolution reports them as missing
        Self(
            segments
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .collect(),
        )
    }

    // Read-side encoding: "id1,id2,id3"; only an empty string is the root
    pub fn parse_joined(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Self::root();
        }
        Self::from_segments(s.split(','))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn child(&self, folder_id: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(folder_id.to_string());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }
}

impl FromStr for FolderPath {
    type Err = Error;

    // Accepts both encodings: a JSON list or a comma-joined string
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.starts_with('[') {
            let segments: Vec<String> = serde_json::from_str(trimmed)
                .map_err(|e| Error::validation(format!("Invalid folder path: {e}")))?;
            Ok(Self::from_segments(segments))
        } else {
            Ok(Self::parse_joined(trimmed))
        }
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl<'de> Deserialize<'de> for FolderPath {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            List(Vec<String>),
            Encoded(String),
            Missing(()),
        }

        match Wire::deserialize(deserializer)? {
            Wire::List(segments) => Ok(Self::from_segments(segments)),
            Wire::Encoded(s) => s.parse().map_err(serde::de::Error::custom),
            Wire::Missing(()) => Ok(Self::root()),
        }
    }
}

// === Tree nodes ===

pub trait TreeNode {
    fn name(&self) -> &str;
    fn files(&self) -> &Collection<File>;
    fn files_mut(&mut self) -> &mut Collection<File>;
    fn flashcard_sets(&self) -> &Collection<FlashcardSet>;
    fn flashcard_sets_mut(&mut self) -> &mut Collection<FlashcardSet>;
    fn folders(&self) -> &Collection<Folder>;
    fn folders_mut(&mut self) -> &mut Collection<Folder>;
}

macro_rules! impl_tree_node {
    ($ty:ty) => {
        impl TreeNode for $ty {
            fn name(&self) -> &str {
                &self.name
            }
            fn files(&self) -> &Collection<File> {
                &self.files
            }
            fn files_mut(&mut self) -> &mut Collection<File> {
                &mut self.files
            }
            fn flashcard_sets(&self) -> &Collection<FlashcardSet> {
                &self.flashcard_sets
            }
            fn flashcard_sets_mut(&mut self) -> &mut Collection<FlashcardSet> {
                &mut self.flashcard_sets
            }
            fn folders(&self) -> &Collection<Folder> {
                &self.folders
            }
            fn folders_mut(&mut self) -> &mut Collection<Folder> {
                &mut self.folders
            }
        }
    };
}

impl_tree_node!(Class);
impl_tree_node!(Folder);

// === Path resolution ===

/// Walks `path` down from the class root's folders and returns the terminal
/// folder. Each segment is looked up among the current node's direct children
/// only; the first missing segment fails the whole lookup.
pub fn resolve<'a>(root: &'a Collection<Folder>, path: &FolderPath) -> Result<&'a Folder> {
    let (first, rest) = path
        .segments()
        .split_first()
        .ok_or_else(|| Error::validation("Folder path is empty"))?;

    let mut current = root.get(first).ok_or_else(|| missing_segment(first))?;
    for segment in rest {
        current = current
            .folders
            .get(segment)
            .ok_or_else(|| missing_segment(segment))?;
    }
    Ok(current)
}

pub fn resolve_mut<'a>(root: &'a mut Collection<Folder>, path: &FolderPath) -> Result<&'a mut Folder> {
    let (first, rest) = path
        .segments()
        .split_first()
        .ok_or_else(|| Error::validation("Folder path is empty"))?;

    let mut current = root.get_mut(first).ok_or_else(|| missing_segment(first))?;
    for segment in rest {
        current = current
            .folders
            .get_mut(segment)
            .ok_or_else(|| missing_segment(segment))?;
    }
    Ok(current)
}

fn missing_segment(id: &str) -> Error {
    Error::not_found(format!("Folder '{id}'"))
}

/// The node whose collections a request addresses: the class root for the
/// empty path, otherwise the resolved folder.
pub fn locate<'a>(class: &'a Class, path: &FolderPath) -> Result<&'a dyn TreeNode> {
    if path.is_root() {
        return Ok(class);
    }
    Ok(resolve(&class.folders, path)?)
}

pub fn locate_mut<'a>(class: &'a mut Class, path: &FolderPath) -> Result<&'a mut dyn TreeNode> {
    if path.is_root() {
        return Ok(class);
    }
    Ok(resolve_mut(&mut class.folders, path)?)
}

// === Collection mutators ===

/// One of the three kinds of record a tree node holds.
pub trait Child: Keyed + Clone {
    type New;
    type Update;

    const LABEL: &'static str;

    fn collection<N: TreeNode + ?Sized>(node: &N) -> &Collection<Self>;
    fn collection_mut<N: TreeNode + ?Sized>(node: &mut N) -> &mut Collection<Self>;

    fn build(payload: Self::New) -> Result<Self>;

    // Must validate everything before touching `self`
    fn apply(&mut self, payload: Self::Update) -> Result<()>;

    /// Stored binaries owned by this record, including its descendants.
    fn blobs(&self) -> Vec<BlobRef> {
        Vec::new()
    }
}

pub fn list<K: Child, N: TreeNode + ?Sized>(node: &N) -> &[K] {
    K::collection(node).as_slice()
}

pub fn create<K: Child, N: TreeNode + ?Sized>(node: &mut N, payload: K::New) -> Result<K> {
    let record = K::build(payload)?;
    Ok(K::collection_mut(node).push(record).clone())
}

pub fn update<K: Child, N: TreeNode + ?Sized>(node: &mut N, id: &str, payload: K::Update) -> Result<K> {
    let record = K::collection_mut(node)
        .get_mut(id)
        .ok_or_else(|| Error::not_found(K::LABEL))?;
    record.apply(payload)?;
    Ok(record.clone())
}

pub fn delete<K: Child, N: TreeNode + ?Sized>(node: &mut N, id: &str) -> Result<K> {
    K::collection_mut(node)
        .remove(id)
        .ok_or_else(|| Error::not_found(K::LABEL))
}

fn required(value: Option<String>, message: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::validation(message)),
    }
}

impl Child for Folder {
    type New = NewFolder;
    type Update = FolderUpdate;

    const LABEL: &'static str = "Folder";

    fn collection<N: TreeNode + ?Sized>(node: &N) -> &Collection<Self> {
        node.folders()
    }

    fn collection_mut<N: TreeNode + ?Sized>(node: &mut N) -> &mut Collection<Self> {
        node.folders_mut()
    }

    fn build(payload: NewFolder) -> Result<Self> {
        Ok(Folder {
            id: new_id(),
            name: required(payload.name, "Folder name is required")?,
            files: Collection::new(),
            flashcard_sets: Collection::new(),
            folders: Collection::new(),
            created_at: Utc::now(),
        })
    }

    fn apply(&mut self, payload: FolderUpdate) -> Result<()> {
        if let Some(name) = payload.name {
            self.name = name;
        }
        Ok(())
    }

    fn blobs(&self) -> Vec<BlobRef> {
        blobs_in(self)
    }
}

impl Child for File {
    type New = NewFile;
    type Update = FileUpdate;

    const LABEL: &'static str = "File";

    fn collection<N: TreeNode + ?Sized>(node: &N) -> &Collection<Self> {
        node.files()
    }

    fn collection_mut<N: TreeNode + ?Sized>(node: &mut N) -> &mut Collection<Self> {
        node.files_mut()
    }

    fn build(payload: NewFile) -> Result<Self> {
        let now = Utc::now();
        Ok(File {
            id: new_id(),
            name: required(payload.name, "File name is required")?,
            content: payload.content,
            blob: payload.blob,
            created_at: now,
            updated_at: now,
        })
    }

    fn apply(&mut self, payload: FileUpdate) -> Result<()> {
        if let Some(name) = payload.name {
            self.name = name;
        }
        if let Some(content) = payload.content {
            self.content = Some(content);
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    fn blobs(&self) -> Vec<BlobRef> {
        self.blob.iter().cloned().collect()
    }
}

impl Child for FlashcardSet {
    type New = NewFlashcardSet;
    type Update = FlashcardSetUpdate;

    const LABEL: &'static str = "Flashcard set";

    fn collection<N: TreeNode + ?Sized>(node: &N) -> &Collection<Self> {
        node.flashcard_sets()
    }

    fn collection_mut<N: TreeNode + ?Sized>(node: &mut N) -> &mut Collection<Self> {
        node.flashcard_sets_mut()
    }

    fn build(payload: NewFlashcardSet) -> Result<Self> {
        let (title, inputs) = match (payload.title, payload.cards) {
            (Some(title), Some(cards)) if !title.trim().is_empty() => (title, cards),
            _ => return Err(Error::validation("Title and cards array are required")),
        };
        let now = Utc::now();
        Ok(FlashcardSet {
            id: new_id(),
            title,
            description: payload.description.unwrap_or_default(),
            cards: build_cards(inputs, None)?,
            active_recall_data: Collection::new(),
            created_at: now,
            updated_at: now,
        })
    }

    fn apply(&mut self, payload: FlashcardSetUpdate) -> Result<()> {
        let cards = match payload.cards {
            Some(inputs) => Some(build_cards(inputs, Some(&self.cards))?),
            None => None,
        };

        if let Some(title) = payload.title {
            self.title = title;
        }
        if let Some(description) = payload.description {
            self.description = description;
        }
        if let Some(cards) = cards {
            // Records for cards that no longer exist would never be reachable again
            self.active_recall_data
                .retain(|record| cards.contains(&record.card_id));
            self.cards = cards;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Normalizes author-supplied cards. An input keeps its id only when it names a
/// card of `existing` that no earlier input already claimed.
fn build_cards(inputs: Vec<CardInput>, existing: Option<&Collection<Flashcard>>) -> Result<Collection<Flashcard>> {
    let mut cards: Collection<Flashcard> = Collection::new();
    for (index, input) in inputs.into_iter().enumerate() {
        let (front, back) = match (input.front, input.back) {
            (Some(front), Some(back)) => (front, back),
            _ => {
                return Err(Error::validation(format!(
                    "Card {} needs both a front and a back",
                    index + 1
                )))
            }
        };

        let id = input
            .id
            .filter(|id| existing.is_some_and(|e| e.contains(id)) && !cards.contains(id))
            .unwrap_or_else(new_id);

        cards.push(Flashcard {
            id,
            front,
            back,
            front_image: input.front_image,
            back_image: input.back_image,
            front_math: input.front_math,
            back_math: input.back_math,
        });
    }
    Ok(cards)
}

// === Tree-wide search ===

/// Finds a flashcard set anywhere in the class: the root's own sets first, then
/// depth-first through folders in creation order (a folder's own sets before its
/// child folders, child folders before later siblings).
pub fn find_set<'a>(class: &'a Class, set_id: &str) -> Option<(FolderPath, &'a FlashcardSet)> {
    if let Some(set) = class.flashcard_sets.get(set_id) {
        return Some((FolderPath::root(), set));
    }
    search_folders(&class.folders, &FolderPath::root(), set_id)
}

fn search_folders<'a>(
    folders: &'a Collection<Folder>,
    parent: &FolderPath,
    set_id: &str,
) -> Option<(FolderPath, &'a FlashcardSet)> {
    for folder in folders {
        let path = parent.child(&folder.id);
        if let Some(set) = folder.flashcard_sets.get(set_id) {
            return Some((path, set));
        }
        if let Some(found) = search_folders(&folder.folders, &path, set_id) {
            return Some(found);
        }
    }
    None
}

/// Mutable counterpart of [`find_set`]. Returns the containing node's path too.
pub fn find_set_mut<'a>(class: &'a mut Class, set_id: &str) -> Result<(FolderPath, &'a mut FlashcardSet)> {
    let path = find_set(class, set_id)
        .map(|(path, _)| path)
        .ok_or_else(|| Error::not_found(FlashcardSet::LABEL))?;
    let node = locate_mut(class, &path)?;
    let set = node
        .flashcard_sets_mut()
        .get_mut(set_id)
        .ok_or_else(|| Error::not_found(FlashcardSet::LABEL))?;
    Ok((path, set))
}

// === Subtree inspection ===

/// Every stored binary referenced from `node` or any of its descendants.
pub fn blobs_in<N: TreeNode + ?Sized>(node: &N) -> Vec<BlobRef> {
    let mut blobs: Vec<BlobRef> = node.files().iter().filter_map(|f| f.blob.clone()).collect();
    for folder in node.folders() {
        blobs.extend(blobs_in(folder));
    }
    blobs
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub folders: usize,
    pub files: usize,
    pub flashcard_sets: usize,
    pub cards: usize,
}

pub fn summarize<N: TreeNode + ?Sized>(node: &N) -> TreeStats {
    let mut stats = TreeStats {
        folders: node.folders().len(),
        files: node.files().len(),
        flashcard_sets: node.flashcard_sets().len(),
        cards: node.flashcard_sets().iter().map(|s| s.cards.len()).sum(),
    };
    for folder in node.folders() {
        let child = summarize(folder);
        stats.folders += child.folders;
        stats.files += child.files;
        stats.flashcard_sets += child.flashcard_sets;
        stats.cards += child.cards;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(name: &str) -> NewFolder {
        NewFolder {
            name: Some(name.to_string()),
        }
    }

    fn card(front: &str, back: &str) -> CardInput {
        CardInput {
            front: Some(front.to_string()),
            back: Some(back.to_string()),
            ..Default::default()
        }
    }

    fn set(title: &str) -> NewFlashcardSet {
        NewFlashcardSet {
            title: Some(title.to_string()),
            description: None,
            cards: Some(vec![card("Q1", "A1"), card("Q2", "A2")]),
        }
    }

    // Bio -> Week1 -> Lecture, returning (class, week1 id, lecture id)
    fn nested_class() -> (Class, String, String) {
        let mut class = Class::new("Bio");
        let week1: Folder = create(&mut class, folder("Week1")).unwrap();
        let week1_path = FolderPath::from_segments([&week1.id]);
        let node = locate_mut(&mut class, &week1_path).unwrap();
        let lecture: Folder = create(node, folder("Lecture")).unwrap();
        (class, week1.id, lecture.id)
    }

    mod folder_path_tests {
        use super::*;

        #[test]
        fn parse_joined_splits_and_trims() {
            let path = FolderPath::parse_joined(" a, b ,c");
            assert_eq!(path.segments(), ["a", "b", "c"]);
        }

        #[test]
        fn parse_joined_empty_is_root() {
            assert!(FolderPath::parse_joined("").is_root());
            assert!(FolderPath::parse_joined("  ").is_root());
            assert!("[]".parse::<FolderPath>().unwrap().is_root());
        }

        #[test]
        fn blank_segments_are_kept() {
            assert_eq!(FolderPath::parse_joined(",").segments(), ["", ""]);
            assert_eq!(FolderPath::parse_joined(" , ").len(), 2);
            assert_eq!(FolderPath::parse_joined("a,,").segments(), ["a", "", ""]);

            let listed: FolderPath = serde_json::from_str(r#"[""]"#).unwrap();
            assert!(!listed.is_root());
        }

        #[test]
        fn both_encodings_decode_identically() {
            let joined: FolderPath = "a,b".parse().unwrap();
            let listed: FolderPath = r#"["a","b"]"#.parse().unwrap();
            assert_eq!(joined, listed);
        }

        #[test]
        fn invalid_json_list_is_validation_error() {
            let err = "[\"a\",".parse::<FolderPath>().unwrap_err();
            assert_eq!(err.kind(), "validation");
        }

        #[test]
        fn deserialize_from_list_string_or_null() {
            let list: FolderPath = serde_json::from_str(r#"["x","y"]"#).unwrap();
            let joined: FolderPath = serde_json::from_str(r#""x,y""#).unwrap();
            let encoded: FolderPath = serde_json::from_str(r#""[\"x\",\"y\"]""#).unwrap();
            let null: FolderPath = serde_json::from_str("null").unwrap();
            assert_eq!(list, joined);
            assert_eq!(list, encoded);
            assert!(null.is_root());
        }

        #[test]
        fn display_round_trips_through_parse() {
            let path = FolderPath::from_segments(["one", "two"]);
            assert_eq!(path.to_string(), "one,two");
            assert_eq!(path.to_string().parse::<FolderPath>().unwrap(), path);
        }

        #[test]
        fn child_and_parent() {
            let path = FolderPath::root().child("a").child("b");
            assert_eq!(path.len(), 2);
            assert_eq!(path.parent().unwrap().segments(), ["a"]);
            assert!(FolderPath::root().parent().is_none());
        }
    }

    mod resolver_tests {
        use super::*;

        #[test]
        fn resolves_nested_chain() {
            let (class, week1, lecture) = nested_class();
            let path = FolderPath::from_segments([&week1, &lecture]);
            let found = resolve(&class.folders, &path).unwrap();
            assert_eq!(found.name, "Lecture");
            assert_eq!(found.id, lecture);
        }

        #[test]
        fn missing_first_segment_is_not_found() {
            let (class, _, lecture) = nested_class();
            let path = FolderPath::from_segments(["nope", lecture.as_str()]);
            let err = resolve(&class.folders, &path).unwrap_err();
            assert_eq!(err.kind(), "not_found");
            assert!(err.to_string().contains("nope"));
        }

        #[test]
        fn missing_later_segment_is_not_found() {
            let (class, week1, _) = nested_class();
            let path = FolderPath::from_segments([week1.as_str(), "nope"]);
            assert!(matches!(resolve(&class.folders, &path), Err(Error::NotFound(_))));
        }

        #[test]
        fn lookups_are_scoped_to_direct_children() {
            let (class, week1, lecture) = nested_class();
            // Lecture exists, but not directly under the root
            let path = FolderPath::from_segments([&lecture]);
            assert!(resolve(&class.folders, &path).is_err());
            // Week1 exists, but not under itself
            let path = FolderPath::from_segments([&week1, &week1]);
            assert!(resolve(&class.folders, &path).is_err());
        }

        #[test]
        fn segment_under_leaf_folder_is_not_found() {
            let (class, week1, lecture) = nested_class();
            let path = FolderPath::from_segments([&week1, &lecture, &lecture]);
            assert!(resolve(&class.folders, &path).is_err());
        }

        #[test]
        fn blank_segment_is_not_found() {
            let (mut class, week1, _) = nested_class();

            let listed: FolderPath = serde_json::from_str(r#"[""]"#).unwrap();
            assert_eq!(locate(&class, &listed).err().unwrap().kind(), "not_found");

            let comma = FolderPath::parse_joined(",");
            assert!(matches!(locate_mut(&mut class, &comma), Err(Error::NotFound(_))));

            let trailing = FolderPath::parse_joined(&format!("{week1},,"));
            assert!(matches!(resolve(&class.folders, &trailing), Err(Error::NotFound(_))));

            // Nothing was created anywhere along the way
            assert_eq!(class.folders.len(), 1);
        }

        #[test]
        fn empty_path_is_rejected() {
            let (class, _, _) = nested_class();
            let err = resolve(&class.folders, &FolderPath::root()).unwrap_err();
            assert_eq!(err.kind(), "validation");
        }

        #[test]
        fn resolve_mut_reaches_same_folder() {
            let (mut class, week1, lecture) = nested_class();
            let path = FolderPath::from_segments([&week1, &lecture]);
            resolve_mut(&mut class.folders, &path).unwrap().name = "Lab".into();
            assert_eq!(resolve(&class.folders, &path).unwrap().name, "Lab");
        }

        #[test]
        fn locate_root_returns_class() {
            let (class, _, _) = nested_class();
            let node = locate(&class, &FolderPath::root()).unwrap();
            assert_eq!(node.name(), "Bio");
            assert_eq!(node.folders().len(), 1);
        }
    }

    mod mutator_tests {
        use super::*;

        #[test]
        fn list_on_empty_class_is_empty_twice() {
            let class = Class::new("Empty");
            assert!(list::<Folder, _>(&class).is_empty());
            assert!(list::<Folder, _>(&class).is_empty());
            assert!(list::<File, _>(&class).is_empty());
            assert!(list::<FlashcardSet, _>(&class).is_empty());
        }

        #[test]
        fn creating_n_folders_keeps_order_and_distinct_ids() {
            let mut class = Class::new("Bio");
            let names = ["A", "B", "C", "D", "E"];
            for name in names {
                create::<Folder, _>(&mut class, folder(name)).unwrap();
            }
            let listed = list::<Folder, _>(&class);
            assert_eq!(listed.len(), names.len());
            let listed_names: Vec<&str> = listed.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(listed_names, names);

            let mut ids: Vec<&str> = listed.iter().map(|f| f.id.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), names.len());
        }

        #[test]
        fn create_folder_requires_name() {
            let mut class = Class::new("Bio");
            let err = create::<Folder, _>(&mut class, NewFolder::default()).unwrap_err();
            assert_eq!(err.kind(), "validation");
            let err = create::<Folder, _>(&mut class, folder("   ")).unwrap_err();
            assert_eq!(err.kind(), "validation");
            assert!(class.folders.is_empty());
        }

        #[test]
        fn update_applies_only_present_fields() {
            let mut class = Class::new("Bio");
            let file: File = create(
                &mut class,
                NewFile {
                    name: Some("notes.txt".into()),
                    content: Some("cells".into()),
                    blob: None,
                },
            )
            .unwrap();

            let updated: File = update(
                &mut class,
                &file.id,
                FileUpdate {
                    name: None,
                    content: Some("organelles".into()),
                },
            )
            .unwrap();
            assert_eq!(updated.name, "notes.txt");
            assert_eq!(updated.content.as_deref(), Some("organelles"));
            assert!(updated.updated_at >= file.updated_at);
        }

        #[test]
        fn explicit_empty_string_overwrites() {
            let mut class = Class::new("Bio");
            let created: Folder = create(&mut class, folder("Week1")).unwrap();
            update::<Folder, _>(
                &mut class,
                &created.id,
                FolderUpdate {
                    name: Some(String::new()),
                },
            )
            .unwrap();
            assert_eq!(class.folders.get(&created.id).unwrap().name, "");
        }

        #[test]
        fn update_missing_record_is_not_found() {
            let mut class = Class::new("Bio");
            let err = update::<File, _>(&mut class, "missing", FileUpdate::default()).unwrap_err();
            assert_eq!(err.to_string(), "File not found");
        }

        #[test]
        fn delete_twice_succeeds_then_not_found() {
            let mut class = Class::new("Bio");
            let created: Folder = create(&mut class, folder("Week1")).unwrap();
            let removed: Folder = delete(&mut class, &created.id).unwrap();
            assert_eq!(removed.id, created.id);
            assert!(matches!(
                delete::<Folder, _>(&mut class, &created.id),
                Err(Error::NotFound(_))
            ));
        }

        #[test]
        fn delete_keeps_remaining_order() {
            let mut class = Class::new("Bio");
            let a: Folder = create(&mut class, folder("A")).unwrap();
            let b: Folder = create(&mut class, folder("B")).unwrap();
            let c: Folder = create(&mut class, folder("C")).unwrap();
            delete::<Folder, _>(&mut class, &b.id).unwrap();
            let ids: Vec<&str> = class.folders.iter().map(|f| f.id.as_str()).collect();
            assert_eq!(ids, [a.id.as_str(), c.id.as_str()]);
        }

        #[test]
        fn create_set_normalizes_cards() {
            let mut class = Class::new("Bio");
            let mut payload = set("Cells");
            payload.cards = Some(vec![CardInput {
                front_image: Some("img/cell.png".into()),
                ..card("What is a cell?", "The unit of life")
            }]);
            let created: FlashcardSet = create(&mut class, payload).unwrap();
            assert_eq!(created.description, "");
            assert_eq!(created.cards.len(), 1);
            let c = &created.cards.as_slice()[0];
            assert_eq!(c.front_image.as_deref(), Some("img/cell.png"));
            assert!(c.back_image.is_none());
            assert!(c.front_math.is_none());
            assert!(created.active_recall_data.is_empty());
        }

        #[test]
        fn create_set_requires_title_and_cards() {
            let mut class = Class::new("Bio");
            let no_cards = NewFlashcardSet {
                title: Some("Cells".into()),
                ..Default::default()
            };
            assert_eq!(create::<FlashcardSet, _>(&mut class, no_cards).unwrap_err().kind(), "validation");

            let no_title = NewFlashcardSet {
                cards: Some(vec![]),
                ..Default::default()
            };
            assert_eq!(create::<FlashcardSet, _>(&mut class, no_title).unwrap_err().kind(), "validation");
            assert!(class.flashcard_sets.is_empty());
        }

        #[test]
        fn create_set_rejects_card_without_back() {
            let mut class = Class::new("Bio");
            let mut payload = set("Cells");
            payload.cards = Some(vec![CardInput {
                front: Some("Q".into()),
                ..Default::default()
            }]);
            let err = create::<FlashcardSet, _>(&mut class, payload).unwrap_err();
            assert!(err.to_string().contains("Card 1"));
        }

        #[test]
        fn update_set_keeps_known_card_ids_and_prunes_recall() {
            let mut class = Class::new("Bio");
            let created: FlashcardSet = create(&mut class, set("Cells")).unwrap();
            let kept = created.cards.as_slice()[0].clone();
            let dropped = created.cards.as_slice()[1].clone();

            {
                let stored = class.flashcard_sets.get_mut(&created.id).unwrap();
                crate::recall::record_review(stored, &kept.id, 3).unwrap();
                crate::recall::record_review(stored, &dropped.id, 2).unwrap();
            }

            let payload = FlashcardSetUpdate {
                cards: Some(vec![
                    CardInput {
                        id: Some(kept.id.clone()),
                        ..card("Q1 edited", "A1")
                    },
                    CardInput {
                        id: Some("forged".into()),
                        ..card("Q3", "A3")
                    },
                ]),
                ..Default::default()
            };
            let updated: FlashcardSet = update(&mut class, &created.id, payload).unwrap();

            assert_eq!(updated.title, "Cells");
            assert_eq!(updated.cards.as_slice()[0].id, kept.id);
            assert_eq!(updated.cards.as_slice()[0].front, "Q1 edited");
            assert_ne!(updated.cards.as_slice()[1].id, "forged");
            assert_eq!(updated.active_recall_data.len(), 1);
            assert!(updated.active_recall_data.contains(&kept.id));
        }

        #[test]
        fn failed_set_update_leaves_record_untouched() {
            let mut class = Class::new("Bio");
            let created: FlashcardSet = create(&mut class, set("Cells")).unwrap();
            let payload = FlashcardSetUpdate {
                title: Some("Renamed".into()),
                cards: Some(vec![CardInput::default()]),
                ..Default::default()
            };
            assert!(update::<FlashcardSet, _>(&mut class, &created.id, payload).is_err());
            let stored = class.flashcard_sets.get(&created.id).unwrap();
            assert_eq!(stored.title, "Cells");
            assert_eq!(stored.cards.len(), 2);
        }

        #[test]
        fn mutators_work_on_nested_folders() {
            let (mut class, week1, lecture) = nested_class();
            let path = FolderPath::from_segments([&week1, &lecture]);
            let node = locate_mut(&mut class, &path).unwrap();
            create::<FlashcardSet, _>(node, set("Cells")).unwrap();

            assert_eq!(list::<FlashcardSet, _>(locate(&class, &path).unwrap()).len(), 1);
            assert!(list::<FlashcardSet, _>(&class).is_empty());
        }
    }

    mod search_tests {
        use super::*;

        #[test]
        fn finds_set_at_root() {
            let mut class = Class::new("Bio");
            let created: FlashcardSet = create(&mut class, set("Root set")).unwrap();
            let (path, found) = find_set(&class, &created.id).unwrap();
            assert!(path.is_root());
            assert_eq!(found.title, "Root set");
        }

        #[test]
        fn finds_set_three_folders_deep() {
            let (mut class, week1, lecture) = nested_class();
            let lecture_path = FolderPath::from_segments([&week1, &lecture]);
            let deep: Folder = create(locate_mut(&mut class, &lecture_path).unwrap(), folder("Deep")).unwrap();
            let deep_path = lecture_path.child(&deep.id);
            let created: FlashcardSet =
                create(locate_mut(&mut class, &deep_path).unwrap(), set("Buried")).unwrap();

            let (path, found) = find_set(&class, &created.id).unwrap();
            assert_eq!(path, deep_path);
            assert_eq!(found.id, created.id);
            assert_eq!(found.title, "Buried");
        }

        #[test]
        fn sibling_sets_never_cross() {
            let mut class = Class::new("Bio");
            let left: Folder = create(&mut class, folder("Left")).unwrap();
            let right: Folder = create(&mut class, folder("Right")).unwrap();
            let left_path = FolderPath::from_segments([&left.id]);
            let right_path = FolderPath::from_segments([&right.id]);
            let left_set: FlashcardSet = create(locate_mut(&mut class, &left_path).unwrap(), set("L")).unwrap();
            let right_set: FlashcardSet = create(locate_mut(&mut class, &right_path).unwrap(), set("R")).unwrap();

            let (path, found) = find_set(&class, &right_set.id).unwrap();
            assert_eq!(path, right_path);
            assert_eq!(found.title, "R");
            let (path, found) = find_set(&class, &left_set.id).unwrap();
            assert_eq!(path, left_path);
            assert_eq!(found.title, "L");
        }

        #[test]
        fn missing_set_is_none() {
            let (class, _, _) = nested_class();
            assert!(find_set(&class, "missing").is_none());
        }

        #[test]
        fn find_set_mut_edits_in_place() {
            let (mut class, week1, _) = nested_class();
            let path = FolderPath::from_segments([&week1]);
            let created: FlashcardSet = create(locate_mut(&mut class, &path).unwrap(), set("Cells")).unwrap();

            let (found_path, stored) = find_set_mut(&mut class, &created.id).unwrap();
            assert_eq!(found_path, path);
            stored.title = "Organelles".into();
            assert_eq!(find_set(&class, &created.id).unwrap().1.title, "Organelles");
        }

        #[test]
        fn find_set_mut_missing_is_not_found() {
            let mut class = Class::new("Bio");
            let err = find_set_mut(&mut class, "missing").unwrap_err();
            assert_eq!(err.to_string(), "Flashcard set not found");
        }
    }

    mod subtree_tests {
        use super::*;

        fn blob(path: &str) -> BlobRef {
            BlobRef {
                storage_path: path.into(),
                size: 3,
                media_type: "text/plain".into(),
            }
        }

        #[test]
        fn blobs_in_collects_descendants() {
            let (mut class, week1, lecture) = nested_class();
            create::<File, _>(
                &mut class,
                NewFile {
                    name: Some("root.txt".into()),
                    content: None,
                    blob: Some(blob("a")),
                },
            )
            .unwrap();
            let path = FolderPath::from_segments([&week1, &lecture]);
            create::<File, _>(
                locate_mut(&mut class, &path).unwrap(),
                NewFile {
                    name: Some("deep.txt".into()),
                    content: Some("inline".into()),
                    blob: Some(blob("b")),
                },
            )
            .unwrap();
            create::<File, _>(
                locate_mut(&mut class, &path).unwrap(),
                NewFile {
                    name: Some("inline.txt".into()),
                    content: Some("no blob".into()),
                    blob: None,
                },
            )
            .unwrap();

            let paths: Vec<String> = blobs_in(&class).into_iter().map(|b| b.storage_path).collect();
            assert_eq!(paths, ["a", "b"]);

            let week1_folder = class.folders.get(&week1).unwrap();
            assert_eq!(blobs_in(week1_folder).len(), 1);
        }

        #[test]
        fn summarize_counts_whole_tree() {
            let (mut class, week1, lecture) = nested_class();
            let path = FolderPath::from_segments([&week1, &lecture]);
            create::<FlashcardSet, _>(locate_mut(&mut class, &path).unwrap(), set("Cells")).unwrap();
            let stats = summarize(&class);
            assert_eq!(
                stats,
                TreeStats {
                    folders: 2,
                    files: 0,
                    flashcard_sets: 1,
                    cards: 2,
                }
            );
        }
    }
}
