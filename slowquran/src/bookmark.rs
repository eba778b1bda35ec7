//! The single bookmark and the last viewed chapter

use crate::model::{page_for_verse, Chapter, VerseKey};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use slowcore::storage::KeyValueStore;
use tracing::warn;

const BOOKMARK_KEY: &str = "app-bookmark";
const LAST_CHAPTER_KEY: &str = "app-lastChapter";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub chapter: Chapter,
    /// Verse number within the chapter.
    pub verse_id: u32,
    pub verse_key: VerseKey,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Bookmark {
    pub fn new(chapter: Chapter, verse_key: VerseKey, verse_id: u32) -> Self {
        Self {
            chapter,
            verse_id,
            verse_key,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Page that holds the bookmarked verse.
    pub fn page(&self) -> u32 {
        page_for_verse(self.verse_id)
    }

    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        read(store, BOOKMARK_KEY)
    }

    /// Save `bookmark`, or remove the stored one when there is none.
    pub fn persist(store: &dyn KeyValueStore, bookmark: Option<&Bookmark>) {
        let result = match bookmark {
            Some(b) => match serde_json::to_string(b) {
                Ok(json) => store.set(BOOKMARK_KEY, &json),
                Err(e) => {
                    warn!("cannot encode bookmark: {e}");
                    return;
                }
            },
            None => store.remove(BOOKMARK_KEY),
        };
        if let Err(e) = result {
            warn!("failed to save bookmark: {e}");
        }
    }
}

pub fn load_last_chapter(store: &dyn KeyValueStore) -> Option<Chapter> {
    read(store, LAST_CHAPTER_KEY)
}

pub fn save_last_chapter(store: &dyn KeyValueStore, chapter: &Chapter) {
    let result = serde_json::to_string(chapter)
        .map_err(slowcore::storage::StorageError::from)
        .and_then(|json| store.set(LAST_CHAPTER_KEY, &json));
    if let Err(e) = result {
        warn!("failed to save last chapter: {e}");
    }
}

fn read<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("ignoring unreadable {key}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::chapter;
    use slowcore::storage::{MemoryStore, SettingsFile};

    #[test]
    fn test_bookmark_round_trip() {
        let store = MemoryStore::new();
        let bm = Bookmark::new(chapter(2, 286), VerseKey::new(2, 255), 255);
        assert!(bm.timestamp > 0);
        Bookmark::persist(&store, Some(&bm));

        let restored = Bookmark::load(&store).unwrap();
        assert_eq!(restored, bm);
        assert_eq!(restored.page(), 26);

        Bookmark::persist(&store, None);
        assert_eq!(Bookmark::load(&store), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_bookmark_uses_camel_case_fields() {
        let bm = Bookmark {
            chapter: chapter(1, 7),
            verse_id: 5,
            verse_key: VerseKey::new(1, 5),
            timestamp: 1_700_000_000_000,
        };
        let json: serde_json::Value = serde_json::to_value(&bm).unwrap();
        assert_eq!(json["verseId"], 5);
        assert_eq!(json["verseKey"], "1:5");
        assert_eq!(json["chapter"]["id"], 1);
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_corrupt_bookmark_is_ignored() {
        let store = MemoryStore::new();
        store.set("app-bookmark", "{not json").unwrap();
        assert_eq!(Bookmark::load(&store), None);
    }

    #[test]
    fn test_last_chapter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        save_last_chapter(&SettingsFile::open(path.clone()), &chapter(18, 110));
        let reopened = SettingsFile::open(path);
        assert_eq!(load_last_chapter(&reopened).map(|c| c.id), Some(18));
    }
}
