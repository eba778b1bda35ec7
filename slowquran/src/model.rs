//! Chapters, verses and the API payloads that carry them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of chapters in the Qur'an.
pub const CHAPTER_COUNT: u16 = 114;

/// Verses per fetched page.
pub const PAGE_SIZE: u32 = 10;

/// Page that holds verse `verse_number` (1-based).
pub fn page_for_verse(verse_number: u32) -> u32 {
    verse_number.max(1).div_ceil(PAGE_SIZE)
}

/// Chapter after `id`, wrapping 114 back to 1.
pub fn next_chapter_id(id: u16) -> u16 {
    if id >= CHAPTER_COUNT {
        1
    } else {
        id + 1
    }
}

/// Chapter before `id`, or `None` at the first chapter.
pub fn previous_chapter_id(id: u16) -> Option<u16> {
    if id > 1 {
        Some(id - 1)
    } else {
        None
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedName {
    #[serde(default)]
    pub language_name: String,
    #[serde(default)]
    pub name: String,
}

/// One of the 114 chapters (surahs).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: u16,
    pub name_simple: String,
    #[serde(default)]
    pub name_arabic: String,
    #[serde(default)]
    pub translated_name: TranslatedName,
    pub verses_count: u32,
    #[serde(default)]
    pub revelation_place: String,
}

impl Chapter {
    pub fn total_pages(&self) -> u32 {
        page_for_verse(self.verses_count)
    }

    pub fn contains_verse(&self, verse_number: u32) -> bool {
        verse_number >= 1 && verse_number <= self.verses_count
    }
}

/// Address of a verse: `"{chapter}:{verse}"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerseKey {
    pub chapter: u16,
    pub verse: u32,
}

impl VerseKey {
    pub fn new(chapter: u16, verse: u32) -> Self {
        Self { chapter, verse }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid verse key {0:?}")]
pub struct ParseVerseKeyError(pub String);

impl FromStr for VerseKey {
    type Err = ParseVerseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVerseKeyError(s.to_string());
        let (chapter, verse) = s.trim().split_once(':').ok_or_else(err)?;
        let chapter: u16 = chapter.parse().map_err(|_| err())?;
        let verse: u32 = verse.parse().map_err(|_| err())?;
        if chapter == 0 || verse == 0 {
            return Err(err());
        }
        Ok(Self { chapter, verse })
    }
}

impl TryFrom<String> for VerseKey {
    type Error = ParseVerseKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VerseKey> for String {
    fn from(key: VerseKey) -> Self {
        key.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    #[serde(default)]
    pub resource_id: u32,
    pub text: String,
}

/// Recitation locator, relative to the audio host or absolute.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRef {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub id: u32,
    pub verse_key: VerseKey,
    #[serde(default)]
    pub text_uthmani: String,
    #[serde(default)]
    pub translations: Vec<Translation>,
    #[serde(default)]
    pub audio: Option<AudioRef>,
}

impl Verse {
    /// Position within the chapter. Ordering is defined by the key alone.
    pub fn number(&self) -> u32 {
        self.verse_key.verse
    }

    pub fn audio_locator(&self) -> Option<&str> {
        self.audio
            .as_ref()
            .and_then(|a| a.url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub per_page: u32,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_records: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            per_page: PAGE_SIZE,
            current_page: 1,
            total_pages: 1,
            total_records: 0,
        }
    }
}

/// One page of a chapter's verses, as served by
/// `GET /api/chapters/{id}/verses?page={n}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersePage {
    #[serde(default)]
    pub verses: Vec<Verse>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaptersResponse {
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// Extended description of a chapter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterInfo {
    #[serde(default)]
    pub short_text: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterInfoResponse {
    #[serde(default)]
    pub chapter_info: Option<ChapterInfo>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_for_verse() {
        assert_eq!(page_for_verse(1), 1);
        assert_eq!(page_for_verse(10), 1);
        assert_eq!(page_for_verse(11), 2);
        assert_eq!(page_for_verse(25), 3);
        assert_eq!(page_for_verse(286), 29);
    }

    #[test]
    fn test_chapter_cycle() {
        assert_eq!(next_chapter_id(1), 2);
        assert_eq!(next_chapter_id(113), 114);
        assert_eq!(next_chapter_id(114), 1);
        assert_eq!(previous_chapter_id(1), None);
        assert_eq!(previous_chapter_id(114), Some(113));
    }

    #[test]
    fn test_verse_key_parse() {
        let key: VerseKey = "2:255".parse().unwrap();
        assert_eq!(key, VerseKey::new(2, 255));
        assert_eq!(key.to_string(), "2:255");
        assert!("2".parse::<VerseKey>().is_err());
        assert!("0:1".parse::<VerseKey>().is_err());
        let err = "a:b".parse::<VerseKey>().unwrap_err();
        assert_eq!(err, ParseVerseKeyError("a:b".into()));
        assert_eq!(err.to_string(), "invalid verse key \"a:b\"");
    }

    #[test]
    fn test_verse_payload_decodes() {
        let json = r#"{
            "verses": [{
                "id": 1,
                "verse_number": 1,
                "verse_key": "1:1",
                "text_uthmani": "بِسْمِ ٱللَّهِ",
                "translations": [{"id": 1, "resource_id": 20, "text": "In the name of Allah"}],
                "audio": {"url": "Alafasy/mp3/001001.mp3", "segments": []}
            }, {
                "id": 2,
                "verse_key": "1:2",
                "audio": {"url": null}
            }],
            "pagination": {
                "per_page": 10, "current_page": 1, "next_page": null,
                "total_pages": 1, "total_records": 7
            }
        }"#;
        let page: VersePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.verses.len(), 2);
        assert_eq!(page.verses[0].number(), 1);
        assert_eq!(page.verses[0].audio_locator(), Some("Alafasy/mp3/001001.mp3"));
        assert_eq!(page.verses[1].audio_locator(), None);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[test]
    fn test_missing_pagination_defaults_to_one_page() {
        let page: VersePage = serde_json::from_str(r#"{"verses": []}"#).unwrap();
        assert_eq!(page.pagination.total_pages, 1);
    }
}
