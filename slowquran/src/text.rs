//! Text helpers for verse display

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Render `n` with Eastern Arabic digits, as used in verse markers.
pub fn arabic_numerals(n: u32) -> String {
    const DIGITS: [char; 10] = ['٠', '١', '٢', '٣', '٤', '٥', '٦', '٧', '٨', '٩'];
    n.to_string()
        .chars()
        .map(|c| c.to_digit(10).map(|d| DIGITS[d as usize]).unwrap_or(c))
        .collect()
}

/// Footnote markers embedded in translation text.
static FOOTNOTE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<sup\b[^>]*>[\s\S]*?</sup>").ok());

/// Strip footnote markers (`<sup ...>...</sup>`) from a translation and
/// collapse runs of whitespace.
pub fn clean_translation(text: &str) -> String {
    let stripped = match FOOTNOTE.as_ref() {
        Some(footnote) => footnote.replace_all(text, ""),
        None => Cow::Borrowed(text),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Chapters 1 and 9 are not preceded by the Bismillah header.
pub fn shows_bismillah(chapter_id: u16) -> bool {
    chapter_id != 1 && chapter_id != 9
}

pub const BISMILLAH: &str = "بِسْمِ ٱللَّهِ ٱلرَّحْمَٰنِ ٱلرَّحِيمِ";

/// Window title for the selected chapter.
pub fn document_title(chapter_name: Option<&str>) -> String {
    match chapter_name {
        Some(name) => format!("Surah {name} | Al-Qur'an"),
        None => "Al-Qur'an".to_string(),
    }
}
