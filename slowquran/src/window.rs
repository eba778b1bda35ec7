//! Verse window - paginated, gap-free view of the selected chapter
//!
//! The window holds the contiguous run of verses loaded so far, between
//! `start_page` and `page`. It never performs I/O itself: operations that
//! need a page return a [`FetchTicket`], and the response is handed back
//! together with that ticket. A ticket that no longer matches the window
//! (the chapter changed, the window was reset, or a newer forward fetch
//! was issued) is rejected, so a late response can never corrupt the
//! current window.

use crate::model::{page_for_verse, Chapter, Verse, VerseKey, VersePage, PAGE_SIZE};
use std::collections::HashSet;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Extends the window at the tail (infinite scroll, jumps).
    Forward,
    /// Extends the window at the head ("load previous").
    Backward,
}

/// Identifies one page request and the window state it was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    /// Selection round: bumped on chapter change and on hard jumps.
    pub epoch: u64,
    /// Forward request counter within the window's lifetime.
    pub seq: u64,
    pub chapter: u16,
    pub page: u32,
    pub direction: Direction,
}

/// What a page response did to the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The response belonged to a superseded request and was dropped.
    Stale,
    /// The window was empty or a gap was found; it now holds only the page.
    Replaced { count: usize },
    /// New verses were added at the tail.
    Appended { count: usize },
    /// New verses were added at the head.
    Prepended { count: usize },
}

/// Result of asking the window to show a particular verse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Jump {
    /// The verse is loaded; scroll to it.
    Scroll(VerseKey),
    /// The verse is on a page that must be fetched first.
    Fetch(FetchTicket),
    /// No chapter is selected or the verse does not exist.
    Ignored,
}

#[derive(Debug)]
pub struct VerseWindow {
    chapter: Option<Chapter>,
    verses: Vec<Verse>,
    page: u32,
    start_page: u32,
    total_pages: u32,
    scroll_target: Option<u32>,
    epoch: u64,
    seq: u64,
    loading: bool,
    loading_previous: bool,
}

impl Default for VerseWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl VerseWindow {
    pub fn new() -> Self {
        Self {
            chapter: None,
            verses: Vec::new(),
            page: 1,
            start_page: 1,
            total_pages: 1,
            scroll_target: None,
            epoch: 0,
            seq: 0,
            loading: false,
            loading_previous: false,
        }
    }

    pub fn chapter(&self) -> Option<&Chapter> {
        self.chapter.as_ref()
    }

    pub fn verses(&self) -> &[Verse] {
        &self.verses
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn start_page(&self) -> u32 {
        self.start_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Verse number waiting to be scrolled to once it is loaded.
    pub fn scroll_target(&self) -> Option<u32> {
        self.scroll_target
    }

    /// A forward fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// A "load previous" fetch is in flight.
    pub fn is_loading_previous(&self) -> bool {
        self.loading_previous
    }

    pub fn can_load_previous(&self) -> bool {
        self.chapter.is_some() && self.start_page > 1
    }

    /// Every verse of the chapter is loaded.
    pub fn is_complete(&self) -> bool {
        self.chapter
            .as_ref()
            .is_some_and(|c| self.verses.len() as u32 == c.verses_count)
    }

    /// The chapter footer (previous/next chapter) is shown once the last
    /// page is in and nothing is loading.
    pub fn shows_chapter_navigation(&self) -> bool {
        !self.loading && self.page >= self.total_pages && !self.verses.is_empty()
    }

    /// The Bismillah header is shown above the first page of most chapters.
    pub fn shows_bismillah(&self) -> bool {
        self.start_page == 1
            && self
                .chapter
                .as_ref()
                .is_some_and(|c| crate::text::shows_bismillah(c.id))
    }

    pub fn index_of(&self, key: VerseKey) -> Option<usize> {
        self.verses.iter().position(|v| v.verse_key == key)
    }

    pub fn get(&self, key: VerseKey) -> Option<&Verse> {
        self.verses.iter().find(|v| v.verse_key == key)
    }

    pub fn contains(&self, key: VerseKey) -> bool {
        self.get(key).is_some()
    }

    /// Index of the verse whose visibility triggers loading the next page:
    /// the 4th from last, or the last when there are four or fewer.
    pub fn trigger_index(&self) -> Option<usize> {
        match self.verses.len() {
            0 => None,
            n if n > 4 => Some(n - 4),
            n => Some(n - 1),
        }
    }

    /// Select `chapter` and start loading its first page. Reselecting the
    /// current chapter does nothing.
    pub fn select_chapter(&mut self, chapter: Chapter) -> Option<FetchTicket> {
        if self.chapter.as_ref().map(|c| c.id) == Some(chapter.id) {
            return None;
        }
        Some(self.open(chapter, 1, None))
    }

    /// Open `chapter` at `page`, discarding whatever was loaded, and
    /// optionally remember a verse to scroll to once it arrives.
    pub fn open(&mut self, chapter: Chapter, page: u32, target: Option<u32>) -> FetchTicket {
        let page = page.clamp(1, chapter.total_pages().max(1));
        debug!("opening chapter {} at page {page}", chapter.id);
        self.total_pages = chapter.total_pages().max(1);
        self.chapter = Some(chapter);
        self.verses.clear();
        self.page = page;
        self.start_page = page;
        self.scroll_target = target;
        self.new_epoch();
        self.issue_forward()
    }

    /// Show verse `verse_number` of the selected chapter.
    pub fn jump_to_verse(&mut self, verse_number: u32) -> Jump {
        let Some(chapter) = self.chapter.as_ref() else {
            return Jump::Ignored;
        };
        if !chapter.contains_verse(verse_number) {
            debug!("ignoring jump to {}:{verse_number}", chapter.id);
            return Jump::Ignored;
        }

        let key = VerseKey::new(chapter.id, verse_number);
        if self.contains(key) {
            self.scroll_target = None;
            return Jump::Scroll(key);
        }

        let required = page_for_verse(verse_number);
        self.scroll_target = Some(verse_number);
        if required == self.page + 1 {
            // Next page: extend the window instead of resetting it.
            self.page = required;
            return Jump::Fetch(self.issue_forward());
        }

        debug!("hard jump to page {required}");
        self.verses.clear();
        self.page = required;
        self.start_page = required;
        self.new_epoch();
        Jump::Fetch(self.issue_forward())
    }

    /// The verse at `index` became visible. Loads the next page when it is
    /// the trigger verse, the current page is fully loaded and more pages
    /// exist.
    pub fn near_end_visible(&mut self, index: usize) -> Option<FetchTicket> {
        if self.trigger_index() != Some(index) || self.loading || self.chapter.is_none() {
            return None;
        }
        if self.page >= self.total_pages {
            return None;
        }
        let tail = self.verses.last()?.number();
        if tail != self.page * PAGE_SIZE {
            return None;
        }
        self.page += 1;
        Some(self.issue_forward())
    }

    /// Start loading the page before `start_page`.
    pub fn begin_load_previous(&mut self) -> Option<FetchTicket> {
        let chapter = self.chapter.as_ref()?.id;
        if self.start_page <= 1 || self.loading_previous {
            return None;
        }
        self.loading_previous = true;
        Some(FetchTicket {
            epoch: self.epoch,
            seq: self.seq,
            chapter,
            page: self.start_page - 1,
            direction: Direction::Backward,
        })
    }

    /// Whether a response for `ticket` would still be applied.
    pub fn is_live(&self, ticket: &FetchTicket) -> bool {
        let same_round = ticket.epoch == self.epoch
            && self.chapter.as_ref().map(|c| c.id) == Some(ticket.chapter);
        match ticket.direction {
            Direction::Forward => same_round && self.loading && ticket.seq == self.seq,
            Direction::Backward => {
                same_round && self.loading_previous && ticket.page + 1 == self.start_page
            }
        }
    }

    /// Apply a page response.
    pub fn apply(&mut self, ticket: &FetchTicket, fetched: VersePage) -> MergeOutcome {
        if !self.is_live(ticket) {
            debug!(
                "dropping stale page {} of chapter {} (epoch {}, current {})",
                ticket.page, ticket.chapter, ticket.epoch, self.epoch
            );
            return MergeOutcome::Stale;
        }
        match ticket.direction {
            Direction::Forward => self.merge_forward(ticket, fetched),
            Direction::Backward => self.merge_backward(ticket, fetched),
        }
    }

    /// A request failed. Clears its loading flag if it is still live, and
    /// moves `page` back to the last loaded page so the next trigger retries.
    pub fn fetch_failed(&mut self, ticket: &FetchTicket) -> bool {
        if !self.is_live(ticket) {
            return false;
        }
        match ticket.direction {
            Direction::Forward => {
                self.loading = false;
                if let Some(tail) = self.verses.last() {
                    self.page = page_for_verse(tail.number());
                }
            }
            Direction::Backward => self.loading_previous = false,
        }
        true
    }

    /// If the pending scroll target is now loaded, clear it and return its key.
    pub fn take_ready_target(&mut self) -> Option<VerseKey> {
        let chapter = self.chapter.as_ref()?.id;
        let key = VerseKey::new(chapter, self.scroll_target?);
        if self.contains(key) {
            self.scroll_target = None;
            Some(key)
        } else {
            None
        }
    }

    fn merge_forward(&mut self, ticket: &FetchTicket, fetched: VersePage) -> MergeOutcome {
        self.loading = false;
        self.total_pages = fetched.pagination.total_pages.max(1);
        let fetched = fetched.verses;

        let Some(tail) = self.verses.last().map(Verse::number) else {
            return self.replace(ticket, fetched);
        };

        let existing: HashSet<VerseKey> = self.verses.iter().map(|v| v.verse_key).collect();
        let Some(first_new) = fetched.iter().find(|v| !existing.contains(&v.verse_key)) else {
            return MergeOutcome::Appended { count: 0 };
        };
        if first_new.number() != tail + 1 {
            debug!(
                "gap between verse {tail} and {} in chapter {}, resetting window",
                first_new.number(),
                ticket.chapter
            );
            return self.replace(ticket, fetched);
        }

        let before = self.verses.len();
        self.verses
            .extend(fetched.into_iter().filter(|v| !existing.contains(&v.verse_key)));
        MergeOutcome::Appended {
            count: self.verses.len() - before,
        }
    }

    fn merge_backward(&mut self, ticket: &FetchTicket, fetched: VersePage) -> MergeOutcome {
        self.loading_previous = false;
        if fetched.verses.is_empty() {
            return MergeOutcome::Prepended { count: 0 };
        }
        let existing: HashSet<VerseKey> = self.verses.iter().map(|v| v.verse_key).collect();
        let fresh: Vec<Verse> = fetched
            .verses
            .into_iter()
            .filter(|v| !existing.contains(&v.verse_key))
            .collect();
        let count = fresh.len();
        self.verses.splice(0..0, fresh);
        self.start_page = ticket.page;
        MergeOutcome::Prepended { count }
    }

    fn replace(&mut self, ticket: &FetchTicket, fetched: Vec<Verse>) -> MergeOutcome {
        if self.start_page != ticket.page {
            // The head moves: a backward load in flight no longer fits.
            self.loading_previous = false;
        }
        self.verses = fetched;
        self.start_page = ticket.page;
        MergeOutcome::Replaced {
            count: self.verses.len(),
        }
    }

    fn new_epoch(&mut self) {
        self.epoch += 1;
        self.loading_previous = false;
    }

    fn issue_forward(&mut self) -> FetchTicket {
        self.seq += 1;
        self.loading = true;
        FetchTicket {
            epoch: self.epoch,
            seq: self.seq,
            chapter: self.chapter.as_ref().map(|c| c.id).unwrap_or_default(),
            page: self.page,
            direction: Direction::Forward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{chapter, page, verse};

    fn numbers(window: &VerseWindow) -> Vec<u32> {
        window.verses().iter().map(Verse::number).collect()
    }

    fn assert_contiguous(window: &VerseWindow) {
        let n = numbers(window);
        for pair in n.windows(2) {
            assert_eq!(pair[1], pair[0] + 1, "window not contiguous: {n:?}");
        }
    }

    /// Window on a 286-verse chapter with pages 1..=`pages` loaded.
    fn loaded(pages: u32) -> VerseWindow {
        let mut w = VerseWindow::new();
        let t = w.select_chapter(chapter(2, 286)).unwrap();
        assert_eq!(w.apply(&t, page(2, 286, 1)), MergeOutcome::Replaced { count: 10 });
        for p in 2..=pages {
            let t = w.near_end_visible(w.trigger_index().unwrap()).unwrap();
            assert_eq!(t.page, p);
            w.apply(&t, page(2, 286, p));
        }
        w
    }

    #[test]
    fn test_select_chapter_resets_and_fetches_page_one() {
        let mut w = loaded(3);
        let t = w.select_chapter(chapter(3, 200)).unwrap();
        assert_eq!((t.chapter, t.page, t.direction), (3, 1, Direction::Forward));
        assert!(w.verses().is_empty());
        assert_eq!((w.page(), w.start_page()), (1, 1));
        assert!(w.is_loading());
    }

    #[test]
    fn test_reselecting_same_chapter_is_noop() {
        let mut w = loaded(2);
        let epoch = w.epoch();
        assert_eq!(w.select_chapter(chapter(2, 286)), None);
        assert_eq!(numbers(&w), (1..=20).collect::<Vec<_>>());
        assert_eq!(w.page(), 2);
        assert_eq!(w.epoch(), epoch);
        assert!(!w.is_loading());
    }

    #[test]
    fn test_forward_fetches_stay_contiguous() {
        let w = loaded(5);
        assert_eq!(numbers(&w), (1..=50).collect::<Vec<_>>());
        assert_eq!(w.total_pages(), 29);
        assert_contiguous(&w);
    }

    #[test]
    fn test_overlapping_page_is_deduplicated() {
        let mut w = VerseWindow::new();
        let t = w.select_chapter(chapter(2, 286)).unwrap();
        w.apply(&t, page(2, 286, 1));
        let t = w.near_end_visible(6).unwrap();

        // Server returns 6..=20: 6..=10 are already present.
        let mut overlapping = page(2, 286, 2);
        overlapping.verses.splice(0..0, (6..=10).map(|n| verse(2, n)));
        assert_eq!(w.apply(&t, overlapping), MergeOutcome::Appended { count: 10 });
        assert_eq!(numbers(&w), (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_gap_replaces_window() {
        let mut w = VerseWindow::new();
        let t = w.select_chapter(chapter(2, 286)).unwrap();
        w.apply(&t, page(2, 286, 1));
        let t = w.near_end_visible(6).unwrap();

        // Response for the ticket's page carries verses 31..=40 instead.
        assert_eq!(w.apply(&t, page(2, 286, 4)), MergeOutcome::Replaced { count: 10 });
        assert_eq!(numbers(&w), (31..=40).collect::<Vec<_>>());
        assert_eq!(w.start_page(), 2);
        assert_contiguous(&w);
    }

    #[test]
    fn test_short_chapter_never_fetches_second_page() {
        let mut w = VerseWindow::new();
        let t = w.select_chapter(chapter(1, 7)).unwrap();
        w.apply(&t, page(1, 7, 1));
        assert_eq!(w.total_pages(), 1);
        for index in 0..7 {
            assert_eq!(w.near_end_visible(index), None);
        }
        assert_eq!(w.page(), 1);
        assert!(w.is_complete());
        assert!(w.shows_chapter_navigation());
    }

    #[test]
    fn test_trigger_waits_for_full_page() {
        let mut w = loaded(1);
        // Only the trigger verse counts.
        assert_eq!(w.trigger_index(), Some(6));
        assert_eq!(w.near_end_visible(9), None);
        let t = w.near_end_visible(6).unwrap();
        // While the fetch is in flight the trigger is disarmed.
        assert_eq!(w.near_end_visible(6), None);
        assert!(w.fetch_failed(&t));
        assert!(!w.fetch_failed(&t));
        assert_eq!(w.page(), 1);
        // Seeing the trigger verse again retries page 2.
        assert_eq!(w.near_end_visible(6).map(|t| t.page), Some(2));
    }

    #[test]
    fn test_partial_last_page_does_not_trigger() {
        let mut w = VerseWindow::new();
        let t = w.select_chapter(chapter(2, 286)).unwrap();
        let mut short = page(2, 286, 1);
        short.verses.truncate(8);
        w.apply(&t, short);
        assert_eq!(w.near_end_visible(w.trigger_index().unwrap()), None);
    }

    #[test]
    fn test_trigger_index_for_short_windows() {
        let mut w = VerseWindow::new();
        assert_eq!(w.trigger_index(), None);
        let t = w.select_chapter(chapter(108, 3)).unwrap();
        w.apply(&t, page(108, 3, 1));
        assert_eq!(w.trigger_index(), Some(2));
    }

    #[test]
    fn test_jump_far_resets_window() {
        let mut w = loaded(1);
        let epoch = w.epoch();
        let Jump::Fetch(t) = w.jump_to_verse(25) else {
            panic!("expected a fetch");
        };
        assert_eq!(t.page, 3);
        assert!(w.verses().is_empty());
        assert_eq!((w.page(), w.start_page()), (3, 3));
        assert_eq!(w.scroll_target(), Some(25));
        assert!(w.epoch() > epoch);

        w.apply(&t, page(2, 286, 3));
        assert_eq!(w.take_ready_target(), Some(VerseKey::new(2, 25)));
        assert_eq!(w.scroll_target(), None);
        assert!(w.can_load_previous());
        assert!(!w.shows_bismillah());
    }

    #[test]
    fn test_jump_to_next_page_extends_window() {
        let mut w = loaded(1);
        let epoch = w.epoch();
        let Jump::Fetch(t) = w.jump_to_verse(15) else {
            panic!("expected a fetch");
        };
        assert_eq!(t.page, 2);
        assert_eq!(w.page(), 2);
        assert_eq!(w.start_page(), 1);
        assert_eq!(w.epoch(), epoch);
        assert_eq!(numbers(&w), (1..=10).collect::<Vec<_>>());

        w.apply(&t, page(2, 286, 2));
        assert_eq!(numbers(&w), (1..=20).collect::<Vec<_>>());
        assert_eq!(w.take_ready_target(), Some(VerseKey::new(2, 15)));
    }

    #[test]
    fn test_jump_to_loaded_verse_only_scrolls() {
        let mut w = loaded(2);
        assert_eq!(w.jump_to_verse(12), Jump::Scroll(VerseKey::new(2, 12)));
        assert!(!w.is_loading());
        assert_eq!(w.page(), 2);
    }

    #[test]
    fn test_jump_out_of_range_is_ignored() {
        let mut w = loaded(1);
        assert_eq!(w.jump_to_verse(0), Jump::Ignored);
        assert_eq!(w.jump_to_verse(287), Jump::Ignored);
        assert_eq!(VerseWindow::new().jump_to_verse(1), Jump::Ignored);
    }

    #[test]
    fn test_stale_response_after_chapter_change_is_dropped() {
        let mut w = VerseWindow::new();
        let old = w.select_chapter(chapter(2, 286)).unwrap();
        let new = w.select_chapter(chapter(3, 200)).unwrap();
        assert_eq!(w.apply(&old, page(2, 286, 1)), MergeOutcome::Stale);
        assert!(w.verses().is_empty());
        assert!(w.is_loading());
        assert!(!w.fetch_failed(&old));
        assert!(w.is_loading());
        assert_eq!(w.apply(&new, page(3, 200, 1)), MergeOutcome::Replaced { count: 10 });
    }

    #[test]
    fn test_superseded_forward_fetch_is_dropped() {
        let mut w = loaded(1);
        let Jump::Fetch(first) = w.jump_to_verse(15) else {
            panic!("expected a fetch");
        };
        let Jump::Fetch(second) = w.jump_to_verse(55) else {
            panic!("expected a fetch");
        };
        assert_eq!(w.apply(&first, page(2, 286, 2)), MergeOutcome::Stale);
        assert_eq!(w.apply(&second, page(2, 286, 6)), MergeOutcome::Replaced { count: 10 });
        assert_eq!(numbers(&w), (51..=60).collect::<Vec<_>>());
    }

    #[test]
    fn test_load_previous_prepends() {
        let mut w = VerseWindow::new();
        let t = w.open(chapter(2, 286), 3, Some(25));
        w.apply(&t, page(2, 286, 3));

        let prev = w.begin_load_previous().unwrap();
        assert_eq!((prev.page, prev.direction), (2, Direction::Backward));
        assert!(w.is_loading_previous());
        assert_eq!(w.begin_load_previous(), None);

        assert_eq!(w.apply(&prev, page(2, 286, 2)), MergeOutcome::Prepended { count: 10 });
        assert_eq!(w.start_page(), 2);
        assert_eq!(numbers(&w), (11..=30).collect::<Vec<_>>());

        let prev = w.begin_load_previous().unwrap();
        w.apply(&prev, page(2, 286, 1));
        assert_eq!(w.start_page(), 1);
        assert_eq!(w.begin_load_previous(), None);
        assert!(w.shows_bismillah());
        assert_contiguous(&w);
    }

    #[test]
    fn test_load_previous_dropped_after_hard_jump() {
        let mut w = VerseWindow::new();
        let t = w.open(chapter(2, 286), 5, None);
        w.apply(&t, page(2, 286, 5));
        let prev = w.begin_load_previous().unwrap();
        let Jump::Fetch(t) = w.jump_to_verse(200) else {
            panic!("expected a fetch");
        };
        assert!(!w.is_loading_previous());
        assert_eq!(w.apply(&prev, page(2, 286, 4)), MergeOutcome::Stale);
        w.apply(&t, page(2, 286, 20));
        assert_eq!(numbers(&w), (191..=200).collect::<Vec<_>>());
    }

    #[test]
    fn test_gap_reset_releases_pending_load_previous() {
        let mut w = VerseWindow::new();
        let t = w.open(chapter(2, 286), 3, None);
        w.apply(&t, page(2, 286, 3));
        let back = w.begin_load_previous().unwrap();
        assert_eq!(back.page, 2);

        let t4 = w.near_end_visible(w.trigger_index().unwrap()).unwrap();
        assert_eq!(t4.page, 4);
        let Jump::Fetch(t5) = w.jump_to_verse(45) else {
            panic!("expected a fetch for page 5");
        };
        assert_eq!(t5.epoch, back.epoch);
        assert_eq!(w.apply(&t5, page(2, 286, 5)), MergeOutcome::Replaced { count: 10 });
        assert_eq!(w.start_page(), 5);
        assert!(!w.is_loading_previous());

        assert_eq!(w.apply(&back, page(2, 286, 2)), MergeOutcome::Stale);
        assert_eq!(numbers(&w), (41..=50).collect::<Vec<_>>());
        let retry = w.begin_load_previous().unwrap();
        assert_eq!(retry.page, 4);
        assert_eq!(w.apply(&retry, page(2, 286, 4)), MergeOutcome::Prepended { count: 10 });
        assert_eq!(numbers(&w), (31..=50).collect::<Vec<_>>());
    }

    #[test]
    fn test_load_previous_during_first_page_is_kept() {
        let mut w = VerseWindow::new();
        let t = w.open(chapter(2, 286), 3, None);
        let back = w.begin_load_previous().unwrap();
        assert_eq!(w.apply(&t, page(2, 286, 3)), MergeOutcome::Replaced { count: 10 });
        assert!(w.is_loading_previous());
        assert_eq!(w.apply(&back, page(2, 286, 2)), MergeOutcome::Prepended { count: 10 });
        assert_eq!(numbers(&w), (11..=30).collect::<Vec<_>>());
    }

    #[test]
    fn test_load_previous_survives_forward_extend() {
        let mut w = VerseWindow::new();
        let t = w.open(chapter(2, 286), 3, None);
        w.apply(&t, page(2, 286, 3));
        let back = w.begin_load_previous().unwrap();

        let Jump::Fetch(t4) = w.jump_to_verse(35) else {
            panic!("expected a fetch for page 4");
        };
        assert_eq!(w.apply(&t4, page(2, 286, 4)), MergeOutcome::Appended { count: 10 });
        assert_eq!(w.start_page(), 3);

        assert_eq!(w.apply(&back, page(2, 286, 2)), MergeOutcome::Prepended { count: 10 });
        assert_eq!(w.start_page(), 2);
        assert_eq!(numbers(&w), (11..=40).collect::<Vec<_>>());
        assert_contiguous(&w);
    }

    #[test]
    fn test_failed_load_previous_can_retry() {
        let mut w = VerseWindow::new();
        let t = w.open(chapter(2, 286), 2, None);
        w.apply(&t, page(2, 286, 2));
        let prev = w.begin_load_previous().unwrap();
        assert!(w.fetch_failed(&prev));
        assert!(!w.is_loading_previous());
        assert_eq!(w.start_page(), 2);
        assert!(w.begin_load_previous().is_some());
    }

    #[test]
    fn test_open_clamps_page() {
        let mut w = VerseWindow::new();
        let t = w.open(chapter(1, 7), 4, Some(7));
        assert_eq!(t.page, 1);
        assert_eq!(w.start_page(), 1);
    }
}
