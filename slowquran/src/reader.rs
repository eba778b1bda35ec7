//! Reader state - selected chapter, bookmark, preferences and the wiring
//! between navigation, the verse window and the playback session
//!
//! Every operation mutates the aggregate and returns the [`Effect`]s the
//! driver has to carry out. Nothing in here touches the network, the
//! audio device or the clock (apart from bookmark timestamps).

use crate::bookmark::{load_last_chapter, save_last_chapter, Bookmark};
use crate::error::{ApiError, PlaybackError};
use crate::media_session::NowPlaying;
use crate::model::{
    next_chapter_id, previous_chapter_id, Chapter, VerseKey, VersePage, CHAPTER_COUNT,
};
use crate::playback::{
    Completion, LoadRequest, Loaded, MediaHandle, PlaybackController, PlaybackStatus,
    TransportCommand,
};
use crate::prefs::{FontSize, Preferences, Theme};
use crate::text::{arabic_numerals, document_title, BISMILLAH};
use crate::window::{FetchTicket, Jump, MergeOutcome, VerseWindow};
use slowcore::storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A chapter given by id or already resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChapterRef {
    Id(u16),
    Chapter(Chapter),
}

impl From<u16> for ChapterRef {
    fn from(id: u16) -> Self {
        ChapterRef::Id(id)
    }
}

impl From<Chapter> for ChapterRef {
    fn from(chapter: Chapter) -> Self {
        ChapterRef::Chapter(chapter)
    }
}

/// Side effects requested by the reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Fetch a page of verses and hand it back with the ticket.
    FetchPage(FetchTicket),
    /// Open the audio and hand the handle back with the request's ticket.
    LoadAudio(LoadRequest),
    /// Bring a verse into view.
    ScrollTo(VerseKey),
    PlaybackChanged(PlaybackStatus),
    ChapterSelected(Chapter),
    /// The loaded verses or loading flags changed.
    WindowChanged,
}

/// Result of handing a page response to the reader.
#[derive(Debug, Default)]
pub struct PageUpdate {
    /// `None` when the request failed.
    pub outcome: Option<MergeOutcome>,
    pub effects: Vec<Effect>,
}

/// One loaded verse as it is presented, with the display preferences applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerseView {
    pub key: VerseKey,
    /// Verse number in Eastern Arabic digits.
    pub marker: String,
    pub arabic: Option<String>,
    pub translation: Option<String>,
    /// This verse is loading, playing or paused.
    pub active: bool,
    pub bookmarked: bool,
    pub has_audio: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerseListing {
    pub bismillah: Option<&'static str>,
    pub verses: Vec<VerseView>,
    pub font_size: FontSize,
}

pub struct Reader {
    store: Arc<dyn KeyValueStore>,
    chapters: Vec<Chapter>,
    loading_chapters: bool,
    window: VerseWindow,
    playback: PlaybackController,
    bookmark: Option<Bookmark>,
    last_chapter: Option<Chapter>,
    prefs: Preferences,
    auto_play_pending: bool,
}

impl Reader {
    /// Restore preferences, bookmark and last chapter from `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, audio_base: &str) -> Self {
        let prefs = Preferences::load(store.as_ref());
        let bookmark = Bookmark::load(store.as_ref());
        let last_chapter = load_last_chapter(store.as_ref());
        Self {
            store,
            chapters: Vec::new(),
            loading_chapters: true,
            window: VerseWindow::new(),
            playback: PlaybackController::new(audio_base),
            bookmark,
            last_chapter,
            prefs,
            auto_play_pending: false,
        }
    }

    /// Open the bookmarked verse, else the last viewed chapter, else nothing.
    pub fn start(&mut self) -> Vec<Effect> {
        let (chapter, page, target) = if let Some(bm) = &self.bookmark {
            info!("restoring bookmark {}", bm.verse_key);
            (bm.chapter.clone(), bm.page(), Some(bm.verse_id))
        } else if let Some(chapter) = self.last_chapter.clone() {
            info!("restoring chapter {}", chapter.id);
            (chapter, 1, None)
        } else {
            return Vec::new();
        };
        let ticket = self.window.open(chapter.clone(), page, target);
        vec![
            Effect::ChapterSelected(chapter),
            Effect::WindowChanged,
            Effect::FetchPage(ticket),
        ]
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn is_loading_chapters(&self) -> bool {
        self.loading_chapters
    }

    pub fn window(&self) -> &VerseWindow {
        &self.window
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn bookmark(&self) -> Option<&Bookmark> {
        self.bookmark.as_ref()
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn selected_chapter(&self) -> Option<&Chapter> {
        self.window.chapter()
    }

    pub fn auto_play_pending(&self) -> bool {
        self.auto_play_pending
    }

    /// The chapter list arrived. A failed fetch passes an empty list.
    pub fn set_chapters(&mut self, chapters: Vec<Chapter>) {
        self.loading_chapters = false;
        self.chapters = chapters;
    }

    pub fn select_chapter(&mut self, chapter: impl Into<ChapterRef>) -> Vec<Effect> {
        let chapter = match chapter.into() {
            ChapterRef::Chapter(c) => c,
            ChapterRef::Id(id) => match self.resolve(id) {
                Some(c) => c,
                None => {
                    warn!("unknown chapter {id}");
                    return Vec::new();
                }
            },
        };

        self.tracking(|reader| {
            reader.playback.reset();
            let Some(ticket) = reader.window.select_chapter(chapter.clone()) else {
                debug!("chapter {} already selected", chapter.id);
                return Vec::new();
            };
            info!("selected chapter {} ({})", chapter.id, chapter.name_simple);
            reader.auto_play_pending = false;
            save_last_chapter(reader.store.as_ref(), &chapter);
            reader.last_chapter = Some(chapter.clone());
            vec![
                Effect::ChapterSelected(chapter),
                Effect::WindowChanged,
                Effect::FetchPage(ticket),
            ]
        })
    }

    /// Manual navigation: stops at the first and last chapter.
    pub fn next_chapter(&mut self) -> Vec<Effect> {
        match self.selected_chapter().map(|c| c.id) {
            Some(id) if id < CHAPTER_COUNT => self.select_chapter(id + 1),
            _ => Vec::new(),
        }
    }

    pub fn previous_chapter(&mut self) -> Vec<Effect> {
        match self.selected_chapter().and_then(|c| previous_chapter_id(c.id)) {
            Some(id) => self.select_chapter(id),
            None => Vec::new(),
        }
    }

    /// The last verse of the chapter finished: move on to the next chapter
    /// (114 wraps to 1) and play it once its first page is in.
    pub fn chapter_end(&mut self) -> Vec<Effect> {
        let Some(current) = self.selected_chapter().map(|c| c.id) else {
            return Vec::new();
        };
        let effects = self.select_chapter(next_chapter_id(current));
        if effects.iter().any(|e| matches!(e, Effect::FetchPage(_))) {
            self.auto_play_pending = true;
        }
        effects
    }

    pub fn jump_to_verse(&mut self, verse_number: u32) -> Vec<Effect> {
        match self.window.jump_to_verse(verse_number) {
            Jump::Scroll(key) => vec![Effect::ScrollTo(key)],
            Jump::Fetch(ticket) => vec![Effect::WindowChanged, Effect::FetchPage(ticket)],
            Jump::Ignored => Vec::new(),
        }
    }

    pub fn load_previous(&mut self) -> Vec<Effect> {
        match self.window.begin_load_previous() {
            Some(ticket) => vec![Effect::WindowChanged, Effect::FetchPage(ticket)],
            None => Vec::new(),
        }
    }

    /// The verse at `index` in the loaded list became visible.
    pub fn near_end_visible(&mut self, index: usize) -> Vec<Effect> {
        match self.window.near_end_visible(index) {
            Some(ticket) => vec![Effect::WindowChanged, Effect::FetchPage(ticket)],
            None => Vec::new(),
        }
    }

    /// Load the next page if the list currently ends at a full page.
    pub fn load_more(&mut self) -> Vec<Effect> {
        match self.window.trigger_index() {
            Some(index) => self.near_end_visible(index),
            None => Vec::new(),
        }
    }

    /// A page request finished.
    pub fn page_loaded(
        &mut self,
        ticket: &FetchTicket,
        result: Result<VersePage, ApiError>,
    ) -> PageUpdate {
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                if !self.window.fetch_failed(ticket) {
                    debug!("ignoring failure of superseded page {}: {e}", ticket.page);
                    return PageUpdate::default();
                }
                warn!("loading page {} of chapter {} failed: {e}", ticket.page, ticket.chapter);
                self.auto_play_pending = false;
                return PageUpdate {
                    outcome: None,
                    effects: vec![Effect::WindowChanged],
                };
            }
        };

        let outcome = self.window.apply(ticket, page);
        if outcome == MergeOutcome::Stale {
            return PageUpdate {
                outcome: Some(outcome),
                effects: Vec::new(),
            };
        }
        debug!("page {} of chapter {}: {outcome:?}", ticket.page, ticket.chapter);

        let mut effects = vec![Effect::WindowChanged];
        if let Some(key) = self.window.take_ready_target() {
            effects.push(Effect::ScrollTo(key));
        }
        effects.extend(self.auto_play());
        PageUpdate {
            outcome: Some(outcome),
            effects,
        }
    }

    fn auto_play(&mut self) -> Vec<Effect> {
        if !self.auto_play_pending
            || self.window.is_loading()
            || self.playback.current().is_some()
        {
            return Vec::new();
        }
        let Some(first) = self.window.verses().first().map(|v| v.verse_key) else {
            return Vec::new();
        };
        self.auto_play_pending = false;
        debug!("auto-playing {first}");
        self.play_verse(first)
    }

    /// Play the loaded verse `key`, or pause/resume it if it is current.
    pub fn play_verse(&mut self, key: VerseKey) -> Vec<Effect> {
        let Some(verse) = self.window.get(key).cloned() else {
            debug!("verse {key} is not loaded");
            return Vec::new();
        };
        self.tracking(|reader| {
            reader
                .playback
                .play_or_toggle(&verse)
                .map(Effect::LoadAudio)
                .into_iter()
                .collect()
        })
    }

    /// An audio load finished.
    pub fn audio_loaded(
        &mut self,
        ticket: u64,
        result: Result<Box<dyn MediaHandle>, PlaybackError>,
    ) -> Vec<Effect> {
        self.tracking(|reader| match reader.playback.on_loaded(ticket, result) {
            Loaded::Playing(key) => vec![Effect::ScrollTo(key)],
            Loaded::Failed(_) | Loaded::Stale => Vec::new(),
        })
    }

    /// Periodic check for the end of the playing verse.
    pub fn tick(&mut self) -> Vec<Effect> {
        let complete = self.window.is_complete();
        let completion = self.playback.poll_finished(self.window.verses(), complete);
        match completion {
            Some(completion) => self.complete(completion),
            None => Vec::new(),
        }
    }

    /// Media keys from the OS surface.
    pub fn transport(&mut self, command: TransportCommand) -> Vec<Effect> {
        let complete = self.window.is_complete();
        let before = self.playback.status();
        let completion = self.playback.transport(command, self.window.verses(), complete);
        let mut effects = match completion {
            Some(completion) => self.complete(completion),
            None => Vec::new(),
        };
        if !effects.iter().any(|e| matches!(e, Effect::PlaybackChanged(_)))
            && self.playback.status() != before
        {
            effects.push(Effect::PlaybackChanged(self.playback.status()));
        }
        effects
    }

    fn complete(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::Next(request) => vec![
                Effect::PlaybackChanged(self.playback.status()),
                Effect::LoadAudio(request),
            ],
            Completion::ChapterEnd => {
                let mut effects = self.chapter_end();
                if !effects.iter().any(|e| matches!(e, Effect::PlaybackChanged(_))) {
                    effects.push(Effect::PlaybackChanged(self.playback.status()));
                }
                effects
            }
            Completion::Finished => vec![Effect::PlaybackChanged(self.playback.status())],
        }
    }

    /// The header audio button: stops while playing, otherwise toggles.
    pub fn global_audio_toggle(&mut self) -> Vec<Effect> {
        self.tracking(|reader| {
            let force = reader.playback.is_playing();
            reader.playback.stop(force);
            Vec::new()
        })
    }

    pub fn stop_audio(&mut self) -> Vec<Effect> {
        self.tracking(|reader| {
            reader.playback.reset();
            Vec::new()
        })
    }

    /// Bookmark `key`, or remove the bookmark if it already points there.
    /// Returns whether `key` is bookmarked afterwards.
    pub fn toggle_bookmark(&mut self, key: VerseKey) -> bool {
        if self.bookmark.as_ref().is_some_and(|b| b.verse_key == key) {
            info!("removed bookmark {key}");
            self.bookmark = None;
        } else {
            let selected = self.selected_chapter().filter(|c| c.id == key.chapter);
            let Some(chapter) = selected.cloned() else {
                warn!("cannot bookmark {key} outside the selected chapter");
                return false;
            };
            info!("bookmarked {key}");
            self.bookmark = Some(Bookmark::new(chapter, key, key.verse));
        }
        Bookmark::persist(self.store.as_ref(), self.bookmark.as_ref());
        self.bookmark.is_some()
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.prefs.set_theme(self.store.as_ref(), theme);
    }

    pub fn toggle_theme(&mut self) {
        let theme = self.prefs.theme.toggled();
        self.set_theme(theme);
    }

    pub fn set_show_translation(&mut self, on: bool) {
        self.prefs.set_show_translation(self.store.as_ref(), on);
    }

    pub fn set_only_translation(&mut self, on: bool) {
        self.prefs.set_only_translation(self.store.as_ref(), on);
    }

    pub fn set_font_size(&mut self, level: i64) {
        self.prefs.set_font_size(self.store.as_ref(), FontSize::new(level));
    }

    pub fn step_font_size(&mut self, delta: i64) {
        let size = self.prefs.font_size.step(delta);
        self.prefs.set_font_size(self.store.as_ref(), size);
    }

    pub fn title(&self) -> String {
        document_title(self.selected_chapter().map(|c| c.name_simple.as_str()))
    }

    /// The loaded verses with the current display preferences applied.
    pub fn listing(&self) -> VerseListing {
        let bookmarked = self.bookmark.as_ref().map(|b| b.verse_key);
        let verses = self
            .window
            .verses()
            .iter()
            .map(|v| VerseView {
                key: v.verse_key,
                marker: arabic_numerals(v.number()),
                arabic: self.prefs.shows_arabic().then(|| v.text_uthmani.clone()),
                translation: v
                    .translations
                    .first()
                    .filter(|_| self.prefs.shows_translation())
                    .map(|t| t.text.clone()),
                active: self.playback.is_active(v.verse_key),
                bookmarked: bookmarked == Some(v.verse_key),
                has_audio: v.audio_locator().is_some(),
            })
            .collect();
        VerseListing {
            bismillah: self.window.shows_bismillah().then_some(BISMILLAH),
            verses,
            font_size: self.prefs.font_size,
        }
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        let key = self.playback.current()?;
        let chapter = self.selected_chapter().filter(|c| c.id == key.chapter)?;
        Some(NowPlaying::for_verse(chapter, key))
    }

    fn resolve(&self, id: u16) -> Option<Chapter> {
        self.chapters
            .iter()
            .chain(self.selected_chapter())
            .find(|c| c.id == id)
            .cloned()
    }

    /// Run `f` and report a playback status change, if any, after its effects.
    fn tracking(&mut self, f: impl FnOnce(&mut Self) -> Vec<Effect>) -> Vec<Effect> {
        let before = self.playback.status();
        let mut effects = f(self);
        let after = self.playback.status();
        if after != before {
            effects.push(Effect::PlaybackChanged(after));
        }
        effects
    }
}
