//! Playback session - one verse recitation at a time
//!
//! The controller owns the only media handle. Opening a handle is
//! asynchronous, so starting a verse hands out a [`LoadRequest`] and the
//! opened handle comes back through [`PlaybackController::on_loaded`]
//! with the request's ticket. Loads that were superseded in the meantime
//! are stopped and dropped there.

use crate::error::PlaybackError;
use crate::model::{Verse, VerseKey};
use async_trait::async_trait;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// A decoded, ready-to-play recitation.
pub trait MediaHandle: Send {
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    /// The audio ran to its natural end.
    fn is_finished(&self) -> bool;
}

/// Opens media handles for audio URLs.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn MediaHandle>, PlaybackError>;
}

/// Audio the driver should open for the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: u64,
    pub key: VerseKey,
    pub url: String,
}

/// What happens after the current verse ends or the user skips.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Continue with the next loaded verse.
    Next(LoadRequest),
    /// The last verse of a fully loaded chapter ended.
    ChapterEnd,
    /// Nothing follows; the session is idle.
    Finished,
}

/// OS-level media keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    Next,
    Previous,
    Stop,
}

/// Result of handing an opened handle to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Loaded {
    Playing(VerseKey),
    Failed(VerseKey),
    Stale,
}

/// Absolute locators are used as they are; relative ones are joined to `base`.
pub fn resolve_audio_url(base: &str, locator: &str) -> String {
    if locator.starts_with("http") {
        return locator.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        locator.trim_start_matches('/')
    )
}

pub struct PlaybackController {
    audio_base: String,
    status: PlaybackStatus,
    current: Option<VerseKey>,
    handle: Option<Box<dyn MediaHandle>>,
    ticket: u64,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("status", &self.status)
            .field("current", &self.current)
            .field("ticket", &self.ticket)
            .finish()
    }
}

impl PlaybackController {
    pub fn new(audio_base: impl Into<String>) -> Self {
        Self {
            audio_base: audio_base.into(),
            status: PlaybackStatus::Idle,
            current: None,
            handle: None,
            ticket: 0,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// Verse being loaded, played or paused.
    pub fn current(&self) -> Option<VerseKey> {
        self.current
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn is_active(&self, key: VerseKey) -> bool {
        self.current == Some(key)
    }

    /// Play `verse`, or pause/resume it if it is already the current verse.
    pub fn play_or_toggle(&mut self, verse: &Verse) -> Option<LoadRequest> {
        if self.current == Some(verse.verse_key) {
            self.toggle();
            return None;
        }
        self.start(verse)
    }

    /// Accept an opened handle for the load identified by `ticket`.
    pub fn on_loaded(
        &mut self,
        ticket: u64,
        result: Result<Box<dyn MediaHandle>, PlaybackError>,
    ) -> Loaded {
        if ticket != self.ticket || self.status != PlaybackStatus::Loading {
            debug!("dropping superseded audio load {ticket}");
            if let Ok(mut handle) = result {
                handle.stop();
            }
            return Loaded::Stale;
        }
        let Some(key) = self.current else {
            return Loaded::Stale;
        };

        let started = result.and_then(|mut handle| {
            handle.play()?;
            Ok(handle)
        });
        match started {
            Ok(handle) => {
                info!("playing {key}");
                self.handle = Some(handle);
                self.status = PlaybackStatus::Playing;
                Loaded::Playing(key)
            }
            Err(e) => {
                warn!("playback of {key} failed: {e}");
                self.reset();
                Loaded::Failed(key)
            }
        }
    }

    /// Pause a playing verse or resume a paused one.
    pub fn toggle(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            debug!("toggle ignored while {:?}", self.status);
            return;
        };
        if handle.is_paused() {
            match handle.play() {
                Ok(()) => self.status = PlaybackStatus::Playing,
                Err(e) => {
                    warn!("cannot resume playback: {e}");
                    self.reset();
                }
            }
        } else {
            handle.pause();
            self.status = PlaybackStatus::Paused;
        }
    }

    /// `force` tears the session down; otherwise play/pause is toggled.
    pub fn stop(&mut self, force: bool) {
        if force {
            self.reset();
        } else {
            self.toggle();
        }
    }

    /// Stop and release the handle and forget the current verse. Any load in
    /// flight is invalidated.
    pub fn reset(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
        self.ticket += 1;
        self.current = None;
        self.status = PlaybackStatus::Idle;
    }

    /// Check whether the playing verse has ended and decide what follows,
    /// given the loaded `verses` and whether they make up the whole chapter.
    pub fn poll_finished(
        &mut self,
        verses: &[Verse],
        chapter_complete: bool,
    ) -> Option<Completion> {
        if self.status != PlaybackStatus::Playing {
            return None;
        }
        if !self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            return None;
        }
        let finished = self.current?;
        debug!("{finished} finished");
        Some(self.advance(finished, verses, chapter_complete))
    }

    /// Apply a media key.
    pub fn transport(
        &mut self,
        command: TransportCommand,
        verses: &[Verse],
        chapter_complete: bool,
    ) -> Option<Completion> {
        match command {
            TransportCommand::Play => {
                if self.status == PlaybackStatus::Paused {
                    self.toggle();
                }
                None
            }
            TransportCommand::Pause => {
                if self.status == PlaybackStatus::Playing {
                    self.toggle();
                }
                None
            }
            TransportCommand::Stop => {
                self.reset();
                None
            }
            TransportCommand::Next => {
                let current = self.current?;
                let index = verses.iter().position(|v| v.verse_key == current)?;
                match verses.get(index + 1) {
                    Some(next) => self.start(next).map(Completion::Next),
                    None if chapter_complete => Some(Completion::ChapterEnd),
                    None => None,
                }
            }
            TransportCommand::Previous => {
                let current = self.current?;
                let index = verses.iter().position(|v| v.verse_key == current)?;
                let previous = verses.get(index.checked_sub(1)?)?;
                self.start(previous).map(Completion::Next)
            }
        }
    }

    fn advance(
        &mut self,
        finished: VerseKey,
        verses: &[Verse],
        chapter_complete: bool,
    ) -> Completion {
        let next = verses
            .iter()
            .position(|v| v.verse_key == finished)
            .and_then(|i| verses.get(i + 1));
        match next {
            Some(next) => match self.start(next) {
                Some(request) => Completion::Next(request),
                None => {
                    self.reset();
                    Completion::Finished
                }
            },
            None => {
                self.reset();
                if chapter_complete {
                    Completion::ChapterEnd
                } else {
                    Completion::Finished
                }
            }
        }
    }

    /// Tear down the current session and begin loading `verse`. A verse
    /// without audio leaves the current session untouched.
    fn start(&mut self, verse: &Verse) -> Option<LoadRequest> {
        let Some(locator) = verse.audio_locator() else {
            warn!("{}", PlaybackError::MissingAudio(verse.verse_key));
            return None;
        };
        self.reset();
        self.current = Some(verse.verse_key);
        self.status = PlaybackStatus::Loading;
        Some(LoadRequest {
            ticket: self.ticket,
            key: verse.verse_key,
            url: resolve_audio_url(&self.audio_base, locator),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Shared view of a fake handle's state.
    #[derive(Clone, Default)]
    pub struct Tracker {
        pub playing: Arc<AtomicBool>,
        pub finished: Arc<AtomicBool>,
        pub stops: Arc<AtomicUsize>,
    }

    impl Tracker {
        pub fn finish(&self) {
            self.finished.store(true, Ordering::SeqCst);
        }

        pub fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }

        pub fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    pub struct FakeHandle {
        tracker: Tracker,
        fail_play: bool,
    }

    impl FakeHandle {
        pub fn new() -> (Box<dyn MediaHandle>, Tracker) {
            let tracker = Tracker::default();
            let handle = FakeHandle {
                tracker: tracker.clone(),
                fail_play: false,
            };
            (Box::new(handle), tracker)
        }

        pub fn blocked() -> Box<dyn MediaHandle> {
            Box::new(FakeHandle {
                tracker: Tracker::default(),
                fail_play: true,
            })
        }
    }

    impl MediaHandle for FakeHandle {
        fn play(&mut self) -> Result<(), PlaybackError> {
            if self.fail_play {
                return Err(PlaybackError::Output("autoplay blocked".into()));
            }
            self.tracker.playing.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn pause(&mut self) {
            self.tracker.playing.store(false, Ordering::SeqCst);
        }

        fn stop(&mut self) {
            self.tracker.playing.store(false, Ordering::SeqCst);
            self.tracker.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn is_paused(&self) -> bool {
            !self.tracker.playing.load(Ordering::SeqCst)
        }

        fn is_finished(&self) -> bool {
            self.tracker.finished.load(Ordering::SeqCst)
        }
    }

    /// Backend that hands out fake handles and records every URL opened.
    #[derive(Default)]
    pub struct FakeBackend {
        pub opened: Mutex<Vec<String>>,
        pub trackers: Mutex<Vec<Tracker>>,
    }

    impl FakeBackend {
        pub fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }

        pub fn last_tracker(&self) -> Option<Tracker> {
            self.trackers.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl AudioBackend for FakeBackend {
        async fn open(&self, url: &str) -> Result<Box<dyn MediaHandle>, PlaybackError> {
            self.opened.lock().unwrap().push(url.to_string());
            let (handle, tracker) = FakeHandle::new();
            self.trackers.lock().unwrap().push(tracker);
            Ok(handle)
        }
    }
}
