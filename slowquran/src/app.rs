//! Async driver
//!
//! `App` owns the [`Reader`] and is the only place where I/O happens. It
//! runs the reader's effects as tokio tasks and feeds their results back
//! in, together with the ticket each request was issued with. Commands
//! arrive over a channel and notices go out over another, so any front end
//! (the console in `main.rs`, a test) can drive it.

use crate::api::QuranApi;
use crate::error::{ApiError, PlaybackError};
use crate::media_session::{MediaSession, SessionState};
use crate::model::{Chapter, ChapterInfo, VerseKey, VersePage};
use crate::playback::{AudioBackend, MediaHandle, PlaybackStatus, TransportCommand};
use crate::prefs::{Preferences, Theme};
use crate::reader::{Effect, Reader, VerseListing};
use crate::window::{Direction, FetchTicket, MergeOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Requests from the front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SelectChapter(u16),
    NextChapter,
    PreviousChapter,
    JumpToVerse(u32),
    /// The verse at this index in the loaded list became visible.
    NearEndVisible(usize),
    LoadMore,
    LoadPrevious,
    PlayVerse(VerseKey),
    GlobalAudioToggle,
    StopAudio,
    Transport(TransportCommand),
    ToggleBookmark(VerseKey),
    SetTheme(Theme),
    ToggleTheme,
    SetShowTranslation(bool),
    SetOnlyTranslation(bool),
    SetFontSize(i64),
    StepFontSize(i64),
    ChapterInfo,
    /// Ask for the loaded verses as they should be displayed.
    ListVerses,
    Quit,
}

/// What the loaded window looks like after a change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub chapter: Option<u16>,
    pub first: Option<u32>,
    pub last: Option<u32>,
    pub len: usize,
    pub page: u32,
    pub start_page: u32,
    pub total_pages: u32,
    pub loading: bool,
    pub loading_previous: bool,
    /// Verses added at the head by the change, for keeping the scroll anchor.
    pub prepended: Option<usize>,
    pub shows_bismillah: bool,
    pub shows_chapter_navigation: bool,
}

/// Updates for the front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    ChaptersLoaded(usize),
    ChapterSelected { chapter: Chapter, title: String },
    Window(WindowSnapshot),
    ScrollTo(VerseKey),
    Playback { status: PlaybackStatus, verse: Option<VerseKey> },
    Bookmark(Option<VerseKey>),
    ChapterInfo { chapter: u16, info: Option<ChapterInfo> },
    Preferences(Preferences),
    Verses(VerseListing),
    Error(String),
}

/// Results of spawned tasks.
enum Event {
    Chapters(Result<Vec<Chapter>, ApiError>),
    Page(FetchTicket, Result<VersePage, ApiError>),
    Audio(u64, Result<Box<dyn MediaHandle>, PlaybackError>),
    Info(u16, Result<Option<ChapterInfo>, ApiError>),
}

enum Incoming {
    Command(Option<Command>),
    Event(Event),
    Tick,
}

/// Front-end side of the channels.
pub struct AppHandle {
    commands: mpsc::UnboundedSender<Command>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl AppHandle {
    /// Returns `false` once the app has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Command> {
        self.commands.clone()
    }

    pub async fn recv(&mut self) -> Option<Notice> {
        self.notices.recv().await
    }
}

pub struct App {
    reader: Reader,
    api: Arc<dyn QuranApi>,
    audio: Arc<dyn AudioBackend>,
    session: Box<dyn MediaSession>,
    poll_interval: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    notices: mpsc::UnboundedSender<Notice>,
    events_tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
    forward: Option<JoinHandle<()>>,
    backward: Option<JoinHandle<()>>,
    audio_load: Option<JoinHandle<()>>,
    epoch: u64,
    initial: Option<(u16, Option<u32>)>,
}

impl App {
    pub fn new(
        reader: Reader,
        api: Arc<dyn QuranApi>,
        audio: Arc<dyn AudioBackend>,
        session: Box<dyn MediaSession>,
        poll_interval: Duration,
    ) -> (Self, AppHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (notices, notices_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let app = Self {
            reader,
            api,
            audio,
            session,
            poll_interval,
            commands,
            notices,
            events_tx,
            events,
            forward: None,
            backward: None,
            audio_load: None,
            epoch: 0,
            initial: None,
        };
        let handle = AppHandle {
            commands: commands_tx,
            notices: notices_rx,
        };
        (app, handle)
    }

    /// Navigate to `chapter` (and `verse`) once the chapter list is in.
    pub fn open_on_start(&mut self, chapter: u16, verse: Option<u32>) {
        self.initial = Some((chapter, verse));
    }

    /// Run until `Command::Quit` or until every handle is dropped.
    pub async fn run(mut self) {
        self.spawn_chapters();
        let effects = self.reader.start();
        self.execute(effects, None);
        self.notify(Notice::Preferences(*self.reader.prefs()));

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let incoming = tokio::select! {
                command = self.commands.recv() => Incoming::Command(command),
                Some(event) = self.events.recv() => Incoming::Event(event),
                _ = ticker.tick() => Incoming::Tick,
            };
            match incoming {
                Incoming::Command(None) | Incoming::Command(Some(Command::Quit)) => break,
                Incoming::Command(Some(command)) => self.handle_command(command),
                Incoming::Event(event) => self.handle_event(event),
                Incoming::Tick => {
                    let effects = self.reader.tick();
                    self.execute(effects, None);
                }
            }
        }

        info!("shutting down");
        let effects = self.reader.stop_audio();
        self.execute(effects, None);
        for task in [self.forward.take(), self.backward.take(), self.audio_load.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }

    fn handle_command(&mut self, command: Command) {
        debug!("command {command:?}");
        let effects = match command {
            Command::SelectChapter(id) if self.reader.is_loading_chapters() => {
                debug!("chapter list not in yet, selecting {id} once it is");
                self.initial = Some((id, None));
                Vec::new()
            }
            Command::SelectChapter(id) => self.reader.select_chapter(id),
            Command::NextChapter => self.reader.next_chapter(),
            Command::PreviousChapter => self.reader.previous_chapter(),
            Command::JumpToVerse(n) => self.reader.jump_to_verse(n),
            Command::NearEndVisible(index) => self.reader.near_end_visible(index),
            Command::LoadMore => self.reader.load_more(),
            Command::LoadPrevious => self.reader.load_previous(),
            Command::PlayVerse(key) => self.reader.play_verse(key),
            Command::GlobalAudioToggle => self.reader.global_audio_toggle(),
            Command::StopAudio => self.reader.stop_audio(),
            Command::Transport(t) => self.reader.transport(t),
            Command::ToggleBookmark(key) => {
                self.reader.toggle_bookmark(key);
                let current = self.reader.bookmark().map(|b| b.verse_key);
                self.notify(Notice::Bookmark(current));
                Vec::new()
            }
            Command::SetTheme(theme) => self.preferences(|r| r.set_theme(theme)),
            Command::ToggleTheme => self.preferences(Reader::toggle_theme),
            Command::SetShowTranslation(on) => self.preferences(|r| r.set_show_translation(on)),
            Command::SetOnlyTranslation(on) => self.preferences(|r| r.set_only_translation(on)),
            Command::SetFontSize(level) => self.preferences(|r| r.set_font_size(level)),
            Command::StepFontSize(delta) => self.preferences(|r| r.step_font_size(delta)),
            Command::ChapterInfo => {
                self.spawn_info();
                Vec::new()
            }
            Command::ListVerses => {
                self.notify(Notice::Verses(self.reader.listing()));
                Vec::new()
            }
            Command::Quit => Vec::new(),
        };
        self.execute(effects, None);
    }

    fn preferences(&mut self, update: impl FnOnce(&mut Reader)) -> Vec<Effect> {
        update(&mut self.reader);
        self.notify(Notice::Preferences(*self.reader.prefs()));
        Vec::new()
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Chapters(result) => {
                let chapters = result.unwrap_or_else(|e| {
                    warn!("loading chapters failed: {e}");
                    self.notify(Notice::Error(e.user_message()));
                    Vec::new()
                });
                info!("{} chapters available", chapters.len());
                self.notify(Notice::ChaptersLoaded(chapters.len()));
                self.reader.set_chapters(chapters);
                if let Some((chapter, verse)) = self.initial.take() {
                    let mut effects = self.reader.select_chapter(chapter);
                    if let Some(verse) = verse {
                        effects.extend(self.reader.jump_to_verse(verse));
                    }
                    self.execute(effects, None);
                }
            }
            Event::Page(ticket, result) => {
                let message = result.as_ref().err().map(ApiError::user_message);
                let update = self.reader.page_loaded(&ticket, result);
                let failed_live = update.outcome.is_none() && !update.effects.is_empty();
                if let (Some(message), true) = (message, failed_live) {
                    self.notify(Notice::Error(message));
                }
                if !self.reader.window().is_loading_previous() {
                    if let Some(task) = self.backward.take() {
                        task.abort();
                    }
                }
                let prepended = match update.outcome {
                    Some(MergeOutcome::Prepended { count }) => Some(count),
                    _ => None,
                };
                self.execute(update.effects, prepended);
            }
            Event::Audio(ticket, result) => {
                if let Err(e) = &result {
                    warn!("audio load {ticket} failed: {e}");
                }
                let effects = self.reader.audio_loaded(ticket, result);
                self.execute(effects, None);
            }
            Event::Info(chapter, result) => {
                let info = result.unwrap_or_else(|e| {
                    warn!("chapter {chapter} info unavailable: {e}");
                    None
                });
                self.notify(Notice::ChapterInfo { chapter, info });
            }
        }
    }

    fn execute(&mut self, effects: Vec<Effect>, prepended: Option<usize>) {
        for effect in effects {
            match effect {
                Effect::FetchPage(ticket) => self.spawn_fetch(ticket),
                Effect::LoadAudio(request) => {
                    if let Some(task) = self.audio_load.take() {
                        task.abort();
                    }
                    let audio = Arc::clone(&self.audio);
                    let events = self.events_tx.clone();
                    self.audio_load = Some(tokio::spawn(async move {
                        let result = audio.open(&request.url).await;
                        let _ = events.send(Event::Audio(request.ticket, result));
                    }));
                }
                Effect::ScrollTo(key) => self.notify(Notice::ScrollTo(key)),
                Effect::PlaybackChanged(status) => {
                    let now_playing = self.reader.now_playing();
                    self.session.set_metadata(now_playing.as_ref());
                    self.session.set_state(SessionState::from(status));
                    self.notify(Notice::Playback {
                        status,
                        verse: self.reader.playback().current(),
                    });
                }
                Effect::ChapterSelected(chapter) => {
                    let title = self.reader.title();
                    self.notify(Notice::ChapterSelected { chapter, title });
                }
                Effect::WindowChanged => {
                    let snapshot = self.snapshot(prepended);
                    self.notify(Notice::Window(snapshot));
                }
            }
        }
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket) {
        if ticket.epoch != self.epoch {
            self.epoch = ticket.epoch;
            if let Some(task) = self.backward.take() {
                task.abort();
            }
        }
        let slot = match ticket.direction {
            Direction::Forward => &mut self.forward,
            Direction::Backward => &mut self.backward,
        };
        if let Some(task) = slot.take() {
            task.abort();
        }

        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        *slot = Some(tokio::spawn(async move {
            let result = api.verses(ticket.chapter, ticket.page).await;
            let _ = events.send(Event::Page(ticket, result));
        }));
    }

    fn spawn_chapters(&self) {
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.chapters().await;
            let _ = events.send(Event::Chapters(result));
        });
    }

    fn spawn_info(&self) {
        let Some(chapter) = self.reader.selected_chapter().map(|c| c.id) else {
            self.notify(Notice::ChapterInfo { chapter: 0, info: None });
            return;
        };
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.chapter_info(chapter).await;
            let _ = events.send(Event::Info(chapter, result));
        });
    }

    fn snapshot(&self, prepended: Option<usize>) -> WindowSnapshot {
        let window = self.reader.window();
        WindowSnapshot {
            chapter: window.chapter().map(|c| c.id),
            first: window.verses().first().map(|v| v.number()),
            last: window.verses().last().map(|v| v.number()),
            len: window.verses().len(),
            page: window.page(),
            start_page: window.start_page(),
            total_pages: window.total_pages(),
            loading: window.is_loading(),
            loading_previous: window.is_loading_previous(),
            prepended,
            shows_bismillah: window.shows_bismillah(),
            shows_chapter_navigation: window.shows_chapter_navigation(),
        }
    }

    fn notify(&self, notice: Notice) {
        // The front end may already be gone during shutdown.
        let _ = self.notices.send(notice);
    }
}
