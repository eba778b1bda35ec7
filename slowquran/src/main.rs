use slowcore::storage::{KeyValueStore, SettingsFile};
use slowquran::api::{CachedApi, HttpApi};
use slowquran::cache::{Cache, DiskCache};
use slowquran::media_session::LoggingSession;
use slowquran::model::VerseKey;
use slowquran::playback::{AudioBackend, PlaybackStatus, TransportCommand};
use slowquran::prefs::Theme;
use slowquran::reader::VerseListing;
use slowquran::{App, Command, Config, Notice, Reader};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
commands:
  c <id>         select chapter        n / p        next / previous chapter
  v <n>          jump to verse         more / prev  load next / previous page
  l              list loaded verses    info         chapter information
  play <n>       play or pause verse   a            audio button
  play / pause   resume / pause        > / <        next / previous verse
  s              stop                  bm <n>       toggle bookmark
  theme [light|dark]   tr on|off   only on|off   font <1-5>|+|-
  q              quit";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slowquran=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let initial = match std::env::args().nth(1).map(|arg| parse_location(&arg)) {
        Some(Ok(location)) => Some(location),
        Some(Err(e)) => {
            eprintln!("{e}\nusage: slowquran [chapter[:verse]]");
            std::process::exit(2);
        }
        None => None,
    };

    let config = Config::from_env();
    info!("api {} | settings {}", config.api_url, config.settings_path().display());

    let http = match HttpApi::new(&config.api_url) {
        Ok(http) => http,
        Err(e) => {
            error!("cannot create HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let (_output, audio) = audio_backend(http.client().clone());
    let cache = Cache::new(Arc::new(DiskCache::new(config.cache_dir.clone())));
    let api = Arc::new(CachedApi::new(http, cache));

    let store: Arc<dyn KeyValueStore> = Arc::new(SettingsFile::open(config.settings_path()));
    let reader = Reader::new(store, &config.audio_url);
    let (mut app, mut handle) = App::new(
        reader,
        api,
        audio,
        Box::new(LoggingSession::default()),
        config.poll_interval,
    );
    if let Some((chapter, verse)) = initial {
        app.open_on_start(chapter, verse);
    }
    let app = tokio::spawn(app.run());

    let current = Arc::new(AtomicU16::new(0));
    let commands = handle.sender();
    let console_chapter = Arc::clone(&current);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{USAGE}");
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin: {e}");
                    break;
                }
            };
            let chapter = console_chapter.load(Ordering::Relaxed);
            match parse_command(&line, (chapter > 0).then_some(chapter)) {
                Ok(Some(command)) => {
                    if commands.send(command).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => println!("{e}\n{USAGE}"),
            }
        }
        let _ = commands.send(Command::Quit);
    });

    while let Some(notice) = handle.recv().await {
        if let Notice::ChapterSelected { chapter, .. } = &notice {
            current.store(chapter.id, Ordering::Relaxed);
        }
        println!("{}", describe(&notice));
    }
    if let Err(e) = app.await {
        error!("app task failed: {e}");
    }
}

#[cfg(feature = "audio")]
fn audio_backend(client: reqwest::Client) -> (Option<rodio::OutputStream>, Arc<dyn AudioBackend>) {
    match slowquran::audio::RodioBackend::try_default(client) {
        Ok((stream, backend)) => (Some(stream), Arc::new(backend)),
        Err(e) => {
            warn!("{e}, recitation disabled");
            (None, Arc::new(slowquran::audio::DisabledBackend))
        }
    }
}

#[cfg(not(feature = "audio"))]
fn audio_backend(_client: reqwest::Client) -> (Option<()>, Arc<dyn AudioBackend>) {
    info!("built without the audio feature, recitation disabled");
    (None, Arc::new(slowquran::audio::DisabledBackend))
}

/// `"18"` or `"2:255"`.
fn parse_location(arg: &str) -> Result<(u16, Option<u32>), String> {
    if arg.contains(':') {
        let key: VerseKey = arg.parse().map_err(|e| format!("{e}"))?;
        return Ok((key.chapter, Some(key.verse)));
    }
    match arg.trim().parse::<u16>() {
        Ok(id) if id > 0 => Ok((id, None)),
        _ => Err(format!("invalid chapter {arg:?}")),
    }
}

fn parse_command(line: &str, chapter: Option<u16>) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let number = |what: &str| -> Result<u32, String> {
        arg.and_then(|a| a.parse().ok())
            .ok_or_else(|| format!("{what} needs a number"))
    };
    let switch = || -> Result<bool, String> {
        match arg {
            Some("on") => Ok(true),
            Some("off") => Ok(false),
            _ => Err(format!("{name} needs on or off")),
        }
    };
    let verse = |what: &str| -> Result<VerseKey, String> {
        let n = number(what)?;
        let chapter = chapter.ok_or("select a chapter first")?;
        Ok(VerseKey::new(chapter, n))
    };

    let command = match name {
        "c" => Command::SelectChapter(
            u16::try_from(number("c")?).map_err(|_| "no such chapter".to_string())?,
        ),
        "n" => Command::NextChapter,
        "p" => Command::PreviousChapter,
        "v" => Command::JumpToVerse(number("v")?),
        "more" => Command::LoadMore,
        "prev" => Command::LoadPrevious,
        "play" if arg.is_none() => Command::Transport(TransportCommand::Play),
        "play" => Command::PlayVerse(verse("play")?),
        "pause" => Command::Transport(TransportCommand::Pause),
        "a" => Command::GlobalAudioToggle,
        "s" => Command::StopAudio,
        ">" => Command::Transport(TransportCommand::Next),
        "<" => Command::Transport(TransportCommand::Previous),
        "bm" => Command::ToggleBookmark(verse("bm")?),
        "theme" if arg.is_none() => Command::ToggleTheme,
        "theme" => Command::SetTheme(
            arg.and_then(Theme::parse)
                .ok_or("theme needs light or dark")?,
        ),
        "tr" => Command::SetShowTranslation(switch()?),
        "only" => Command::SetOnlyTranslation(switch()?),
        "font" if arg == Some("+") => Command::StepFontSize(1),
        "font" if arg == Some("-") => Command::StepFontSize(-1),
        "font" => Command::SetFontSize(i64::from(number("font")?)),
        "l" | "list" => Command::ListVerses,
        "info" => Command::ChapterInfo,
        "q" | "quit" => Command::Quit,
        other => return Err(format!("unknown command {other:?}")),
    };
    Ok(Some(command))
}

fn describe(notice: &Notice) -> String {
    match notice {
        Notice::ChaptersLoaded(0) => "chapter list unavailable".into(),
        Notice::ChaptersLoaded(n) => format!("{n} chapters"),
        Notice::ChapterSelected { chapter, title } => format!(
            "== {title} ({}, {} verses, {})",
            chapter.name_arabic, chapter.verses_count, chapter.revelation_place
        ),
        Notice::Window(w) if w.loading && w.len == 0 => "loading...".into(),
        Notice::Window(w) => {
            let range = match (w.first, w.last) {
                (Some(first), Some(last)) => format!("verses {first}-{last}"),
                _ => "no verses".into(),
            };
            let mut line = format!(
                "{range} | pages {}-{} of {}",
                w.start_page, w.page, w.total_pages
            );
            if let Some(n) = w.prepended {
                line.push_str(&format!(" | +{n} above"));
            }
            if w.loading || w.loading_previous {
                line.push_str(" | loading");
            }
            if w.shows_chapter_navigation {
                line.push_str(" | end of chapter (n / p)");
            }
            line
        }
        Notice::ScrollTo(key) => format!("-> {key}"),
        Notice::Playback { status, verse } => match (status, verse) {
            (PlaybackStatus::Idle, _) | (_, None) => "audio stopped".into(),
            (status, Some(key)) => format!("audio {status:?} {key}").to_lowercase(),
        },
        Notice::Bookmark(Some(key)) => format!("bookmarked {key}"),
        Notice::Bookmark(None) => "bookmark removed".into(),
        Notice::ChapterInfo { info: Some(info), .. } => format!("{}\n({})", info.text, info.source),
        Notice::ChapterInfo { info: None, .. } => "information unavailable".into(),
        Notice::Preferences(p) => format!(
            "theme {} | translation {} | translation only {} | font {}",
            p.theme.as_str(),
            p.show_translation,
            p.only_translation,
            p.font_size.level()
        ),
        Notice::Verses(listing) => render_listing(listing),
        Notice::Error(message) => format!("! {message}"),
    }
}

fn render_listing(listing: &VerseListing) -> String {
    if listing.verses.is_empty() {
        return "no verses loaded".into();
    }
    let width = listing.font_size.columns();
    let mut lines = Vec::new();
    if let Some(bismillah) = listing.bismillah {
        lines.push(bismillah.to_string());
    }
    for verse in &listing.verses {
        let mark = match (verse.active, verse.bookmarked) {
            (true, true) => "> *",
            (true, false) => ">  ",
            (false, true) => "  *",
            (false, false) => "   ",
        };
        let audio = if verse.has_audio { "" } else { " (no audio)" };
        lines.push(format!("{mark} {} ({}){audio}", verse.key, verse.marker));
        for text in [&verse.arabic, &verse.translation].into_iter().flatten() {
            lines.extend(textwrap::wrap(text, width).into_iter().map(|l| format!("    {l}")));
        }
    }
    lines.join("\n")
}
