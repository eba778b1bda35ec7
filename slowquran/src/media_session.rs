//! "Now playing" surface for OS media controls

use crate::model::{Chapter, VerseKey};
use crate::playback::PlaybackStatus;
use tracing::info;

pub const ALBUM: &str = "Al-Quran";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artwork {
    pub src: String,
    pub sizes: String,
    pub mime_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Vec<Artwork>,
}

impl NowPlaying {
    pub fn for_verse(chapter: &Chapter, key: VerseKey) -> Self {
        let artwork = ["512x512", "96x96"]
            .into_iter()
            .map(|sizes| Artwork {
                src: format!("icons/quran-{sizes}.png"),
                sizes: sizes.to_string(),
                mime_type: "image/png".to_string(),
            })
            .collect();
        Self {
            title: format!("Verse {}", key.verse),
            artist: format!("Surah {}", chapter.name_simple),
            album: ALBUM.to_string(),
            artwork,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    None,
    Playing,
    Paused,
}

impl From<PlaybackStatus> for SessionState {
    fn from(status: PlaybackStatus) -> Self {
        match status {
            PlaybackStatus::Playing => SessionState::Playing,
            PlaybackStatus::Paused => SessionState::Paused,
            PlaybackStatus::Idle | PlaybackStatus::Loading => SessionState::None,
        }
    }
}

/// Platform media session. Commands coming back from it are fed to the
/// reader as transport commands.
pub trait MediaSession: Send {
    fn set_metadata(&mut self, metadata: Option<&NowPlaying>);
    fn set_state(&mut self, state: SessionState);
}

/// Media session that only logs what it would show.
#[derive(Debug, Default)]
pub struct LoggingSession {
    metadata: Option<NowPlaying>,
    state: SessionState,
}

impl LoggingSession {
    pub fn metadata(&self) -> Option<&NowPlaying> {
        self.metadata.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl MediaSession for LoggingSession {
    fn set_metadata(&mut self, metadata: Option<&NowPlaying>) {
        if self.metadata.as_ref() == metadata {
            return;
        }
        if let Some(m) = metadata {
            info!("now playing: {} - {} ({})", m.artist, m.title, m.album);
        }
        self.metadata = metadata.cloned();
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::chapter;

    #[test]
    fn test_now_playing_metadata() {
        let mut ch = chapter(36, 83);
        ch.name_simple = "Ya-Sin".into();
        let np = NowPlaying::for_verse(&ch, VerseKey::new(36, 12));
        assert_eq!(np.title, "Verse 12");
        assert_eq!(np.artist, "Surah Ya-Sin");
        assert_eq!(np.album, "Al-Quran");
        let sizes: Vec<&str> = np.artwork.iter().map(|a| a.sizes.as_str()).collect();
        assert_eq!(sizes, ["512x512", "96x96"]);
    }

    #[test]
    fn test_session_state_mirrors_playback() {
        assert_eq!(SessionState::from(PlaybackStatus::Playing), SessionState::Playing);
        assert_eq!(SessionState::from(PlaybackStatus::Paused), SessionState::Paused);
        assert_eq!(SessionState::from(PlaybackStatus::Loading), SessionState::None);
        assert_eq!(SessionState::from(PlaybackStatus::Idle), SessionState::None);
    }

    #[test]
    fn test_logging_session_tracks_latest() {
        let mut session = LoggingSession::default();
        let np = NowPlaying::for_verse(&chapter(1, 7), VerseKey::new(1, 1));
        session.set_metadata(Some(&np));
        session.set_state(SessionState::Playing);
        assert_eq!(session.metadata(), Some(&np));
        assert_eq!(session.state(), SessionState::Playing);
        session.set_metadata(None);
        assert_eq!(session.metadata(), None);
    }
}
