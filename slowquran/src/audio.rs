//! Audio backends

use crate::error::PlaybackError;
use crate::playback::{AudioBackend, MediaHandle};
use async_trait::async_trait;

/// Backend used when the binary is built without audio output. Every open
/// fails, which leaves the session idle.
#[derive(Debug, Default)]
pub struct DisabledBackend;

#[async_trait]
impl AudioBackend for DisabledBackend {
    async fn open(&self, url: &str) -> Result<Box<dyn MediaHandle>, PlaybackError> {
        Err(PlaybackError::Output(format!(
            "audio output disabled, cannot play {url}"
        )))
    }
}

#[cfg(feature = "audio")]
pub use self::rodio_backend::RodioBackend;

#[cfg(feature = "audio")]
mod rodio_backend {
    use super::*;
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use std::io::Cursor;
    use tracing::debug;

    /// Downloads a recitation and decodes it into a paused rodio sink.
    pub struct RodioBackend {
        handle: OutputStreamHandle,
        client: reqwest::Client,
    }

    impl RodioBackend {
        /// Open the default output device. The returned stream must be kept
        /// alive for as long as audio should be heard.
        pub fn try_default(client: reqwest::Client) -> Result<(OutputStream, Self), PlaybackError> {
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| PlaybackError::Output(e.to_string()))?;
            Ok((stream, Self { handle, client }))
        }
    }

    #[async_trait]
    impl AudioBackend for RodioBackend {
        async fn open(&self, url: &str) -> Result<Box<dyn MediaHandle>, PlaybackError> {
            debug!("downloading {url}");
            let data = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;

            let source = Decoder::new(Cursor::new(data.to_vec()))
                .map_err(|e| PlaybackError::Decode(e.to_string()))?;
            let sink = Sink::try_new(&self.handle)
                .map_err(|e| PlaybackError::Output(e.to_string()))?;
            sink.pause();
            sink.append(source);
            Ok(Box::new(SinkHandle { sink }))
        }
    }

    struct SinkHandle {
        sink: Sink,
    }

    impl MediaHandle for SinkHandle {
        fn play(&mut self) -> Result<(), PlaybackError> {
            self.sink.play();
            Ok(())
        }

        fn pause(&mut self) {
            self.sink.pause();
        }

        fn stop(&mut self) {
            self.sink.stop();
        }

        fn is_paused(&self) -> bool {
            self.sink.is_paused()
        }

        fn is_finished(&self) -> bool {
            self.sink.empty()
        }
    }
}
