//! slowquran - a minimal Qur'an reader and reciter for the Slow Computer
//!
//! The crate is split into synchronous state ([`window`], [`playback`],
//! [`reader`]) that never performs I/O, and the [`app`] driver that runs
//! the requested effects against the content API, the cache and the
//! audio backend.

pub mod api;
pub mod app;
pub mod audio;
pub mod bookmark;
pub mod cache;
pub mod config;
pub mod error;
pub mod media_session;
pub mod model;
pub mod playback;
pub mod prefs;
pub mod reader;
pub mod text;
pub mod window;

pub use app::{App, AppHandle, Command, Notice, WindowSnapshot};
pub use config::Config;
pub use reader::{Effect, Reader};
