//! Client-side controller for a Qwen3-TTS voice-synthesis server.
//!
//! The controller owns the session state, talks to the server's `/api` endpoints and
//! drives a rendering surface through [`ConsoleSurface`].

pub mod api;
pub mod config;
pub mod console;
pub mod error;
pub mod generation;
pub mod model;
pub mod personality;
pub mod segment;
pub mod session;
pub mod stream;
pub mod surface;
pub mod terminal;
pub mod upload;

pub use api::ApiClient;
pub use config::ConsoleConfig;
pub use console::Console;
pub use error::{ConsoleError, Result};
pub use generation::{AudioFormat, GenerationForm, GenerationOutput, GenerationPhase, OutputOptions};
pub use segment::{Region, WaveformWidget};
pub use session::{GenerationMode, ModelKind, Session};
pub use surface::ConsoleSurface;
