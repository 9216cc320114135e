//! Organtrack Server Library
//!
//! This module exposes the relay components for testing and embedding.

pub mod error;
pub mod relay;
pub mod state;

pub use error::{RelayError, Result};
pub use relay::acceptor::serve;
pub use state::{AppState, Settings};

/// Build the relay state, with the detector chosen by the settings
pub fn create_app(settings: Settings) -> Result<AppState> {
    let detector = settings.detector()?;
    AppState::new(settings, detector)
}
