//! Document rendering interface.
//!
//! Rendering is a pure function of the form, entry and document settings.
//! Placing the output in the cache and recording the outcome happen in the
//! caller, typically the generate task.

mod command;
mod types;

pub use command::CommandRenderer;
pub use types::{RenderError, Renderer};
