//! User interface rendering and input handling.
//!
//! - **renderer**: crossterm frame for the shell (title, transcript, prompt)
//! - **input**: single-line prompt editor

pub mod input;
pub mod renderer;

pub use input::{InputAction, InputLine};
pub use renderer::Renderer;
