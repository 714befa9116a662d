//! CLI prompts using cliclack (Charm-style inline prompts)
//!
//! Only available with the `tui` feature.

#[cfg(feature = "tui")]
mod prompts;

#[cfg(feature = "tui")]
pub use prompts::{run, CreateArgs};
