//! Runtime detection and external tools
//!
//! - [`check`]: runtime detection (Python, Node.js, Docker)
//! - [`invoker`]: argv-based tool invocation with timeouts
//! - [`dev`]: the local development server launcher

pub mod check;
pub mod dev;
pub mod invoker;

pub use check::{check_runtimes_with_advisory, runtimes_for, Runtime, RuntimeInfo};
pub use invoker::{Invocation, ProcessInvoker, ToolInvoker, ToolStatus, DEFAULT_TOOL_TIMEOUT};
