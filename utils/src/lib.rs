//! Shared infrastructure utilities for async-helpers.
//!
//! This crate provides cross-cutting utilities that the engine needs
//! but that don't belong in the domain-pure `async-helpers-types` crate:
//!
//! - **`render`**: Never-failing text rendering of helper arguments and results
//! - **`panic`**: Turning caught panic payloads into messages

pub mod panic;
pub mod render;

pub use panic::panic_message;
pub use render::{is_empty_arg, preview, render_args, value_kind, value_to_text};
