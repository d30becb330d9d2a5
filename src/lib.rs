//! # Hygrolog Core Library
//!
//! Reconstructs temperature and relative humidity readings from a remote
//! sensor device that streams human-readable ASCII lines over a serial
//! link, and renders aggregated results through a strftime-style output
//! template.
//!
//! ## Data Flow
//!
//! 1. **Transport**: a [`reconstruct::ByteSource`] yields raw bytes with a
//!    bounded read timeout ([`serial::SerialSource`] in production).
//! 2. **Reconstruction**: [`reconstruct::StreamReconstructor`] drives the
//!    incremental parsers of [`parse`] over every byte, reassembles
//!    checksummed `(temperature, humidity, checksum)` records and
//!    aggregates them over the configured interval.
//! 3. **Rendering**: [`render::TemplateRenderer`] expands the output
//!    template once per emission, delegating calendar directives to chrono
//!    and substituting `%vC`/`%vF`/`%vH` sensor values.
//!
//! ## Wire Format
//!
//! The device sends lines of the form `<temp>\t<rh>\t<sum>\n`, where `sum`
//! must equal `temp + rh` within 0.001, or error reports of the form
//! `Err:<code>\n`. Lines may be malformed or interleaved at the byte level;
//! the parsers resynchronize on every line terminator, so noise only ever
//! costs the record it occurred in.

pub mod config;
pub mod parse;
pub mod reconstruct;
pub mod render;
pub mod serial;

pub use config::Config;
pub use reconstruct::{ByteSource, ReadEvent, StreamReconstructor};
pub use render::TemplateRenderer;
