//! PDF Auto-Fill Library
//!
//! Fills PDF templates from a source record. A template either carries
//! `{token}` placeholders in its text layer or interactive AcroForm fields;
//! the engine decides which, detects fields and choice groups, lets a user
//! adjust values over a rendered preview and writes the final document.
//!
//! The server binary is in main.rs.
//!
//! # Modules
//!
//! - `template`: fetching and validating template bytes
//! - `document`, `pdf`: text layer and rasterization over MuPDF
//! - `extract`: mode classification, placeholder and choice detection
//! - `resolver`, `profile`, `record`: mapping tokens and field names to data
//! - `overlay`: page frames with editable controls
//! - `synth`: output documents and filenames
//! - `session`: the session state machine and engine

pub mod acroform;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod overlay;
pub mod pdf;
pub mod profile;
pub mod record;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod state;
pub mod synth;
pub mod template;

mod mupdf;

#[cfg(test)]
mod test_support;
