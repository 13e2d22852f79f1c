//! Template loading
//!
//! Owns the immutable template bytes and the transport that fetches them.

mod bytes;
mod loader;
mod transport;

pub use bytes::TemplateBytes;
pub use loader::{TemplateLoader, DEFAULT_MAX_TEMPLATE_BYTES};
pub use transport::{FetchedTemplate, HttpTransport, StaticTransport, TemplateTransport};
