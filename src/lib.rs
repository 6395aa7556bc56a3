//! Export chat conversations saved as HTML to clean Markdown.

pub mod conversation;
pub mod diagnostics;
pub mod dom;
pub mod error;
pub mod export;
pub mod filename;
pub mod idle;
pub mod panic_handler;
pub mod parsing;
pub mod selection;
pub mod settings;
pub mod sink;
pub mod templates;

pub use error::ExportError;
