//! OCCI text rendering: `text/plain`, `text/occi+plain`, `text/occi`
//! (headers) and `text/uri-list`.

pub mod grammar;
pub mod headers;
pub mod parser;
pub mod renderer;

pub use headers::{transform_body, transform_headers, Headers, KeyGroup};
pub use parser::TextParser;
pub use renderer::{Rendered, TextRenderer};
