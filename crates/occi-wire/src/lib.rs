//! Wire formats for the OCCI object model.
//!
//! Parses and renders entities, action instances and category models in
//! the OCCI text rendering (`text/plain`, `text/occi`, `text/uri-list`) and
//! the OCCI JSON rendering (`application/json`).
//!
//! ## Architecture
//!
//! - **text**: header normalization, line grammar, `TextParser` and `TextRenderer`
//! - **json**: serde documents, `JsonParser` and `JsonRenderer`
//! - **registry**: category drafts registered into a `Model` parent-first
//! - **warehouse**: bundled OCCI Core and OCCI Infrastructure definitions
//! - **codec**: dispatch by `MediaType`

pub mod codec;
pub mod json;
pub mod media;
pub mod registry;
pub mod text;
pub mod warehouse;

pub use codec::{render_entity, render_model, Parser};
pub use json::{JsonParser, JsonRenderer};
pub use media::MediaType;
pub use registry::{Drafts, KindDraft, MixinDraft};
pub use text::{Headers, KeyGroup, Rendered, TextParser, TextRenderer};
pub use warehouse::Warehouse;
