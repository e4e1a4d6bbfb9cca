//! OCCI JSON rendering (`application/json`).

pub mod document;
pub mod parser;
pub mod renderer;

pub use document::{
    ActionInstanceDocument, AttributeDocument, CategoriesDocument, CategoryDocument,
    CollectionDocument, Endpoint, EntityDocument,
};
pub use parser::JsonParser;
pub use renderer::JsonRenderer;
