//! Core types for the OCCI object model.
//!
//! This crate defines the typed attribute engine, the category hierarchy
//! (kinds, mixins, actions), entity instances and the category registry.
//! Wire formats live in `occi-wire`; this crate contains no codec logic.

pub mod action_instance;
pub mod attribute;
pub mod attribute_set;
pub mod category;
pub mod config;
pub mod entity;
pub mod error;
pub mod infrastructure;
pub mod model;
pub mod resource;
pub mod value;

pub use action_instance::ActionInstance;
pub use attribute::{Attribute, AttributeDefinition, AttributeDefinitions, AttributeType};
pub use attribute_set::{AttributeSet, Node};
pub use category::{Action, AnyCategory, Categorized, Category, Kind, Mixin};
pub use config::ValidationConfig;
pub use entity::{Entity, EntityBuilder};
pub use error::{OcciError, OcciResult};
pub use model::Model;
pub use resource::{AnyEntity, Link, Resource};
pub use value::AttributeValue;
