//! Media-type dispatch over the text and JSON codecs.

use crate::json::{JsonParser, JsonRenderer};
use crate::media::MediaType;
use crate::text::{Headers, Rendered, TextParser, TextRenderer};
use occi_types::action_instance::ActionInstance;
use occi_types::config::ValidationConfig;
use occi_types::error::{OcciError, OcciResult};
use occi_types::model::Model;
use occi_types::resource::AnyEntity;

/// A parser chosen by media type.
#[derive(Debug, Clone)]
pub enum Parser<'m> {
    Text(TextParser<'m>),
    Json(JsonParser<'m>),
}

impl<'m> Parser<'m> {
    /// Fails `Parsing` for `text/uri-list`, which carries locations only.
    pub fn for_media_type(model: &'m Model, media_type: MediaType) -> OcciResult<Self> {
        if media_type.is_json() {
            Ok(Parser::Json(JsonParser::new(model)))
        } else {
            TextParser::new(model, media_type).map(Parser::Text)
        }
    }

    pub fn with_validation(self, config: ValidationConfig) -> Self {
        match self {
            Parser::Text(p) => Parser::Text(p.with_validation(config)),
            Parser::Json(p) => Parser::Json(p.with_validation(config)),
        }
    }

    pub fn entities(&self, body: &str, headers: &Headers) -> OcciResult<Vec<AnyEntity>> {
        match self {
            Parser::Text(p) => p.entities(body, headers),
            Parser::Json(p) => p.entities(body),
        }
    }

    pub fn action_instances(&self, body: &str, headers: &Headers) -> OcciResult<Vec<ActionInstance>> {
        match self {
            Parser::Text(p) => p.action_instances(body, headers),
            Parser::Json(p) => p.action_instances(body),
        }
    }
}

/// Render an entity in the given media type.
pub fn render_entity(entity: &AnyEntity, media_type: MediaType) -> OcciResult<Rendered> {
    if media_type.is_json() {
        return Ok(Rendered {
            body: JsonRenderer::new().entity(entity)?,
            headers: Headers::new(),
        });
    }
    TextRenderer::new(media_type)?.entity(entity)
}

/// Render all categories of a model in the given media type.
pub fn render_model(model: &Model, media_type: MediaType) -> OcciResult<Rendered> {
    if media_type == MediaType::UriList {
        return Err(OcciError::Rendering(
            "a model cannot be rendered as text/uri-list".to_string(),
        ));
    }
    if media_type.is_json() {
        return Ok(Rendered {
            body: JsonRenderer::new().model(model)?,
            headers: Headers::new(),
        });
    }
    TextRenderer::new(media_type)?.model(model)
}
