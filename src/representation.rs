//! Representations: how resource data becomes response bytes.
//!
//! A representation factory is registered under a short differentiator
//! (`"json"`, `"text"`) and a content type. At render time the main
//! handler picks a factory — either the one a method config pinned or
//! the one content negotiation selected — and asks it to represent the
//! resource's data.

use std::collections::HashMap;

use serde_json::Value;

use crate::context::RequestContext;
use crate::error::Error;
use crate::http::HttpResponse;
use crate::negotiation::{Accept, MediaType};
use crate::Application;

/// A rendered representation of resource data.
pub struct Representation {
    pub content_type: String,
    pub encoding: Option<String>,
    pub body: RepresentationBody,
}

pub enum RepresentationBody {
    Text(String),
    /// A complete response the factory built itself (e.g. a file send).
    Response(HttpResponse),
}

impl Representation {
    pub fn text(content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            encoding: Some("utf-8".to_string()),
            body: RepresentationBody::Text(body.into()),
        }
    }
}

/// Produces representations for one content type.
pub trait RepresentationFactory: Send + Sync {
    /// Short name used to pin this factory from a method config.
    fn differentiator(&self) -> &str;

    fn content_type(&self) -> &str;

    /// Render `data`. `args` are the representation args from the
    /// resolved method's config.
    fn represent(
        &self,
        app: &Application,
        ctx: &RequestContext,
        data: Value,
        args: &HashMap<String, Value>,
    ) -> Result<Representation, Error>;
}

/// Registry of representation factories, keyed both by differentiator
/// and by content type. Registration order drives negotiation
/// tie-breaking.
#[derive(Default)]
pub struct RepresentationRegistry {
    factories: Vec<Box<dyn RepresentationFactory>>,
}

impl RepresentationRegistry {
    /// A registry with the built-in JSON and text factories, JSON first.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(JsonRepresentation));
        registry.register(Box::new(TextRepresentation));
        registry
    }

    /// Register a factory. A repeated differentiator or content type
    /// replaces the earlier registration in place, keeping its
    /// negotiation rank.
    pub fn register(&mut self, factory: Box<dyn RepresentationFactory>) {
        if let Some(existing) = self.factories.iter_mut().find(|f| {
            f.differentiator() == factory.differentiator()
                || f.content_type() == factory.content_type()
        }) {
            *existing = factory;
        } else {
            self.factories.push(factory);
        }
    }

    pub fn get(&self, differentiator: &str) -> Option<&dyn RepresentationFactory> {
        self.factories
            .iter()
            .find(|f| f.differentiator() == differentiator)
            .map(|f| &**f)
    }

    pub fn by_content_type(&self, content_type: &str) -> Option<&dyn RepresentationFactory> {
        self.factories
            .iter()
            .find(|f| f.content_type() == content_type)
            .map(|f| &**f)
    }

    /// Content types in registration order.
    pub fn content_types(&self) -> Vec<MediaType> {
        self.factories
            .iter()
            .filter_map(|f| MediaType::parse(f.content_type()))
            .collect()
    }

    /// Negotiate the best registered content type against an Accept
    /// header. Falls back to `default_content_type` when nothing
    /// matches.
    pub fn best_match(&self, accept_header: &str, default_content_type: &str) -> String {
        let accept = Accept::parse(accept_header);
        let available = self.content_types();
        crate::negotiation::negotiate(&accept, &available)
            .map(MediaType::mime_type)
            .unwrap_or_else(|| default_content_type.to_string())
    }
}

/// JSON representation. `indent` in the representation args switches to
/// pretty printing.
pub struct JsonRepresentation;

impl RepresentationFactory for JsonRepresentation {
    fn differentiator(&self) -> &str {
        "json"
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn represent(
        &self,
        _app: &Application,
        _ctx: &RequestContext,
        data: Value,
        args: &HashMap<String, Value>,
    ) -> Result<Representation, Error> {
        let pretty = args
            .get("indent")
            .map(|v| !matches!(v, Value::Null | Value::Bool(false)))
            .unwrap_or(false);
        let body = if pretty {
            serde_json::to_string_pretty(&data)
        } else {
            serde_json::to_string(&data)
        }
        .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Representation::text("application/json", body))
    }
}

/// Plain-text representation. String data passes through verbatim,
/// anything else renders as JSON text.
pub struct TextRepresentation;

impl RepresentationFactory for TextRepresentation {
    fn differentiator(&self) -> &str {
        "text"
    }

    fn content_type(&self) -> &str {
        "text/plain"
    }

    fn represent(
        &self,
        _app: &Application,
        _ctx: &RequestContext,
        data: Value,
        _args: &HashMap<String, Value>,
    ) -> Result<Representation, Error> {
        let body = match data {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Ok(Representation::text("text/plain", body))
    }
}
