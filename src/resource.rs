//! Resource model: the contract between mounted application code and the
//! dispatch core.
//!
//! A resource exposes one descriptor per handler method. Descriptors are
//! built once at registration time and carry everything the core needs
//! at request time: parameter specs for the argument binder and response
//! configuration for the renderer. Method lookup is explicit — absence
//! is an `Option`, never a reflection failure.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::binder::Args;
use crate::context::RequestContext;
use crate::error::Error;
use crate::http::HttpResponse;
use crate::Application;

/// How a declared parameter binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Must be satisfiable from the source or the URL variables.
    Required,
    /// May be absent; the handler applies its own default.
    Optional,
    /// Collects every source value sharing the parameter's name, in
    /// order, as positional arguments.
    VarPositional,
    /// Collects every source key/value pair as keyword arguments.
    VarKeyword,
}

/// A declared handler parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    /// Documented default for optional parameters. Metadata only: the
    /// binder never materializes it into the bound arguments.
    pub default: Option<String>,
}

/// Response configuration for one resource method, the moral equivalent
/// of the original `@config` decorator surface.
#[derive(Debug, Clone, Default)]
pub struct MethodConfig {
    /// Pin a representation differentiator, overriding negotiation.
    pub representation: Option<String>,
    /// Response status, overriding the per-method default.
    pub status: Option<u16>,
    /// Location header for redirect-style responses.
    pub location: Option<String>,
    /// Extra response headers.
    pub headers: HashMap<String, String>,
    /// Constructor arguments forwarded to the representation factory.
    pub representation_args: HashMap<String, Value>,
}

impl MethodConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn representation(mut self, differentiator: impl Into<String>) -> Self {
        self.representation = Some(differentiator.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn representation_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.representation_args.insert(name.into(), value.into());
        self
    }
}

/// Per-method metadata: parameter descriptors plus response config.
/// Built once at registration time, read-only at request time.
#[derive(Debug, Clone, Default)]
pub struct MethodDescriptor {
    pub params: Vec<ParamSpec>,
    pub config: MethodConfig,
}

impl MethodDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::Required,
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::Optional,
            default: None,
        });
        self
    }

    pub fn optional_with_default(
        mut self,
        name: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::Optional,
            default: Some(default.into()),
        });
        self
    }

    pub fn var_positional(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::VarPositional,
            default: None,
        });
        self
    }

    pub fn var_keyword(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::VarKeyword,
            default: None,
        });
        self
    }

    pub fn config(mut self, config: MethodConfig) -> Self {
        self.config = config;
        self
    }
}

/// What a resource method hands back to the main handler.
#[derive(Debug)]
pub enum ResourceOutcome {
    /// Data to render through a representation.
    Data(Value),
    /// Nothing to render. Combined with a 3xx in-progress response this
    /// passes the response through untouched; otherwise it renders as
    /// null data.
    NoContent,
    /// A complete response, returned without further processing.
    Response(HttpResponse),
}

/// A mounted resource instance.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Descriptor for a handler method, or `None` if the resource does
    /// not implement it.
    fn describe(&self, method: &str) -> Option<&MethodDescriptor>;

    /// Invoke a handler method with bound arguments. The context gives
    /// handlers access to the request, the in-progress response, and
    /// finished-callback registration.
    async fn call(
        &self,
        method: &str,
        args: Args,
        ctx: &mut RequestContext,
    ) -> Result<ResourceOutcome, Error>;
}

/// Creates a resource instance for a request. The second argument is the
/// mount name the resource was resolved under.
pub type ResourceFactory = Arc<dyn Fn(&Application, &str) -> Arc<dyn Resource> + Send + Sync>;

type DynMethodFn =
    Arc<dyn Fn(Args, &mut RequestContext) -> Result<ResourceOutcome, Error> + Send + Sync>;

/// A resource assembled from closures, for handlers that don't warrant a
/// dedicated type. Also the workhorse of the test suites.
#[derive(Default)]
pub struct DynResource {
    methods: HashMap<String, (MethodDescriptor, DynMethodFn)>,
}

impl DynResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<F>(mut self, name: impl Into<String>, descriptor: MethodDescriptor, f: F) -> Self
    where
        F: Fn(Args, &mut RequestContext) -> Result<ResourceOutcome, Error>
            + Send
            + Sync
            + 'static,
    {
        self.methods
            .insert(name.into(), (descriptor, Arc::new(f)));
        self
    }

    /// Wrap into the factory shape `Application::mount` expects.
    pub fn into_factory(self) -> ResourceFactory {
        let resource: Arc<dyn Resource> = Arc::new(self);
        Arc::new(move |_app, _name| resource.clone())
    }
}

#[async_trait]
impl Resource for DynResource {
    fn describe(&self, method: &str) -> Option<&MethodDescriptor> {
        self.methods.get(method).map(|(descriptor, _)| descriptor)
    }

    async fn call(
        &self,
        method: &str,
        args: Args,
        ctx: &mut RequestContext,
    ) -> Result<ResourceOutcome, Error> {
        let (_, f) = self
            .methods
            .get(method)
            .ok_or_else(|| Error::Bind(format!("resource has no method {method}")))?;
        f(args, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpRequest;

    #[tokio::test]
    async fn test_dyn_resource_lookup_and_call() {
        let resource = DynResource::new().method(
            "GET",
            MethodDescriptor::new().required("id"),
            |args, _ctx| {
                let id = args.keyword("id").unwrap().to_string();
                Ok(ResourceOutcome::Data(serde_json::json!({ "id": id })))
            },
        );

        assert!(resource.describe("GET").is_some());
        assert!(resource.describe("DELETE").is_none());

        let mut ctx = RequestContext::new(HttpRequest::new("GET", "/widgets/42"));
        let mut kwargs = HashMap::new();
        kwargs.insert("id".to_string(), "42".to_string());
        let outcome = resource
            .call("GET", Args::Keyword(kwargs), &mut ctx)
            .await
            .unwrap();
        match outcome {
            ResourceOutcome::Data(v) => assert_eq!(v["id"], "42"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = MethodDescriptor::new()
            .required("id")
            .optional_with_default("verbose", "false")
            .config(MethodConfig::new().status(201).representation("json"));
        assert_eq!(descriptor.params.len(), 2);
        assert_eq!(descriptor.params[0].kind, ParamKind::Required);
        assert_eq!(descriptor.params[1].default.as_deref(), Some("false"));
        assert_eq!(descriptor.config.status, Some(201));
    }
}
