//! The application: owns all registered state and the compiled chain.
//!
//! All registration happens before serving, through `&mut self`
//! methods. Once the application is wrapped in an `Arc` and handed to
//! the transport it is immutable; every request borrows it shared.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::chain::{Handler, HandlerChain};
use crate::context::RequestContext;
use crate::error::Error;
use crate::events::{Event, EventKind, Subscribers};
use crate::handlers::{
    CorsHandler, CsrfGuard, ExceptionBoundary, MainHandler, Notifier, ResourceFinder,
    StaticFilesHandler, Timer, Tweaker,
};
use crate::http::{HttpRequest, HttpResponse};
use crate::mounted::{join_paths, MountedResource};
use crate::registry::ResourceRegistry;
use crate::representation::{RepresentationFactory, RepresentationRegistry};
use crate::resource::ResourceFactory;
use crate::settings::Settings;
use crate::static_files::{StaticMounts, StaticTarget};

/// Options for [`Application::mount_with`].
#[derive(Default)]
pub struct MountOptions {
    /// HTTP methods the mount accepts; empty accepts any.
    pub methods: Vec<String>,
    /// Resource method to dispatch to instead of the HTTP method name.
    pub dispatch_method: Option<String>,
    /// Redirect `/path` to `/path/` when only the latter matches.
    pub add_slash: bool,
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn dispatch_method(mut self, method: impl Into<String>) -> Self {
        self.dispatch_method = Some(method.into());
        self
    }

    pub fn add_slash(mut self) -> Self {
        self.add_slash = true;
        self
    }
}

pub struct Application {
    settings: Settings,
    registry: ResourceRegistry,
    representations: RepresentationRegistry,
    static_mounts: StaticMounts,
    subscribers: Subscribers,
    error_resource: Option<ResourceFactory>,
    csrf_handler: Option<Arc<dyn Handler>>,
    user_handlers: Vec<Arc<dyn Handler>>,
    chain: HandlerChain,
}

impl Application {
    pub fn new(settings: Settings) -> Self {
        let mut app = Self {
            settings,
            registry: ResourceRegistry::new(),
            representations: RepresentationRegistry::with_defaults(),
            static_mounts: StaticMounts::new(),
            subscribers: Subscribers::new(),
            error_resource: None,
            csrf_handler: None,
            user_handlers: Vec::new(),
            chain: HandlerChain::new(Vec::new()),
        };
        app.compile_chain();
        app
    }

    /// Mount a resource at a path pattern, accepting any method.
    pub fn mount(
        &mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        factory: ResourceFactory,
    ) -> Result<(), Error> {
        self.mount_with(name, path, factory, MountOptions::default())
    }

    pub fn mount_with(
        &mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        factory: ResourceFactory,
        options: MountOptions,
    ) -> Result<(), Error> {
        let mount = MountedResource::new(
            name,
            factory,
            path,
            options.methods,
            options.dispatch_method,
            options.add_slash,
        )?;
        self.registry.add(mount)
    }

    /// Mount a resource under an existing mount's path.
    pub fn mount_under(
        &mut self,
        parent: &str,
        name: impl Into<String>,
        path: &str,
        factory: ResourceFactory,
        options: MountOptions,
    ) -> Result<(), Error> {
        let parent_path = self
            .registry
            .get(parent)
            .ok_or_else(|| {
                Error::Configuration(format!("no resource named {parent} to mount under"))
            })?
            .path()
            .to_string();
        self.mount_with(name, join_paths(&parent_path, path), factory, options)
    }

    /// Mount a static target at a path prefix.
    pub fn mount_static(&mut self, prefix: impl Into<String>, target: StaticTarget) {
        self.static_mounts.add(prefix, target);
    }

    pub fn register_representation(&mut self, factory: Box<dyn RepresentationFactory>) {
        self.representations.register(factory);
    }

    /// Install a stage between the resource finder and the timer.
    /// Stages run in registration order.
    pub fn add_handler(&mut self, handler: Arc<dyn Handler>) {
        self.user_handlers.push(handler);
        self.compile_chain();
    }

    /// Replace the default csrf guard used when `csrf.enabled` is set.
    pub fn set_csrf_handler(&mut self, handler: Arc<dyn Handler>) {
        self.csrf_handler = Some(handler);
        self.compile_chain();
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, f: F)
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(kind, f);
    }

    /// Resource used to render bodies for error responses. Invoked via
    /// GET with no arguments.
    pub fn set_error_resource(&mut self, factory: ResourceFactory) {
        self.error_resource = Some(factory);
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.settings.set(key, value);
        // csrf/cors toggles change the chain shape
        self.compile_chain();
    }

    fn compile_chain(&mut self) {
        let mut handlers: Vec<Arc<dyn Handler>> = vec![
            Arc::new(ExceptionBoundary),
            Arc::new(StaticFilesHandler),
            Arc::new(Tweaker),
            Arc::new(Notifier),
            Arc::new(ResourceFinder),
        ];
        if self.settings.get_bool("csrf.enabled") {
            handlers.push(
                self.csrf_handler
                    .clone()
                    .unwrap_or_else(|| Arc::new(CsrfGuard)),
            );
        }
        handlers.extend(self.user_handlers.iter().cloned());
        if self.settings.get_bool("cors.enabled") {
            handlers.push(Arc::new(CorsHandler));
        }
        handlers.push(Arc::new(Timer));
        handlers.push(Arc::new(MainHandler));
        self.chain = HandlerChain::new(handlers);
    }

    /// Run one request through the chain. The exception boundary turns
    /// errors into responses, so an `Err` here means the boundary itself
    /// broke; it degrades to a bare 500.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let mut ctx = RequestContext::new(request);
        match self.chain.execute(self, &mut ctx).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "request escaped the exception boundary");
                HttpResponse::internal_server_error()
                    .with_header("Content-Type", "text/plain; charset=utf-8")
                    .with_body(b"500 Internal Server Error".to_vec())
            }
        }
    }

    /// Generate the path for a named mount from URL variables.
    pub fn resource_path(
        &self,
        name: &str,
        vars: &HashMap<String, String>,
    ) -> Result<String, Error> {
        let mount = self
            .registry
            .get(name)
            .ok_or_else(|| Error::PathFormat(format!("no resource named {name}")))?;
        mount.format_path(vars)
    }

    /// Generate the URL for a file under a static mount.
    pub fn static_path(&self, prefix: &str, rel: &str) -> Result<String, Error> {
        self.static_mounts.static_path(prefix, rel)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn representations(&self) -> &RepresentationRegistry {
        &self.representations
    }

    pub fn static_mounts(&self) -> &StaticMounts {
        &self.static_mounts
    }

    pub fn error_resource(&self) -> Option<&ResourceFactory> {
        self.error_resource.as_ref()
    }

    pub fn notify(&self, event: &Event<'_>) {
        self.subscribers.notify(event);
    }

    pub fn debug(&self) -> bool {
        self.settings.get_bool("debug")
    }

    pub fn testing(&self) -> bool {
        self.settings.get_bool("testing")
    }

    pub fn default_content_type(&self) -> &str {
        self.settings
            .get_str("default_content_type")
            .unwrap_or("application/json")
    }
}
