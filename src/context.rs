//! Per-request state threaded through the handler chain.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binder::Args;
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::resource::{MethodConfig, Resource};
use crate::status::default_status;
use crate::Application;

/// Runs after the response is produced, whatever the outcome. Failures
/// are collected, never allowed to clobber the response of a callback
/// that ran earlier.
pub type FinishedCallback =
    Arc<dyn Fn(&Application, &RequestContext, &HttpResponse) -> Result<(), Error> + Send + Sync>;

/// Everything the chain accumulates about one request. Owned by exactly
/// one in-flight request; stages communicate by mutating it.
pub struct RequestContext {
    pub request: HttpRequest,
    /// Variables captured from the matched path pattern.
    pub urlvars: HashMap<String, String>,
    /// Resolved by the resource finder.
    pub resource: Option<Arc<dyn Resource>>,
    pub resource_name: Option<String>,
    pub resource_method: Option<String>,
    pub resource_args: Option<Args>,
    /// The in-progress response stages build up before the main handler
    /// renders into it.
    pub response: HttpResponse,
    /// Set by the static-files stage; static requests skip events and
    /// finished callbacks.
    pub is_static: bool,
    finished_callbacks: Vec<FinishedCallback>,
    negotiated: Option<String>,
}

impl RequestContext {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            urlvars: HashMap::new(),
            resource: None,
            resource_name: None,
            resource_method: None,
            resource_args: None,
            response: HttpResponse::ok(),
            is_static: false,
            finished_callbacks: Vec::new(),
            negotiated: None,
        }
    }

    /// Register a callback to run after the response is final.
    pub fn on_finished(&mut self, callback: FinishedCallback) {
        self.finished_callbacks.push(callback);
    }

    /// Take the registered callbacks, leaving none behind.
    pub(crate) fn take_finished_callbacks(&mut self) -> Vec<FinishedCallback> {
        std::mem::take(&mut self.finished_callbacks)
    }

    /// The content type negotiation selected for this request, computed
    /// once from the Accept header against the registered
    /// representations and cached.
    pub fn negotiated_content_type(&mut self, app: &Application) -> &str {
        if self.negotiated.is_none() {
            let accept = self.request.header("accept").unwrap_or("*/*");
            self.negotiated = Some(
                app.representations()
                    .best_match(accept, app.default_content_type()),
            );
        }
        self.negotiated.as_deref().unwrap_or_default()
    }

    /// Drop the cached negotiation result so it is recomputed, used when
    /// the boundary swaps in the error resource.
    pub fn reset_negotiation(&mut self) {
        self.negotiated = None;
    }

    /// Seed the in-progress response from a resolved method's config:
    /// the per-method default status unless the config pins one, plus
    /// any configured location and extra headers.
    pub fn apply_method_config(&mut self, config: &MethodConfig) {
        self.response.status = config
            .status
            .unwrap_or_else(|| default_status(&self.request.method));
        if let Some(location) = &config.location {
            self.response
                .headers
                .insert("Location".to_string(), location.clone());
        }
        for (name, value) in &config.headers {
            self.response.headers.insert(name.clone(), value.clone());
        }
    }
}
