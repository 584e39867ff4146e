//! The system stages of the handler chain.
//!
//! Compiled order: exception boundary, static files, tweaker, notifier,
//! resource finder, the optional csrf guard, any application-installed
//! stages, the optional cors stage, timer, and finally the main handler
//! that invokes the resource. The boundary at the head converts every
//! error below it into a response, so `Application::handle` almost never
//! sees an `Err`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::binder::{bind, Args};
use crate::chain::{Handler, HandlerChain, Next};
use crate::context::RequestContext;
use crate::error::Error;
use crate::events::Event;
use crate::http::HttpResponse;
use crate::registry::Resolution;
use crate::resource::ResourceOutcome;
use crate::static_files::StaticTarget;
use crate::status::reason_for;
use crate::Application;

/// Outermost stage: converts errors into responses, renders the error
/// resource for error statuses, and runs finished callbacks.
pub struct ExceptionBoundary;

#[async_trait]
impl Handler for ExceptionBoundary {
    fn name(&self) -> &str {
        "exception_boundary"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        let mut response = match next.run(app, ctx).await {
            Ok(response) => response,
            Err(err) => {
                log_error(app, ctx, &err);
                error_response(app, &err)
            }
        };

        if response.status > 400 && !ctx.is_static {
            response = self.render_error_resource(app, ctx, response).await;
        }

        if !ctx.is_static {
            let callbacks = ctx.take_finished_callbacks();
            let mut failures = Vec::new();
            for callback in callbacks {
                if let Err(err) = callback(app, ctx, &response) {
                    failures.push(err.to_string());
                }
            }
            if !failures.is_empty() {
                let err = Error::FinishedCallbacks(failures);
                tracing::error!(error = %err, path = %ctx.request.path, "finished callbacks failed");
                response = error_response(app, &err);
            }
        }

        Ok(response)
    }
}

impl ExceptionBoundary {
    /// Re-enter the tail of the chain with the error resource swapped
    /// in, rendering a representation-negotiated error body. The
    /// original response is kept when no error resource is configured,
    /// when debug mode wants raw 5xx diagnostics, or when the error
    /// resource itself fails.
    async fn render_error_resource(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        original: HttpResponse,
    ) -> HttpResponse {
        let Some(factory) = app.error_resource() else {
            return original;
        };
        if app.debug() && original.status >= 500 {
            return original;
        }

        ctx.request.method = "GET".to_string();
        ctx.resource = Some(factory(app, "error"));
        ctx.resource_name = Some("error".to_string());
        ctx.resource_method = Some("GET".to_string());
        ctx.resource_args = Some(Args::Empty);
        ctx.response = original.clone();
        ctx.reset_negotiation();

        let mut tail: Vec<Arc<dyn Handler>> = Vec::new();
        if app.settings().get_bool("cors.enabled") {
            tail.push(Arc::new(CorsHandler));
        }
        tail.push(Arc::new(MainHandler));

        match HandlerChain::execute_detached(&tail, app, ctx).await {
            Ok(mut rendered) => {
                rendered.status = original.status;
                rendered
            }
            Err(err) => {
                tracing::error!(error = %err, "error resource failed; keeping original response");
                original
            }
        }
    }
}

fn log_error(app: &Application, ctx: &RequestContext, err: &Error) {
    let status = err.status_code();
    if err.is_server_error() {
        tracing::error!(
            error = %err,
            status,
            method = %ctx.request.method,
            path = %ctx.request.path,
            "request failed"
        );
    } else {
        tracing::debug!(error = %err, status, path = %ctx.request.path, "request aborted");
    }
    if status == 404 && app.debug() && !app.testing() {
        for mount in app.registry().iter() {
            tracing::debug!(name = mount.name(), path = mount.path(), "mounted resource");
        }
    }
}

/// Build the fallback plain-text response for an error. Debug mode
/// appends the error detail after the status line.
fn error_response(app: &Application, err: &Error) -> HttpResponse {
    let status = err.status_code();
    let mut response = HttpResponse::new(status);
    if let Error::Redirect { location, .. } = err {
        response
            .headers
            .insert("Location".to_string(), location.clone());
    }
    let reason = reason_for(status);
    let body = if app.debug() {
        format!("{status} {reason}\n\n{err}")
    } else {
        format!("{status} {reason}")
    };
    response
        .headers
        .insert("Content-Type".to_string(), "text/plain; charset=utf-8".to_string());
    response.body = body.into_bytes();
    response
}

/// Serves static mounts by longest prefix; everything else passes
/// through. Static requests are flagged so the boundary skips events
/// and finished callbacks for them.
pub struct StaticFilesHandler;

#[async_trait]
impl Handler for StaticFilesHandler {
    fn name(&self) -> &str {
        "static_files"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        let found = app
            .static_mounts()
            .find(&ctx.request.path)
            .map(|(mount, rel)| (mount.target.clone(), rel.to_string()));
        match found {
            Some((target, rel)) => {
                ctx.is_static = true;
                match target {
                    StaticTarget::App(static_app) => static_app.serve(&ctx.request, &rel).await,
                    StaticTarget::External(_) => Err(Error::NotFound(ctx.request.path.clone())),
                }
            }
            None => next.run(app, ctx).await,
        }
    }
}

/// Normalizes the request before resolution: decodes the form body,
/// applies the `$method` and `$accept` reserved parameters, and maps a
/// path extension onto the Accept header.
pub struct Tweaker;

#[async_trait]
impl Handler for Tweaker {
    fn name(&self) -> &str {
        "tweaker"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        ctx.request.decode_form();

        let dollar_method = take_param(&mut ctx.request.form, "$method")
            .or_else(|| take_param(&mut ctx.request.query, "$method"));
        let dollar_accept = take_param(&mut ctx.request.query, "$accept")
            .or_else(|| take_param(&mut ctx.request.form, "$accept"));

        if let Some(new_method) = dollar_method {
            let tunneled = ctx.request.method == "POST"
                && app
                    .settings()
                    .get_list("tunnel_over_post")
                    .iter()
                    .any(|m| m == &new_method);
            if tunneled || app.debug() {
                ctx.request.method = new_method;
            } else {
                return Err(Error::abort(
                    400,
                    format!("method {new_method} cannot be tunneled over {}", ctx.request.method),
                ));
            }
        }

        if let Some(accept) = dollar_accept {
            // a bare differentiator resolves to its content type
            let content_type = app
                .representations()
                .get(&accept)
                .map(|f| f.content_type().to_string())
                .unwrap_or(accept);
            ctx.request.headers.insert("accept".to_string(), content_type);
        } else if app.settings().get_bool("set_accept_from_ext") {
            apply_accept_from_ext(app, ctx);
        }

        next.run(app, ctx).await
    }
}

/// Remove every occurrence of `name` from `pairs`, keeping the first
/// value.
fn take_param(pairs: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let value = pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone());
    pairs.retain(|(k, _)| k != name);
    value
}

/// `/widgets/42.json` becomes `/widgets/42` with `Accept:
/// application/json`, provided `json` names a registered
/// representation.
fn apply_accept_from_ext(app: &Application, ctx: &mut RequestContext) {
    let path = ctx.request.path.clone();
    let Some(last_segment) = path.rsplit('/').next() else {
        return;
    };
    let Some((stem, ext)) = last_segment.rsplit_once('.') else {
        return;
    };
    if stem.is_empty() || ext.is_empty() {
        return;
    }
    let Some(factory) = app.representations().get(ext) else {
        return;
    };
    ctx.request
        .headers
        .insert("accept".to_string(), factory.content_type().to_string());
    ctx.request.path = format!(
        "{}{stem}",
        &path[..path.len() - last_segment.len()]
    );
}

/// Emits `NewRequest` before and `NewResponse` after the downstream
/// stages.
pub struct Notifier;

#[async_trait]
impl Handler for Notifier {
    fn name(&self) -> &str {
        "notifier"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        app.notify(&Event::NewRequest {
            request: &ctx.request,
        });
        let response = next.run(app, ctx).await?;
        app.notify(&Event::NewResponse {
            request: &ctx.request,
            response: &response,
        });
        Ok(response)
    }
}

/// Resolves the mount table, binds arguments, and seeds the in-progress
/// response from the resolved method's config.
pub struct ResourceFinder;

#[async_trait]
impl Handler for ResourceFinder {
    fn name(&self) -> &str {
        "resource_finder"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        let method = ctx.request.method.clone();
        let path = ctx.request.path.clone();

        let found = match app.registry().resolve(&method, &path) {
            Resolution::Found(found) => found,
            Resolution::MethodNotAllowed => {
                return Err(Error::MethodNotAllowed(format!("{method} {path}")));
            }
            Resolution::NotFound => {
                return Err(match add_slash_outcome(app, &method, &path) {
                    SlashOutcome::Redirect(location) => {
                        let location = match ctx.request.query_string() {
                            qs if qs.is_empty() => location,
                            qs => format!("{location}?{qs}"),
                        };
                        Error::Redirect {
                            status: 303,
                            location,
                        }
                    }
                    SlashOutcome::MethodNotAllowed => {
                        Error::MethodNotAllowed(format!("{method} {path}"))
                    }
                    SlashOutcome::Miss => Error::NotFound(path),
                });
            }
        };

        let resource = (found.factory)(app, &found.name);
        let method_name = found
            .dispatch_method
            .clone()
            .unwrap_or_else(|| method.clone());

        let args = bind(resource.as_ref(), &method_name, &ctx.request, &found.urlvars)?;
        if let Some(descriptor) = resource.describe(&method_name) {
            let config = descriptor.config.clone();
            ctx.apply_method_config(&config);
        }

        ctx.urlvars = found.urlvars;
        ctx.resource = Some(resource);
        ctx.resource_name = Some(found.name.clone());
        ctx.resource_method = Some(method_name);
        ctx.resource_args = Some(args);

        app.notify(&Event::ResourceFound {
            request: &ctx.request,
            name: &found.name,
            urlvars: &ctx.urlvars,
        });

        next.run(app, ctx).await
    }
}

enum SlashOutcome {
    Redirect(String),
    MethodNotAllowed,
    Miss,
}

/// How an unmatched path relates to its slash-suffixed sibling. Only
/// mounts that opted into add-slash participate: one accepting the
/// method redirects; one matching the path but excluding the method is
/// a 405 on the original path, not a 404.
fn add_slash_outcome(app: &Application, method: &str, path: &str) -> SlashOutcome {
    if path.ends_with('/') {
        return SlashOutcome::Miss;
    }
    let slashed = format!("{path}/");
    let mut path_matched = false;
    for mount in app.registry().iter() {
        if !mount.add_slash() || mount.match_path(&slashed).is_none() {
            continue;
        }
        if mount.allows(method) {
            return SlashOutcome::Redirect(slashed);
        }
        path_matched = true;
    }
    if path_matched {
        SlashOutcome::MethodNotAllowed
    } else {
        SlashOutcome::Miss
    }
}

/// Default csrf guard: unsafe methods must carry `X-CSRF-Token`. The
/// application can install its own stage in this slot instead.
pub struct CsrfGuard;

#[async_trait]
impl Handler for CsrfGuard {
    fn name(&self) -> &str {
        "csrf_guard"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        let unsafe_method = matches!(
            ctx.request.method.as_str(),
            "POST" | "PUT" | "DELETE" | "PATCH"
        );
        if unsafe_method && ctx.request.header("x-csrf-token").is_none() {
            return Err(Error::abort(403, "missing csrf token"));
        }
        next.run(app, ctx).await
    }
}

/// Cross-origin support: answers preflights and injects the
/// allow-origin header on actual responses.
pub struct CorsHandler;

#[async_trait]
impl Handler for CorsHandler {
    fn name(&self) -> &str {
        "cors"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        let origin = ctx.request.header("origin").map(str::to_string);
        let allowed = app
            .settings()
            .get_str("cors.allowed_origins")
            .unwrap_or("*")
            .to_string();

        if ctx.request.method == "OPTIONS"
            && origin.is_some()
            && ctx.request.header("access-control-request-method").is_some()
        {
            return Ok(HttpResponse::no_content()
                .with_header("Access-Control-Allow-Origin", allowed)
                .with_header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, PATCH, OPTIONS")
                .with_header("Access-Control-Allow-Headers", "Content-Type, Accept, X-CSRF-Token")
                .with_header("Access-Control-Max-Age", "86400"));
        }

        let mut response = next.run(app, ctx).await?;
        if origin.is_some() {
            response
                .headers
                .insert("Access-Control-Allow-Origin".to_string(), allowed);
        }
        Ok(response)
    }
}

/// Logs the wall-clock duration of everything downstream.
pub struct Timer;

#[async_trait]
impl Handler for Timer {
    fn name(&self) -> &str {
        "timer"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        let start = Instant::now();
        let result = next.run(app, ctx).await;
        tracing::debug!(
            method = %ctx.request.method,
            path = %ctx.request.path,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "resource handled"
        );
        result
    }
}

/// Terminal stage: invokes the resolved resource method and renders the
/// outcome through a representation.
pub struct MainHandler;

#[async_trait]
impl Handler for MainHandler {
    fn name(&self) -> &str {
        "main"
    }

    async fn handle(
        &self,
        app: &Application,
        ctx: &mut RequestContext,
        _next: Next<'_>,
    ) -> Result<HttpResponse, Error> {
        let resource = ctx.resource.clone().ok_or_else(|| {
            Error::HandlerContract("main handler reached without a resolved resource".to_string())
        })?;
        let method = ctx.resource_method.clone().ok_or_else(|| {
            Error::HandlerContract("main handler reached without a resource method".to_string())
        })?;
        let args = ctx.resource_args.take().unwrap_or(Args::Empty);

        let outcome = resource.call(&method, args, ctx).await?;

        let data = match outcome {
            ResourceOutcome::Response(response) => return Ok(response),
            ResourceOutcome::NoContent
                if ctx.response.is_redirect() || ctx.response.status == 204 =>
            {
                return Ok(ctx.response.clone());
            }
            ResourceOutcome::NoContent => Value::Null,
            ResourceOutcome::Data(data) => data,
        };

        let config = resource
            .describe(&method)
            .map(|d| d.config.clone())
            .unwrap_or_default();

        let factory = match &config.representation {
            Some(differentiator) => {
                app.representations().get(differentiator).ok_or_else(|| {
                    Error::Configuration(format!(
                        "no representation registered as {differentiator}"
                    ))
                })?
            }
            None => {
                let content_type = ctx.negotiated_content_type(app).to_string();
                app.representations()
                    .by_content_type(&content_type)
                    .ok_or_else(|| {
                        Error::Internal(format!(
                            "negotiated content type {content_type} has no representation"
                        ))
                    })?
            }
        };

        let representation = factory.represent(app, ctx, data, &config.representation_args)?;
        let mut response = ctx.response.clone();
        match representation.body {
            crate::representation::RepresentationBody::Response(rendered) => Ok(rendered),
            crate::representation::RepresentationBody::Text(text) => {
                let content_type = match &representation.encoding {
                    Some(encoding) => {
                        format!("{}; charset={encoding}", representation.content_type)
                    }
                    None => representation.content_type.clone(),
                };
                response
                    .headers
                    .insert("Content-Type".to_string(), content_type);
                response.body = text.into_bytes();
                Ok(response)
            }
        }
    }
}
