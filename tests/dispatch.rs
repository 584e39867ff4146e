// End-to-end tests for the dispatch chain

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gantry::{
    Application, Args, DynResource, Error, EventKind, HttpRequest, HttpResponse, MethodConfig,
    MethodDescriptor, MountOptions, ResourceOutcome, Settings,
};
use serde_json::json;

fn widget_resource() -> DynResource {
    DynResource::new()
        .method(
            "GET",
            MethodDescriptor::new().required("id"),
            |args, _ctx| {
                let id = args.keyword("id").unwrap_or_default().to_string();
                Ok(ResourceOutcome::Data(json!({ "id": id })))
            },
        )
        .method(
            "DELETE",
            MethodDescriptor::new().required("id"),
            |_args, _ctx| Ok(ResourceOutcome::NoContent),
        )
}

fn app_with_widget() -> Application {
    let mut app = Application::new(Settings::default());
    app.mount("widget", "/widgets/{id}", widget_resource().into_factory())
        .unwrap();
    app
}

#[tokio::test]
async fn test_get_widget_by_id() {
    let app = app_with_widget();
    let response = app.handle(HttpRequest::new("GET", "/widgets/42")).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("content-type"),
        Some("application/json; charset=utf-8")
    );
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["id"], "42");
}

#[tokio::test]
async fn test_unmounted_path_is_404() {
    let app = app_with_widget();
    let response = app.handle(HttpRequest::new("GET", "/gadgets/42")).await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let mut app = Application::new(Settings::default());
    app.mount_with(
        "widget",
        "/widgets/{id}",
        widget_resource().into_factory(),
        MountOptions::new().methods(["GET"]),
    )
    .unwrap();

    let response = app.handle(HttpRequest::new("PUT", "/widgets/42")).await;
    assert_eq!(response.status, 405);
}

#[tokio::test]
async fn test_first_mounted_match_wins() {
    let special = DynResource::new().method("GET", MethodDescriptor::new(), |_args, _ctx| {
        Ok(ResourceOutcome::Data(json!("special")))
    });

    let mut app = Application::new(Settings::default());
    app.mount("special", "/widgets/special", special.into_factory())
        .unwrap();
    app.mount("widget", "/widgets/{id}", widget_resource().into_factory())
        .unwrap();

    let response = app.handle(HttpRequest::new("GET", "/widgets/special")).await;
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body, json!("special"));
}

#[tokio::test]
async fn test_missing_required_param_is_400() {
    let listing = DynResource::new().method(
        "GET",
        MethodDescriptor::new().required("owner"),
        |_args, _ctx| Ok(ResourceOutcome::NoContent),
    );
    let mut app = Application::new(Settings::default());
    app.mount("widgets", "/widgets", listing.into_factory())
        .unwrap();

    let response = app.handle(HttpRequest::new("GET", "/widgets")).await;
    assert_eq!(response.status, 400);

    let response = app
        .handle(HttpRequest::new("GET", "/widgets?owner=sam"))
        .await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_delete_defaults_to_204_with_empty_body() {
    let app = app_with_widget();
    let response = app.handle(HttpRequest::new("DELETE", "/widgets/42")).await;
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_post_follows_configured_location() {
    let creator = DynResource::new().method(
        "POST",
        MethodDescriptor::new()
            .required("name")
            .config(MethodConfig::new().location("/widgets/new")),
        |_args, _ctx| Ok(ResourceOutcome::NoContent),
    );
    let mut app = Application::new(Settings::default());
    app.mount("widgets", "/widgets", creator.into_factory())
        .unwrap();

    let response = app
        .handle(
            HttpRequest::new("POST", "/widgets")
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_body(b"name=sprocket".to_vec()),
        )
        .await;
    assert_eq!(response.status, 303);
    assert_eq!(response.header("location"), Some("/widgets/new"));
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_method_config_pins_status_and_headers() {
    let creator = DynResource::new().method(
        "POST",
        MethodDescriptor::new().config(
            MethodConfig::new()
                .status(201)
                .header("X-Widget-Id", "next"),
        ),
        |_args, _ctx| Ok(ResourceOutcome::Data(json!({ "created": true }))),
    );
    let mut app = Application::new(Settings::default());
    app.mount("widgets", "/widgets", creator.into_factory())
        .unwrap();

    let response = app.handle(HttpRequest::new("POST", "/widgets")).await;
    assert_eq!(response.status, 201);
    assert_eq!(response.header("x-widget-id"), Some("next"));
}

#[tokio::test]
async fn test_resource_can_return_complete_response() {
    let raw = DynResource::new().method("GET", MethodDescriptor::new(), |_args, _ctx| {
        Ok(ResourceOutcome::Response(
            HttpResponse::new(418).with_body(b"teapot".to_vec()),
        ))
    });
    let mut app = Application::new(Settings::default());
    app.mount("teapot", "/teapot", raw.into_factory()).unwrap();

    let response = app.handle(HttpRequest::new("GET", "/teapot")).await;
    assert_eq!(response.status, 418);
    assert_eq!(response.body, b"teapot");
}

#[tokio::test]
async fn test_accept_header_selects_representation() {
    let app = app_with_widget();
    let response = app
        .handle(HttpRequest::new("GET", "/widgets/42").with_header("Accept", "text/plain"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("content-type"),
        Some("text/plain; charset=utf-8")
    );
}

#[tokio::test]
async fn test_exotic_accept_header_falls_back_to_default() {
    let app = app_with_widget();
    let response = app
        .handle(
            HttpRequest::new("GET", "/widgets/42")
                .with_header("Accept", "a/b;x=\u{130}\u{130}\u{130}\u{130};q=1"),
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("content-type"),
        Some("application/json; charset=utf-8")
    );
}

#[tokio::test]
async fn test_path_extension_sets_accept() {
    let app = app_with_widget();
    let response = app.handle(HttpRequest::new("GET", "/widgets/42.text")).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("content-type"),
        Some("text/plain; charset=utf-8")
    );
}

#[tokio::test]
async fn test_dollar_accept_overrides_header() {
    let app = app_with_widget();
    let response = app
        .handle(
            HttpRequest::new("GET", "/widgets/42?$accept=text")
                .with_header("Accept", "application/json"),
        )
        .await;
    assert_eq!(
        response.header("content-type"),
        Some("text/plain; charset=utf-8")
    );
}

#[tokio::test]
async fn test_pinned_representation_beats_negotiation() {
    let pinned = DynResource::new().method(
        "GET",
        MethodDescriptor::new().config(MethodConfig::new().representation("text")),
        |_args, _ctx| Ok(ResourceOutcome::Data(json!("plain please"))),
    );
    let mut app = Application::new(Settings::default());
    app.mount("pinned", "/pinned", pinned.into_factory()).unwrap();

    let response = app
        .handle(HttpRequest::new("GET", "/pinned").with_header("Accept", "application/json"))
        .await;
    assert_eq!(
        response.header("content-type"),
        Some("text/plain; charset=utf-8")
    );
}

#[tokio::test]
async fn test_method_tunneled_over_post() {
    let app = app_with_widget();
    let response = app
        .handle(HttpRequest::new("POST", "/widgets/42?$method=DELETE"))
        .await;
    assert_eq!(response.status, 204);
}

#[tokio::test]
async fn test_tunneling_outside_allowlist_is_400() {
    let mut app = Application::new(Settings::default());
    app.set_setting("tunnel_over_post", "PUT");
    app.mount("widget", "/widgets/{id}", widget_resource().into_factory())
        .unwrap();

    let response = app
        .handle(HttpRequest::new("POST", "/widgets/42?$method=DELETE"))
        .await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_debug_mode_allows_any_tunnel() {
    let mut app = Application::new(Settings::default());
    app.set_setting("debug", true);
    app.set_setting("tunnel_over_post", "");
    app.mount("widget", "/widgets/{id}", widget_resource().into_factory())
        .unwrap();

    let response = app
        .handle(HttpRequest::new("GET", "/widgets/42?$method=DELETE"))
        .await;
    assert_eq!(response.status, 204);
}

#[tokio::test]
async fn test_add_slash_redirect_preserves_query() {
    let mut app = Application::new(Settings::default());
    app.mount_with(
        "widgets",
        "/widgets/",
        widget_resource().into_factory(),
        MountOptions::new().add_slash(),
    )
    .unwrap();

    let response = app
        .handle(HttpRequest::new("GET", "/widgets?owner=sam"))
        .await;
    assert_eq!(response.status, 303);
    assert_eq!(response.header("location"), Some("/widgets/?owner=sam"));
}

#[tokio::test]
async fn test_add_slash_with_wrong_method_is_405() {
    let listing = DynResource::new().method("GET", MethodDescriptor::new(), |_args, _ctx| {
        Ok(ResourceOutcome::Data(json!([])))
    });
    let mut app = Application::new(Settings::default());
    app.mount_with(
        "widgets",
        "/widgets/",
        listing.into_factory(),
        MountOptions::new().methods(["GET"]).add_slash(),
    )
    .unwrap();

    // the slashed sibling exists but excludes the method
    let response = app.handle(HttpRequest::new("POST", "/widgets")).await;
    assert_eq!(response.status, 405);

    // the redirect still fires for an accepted method
    let response = app.handle(HttpRequest::new("GET", "/widgets")).await;
    assert_eq!(response.status, 303);
    assert_eq!(response.header("location"), Some("/widgets/"));
}

#[tokio::test]
async fn test_finished_callbacks_all_run_and_failures_aggregate() {
    let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_for_resource = seen.clone();

    let resource = DynResource::new().method("GET", MethodDescriptor::new(), move |_args, ctx| {
        let first = seen_for_resource.clone();
        ctx.on_finished(Arc::new(move |_app, _ctx, _response| {
            first.lock().unwrap().push("first");
            Err(Error::Internal("first callback failed".to_string()))
        }));
        let second = seen_for_resource.clone();
        ctx.on_finished(Arc::new(move |_app, _ctx, _response| {
            second.lock().unwrap().push("second");
            Ok(())
        }));
        Ok(ResourceOutcome::Data(json!("ok")))
    });

    let mut app = Application::new(Settings::default());
    app.mount("callbacks", "/callbacks", resource.into_factory())
        .unwrap();

    let response = app.handle(HttpRequest::new("GET", "/callbacks")).await;
    assert_eq!(response.status, 500);
    assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
}

#[tokio::test]
async fn test_error_resource_renders_error_body() {
    let error_resource = DynResource::new().method("GET", MethodDescriptor::new(), |_args, ctx| {
        Ok(ResourceOutcome::Data(
            json!({ "status": ctx.response.status, "custom": true }),
        ))
    });

    let mut app = app_with_widget();
    app.set_error_resource(error_resource.into_factory());

    let response = app.handle(HttpRequest::new("GET", "/gadgets")).await;
    assert_eq!(response.status, 404);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["status"], 404);
    assert_eq!(body["custom"], true);
}

#[tokio::test]
async fn test_error_resource_skipped_for_plain_400() {
    // only statuses above 400 re-enter the chain
    let error_resource = DynResource::new().method("GET", MethodDescriptor::new(), |_args, _ctx| {
        Ok(ResourceOutcome::Data(json!({ "custom": true })))
    });

    let mut app = Application::new(Settings::default());
    app.set_error_resource(error_resource.into_factory());
    let listing = DynResource::new().method(
        "GET",
        MethodDescriptor::new().required("owner"),
        |_args, _ctx| Ok(ResourceOutcome::NoContent),
    );
    app.mount("widgets", "/widgets", listing.into_factory())
        .unwrap();

    let response = app.handle(HttpRequest::new("GET", "/widgets")).await;
    assert_eq!(response.status, 400);
    assert!(serde_json::from_slice::<serde_json::Value>(&response.body).is_err());
}

#[tokio::test]
async fn test_events_fire_in_order() {
    let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut app = app_with_widget();
    for (kind, tag) in [
        (EventKind::NewRequest, "request"),
        (EventKind::ResourceFound, "found"),
        (EventKind::NewResponse, "response"),
    ] {
        let seen = seen.clone();
        app.subscribe(kind, move |_event| {
            seen.lock().unwrap().push(tag);
        });
    }

    app.handle(HttpRequest::new("GET", "/widgets/42")).await;
    assert_eq!(*seen.lock().unwrap(), ["request", "found", "response"]);
}

#[tokio::test]
async fn test_static_requests_skip_events() {
    let root = std::env::temp_dir().join("gantry-dispatch-static");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("app.css"), b"body{}").unwrap();

    let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let mut app = app_with_widget();
    app.mount_static(
        "/static",
        gantry::StaticTarget::App(Arc::new(gantry::DirectoryApp::new(&root))),
    );
    {
        let seen = seen.clone();
        app.subscribe(EventKind::NewRequest, move |_event| {
            seen.lock().unwrap().push("request");
        });
    }

    let response = app.handle(HttpRequest::new("GET", "/static/app.css")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("text/css"));
    assert_eq!(response.body, b"body{}");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_csrf_guard_blocks_unsafe_methods() {
    let mut app = app_with_widget();
    app.set_setting("csrf.enabled", true);

    let response = app.handle(HttpRequest::new("DELETE", "/widgets/42")).await;
    assert_eq!(response.status, 403);

    let response = app
        .handle(HttpRequest::new("DELETE", "/widgets/42").with_header("X-CSRF-Token", "tok"))
        .await;
    assert_eq!(response.status, 204);

    let response = app.handle(HttpRequest::new("GET", "/widgets/42")).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_cors_header_injection() {
    let mut app = app_with_widget();
    app.set_setting("cors.enabled", true);

    let response = app
        .handle(HttpRequest::new("GET", "/widgets/42").with_header("Origin", "https://example.com"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));

    // no Origin header, no cors headers
    let response = app.handle(HttpRequest::new("GET", "/widgets/42")).await;
    assert_eq!(response.header("access-control-allow-origin"), None);
}

#[tokio::test]
async fn test_cors_preflight_short_circuits() {
    // preflight reaches the cors stage only if the mount resolves, so
    // the resource declares OPTIONS
    let resource = widget_resource().method("OPTIONS", MethodDescriptor::new(), |_args, _ctx| {
        Ok(ResourceOutcome::NoContent)
    });
    let mut app = Application::new(Settings::default());
    app.set_setting("cors.enabled", true);
    app.mount("widget", "/widgets/{id}", resource.into_factory())
        .unwrap();

    let response = app
        .handle(
            HttpRequest::new("OPTIONS", "/widgets/42")
                .with_header("Origin", "https://example.com")
                .with_header("Access-Control-Request-Method", "GET"),
        )
        .await;
    assert_eq!(response.status, 204);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    assert!(response.header("access-control-allow-methods").is_some());
}

#[tokio::test]
async fn test_dispatch_method_option() {
    let searcher = DynResource::new().method(
        "search",
        MethodDescriptor::new().optional("q"),
        |args, _ctx| {
            Ok(ResourceOutcome::Data(
                json!({ "q": args.keyword("q").unwrap_or("") }),
            ))
        },
    );
    let mut app = Application::new(Settings::default());
    app.mount_with(
        "search",
        "/search",
        searcher.into_factory(),
        MountOptions::new().dispatch_method("search"),
    )
    .unwrap();

    let response = app.handle(HttpRequest::new("GET", "/search?q=bolts")).await;
    assert_eq!(response.status, 200);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["q"], "bolts");
}

#[tokio::test]
async fn test_urlvar_beats_query_param() {
    let app = app_with_widget();
    let response = app
        .handle(HttpRequest::new("GET", "/widgets/42?id=99"))
        .await;
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["id"], "42");
}

#[tokio::test]
async fn test_resource_can_abort_with_status() {
    let gone = DynResource::new().method("GET", MethodDescriptor::new(), |_args, _ctx| {
        Err::<ResourceOutcome, _>(Error::abort(410, "retired widget"))
    });
    let mut app = Application::new(Settings::default());
    app.mount("gone", "/gone", gone.into_factory()).unwrap();

    let response = app.handle(HttpRequest::new("GET", "/gone")).await;
    assert_eq!(response.status, 410);
}

#[tokio::test]
async fn test_resource_can_redirect() {
    let moved = DynResource::new().method("GET", MethodDescriptor::new(), |_args, _ctx| {
        Err::<ResourceOutcome, _>(Error::Redirect {
            status: 303,
            location: "/widgets/42".to_string(),
        })
    });
    let mut app = Application::new(Settings::default());
    app.mount("moved", "/moved", moved.into_factory()).unwrap();

    let response = app.handle(HttpRequest::new("GET", "/moved")).await;
    assert_eq!(response.status, 303);
    assert_eq!(response.header("location"), Some("/widgets/42"));
}

#[tokio::test]
async fn test_user_handler_runs_after_resource_finder() {
    use async_trait::async_trait;
    use gantry::{Handler, Next, RequestContext};

    struct Stamp;

    #[async_trait]
    impl Handler for Stamp {
        async fn handle(
            &self,
            app: &Application,
            ctx: &mut RequestContext,
            next: Next<'_>,
        ) -> Result<HttpResponse, Error> {
            // the finder has already resolved the mount by this point
            assert!(ctx.resource.is_some());
            let mut response = next.run(app, ctx).await?;
            response
                .headers
                .insert("X-Stamped".to_string(), "yes".to_string());
            Ok(response)
        }
    }

    let mut app = app_with_widget();
    app.add_handler(Arc::new(Stamp));

    let response = app.handle(HttpRequest::new("GET", "/widgets/42")).await;
    assert_eq!(response.header("x-stamped"), Some("yes"));
}

#[tokio::test]
async fn test_format_path_roundtrips_resolution() {
    let app = app_with_widget();
    let mut vars = HashMap::new();
    vars.insert("id".to_string(), "42".to_string());
    let path = app.resource_path("widget", &vars).unwrap();
    assert_eq!(path, "/widgets/42");

    let response = app.handle(HttpRequest::new("GET", path)).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_var_positional_binding() {
    let tags = DynResource::new().method(
        "GET",
        MethodDescriptor::new().var_positional("tag"),
        |args, _ctx| {
            let collected: Vec<_> = match &args {
                Args::Positional(values) => values.clone(),
                _ => Vec::new(),
            };
            Ok(ResourceOutcome::Data(json!(collected)))
        },
    );
    let mut app = Application::new(Settings::default());
    app.mount("tags", "/tags", tags.into_factory()).unwrap();

    let response = app
        .handle(HttpRequest::new("GET", "/tags?tag=a&tag=b"))
        .await;
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body, json!(["a", "b"]));
}
