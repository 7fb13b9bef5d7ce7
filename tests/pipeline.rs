//! End-to-end pipeline behavior through the in-process router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use serde_json::json;

use request_pipeline::config::{RouteLimits, RouteLimitsOverride};
use request_pipeline::http::SetCookie;
use request_pipeline::pipeline::RequestFlow;
use request_pipeline::schema::{any, integer, object, string, SchemaSet};
use request_pipeline::{
    apply_controllers, Controller, Guard, HttpError, Moment, Request, RequestInterceptor, Response,
    ResponseInterceptor, Route, RouteHandler, ServiceProvider, ServiceRegistry, Services,
};

mod common;
use common::{get, json_request, router_for, send, Recorder};

fn recording_interceptor(recorder: &Recorder, name: &'static str) -> ResponseInterceptor {
    let recorder = recorder.clone();
    ResponseInterceptor::named(name, move |response: Response, _| {
        let recorder = recorder.clone();
        async move {
            recorder.push(name);
            response
        }
    })
}

fn recording_guard(recorder: &Recorder, name: &'static str, allow: bool) -> Guard {
    let recorder = recorder.clone();
    Guard::named(name, move |_req: Request, _route: Arc<Route>, _s: Services| {
        let recorder = recorder.clone();
        async move {
            recorder.push(name);
            allow
        }
    })
}

fn signup_route() -> Route {
    Route::new("/signup", |req: Request, _s| async move {
        req.body.clone().unwrap_or_default()
    })
    .method(Method::POST)
    .body(
        object()
            .field("username", string().min_len(4))
            .field("password", string()),
    )
}

#[tokio::test]
async fn test_short_username_is_rejected() {
    let router = router_for(vec![signup_route()], ServiceRegistry::new());
    let res = send(
        router,
        json_request(Method::POST, "/signup", r#"{"username":"ab","password":"x"}"#),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["message"]
        .as_str()
        .unwrap()
        .contains("Incorrect body arguments"));
    assert_eq!(res.body["location"], "body");
    assert_eq!(res.body["issues"][0]["path"], "username");
}

#[tokio::test]
async fn test_multipart_without_boundary_is_rejected() {
    let router = router_for(vec![signup_route()], ServiceRegistry::new());
    let request = axum::http::Request::post("/signup")
        .header("content-type", "multipart/form-data")
        .body(Body::from("username=abcd"))
        .unwrap();
    let res = send(router, request).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["message"].as_str().unwrap().contains("boundary"));
}

#[tokio::test]
async fn test_unsupported_content_type_is_not_acceptable() {
    let router = router_for(vec![signup_route()], ServiceRegistry::new());
    let request = axum::http::Request::post("/signup")
        .header("content-type", "application/xml")
        .body(Body::from("<user/>"))
        .unwrap();
    let res = send(router, request).await;
    assert_eq!(res.status, StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let route = signup_route().limits(RouteLimitsOverride::default().max_body_size(16));
    let router = router_for(vec![route], ServiceRegistry::new());
    let res = send(
        router,
        json_request(
            Method::POST,
            "/signup",
            r#"{"username":"abcdefgh","password":"secret"}"#,
        ),
    )
    .await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_urlencoded_body_is_accepted() {
    let router = router_for(vec![signup_route()], ServiceRegistry::new());
    let request = axum::http::Request::post("/signup")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("username=alice&password=pw&extra=1"))
        .unwrap();
    let res = send(router, request).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({"username": "alice", "password": "pw"}));
}

#[tokio::test]
async fn test_json_round_trip() {
    let route = Route::new("/echo", |req: Request, _s| async move {
        req.body.clone().unwrap_or_default()
    })
    .method(Method::PUT)
    .body(object().field("a", any()));
    let router = router_for(vec![route], ServiceRegistry::new());
    let res = send(router, json_request(Method::PUT, "/echo", r#"{"a":1}"#)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({"a": 1}));
}

#[tokio::test]
async fn test_body_is_not_decoded_without_schema() {
    let route = Route::new("/raw", |req: Request, _s| async move {
        json!({ "has_body": req.body.is_some() })
    })
    .method(Method::POST);
    let router = router_for(vec![route], ServiceRegistry::new());
    let request = axum::http::Request::post("/raw")
        .header("content-type", "application/x-unknown")
        .body(Body::from("\u{0}\u{1}garbage"))
        .unwrap();
    let res = send(router, request).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({"has_body": false}));
}

#[tokio::test]
async fn test_guard_false_is_unauthorized() {
    let recorder = Recorder::default();
    let route = Route::new("/secret", |_req, _s| async { "secret" })
        .guard(recording_guard(&recorder, "deny", false));
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/secret")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "You may not access this endpoint!");
}

#[tokio::test]
async fn test_guard_custom_response_is_forwarded() {
    let route = Route::new("/secret", |_req, _s| async { "secret" }).guard(Guard::function(
        |_req: Request, _route: Arc<Route>, _s: Services| async {
            Response::json(StatusCode::FORBIDDEN, json!({"reason": "banned"}))
                .with_header("x-ban-id", "7")
        },
    ));
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/secret")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body, json!({"reason": "banned"}));
    assert_eq!(res.headers["x-ban-id"], "7");
}

#[tokio::test]
async fn test_first_rejecting_guard_wins() {
    let recorder = Recorder::default();
    let first = {
        let recorder = recorder.clone();
        Guard::named("first", move |_req: Request, _route: Arc<Route>, _s: Services| {
            let recorder = recorder.clone();
            async move {
                recorder.push("first");
                Err::<bool, _>(HttpError::with_status(StatusCode::FORBIDDEN, "first says no"))
            }
        })
    };
    let route = Route::new("/secret", |_req, _s| async { "secret" })
        .guard(recording_guard(&recorder, "open", true))
        .guard(first)
        .guard(recording_guard(&recorder, "second", false));
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/secret")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["message"], "first says no");
    assert_eq!(recorder.entries(), vec!["open", "first"]);
}

#[tokio::test]
async fn test_guard_receives_route_and_services() {
    let registry =
        ServiceRegistry::new().with("allowed_path", ServiceProvider::value("/admin".to_string()));
    let guard = Guard::function(|_req: Request, route: Arc<Route>, services: Services| async move {
        services
            .get::<String>("allowed_path")
            .map(|allowed| allowed.as_str() == route.url())
            .unwrap_or(false)
    })
    .requires(["allowed_path"]);
    let route = Route::new("/admin", |_req, _s| async { "welcome" }).guard(guard);
    let res = send(router_for(vec![route], registry), get("/admin")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!("welcome"));
}

#[tokio::test]
async fn test_missing_service_is_internal_error() {
    let route = Route::new("/db", |_req, _s| async { "unreachable" }).requires(["database"]);
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/db")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        res.body["message"],
        "Missing/unresolved required service for this route"
    );
}

#[tokio::test]
async fn test_missing_guard_service_skips_handler() {
    let recorder = Recorder::default();
    let handler_recorder = recorder.clone();
    let route = Route::new("/db", move |_req, _s| {
        let recorder = handler_recorder.clone();
        async move {
            recorder.push("handler");
            "done"
        }
    })
    .guard(recording_guard(&recorder, "needs-db", true).requires(["database"]))
    .intercept_response(
        recording_interceptor(&recorder, "guard-moment").at([Moment::GuardPreventedProgression]),
    );
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/db")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(recorder.entries(), vec!["guard-moment"]);
}

#[tokio::test]
async fn test_ok_moment_dispatch_order() {
    let recorder = Recorder::default();
    let route = Route::new("/ok", |_req, _s| async { json!({"ok": true}) })
        .intercept_response(recording_interceptor(&recorder, "always").at([Moment::Always]))
        .intercept_response(
            recording_interceptor(&recorder, "guard-only").at([Moment::GuardPreventedProgression]),
        )
        .intercept_response(
            recording_interceptor(&recorder, "before-write").at([Moment::BeforeWritingToClient]),
        )
        .intercept_response(recording_interceptor(&recorder, "finished").at([Moment::HandlerFinished]))
        .intercept_response(recording_interceptor(&recorder, "default"))
        .intercept_response(
            recording_interceptor(&recorder, "ok").at([Moment::HandlerFinishedWithOkResponse]),
        );
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/ok")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        recorder.entries(),
        vec!["default", "ok", "finished", "before-write", "always"]
    );
}

#[tokio::test]
async fn test_error_moment_interceptor_rewrites_response() {
    let route = Route::new("/fail", |_req, _s| async {
        Err::<String, _>(HttpError::bad_request("nope"))
    })
    .intercept_response(
        ResponseInterceptor::named("teapot", |mut response: Response, _| async move {
            response.set_status(StatusCode::IM_A_TEAPOT);
            response
        })
        .at([Moment::HandlerFinishedWithErrorResponse]),
    )
    .intercept_response(ResponseInterceptor::function(|_response: Response, _| async {
        Response::ok(json!("default interceptors only see successes"))
    }));
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/fail")).await;
    assert_eq!(res.status, StatusCode::IM_A_TEAPOT);
    assert_eq!(res.body["message"], "nope");
}

#[tokio::test]
async fn test_validation_failure_moment_skips_handler_interceptors() {
    let recorder = Recorder::default();
    let route = signup_route()
        .intercept_response(recording_interceptor(&recorder, "default"))
        .intercept_response(recording_interceptor(&recorder, "finished").at([Moment::HandlerFinished]))
        .intercept_response(recording_interceptor(&recorder, "always").at([Moment::Always]))
        .intercept_response(
            recording_interceptor(&recorder, "invalid").at([Moment::DataValidationFailed]),
        );
    let res = send(
        router_for(vec![route], ServiceRegistry::new()),
        json_request(Method::POST, "/signup", r#"{"username":"ab","password":"x"}"#),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(recorder.entries(), vec!["invalid", "always"]);
}

#[tokio::test]
async fn test_request_interceptor_short_circuit() {
    let recorder = Recorder::default();
    let handler_recorder = recorder.clone();
    let route = Route::new("/cached", move |_req, _s| {
        let recorder = handler_recorder.clone();
        async move {
            recorder.push("handler");
            "fresh"
        }
    })
    .intercept_request(RequestInterceptor::named("cache", |_req: Request, _s| async {
        Response::ok(json!("cached"))
    }))
    .guard(recording_guard(&recorder, "guard", true))
    .intercept_response(recording_interceptor(&recorder, "default"))
    .intercept_response(
        recording_interceptor(&recorder, "prevented")
            .at([Moment::InterceptorPreventedProgression]),
    )
    .intercept_response(
        recording_interceptor(&recorder, "prevented-ok")
            .at([Moment::InterceptorPreventedProgressionWithOkResponse]),
    )
    .intercept_response(recording_interceptor(&recorder, "always").at([Moment::Always]))
    .intercept_response(
        recording_interceptor(&recorder, "before-write").at([Moment::BeforeWritingToClient]),
    );
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/cached")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!("cached"));
    assert_eq!(
        recorder.entries(),
        vec!["prevented-ok", "prevented", "before-write", "always"]
    );
}

#[tokio::test]
async fn test_request_interceptor_error_uses_error_moment() {
    let recorder = Recorder::default();
    let route = Route::new("/blocked", |_req, _s| async { "never" })
        .intercept_request(RequestInterceptor::function(|_req: Request, _s| async {
            HttpError::with_status(StatusCode::TOO_MANY_REQUESTS, "slow down")
        }))
        .intercept_response(
            recording_interceptor(&recorder, "error")
                .at([Moment::InterceptorPreventedProgressionWithErrorResponse]),
        )
        .intercept_response(
            recording_interceptor(&recorder, "ok")
                .at([Moment::InterceptorPreventedProgressionWithOkResponse]),
        );
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/blocked")).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(recorder.entries(), vec!["error"]);
}

#[tokio::test]
async fn test_request_interceptor_replaces_request_and_provides_services() {
    let route = Route::new("/me", |req: Request, services: Services| async move {
        let user = services.require::<String>("user")?;
        Ok::<_, HttpError>(json!({
            "user": user.as_str(),
            "tagged": req.metadata.get("tagged").cloned().unwrap_or_default(),
        }))
    })
    .requires(["user"])
    .intercept_request(RequestInterceptor::function(|mut req: Request, _s| async move {
        let user = req.header_str("x-user").unwrap_or("anonymous").to_string();
        req.provide("user", user);
        req.metadata.insert("tagged".into(), json!(true));
        RequestFlow::Continue(req)
    }));
    let router = router_for(vec![route], ServiceRegistry::new());

    for name in ["alice", "bob"] {
        let request = axum::http::Request::get("/me")
            .header("x-user", name)
            .body(Body::empty())
            .unwrap();
        let res = send(router.clone(), request).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, json!({"user": name, "tagged": true}));
    }
}

#[tokio::test]
async fn test_scoped_services_are_per_request() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let registry = ServiceRegistry::new().with(
        "request_counter",
        ServiceProvider::scoped(move |_| Ok(counter.fetch_add(1, Ordering::SeqCst))),
    );
    let guard = Guard::function(|_req: Request, _route: Arc<Route>, _s: Services| async { true })
        .requires(["request_counter"]);
    let route = Route::new("/count", |_req, services: Services| async move {
        let n = services.require::<usize>("request_counter")?;
        Ok::<_, HttpError>(json!(*n))
    })
    .requires(["request_counter"])
    .guard(guard);
    let router = router_for(vec![route], registry);

    let first = send(router.clone(), get("/count")).await;
    let second = send(router, get("/count")).await;
    assert_eq!(first.body, json!(0));
    assert_eq!(second.body, json!(1));
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_route_register_overrides_registry() {
    let registry = ServiceRegistry::new().with("label", ServiceProvider::value("global".to_string()));
    let route = |url: &str| {
        Route::new(url, |_req, services: Services| async move {
            let label = services.require::<String>("label")?;
            Ok::<_, HttpError>(json!(label.as_str()))
        })
        .requires(["label"])
    };
    let router = router_for(
        vec![
            route("/global"),
            route("/local").register("label", ServiceProvider::value("local".to_string())),
        ],
        registry,
    );
    assert_eq!(send(router.clone(), get("/global")).await.body, json!("global"));
    assert_eq!(send(router, get("/local")).await.body, json!("local"));
}

#[tokio::test]
async fn test_param_groups_missing_vs_invalid() {
    let route = Route::new("/items", |req: Request, _s| async move {
        json!({ "page": req.query_param("page").cloned() })
    })
    .query_param("page", integer().min(1.0));
    let router = router_for(vec![route], ServiceRegistry::new());

    let missing = send(router.clone(), get("/items")).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert!(missing.body["message"].as_str().unwrap().contains("to be present"));

    let invalid = send(router.clone(), get("/items?page=zero")).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert!(invalid.body["message"]
        .as_str()
        .unwrap()
        .contains("could not be validated"));

    let ok = send(router, get("/items?page=3")).await;
    assert_eq!(ok.body, json!({"page": 3}));
}

#[tokio::test]
async fn test_cookies_are_parsed_and_set() {
    let route = Route::new("/session", |req: Request, _s| async move {
        let session = req.cookie("session").cloned().unwrap_or_default();
        Response::ok(json!({ "session": session }))
            .with_cookie(SetCookie::new("seen", "1").path("/").http_only())
    })
    .cookie("session", string());
    let request = axum::http::Request::get("/session")
        .header("cookie", "theme=dark; session=abc123")
        .body(Body::empty())
        .unwrap();
    let res = send(router_for(vec![route], ServiceRegistry::new()), request).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({"session": "abc123"}));
    let set_cookie = res.headers["set-cookie"].to_str().unwrap();
    assert!(set_cookie.starts_with("seen=1"));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_optional_url_param_and_wildcard() {
    let greet = Route::new("/hello/:name?", |req: Request, _s| async move {
        json!(req.url_param("name").cloned().unwrap_or(json!("world")))
    })
    .url_param("name", string().optional());
    let files = Route::new("/static/*", |req: Request, _s| async move {
        json!(req.url_param("wildcard").cloned())
    })
    .url_param("wildcard", string());
    let router = router_for(vec![greet, files], ServiceRegistry::new());

    assert_eq!(send(router.clone(), get("/hello")).await.body, json!("world"));
    assert_eq!(send(router.clone(), get("/hello/ada")).await.body, json!("ada"));
    assert_eq!(
        send(router, get("/static/css/site.css")).await.body,
        json!("css/site.css")
    );
}

#[tokio::test]
async fn test_panicking_guard_is_internal_error() {
    let route = Route::new("/boom", |_req, _s| async { "never" }).guard(Guard::function(
        |_req: Request, _route: Arc<Route>, _s: Services| async {
            if true {
                panic!("guard exploded");
            }
            true
        },
    ));
    let res = send(router_for(vec![route], ServiceRegistry::new()), get("/boom")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_controllers_wrap_routes() {
    let recorder = Recorder::default();
    let api = Controller::new("api")
        .guard(recording_guard(&recorder, "api", true))
        .header("x-client", string());
    let admin = Controller::new("admin").guard(recording_guard(&recorder, "admin", true));
    let route = Route::new("/admin/stats", |req: Request, _s| async move {
        json!(req.header("x-client").cloned())
    })
    .guard(recording_guard(&recorder, "route", true));
    let route = apply_controllers(route, &[api, admin]);
    let router = router_for(vec![route], ServiceRegistry::new());

    let missing = send(router.clone(), get("/admin/stats")).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert!(recorder.entries().is_empty());

    let request = axum::http::Request::get("/admin/stats")
        .header("x-client", "cli")
        .body(Body::empty())
        .unwrap();
    let res = send(router, request).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!("cli"));
    assert_eq!(recorder.entries(), vec!["api", "admin", "route"]);
}

#[test]
fn test_composition_is_idempotent() {
    let controllers = [
        Controller::new("outer")
            .body(object().field("token", string()))
            .query_param("lang", string().optional()),
        Controller::new("inner").header("x-trace", string().optional()),
    ];
    let guard = Guard::function(|_req: Request, _route: Arc<Route>, _s: Services| async { true })
        .with_schemas(SchemaSet::new().cookie("session", string()));
    let route = Route::new("/things", |_req, _s| async { "ok" })
        .body(object().field("name", string()))
        .guard(guard);

    let registry = Arc::new(ServiceRegistry::new());
    let first = RouteHandler::new(
        apply_controllers(route.clone(), &controllers),
        registry.clone(),
        &RouteLimits::default(),
    );
    let second = RouteHandler::new(
        apply_controllers(route, &controllers),
        registry,
        &RouteLimits::default(),
    );
    assert_eq!(first.schemas(), second.schemas());
    let body = first.schemas().body.as_ref().unwrap();
    assert!(body.get("token").is_some());
    assert!(body.get("name").is_some());
    assert!(first.schemas().cookies.is_some());
}

#[tokio::test]
async fn test_invocation_counter() {
    let registry = Arc::new(ServiceRegistry::new());
    let handler = RouteHandler::new(
        Route::new("/", |_req, _s| async { "ok" }),
        registry,
        &RouteLimits::default(),
    );
    for _ in 0..3 {
        let response = handler
            .process(get("/"), std::collections::HashMap::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(handler.invocations(), 3);
}
