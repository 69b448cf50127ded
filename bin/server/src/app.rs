//! HTTP routing and the shared tower middleware stack.

use axum::{
    Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};
use tracing::{Span, info_span, warn};
use ulid::Ulid;

use crate::auth::{self, AppState, require_admin, require_auth};
use crate::config::HttpConfig;
use crate::{health, users};

const REQUEST_ID: &str = "x-request-id";

/// Builds the routes without the outer middleware stack.
pub fn routes(state: AppState) -> Router {
    let admin = Router::new()
        .route("/users", get(users::list).post(users::create))
        .route("/users/inactive", get(users::list_inactive))
        .route("/users/{id}", put(users::update).delete(users::delete))
        .route_layer(middleware::from_fn(require_admin));

    let api = Router::new()
        .route("/users/me", get(users::me))
        .route("/users/find", get(users::find_by_id))
        .route("/users/by-email", get(users::find_by_email))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
        .route("/auth/signup", post(auth::signup))
        .nest("/api", api)
        .route("/health", get(health::health))
        .with_state(state)
}

/// Builds the full application: routes plus request ids, tracing, CORS and timeouts.
pub fn router(state: AppState, http: &HttpConfig) -> Router {
    let cors = cors_layer(&state.settings.frontend_url);

    routes(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(RequestBodyTimeoutLayer::new(http.read_timeout()))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                http.write_timeout(),
            )),
    )
}

/// Credentialed CORS for the single frontend origin.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE]);

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            warn!(error = %e, frontend_url, "frontend URL is not a valid origin, CORS disabled");
            cors
        }
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
