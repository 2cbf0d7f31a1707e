//! HTTP surface of the rendering service.
//!
//! | Route                | Auth | Response                               |
//! |----------------------|------|----------------------------------------|
//! | `GET /health`        | no   | `{status, service}`                    |
//! | `POST /render`       | yes  | raw image bytes                        |
//! | `POST /render/batch` | yes  | `{results: [...]}`                     |
//! | `POST /render/video` | yes  | `{success, video_base64, ...}`         |

mod error;
pub mod handlers;
pub mod types;

pub use error::ApiError;

use crate::auth::require_api_key;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use rendersmith::RenderService;
use std::fmt;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body; scenes may embed images as data URLs
pub const BODY_LIMIT: usize = 32 * 1024 * 1024;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    service: Arc<RenderService>,
    api_key: Option<Arc<str>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AppState {
    /// Create state around a service and an optional shared secret
    #[must_use]
    pub fn new(service: Arc<RenderService>, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.map(Arc::from),
        }
    }

    /// The rendering engine
    #[must_use]
    pub fn service(&self) -> &RenderService {
        &self.service
    }

    /// Configured shared secret
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

/// Build the application router
pub fn router(state: AppState, cors: bool) -> Router {
    let protected = Router::new()
        .route("/render", post(handlers::render))
        .route("/render/batch", post(handlers::render_batch))
        .route("/render/video", post(handlers::render_video))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(BODY_LIMIT))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
        .with_state(state);

    if cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use base64::Engine;
    use rendersmith::mock::{MockBundler, MockCompositionRenderer, MockLauncher, MOCK_VIDEO_BYTES};
    use rendersmith::{ServiceConfig, VideoConfig};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Fixture {
        launcher: MockLauncher,
        bundler: MockBundler,
        renderer: MockCompositionRenderer,
        app: Router,
        _scratch: tempfile::TempDir,
    }

    fn fixture(api_key: Option<&str>) -> Fixture {
        let scratch = tempfile::tempdir().unwrap();
        let launcher = MockLauncher::new();
        let bundler = MockBundler::new();
        let renderer = MockCompositionRenderer::new();
        let config = ServiceConfig::default()
            .with_video(VideoConfig::default().with_output_dir(scratch.path()));
        let service = RenderService::with_backends(
            config,
            Arc::new(launcher.clone()),
            Arc::new(bundler.clone()),
            Arc::new(renderer.clone()),
        );
        let app = router(
            AppState::new(Arc::new(service), api_key.map(str::to_string)),
            false,
        );
        Fixture {
            launcher,
            bundler,
            renderer,
            app,
            _scratch: scratch,
        }
    }

    fn post_json(uri: &str, body: &Value, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).expect("json body")
    }

    fn rect() -> Value {
        json!({"objects": [{"type": "rect", "left": 0, "top": 0, "width": 50, "height": 50}]})
    }

    #[tokio::test]
    async fn test_health_needs_no_key() {
        let fx = fixture(Some("s3cret"));
        let response = send(
            &fx.app,
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "ok", "service": "rendersmith"})
        );
    }

    #[tokio::test]
    async fn test_render_routes_require_key() {
        let fx = fixture(Some("s3cret"));
        let body = json!({"scene": rect(), "width": 10, "height": 10});

        for uri in ["/render", "/render/batch", "/render/video"] {
            let response = send(&fx.app, post_json(uri, &body, None)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
        let response = send(&fx.app, post_json("/render", &body, Some("wrong"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(fx.launcher.launches(), 0);

        let response = send(&fx.app, post_json("/render", &body, Some("s3cret"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_no_key_configured_bypasses_auth() {
        let fx = fixture(None);
        let body = json!({"scene": rect(), "width": 10, "height": 10});
        let response = send(&fx.app, post_json("/render", &body, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_render_returns_image_with_headers() {
        let fx = fixture(None);
        let body = json!({"scene": rect(), "width": 120, "height": 80, "format": "png"});

        let response = send(&fx.app, post_json("/render", &body, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "image/png");
        assert_eq!(headers["x-render-width"], "120");
        assert_eq!(headers["x-render-height"], "80");
        assert_eq!(headers["cache-control"], "no-store");

        let bytes = body_bytes(response).await;
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (240, 160));
    }

    #[tokio::test]
    async fn test_render_jpeg_content_type() {
        let fx = fixture(None);
        let body = json!({"scene": rect(), "width": 20, "height": 20, "format": "jpeg", "quality": 60});
        let response = send(&fx.app, post_json("/render", &body, None)).await;
        assert_eq!(response.headers()["content-type"], "image/jpeg");
    }

    #[tokio::test]
    async fn test_render_missing_or_null_scene_is_400() {
        let fx = fixture(None);
        for body in [json!({"width": 10}), json!({"scene": null}), json!({"scene": [1]})] {
            let response = send(&fx.app, post_json("/render", &body, None)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            let json = body_json(response).await;
            assert!(json["detail"].as_str().unwrap().contains("scene"));
            assert!(json["error"].is_string());
        }
        assert_eq!(fx.launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_render_malformed_json_is_400() {
        let fx = fixture(None);
        let request = Request::post("/render")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(&fx.app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_render_runtime_failure_is_500() {
        let fx = fixture(None);
        fx.launcher.runtime_missing(true);
        let body = json!({"scene": rect(), "width": 10, "height": 10});

        let response = send(&fx.app, post_json("/render", &body, None)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Render failed");
        assert!(json["detail"].as_str().unwrap().contains("not initialised"));
    }

    #[tokio::test]
    async fn test_batch_mixed_results() {
        let fx = fixture(None);
        let body = json!({"items": [
            {"id": "a", "scene": rect(), "width": 100, "height": 100, "format": "png"},
            {"id": "b", "scene": null, "width": 100, "height": 100}
        ]});

        let response = send(&fx.app, post_json("/render/batch", &body, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0]["id"], "a");
        assert_eq!(results[0]["success"], true);
        assert_eq!(results[0]["format"], "png");
        assert_eq!(results[0]["error"], Value::Null);
        let png = base64::engine::general_purpose::STANDARD
            .decode(results[0]["image_base64"].as_str().unwrap())
            .unwrap();
        assert!(!png.is_empty());

        assert_eq!(results[1]["id"], "b");
        assert_eq!(results[1]["success"], false);
        assert_eq!(results[1]["image_base64"], Value::Null);
        assert_eq!(results[1]["format"], "png");
        assert!(results[1]["error"].is_string());
    }

    #[tokio::test]
    async fn test_batch_size_limits_render_nothing() {
        let fx = fixture(None);
        let items: Vec<Value> = (0..25)
            .map(|i| json!({"id": i, "scene": rect(), "width": 4, "height": 4}))
            .collect();

        let response = send(&fx.app, post_json("/render/batch", &json!({"items": items}), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&fx.app, post_json("/render/batch", &json!({"items": []}), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&fx.app, post_json("/render/batch", &json!({}), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(fx.launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_batch_bad_items_fail_individually() {
        let fx = fixture(None);
        let body = json!({"items": [
            {"id": "zero", "scene": rect(), "width": 0},
            {"id": "neg", "scene": rect(), "width": -1},
            {"id": "webp", "scene": rect(), "format": "webp"},
            {"id": "good", "scene": rect(), "width": 10, "height": 10, "format": "jpeg"}
        ]});

        let response = send(&fx.app, post_json("/render/batch", &body, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);

        let ids: Vec<&str> = results.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["zero", "neg", "webp", "good"]);

        assert_eq!(results[0]["success"], false);
        assert!(results[0]["error"].as_str().unwrap().contains("items[0].width"));
        assert_eq!(results[1]["success"], false);
        assert!(results[1]["error"].as_str().unwrap().contains("items[1]"));
        assert_eq!(results[2]["success"], false);
        assert!(results[2]["error"].as_str().unwrap().contains("items[2]"));
        assert_eq!(results[2]["format"], "png");

        assert_eq!(results[3]["success"], true);
        assert_eq!(results[3]["format"], "jpeg");
        assert!(results[3]["image_base64"].is_string());
    }

    #[tokio::test]
    async fn test_batch_items_must_be_an_array() {
        let fx = fixture(None);
        let response = send(&fx.app, post_json("/render/batch", &json!({"items": 5}), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fx.launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_video_success() {
        let fx = fixture(None);
        let body = json!({"composition_id": "ServiceHero", "input_props": {"title": "Hi"}});

        let response = send(&fx.app, post_json("/render/video", &body, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["composition_id"], "ServiceHero");
        assert_eq!(json["format"], "mp4");
        assert_eq!(json["size_bytes"], MOCK_VIDEO_BYTES.len());
        let video = base64::engine::general_purpose::STANDARD
            .decode(json["video_base64"].as_str().unwrap())
            .unwrap();
        assert_eq!(video, MOCK_VIDEO_BYTES);
    }

    #[tokio::test]
    async fn test_video_unknown_composition_does_no_work() {
        let fx = fixture(None);
        let body = json!({"composition_id": "../../etc/passwd", "input_props": {}});

        let response = send(&fx.app, post_json("/render/video", &body, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Unknown composition");
        assert_eq!(fx.bundler.builds(), 0);
        assert_eq!(fx.renderer.renders(), 0);
    }

    #[tokio::test]
    async fn test_video_missing_fields_are_400() {
        let fx = fixture(None);
        for body in [
            json!({"input_props": {}}),
            json!({"composition_id": "ServiceHero"}),
            json!({"composition_id": "ServiceHero", "input_props": "x"}),
        ] {
            let response = send(&fx.app, post_json("/render/video", &body, None)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(body_json(response).await["success"], false);
        }
    }

    #[tokio::test]
    async fn test_video_render_failure_is_500() {
        let fx = fixture(None);
        fx.renderer.fail_renders(true);
        let body = json!({"composition_id": "BrandedStatic", "input_props": {}});

        let response = send(&fx.app, post_json("/render/video", &body, None)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["detail"].as_str().unwrap().contains("mock encoder crashed"));
    }
}
