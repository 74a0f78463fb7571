// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    handlers::{attempt, auth, health, quiz},
    state::AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        quiz::create_quiz,
        quiz::my_quizzes,
        quiz::published_quizzes,
        quiz::get_quiz,
        quiz::get_quiz_full,
        quiz::update_quiz,
        quiz::delete_quiz,
        quiz::start_quiz,
        quiz::submit_quiz,
        attempt::my_attempts,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "quizzes", description = "Quiz authoring, taking and scoring"),
        (name = "attempts", description = "Attempt history"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "token",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// Identity is checked per handler by the `AuthUser` extractor, so public and
/// protected routes can share a path (`GET` vs `PUT /api/quizzes/{id}`).
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/", post(quiz::create_quiz))
        .route("/my-quizzes", get(quiz::my_quizzes))
        .route("/published", get(quiz::published_quizzes))
        .route(
            "/{id}",
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        )
        .route("/{id}/full", get(quiz::get_quiz_full))
        .route("/{id}/start", post(quiz::start_quiz))
        .route("/{id}/submit", post(quiz::submit_quiz));

    let attempt_routes = Router::new().route("/my-attempts", get(attempt::my_attempts));

    Router::new()
        .route("/", get(health::root))
        .route("/api/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/attempts", attempt_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(health::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::{config::Config, store::SqliteQuizStore};

    async fn app() -> Router {
        let store = SqliteQuizStore::open_in_memory().await.unwrap();
        create_router(AppState {
            store: Arc::new(store),
            config: Config {
                database_url: "sqlite::memory:".to_string(),
                jwt_secret: "routes_test_secret".to_string(),
                jwt_expiration: 600,
                submit_grace_seconds: 30,
                port: 0,
                rust_log: "error".to_string(),
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
        })
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .await
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_protected_route_without_token_is_401() {
        let response = app()
            .await
            .oneshot(
                Request::get("/api/quizzes/my-quizzes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn test_malformed_quiz_id_is_400() {
        let response = app()
            .await
            .oneshot(
                Request::get("/api/quizzes/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app()
            .await
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn test_openapi_lists_quiz_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/quizzes/{id}/submit"));
        assert!(doc.paths.paths.contains_key("/api/auth/register"));
    }
}
