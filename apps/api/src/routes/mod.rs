pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::wizard::handlers;

pub fn build_router(state: AppState) -> Router {
    // Only the multipart steps carry files; everything else keeps axum's default.
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Wizard steps, in order
        .route(
            "/profile/basic-info",
            post(handlers::handle_basic_info).layer(upload_limit),
        )
        .route("/profile/skills", post(handlers::handle_skills))
        .route("/profile/education", post(handlers::handle_education))
        .route("/profile/experience", post(handlers::handle_experience))
        .route("/profile/projects", post(handlers::handle_projects))
        .route(
            "/profile/achievements",
            post(handlers::handle_achievements).layer(upload_limit),
        )
        // Read-only views
        .route("/profile/summary", get(handlers::handle_summary))
        .route("/profile/picture", get(handlers::handle_edit_picture))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
    };
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::Claims;
    use crate::config::{Config, StorageBackend};
    use crate::storage::LocalDiskStore;
    use crate::wizard::form::test_support::{self, Part};

    const SECRET: &str = "test-secret";

    /// State whose pool never connects; fine for requests rejected before any query.
    fn test_state_at(storage_root: &Path, max_upload_bytes: usize) -> AppState {
        let config = Config {
            database_url: "postgres://localhost/unused".into(),
            jwt_secret: SECRET.into(),
            storage: StorageBackend::Local {
                root: storage_root.display().to_string(),
            },
            public_url_base: "/storage".into(),
            port: 0,
            rust_log: "info".into(),
            max_upload_bytes,
        };
        AppState {
            db: PgPoolOptions::new()
                .connect_lazy(&config.database_url)
                .unwrap(),
            storage: Arc::new(LocalDiskStore::new(storage_root, "/storage")),
            config,
        }
    }

    fn test_state() -> AppState {
        test_state_at(Path::new("/tmp"), 20 * 1024 * 1024)
    }

    fn bearer() -> String {
        let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let token = encode(
            &Header::default(),
            &Claims {
                sub: Uuid::new_v4(),
                exp,
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    fn post_json(path: &str, body: &str) -> Request<Body> {
        Request::post(path)
            .header(header::AUTHORIZATION, bearer())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_multipart(path: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::post(path)
            .header(header::AUTHORIZATION, bearer())
            .header(header::CONTENT_TYPE, test_support::content_type())
            .body(Body::from(test_support::body(parts)))
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_health_ok() {
        let response = build_router(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_steps_require_authentication() {
        for path in ["/profile/skills", "/profile/education", "/profile/projects"] {
            let response = build_router(test_state())
                .oneshot(
                    Request::post(path)
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(r#"{}"#))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
        }
    }

    #[tokio::test]
    async fn test_summary_rejects_bad_token() {
        let response = build_router(test_state())
            .oneshot(
                Request::get("/profile/summary")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_string_skill_is_field_error() {
        let response = build_router(test_state())
            .oneshot(post_json("/profile/skills", r#"{"skills":["rust",1]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["fields"]["skills.1"].is_array());
        assert!(body["error"]["fields"]["skills.0"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_education_id_is_field_error() {
        let response = build_router(test_state())
            .oneshot(post_json(
                "/profile/education",
                r#"{"education":[{"id":"x","institution":"MIT","start_date":20200101}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        let fields = &body["error"]["fields"];
        assert_eq!(
            fields["education.0.id"][0],
            "The id field must be a valid UUID."
        );
        assert!(fields["education.0.start_date"].is_array());
    }

    #[tokio::test]
    async fn test_unreadable_json_is_bad_request() {
        for body in ["{not json", "[]", r#""skills""#] {
            let response = build_router(test_state())
                .oneshot(post_json("/profile/skills", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn test_undecodable_picture_writes_nothing() {
        let storage = tempfile::tempdir().unwrap();
        let response = build_router(test_state_at(storage.path(), 1024 * 1024))
            .oneshot(post_multipart(
                "/profile/basic-info",
                &[
                    Part::Text("location", "Nairobi"),
                    Part::Text("birth_date", "1994-03-12"),
                    // "not an image"
                    Part::Text("profile_picture_cropped", "bm90IGFuIGltYWdl"),
                    Part::File("cv", "cv.pdf", b"%PDF-1.4"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        let fields = &body["error"]["fields"];
        assert!(fields["profile_picture_cropped"].is_array());
        assert!(is_empty_dir(storage.path()));
    }

    #[tokio::test]
    async fn test_achievements_multipart_keys_validated() {
        let storage = tempfile::tempdir().unwrap();
        let response = build_router(test_state_at(storage.path(), 1024 * 1024))
            .oneshot(post_multipart(
                "/profile/achievements",
                &[
                    Part::Text("achievements[0][issuer]", "IEEE"),
                    Part::Text("achievements[1][title]", "Hackathon Winner"),
                    Part::File("achievements[1][certificate]", "cert.exe", b"MZ"),
                    Part::File("achievements[2][certificate]", "", b""),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        let keys: Vec<&str> = body["error"]["fields"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["achievements.0.title", "achievements.1.certificate"]);
        assert!(is_empty_dir(storage.path()));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let storage = tempfile::tempdir().unwrap();
        let picture = "A".repeat(8 * 1024);
        let response = build_router(test_state_at(storage.path(), 1024))
            .oneshot(post_multipart(
                "/profile/basic-info",
                &[
                    Part::Text("location", "Nairobi"),
                    Part::Text("profile_picture_cropped", &picture),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    }
}
