use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{AccountForm, AuthPayload, UserPayload},
    services,
};
use crate::{auth::AuthAccount, errors::AppError, response::Envelope, state::AppState};

/// Room for a maximal picture plus the text fields; the picture rule itself
/// reports anything over its own limit.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

pub fn guest_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(show).post(update).delete(destroy))
        .route("/logout", post(logout))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    form: AccountForm,
) -> Result<(StatusCode, Json<Envelope<AuthPayload>>), AppError> {
    let payload = services::register(&state, &form).await?;
    Ok((StatusCode::CREATED, Json(Envelope::data(payload))))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    form: AccountForm,
) -> Result<Json<Envelope<AuthPayload>>, AppError> {
    let payload = services::login(&state, &form).await?;
    Ok(Json(Envelope::data(payload)))
}

#[instrument(skip(state, auth), fields(account_id = %auth.account.id))]
pub async fn show(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> Result<Json<Envelope<UserPayload>>, AppError> {
    let user = services::show(&state, &auth.account).await?;
    Ok(Json(Envelope::data(UserPayload { user })))
}

#[instrument(skip(state, auth, form), fields(account_id = %auth.account.id))]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthAccount,
    form: AccountForm,
) -> Result<Json<Envelope<UserPayload>>, AppError> {
    let user = services::update_profile(&state, &auth.account, &form).await?;
    Ok(Json(Envelope::data(UserPayload { user })))
}

#[instrument(skip(state, auth), fields(account_id = %auth.account.id))]
pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> Result<Json<Envelope<()>>, AppError> {
    services::delete_account(&state, &auth.account).await?;
    Ok(Json(Envelope::ok()))
}

#[instrument(skip(state, auth), fields(account_id = %auth.account.id))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> Result<Json<Envelope<()>>, AppError> {
    services::logout(&state, auth.token_id).await?;
    Ok(Json(Envelope::ok()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{app::build_app, fakes};

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn bare_req(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        req.body(Body::empty()).unwrap()
    }

    fn parse(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    async fn register_ana(app: &Router) -> (Value, String) {
        let (status, body) = send(
            app,
            json_req(
                "POST",
                "/register",
                None,
                json!({
                    "name": "Ana",
                    "email": "a@x.com",
                    "password": "longpass1",
                    "gender": "female"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let v = parse(&body);
        let token = v["data"]["token"].as_str().unwrap().to_string();
        (v, token)
    }

    #[tokio::test]
    async fn register_returns_created_envelope() {
        let app = build_app(fakes::harness().0);
        let (v, token) = register_ana(&app).await;
        assert_eq!(v["status"], json!(true));
        assert!(!token.is_empty());
        let user = &v["data"]["user"];
        assert_eq!(user["name"], "Ana");
        assert_eq!(user["gender"], "female");
        assert_eq!(user["profile_picture"], Value::Null);
        assert!(user.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_validation_is_422_with_field_errors() {
        let app = build_app(fakes::harness().0);
        let (status, body) = send(
            &app,
            json_req("POST", "/register", None, json!({ "email": "a@x.com", "gender": "robot" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let v = parse(&body);
        assert_eq!(v["status"], json!(false));
        assert_eq!(v["errors"]["gender"][0], "The selected gender is invalid.");
        assert_eq!(v["errors"]["name"][0], "The name field is required.");
        assert_eq!(v["errors"]["password"][0], "The password field is required.");
        assert!(v["errors"].get("email").is_none());
    }

    #[tokio::test]
    async fn undecodable_bodies_still_get_the_envelope() {
        let app = build_app(fakes::harness().0);
        for (raw, expected) in [
            ("{bad", StatusCode::BAD_REQUEST),
            ("[1,2]", StatusCode::UNPROCESSABLE_ENTITY),
        ] {
            let req = Request::builder()
                .method("POST")
                .uri("/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(raw))
                .unwrap();
            let (status, body) = send(&app, req).await;
            assert_eq!(status, expected, "{raw}");
            let v = parse(&body);
            assert_eq!(v["status"], json!(false));
            assert!(v["message"].as_str().is_some_and(|m| !m.is_empty()));
        }
    }

    #[tokio::test]
    async fn oversized_body_gets_the_envelope() {
        let app = build_app(fakes::harness().0);
        let bio = "a".repeat(MAX_BODY_BYTES + 1);
        let (status, body) = send(
            &app,
            json_req("POST", "/register", None, json!({ "bio": bio })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(parse(&body)["status"], json!(false));
    }

    #[tokio::test]
    async fn whitespace_name_is_required() {
        let app = build_app(fakes::harness().0);
        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/register",
                None,
                json!({
                    "name": "   ",
                    "email": "a@x.com",
                    "password": "longpass1",
                    "gender": "female"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(parse(&body)["errors"]["name"][0], "The name field is required.");
    }

    #[tokio::test]
    async fn register_multipart_with_picture() {
        let (state, storage) = fakes::harness();
        let app = build_app(state);
        let body = concat!(
            "--B\r\n",
            "Content-Disposition: form-data; name=\"name\"\r\n\r\nAna\r\n",
            "--B\r\n",
            "Content-Disposition: form-data; name=\"email\"\r\n\r\na@x.com\r\n",
            "--B\r\n",
            "Content-Disposition: form-data; name=\"password\"\r\n\r\nlongpass1\r\n",
            "--B\r\n",
            "Content-Disposition: form-data; name=\"gender\"\r\n\r\nother\r\n",
            "--B\r\n",
            "Content-Disposition: form-data; name=\"profile_picture\"; filename=\"a.gif\"\r\n",
            "Content-Type: image/gif\r\n\r\nGIF89a\r\n",
            "--B--\r\n",
        );
        let req = Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=B")
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::CREATED);
        let v = parse(&body);
        let url = v["data"]["user"]["profile_picture"].as_str().unwrap();
        assert!(url.ends_with(".gif"));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn login_failures_are_byte_identical() {
        let app = build_app(fakes::harness().0);
        register_ana(&app).await;

        let wrong = send(
            &app,
            json_req("POST", "/login", None, json!({ "email": "a@x.com", "password": "wrongpass" })),
        )
        .await;
        let unknown = send(
            &app,
            json_req("POST", "/login", None, json!({ "email": "zz@x.com", "password": "longpass1" })),
        )
        .await;
        assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, unknown);
        assert_eq!(parse(&wrong.1), json!({ "status": false, "message": "Invalid credentials" }));
    }

    #[tokio::test]
    async fn login_missing_fields_is_422() {
        let app = build_app(fakes::harness().0);
        let (status, body) = send(&app, bare_req("POST", "/login", None)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let v = parse(&body);
        assert!(v["errors"].get("email").is_some());
        assert!(v["errors"].get("password").is_some());
    }

    #[tokio::test]
    async fn user_routes_need_a_token() {
        let app = build_app(fakes::harness().0);
        for (method, uri) in [("GET", "/user"), ("POST", "/user"), ("DELETE", "/user"), ("POST", "/logout")] {
            let (status, body) = send(&app, bare_req(method, uri, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(parse(&body), json!({ "status": false, "message": "Unauthenticated." }));
        }
        let (status, _) = send(&app, bare_req("GET", "/user", Some("forged"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn show_and_update_profile() {
        let app = build_app(fakes::harness().0);
        let (_, token) = register_ana(&app).await;

        let (status, body) = send(&app, bare_req("GET", "/user", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse(&body)["data"]["user"]["email"], "a@x.com");

        let (status, body) = send(
            &app,
            json_req("POST", "/user", Some(&token), json!({ "name": "Ana Maria", "bio": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let user = &parse(&body)["data"]["user"];
        assert_eq!(user["name"], "Ana Maria");
        assert_eq!(user["bio"], "hi");
        assert_eq!(user["gender"], "female");

        let (status, body) = send(
            &app,
            json_req("POST", "/user", Some(&token), json!({ "gender": "robot" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(parse(&body)["errors"].get("gender").is_some());
    }

    #[tokio::test]
    async fn delete_then_same_token_is_rejected() {
        let app = build_app(fakes::harness().0);
        let (_, token) = register_ana(&app).await;

        let (status, body) = send(&app, bare_req("DELETE", "/user", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse(&body), json!({ "status": true }));

        let (status, _) = send(&app, bare_req("GET", "/user", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            json_req("POST", "/login", None, json!({ "email": "a@x.com", "password": "longpass1" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_revokes_only_the_current_token() {
        let app = build_app(fakes::harness().0);
        let (_, t1) = register_ana(&app).await;
        let (_, body) = send(
            &app,
            json_req("POST", "/login", None, json!({ "email": "a@x.com", "password": "longpass1" })),
        )
        .await;
        let t2 = parse(&body)["data"]["token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, bare_req("POST", "/logout", Some(&t1))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse(&body), json!({ "status": true }));

        assert_eq!(send(&app, bare_req("GET", "/user", Some(&t1))).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(send(&app, bare_req("GET", "/user", Some(&t2))).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn health() {
        let app = build_app(fakes::harness().0);
        let (status, body) = send(&app, bare_req("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }
}
