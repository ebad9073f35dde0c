use hub_shared::auth::{require_caller, Caller};
use hub_shared::courses::{self, AssignCourseInput, CourseInput};
use hub_shared::error::{HubError, HubResult};
use hub_shared::quick_shorts::{self, RefreshOptions};
use hub_shared::showcase::comments::{self, CommentInput};
use hub_shared::showcase::media::{self, DemoUploadRequest};
use hub_shared::showcase::projects::{self, CreateProjectInput, ProjectView};
use hub_shared::showcase::suggestions::{self, SuggestionInput};
use hub_shared::showcase::{FeedQuery, SortMode};
use hub_shared::store::Document;
use hub_shared::types::QuickShortsSources;
use hub_shared::users::{self, UserInput, UserPatch};
use hub_shared::{announcements, gemini, response, runtime_config, url_check, youtube, AppState};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

type Reply = HubResult<Response<Body>>;

#[derive(Deserialize)]
struct BatchDeleteRequest {
    #[serde(default)]
    emails: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManualShortRequest {
    video_id: String,
    #[serde(default)]
    title: String,
}

/// Main Lambda handler - routes every `/api/*` request
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return response::preflight();
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let routed = match parts.split_first() {
        Some((&"api", rest)) => route(&event, &state, &method, rest).await,
        _ => Err(HubError::not_found("Not found")),
    };

    match routed {
        Ok(resp) => Ok(resp),
        Err(e) => e.into_response(),
    }
}

async fn route(event: &Request, state: &AppState, method: &Method, parts: &[&str]) -> Reply {
    let store = state.store.as_ref();

    match (method, parts) {
        // --- PLATFORM ---
        (&Method::GET, ["health"]) => reply(StatusCode::OK, &json!({"status": "ok"})),
        (&Method::GET, ["runtime-config"]) => {
            let config = runtime_config::runtime_config(&state.config.firebase)?;
            response::no_store(StatusCode::OK, &config).map_err(internal)
        }
        (&Method::POST, ["gemini"]) => {
            let data = gemini::prompt(&state.http, &state.config, parse(event)?).await?;
            reply(StatusCode::OK, &data)
        }
        (&Method::POST, ["gemini", "custom"]) => {
            let data = gemini::custom(&state.http, &state.config, parse(event)?).await?;
            reply(StatusCode::OK, &data)
        }
        (&Method::GET, ["url", "check"]) => {
            let url = query(event, "url").unwrap_or_default();
            check_reply(url_check::check_url(&state.http, &url).await)
        }
        (&Method::GET, ["youtube", "check"]) => {
            let video_id = query(event, "videoId").unwrap_or_default();
            check_reply(state.youtube.check_video(&video_id).await)
        }
        (&Method::GET, ["youtube", "search"]) => {
            let max = youtube::clamp_max(query(event, "max").as_deref(), 15, 30);
            let q = query(event, "query").unwrap_or_default();
            check_reply(state.youtube.search(&q, max).await)
        }
        (&Method::GET, ["youtube", "channel-shorts"]) => {
            let max = youtube::clamp_max(query(event, "max").as_deref(), 1000, 2000);
            let handle = query(event, "handle").unwrap_or_default();
            check_reply(state.youtube.channel_shorts(&handle, max).await)
        }

        // --- USERS ---
        (&Method::POST, ["session"]) => {
            let caller = require_caller(event, &state.config)?;
            let user = users::record_login(store, &state.config, &caller).await?;
            let is_admin = state.is_admin(&caller).await?;
            reply(StatusCode::OK, &json!({"user": user, "isAdmin": is_admin}))
        }
        (&Method::GET, ["users", "me"]) => {
            let caller = require_caller(event, &state.config)?;
            reply(StatusCode::OK, &users::get_user(store, &caller.email).await?)
        }
        (&Method::GET, ["users"]) => {
            require_admin(event, state).await?;
            reply(StatusCode::OK, &users::list_users(store).await?)
        }
        (&Method::POST, ["users"]) => {
            require_admin(event, state).await?;
            let input: UserInput = parse(event)?;
            reply(StatusCode::OK, &users::save_user(store, input).await?)
        }
        (&Method::POST, ["users", "delete"]) => {
            require_admin(event, state).await?;
            let request: BatchDeleteRequest = parse(event)?;
            let deleted = users::delete_users(store, &request.emails).await?;
            reply(StatusCode::OK, &json!({"deleted": deleted}))
        }
        (&Method::PATCH, ["users", email]) => {
            require_admin(event, state).await?;
            let patch: UserPatch = parse(event)?;
            reply(StatusCode::OK, &users::update_user(store, &path_email(email), patch).await?)
        }
        (&Method::DELETE, ["users", email]) => {
            require_admin(event, state).await?;
            let email = path_email(email);
            users::delete_user(store, &email).await?;
            reply(StatusCode::OK, &json!({"deleted": email}))
        }

        // --- COURSES ---
        (&Method::GET, ["courses"]) => reply(StatusCode::OK, &courses::list_courses(store).await?),
        (&Method::POST, ["courses"]) => {
            require_admin(event, state).await?;
            let input: CourseInput = parse(event)?;
            reply(StatusCode::OK, &courses::save_course(store, input).await?)
        }
        (&Method::DELETE, ["courses", id]) => {
            require_admin(event, state).await?;
            courses::delete_course(store, id).await?;
            reply(StatusCode::OK, &json!({"deleted": id}))
        }
        (&Method::GET, ["user-courses"]) => {
            let caller = require_caller(event, &state.config)?;
            reply(StatusCode::OK, &courses::list_user_courses(store, &caller.email).await?)
        }
        (&Method::POST, ["user-courses"]) => {
            let caller = require_caller(event, &state.config)?;
            let input: AssignCourseInput = parse(event)?;
            reply(StatusCode::CREATED, &courses::assign_course(store, &caller, input).await?)
        }
        (&Method::DELETE, ["user-courses", video_id]) => {
            let caller = require_caller(event, &state.config)?;
            courses::remove_user_course(store, &caller.email, video_id).await?;
            reply(StatusCode::OK, &json!({"deleted": video_id}))
        }

        // --- ANNOUNCEMENTS ---
        (&Method::GET, ["announcements"]) => {
            reply(StatusCode::OK, &announcements::list_announcements(store).await?)
        }
        (&Method::POST, ["announcements"]) => {
            require_admin(event, state).await?;
            let created = announcements::create_announcement(store, parse(event)?).await?;
            reply(StatusCode::CREATED, &created)
        }

        // --- SHOWCASE ---
        (&Method::GET, ["showcase", "projects"]) => {
            let feed = FeedQuery {
                q: query(event, "q"),
                tag: query(event, "tag"),
                sort: SortMode::parse(query(event, "sort").as_deref()),
            };
            let listed = projects::list_projects(store, &feed, chrono::Utc::now()).await?;
            reply(StatusCode::OK, &listed)
        }
        (&Method::POST, ["showcase", "projects"]) => {
            let caller = require_caller(event, &state.config)?;
            let input: CreateProjectInput = parse(event)?;
            let project = projects::create_project(store, &caller, input).await?;
            reply(StatusCode::CREATED, &ProjectView::from(project))
        }
        (&Method::GET, ["showcase", "projects", id]) => {
            let project = projects::get_project(store, id).await?;
            reply(StatusCode::OK, &ProjectView::from(project))
        }
        (&Method::PATCH, ["showcase", "projects", id]) => {
            let (caller, is_admin) = caller_with_role(event, state).await?;
            let patch: Document = parse(event)?;
            let project = projects::update_project(store, &caller, is_admin, id, patch).await?;
            reply(StatusCode::OK, &ProjectView::from(project))
        }
        (&Method::DELETE, ["showcase", "projects", id]) => {
            let (caller, is_admin) = caller_with_role(event, state).await?;
            let report =
                projects::delete_project(store, state.media.as_deref(), &caller, is_admin, id)
                    .await?;
            reply(StatusCode::OK, &report)
        }
        (&Method::GET, ["showcase", "tags"]) => {
            reply(StatusCode::OK, &projects::list_tags(store).await?)
        }
        (&Method::POST, ["showcase", "projects", id, "upvote"]) => {
            let caller = require_caller(event, &state.config)?;
            reply(StatusCode::OK, &projects::toggle_upvote(store, &caller, id).await?)
        }
        (&Method::GET, ["showcase", "projects", id, "comments"]) => {
            reply(StatusCode::OK, &comments::list_comments(store, id).await?)
        }
        (&Method::POST, ["showcase", "projects", id, "comments"]) => {
            let caller = require_caller(event, &state.config)?;
            let input: CommentInput = parse(event)?;
            reply(StatusCode::CREATED, &comments::add_comment(store, &caller, id, input).await?)
        }
        (&Method::POST, ["showcase", "projects", id, "suggestions"]) => {
            let caller = require_caller(event, &state.config)?;
            let input: SuggestionInput = parse(event)?;
            let created = suggestions::add_suggestion(store, &caller, id, input).await?;
            reply(StatusCode::CREATED, &created)
        }
        (&Method::GET, ["showcase", "suggestions"]) => {
            let to = query(event, "to").unwrap_or_default();
            reply(StatusCode::OK, &suggestions::list_for_recipient(store, &to).await?)
        }
        (&Method::POST, ["showcase", "projects", id, "demo-video"]) => {
            let (caller, is_admin) = caller_with_role(event, state).await?;
            let media_store = state.media.as_deref().ok_or_else(|| {
                HubError::Config("Demo video uploads are not configured".to_string())
            })?;
            let request: DemoUploadRequest = parse(event)?;
            let upload =
                media::request_demo_upload(store, media_store, &caller, is_admin, id, request)
                    .await?;
            reply(StatusCode::OK, &upload)
        }

        // --- QUICK SHORTS ---
        (&Method::GET, ["quick-shorts"]) => {
            let topic = query(event, "topic");
            let shorts = quick_shorts::list_quick_shorts(store, topic.as_deref()).await?;
            reply(StatusCode::OK, &shorts)
        }
        (&Method::POST, ["quick-shorts"]) => {
            let caller = require_admin(event, state).await?;
            let request: ManualShortRequest = parse(event)?;
            if !youtube::is_valid_video_id(request.video_id.trim()) {
                return Err(HubError::bad_request("Invalid videoId format"));
            }
            let short =
                quick_shorts::add_manual_short(store, &request.video_id, &request.title, &caller.email)
                    .await?;
            reply(StatusCode::CREATED, &short)
        }
        (&Method::GET, ["quick-shorts", "sources"]) => {
            require_admin(event, state).await?;
            reply(StatusCode::OK, &quick_shorts::get_sources(store).await?)
        }
        (&Method::PUT, ["quick-shorts", "sources"]) => {
            require_admin(event, state).await?;
            let sources: QuickShortsSources = parse(event)?;
            reply(StatusCode::OK, &quick_shorts::save_sources(store, sources).await?)
        }
        (&Method::GET, ["quick-shorts", "meta"]) => {
            reply(StatusCode::OK, &quick_shorts::get_meta(store).await?)
        }
        (&Method::POST, ["quick-shorts", "refresh"]) => {
            require_admin(event, state).await?;
            let options = RefreshOptions {
                max_new: state.config.quick_shorts_max_new,
                max_per_source: state.config.quick_shorts_max_per_source,
            };
            let report =
                quick_shorts::refresh_quick_shorts(store, state.videos.as_ref(), options).await?;
            reply(StatusCode::OK, &report)
        }

        // --- ADMIN ---
        (&Method::POST, ["admin", "flush-cache"]) => {
            require_admin(event, state).await?;
            if !state.store.has_remote() {
                return Err(HubError::Config("No remote document store configured".to_string()));
            }
            reply(StatusCode::OK, &state.store.flush().await?)
        }

        _ => {
            tracing::warn!("No route matched - Method: {} Path: /api/{}", method, parts.join("/"));
            Err(HubError::not_found("Not found"))
        }
    }
}

fn reply<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Reply {
    response::json(status, body).map_err(internal)
}

/// Check endpoints answer rejected input as `{ok: false, reason}`.
fn check_reply<T: Serialize>(result: HubResult<T>) -> Reply {
    match result {
        Ok(body) => reply(StatusCode::OK, &body),
        Err(HubError::BadRequest(reason)) => reply(
            StatusCode::BAD_REQUEST,
            &json!({"ok": false, "reason": reason}),
        ),
        Err(e) => Err(e),
    }
}

fn internal(err: Error) -> HubError {
    HubError::Internal(err.to_string())
}

fn parse<T: DeserializeOwned>(event: &Request) -> HubResult<T> {
    Ok(serde_json::from_slice(event.body())?)
}

fn query(event: &Request, key: &str) -> Option<String> {
    event
        .query_string_parameters_ref()
        .and_then(|params| params.first(key))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Path segments arrive undecoded; `@` is the only character expected in an email key.
fn path_email(segment: &str) -> String {
    segment.replace("%40", "@").to_lowercase()
}

async fn caller_with_role(event: &Request, state: &AppState) -> HubResult<(Caller, bool)> {
    let caller = require_caller(event, &state.config)?;
    let is_admin = state.is_admin(&caller).await?;
    Ok((caller, is_admin))
}

async fn require_admin(event: &Request, state: &AppState) -> HubResult<Caller> {
    let caller = require_caller(event, &state.config)?;
    users::require_admin(state.store.as_ref(), &state.config, &caller).await?;
    Ok(caller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_shared::config::HubConfig;
    use serde_json::Value;
    use std::collections::HashMap;

    const ADMIN: &str = "boss@oneorigin.us";

    fn state() -> Arc<AppState> {
        AppState::in_memory(HubConfig {
            admin_emails: vec![ADMIN.to_string()],
            ..HubConfig::default()
        })
    }

    fn request(method: Method, uri: &str, email: Option<&str>, body: Value) -> Request {
        let mut builder = lambda_http::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(email) = email {
            builder = builder.header("X-User-Email", email);
        }
        let body = if body.is_null() {
            Body::Empty
        } else {
            Body::from(body.to_string())
        };
        builder.body(body).unwrap()
    }

    async fn call(state: &Arc<AppState>, req: Request) -> (StatusCode, Value) {
        let resp = function_handler(req, Arc::clone(state)).await.unwrap();
        let status = resp.status();
        let value = serde_json::from_slice(resp.body().as_ref()).unwrap_or(Value::Null);
        (status, value)
    }

    fn project_body() -> Value {
        json!({
            "name": "Lunch Bot",
            "tagline": "Orders lunch",
            "description": "A slack bot that collects lunch orders and places them daily.",
            "codeUrl": "https://github.com/acme/lunch-bot",
            "tags": ["slack"]
        })
    }

    #[tokio::test]
    async fn health_and_preflight() {
        let state = state();
        let (status, body) = call(&state, request(Method::GET, "/api/health", None, Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let resp = function_handler(
            request(Method::OPTIONS, "/api/showcase/projects", None, Value::Null),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "*");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, body) = call(&state(), request(Method::GET, "/api/nope", None, Value::Null)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn session_enforces_domain() {
        let state = state();
        let (status, _) = call(&state, request(Method::POST, "/api/session", None, Value::Null)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &state,
            request(Method::POST, "/api/session", Some("x@gmail.com"), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &state,
            request(Method::POST, "/api/session", Some(ADMIN), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "Admin");
        assert_eq!(body["isAdmin"], true);
    }

    #[tokio::test]
    async fn admin_routes_require_admin() {
        let state = state();
        let (status, _) = call(
            &state,
            request(Method::GET, "/api/users", Some("dev@oneorigin.us"), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &state,
            request(Method::POST, "/api/users", Some(ADMIN), json!({"email": "new@oneorigin.us"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &state,
            request(
                Method::PATCH,
                "/api/users/new%40oneorigin.us",
                Some(ADMIN),
                json!({"role": "Admin"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "Admin");

        let (_, listed) = call(&state, request(Method::GET, "/api/users", Some(ADMIN), Value::Null)).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn showcase_flow() {
        let state = state();
        let maker = Some("maker@oneorigin.us");

        let (status, created) = call(
            &state,
            request(Method::POST, "/api/showcase/projects", maker, project_body()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, vote) = call(
            &state,
            request(
                Method::POST,
                &format!("/api/showcase/projects/{}/upvote", id),
                Some("fan@oneorigin.us"),
                Value::Null,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(vote, json!({"upvotes": 1, "upvoted": true}));

        let (status, _) = call(
            &state,
            request(
                Method::POST,
                &format!("/api/showcase/projects/{}/comments", id),
                Some("fan@oneorigin.us"),
                json!({"body": "Love it"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, listing) = call(
            &state,
            request(
                Method::GET,
                &format!("/api/showcase/projects/{}/comments", id),
                None,
                Value::Null,
            ),
        )
        .await;
        assert_eq!(listing["thread"].as_array().unwrap().len(), 1);

        let listed_req = request(Method::GET, "/api/showcase/projects", None, Value::Null)
            .with_query_string_parameters(HashMap::from([
                ("sort".to_string(), "newest".to_string()),
                ("tag".to_string(), "slack".to_string()),
            ]));
        let (_, listed) = call(&state, listed_req).await;
        assert_eq!(listed[0]["commentsCount"], 1);

        let (status, _) = call(
            &state,
            request(
                Method::DELETE,
                &format!("/api/showcase/projects/{}", id),
                Some("fan@oneorigin.us"),
                Value::Null,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, report) = call(
            &state,
            request(Method::DELETE, &format!("/api/showcase/projects/{}", id), maker, Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["commentsRemoved"], 1);
    }

    #[tokio::test]
    async fn invalid_submission_is_400() {
        let mut body = project_body();
        body["description"] = json!("short");
        let (status, payload) = call(
            &state(),
            request(Method::POST, "/api/showcase/projects", Some("maker@oneorigin.us"), body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"].as_str().unwrap().contains("40"));
    }

    #[tokio::test]
    async fn demo_upload_needs_bucket() {
        let state = state();
        let (_, created) = call(
            &state,
            request(Method::POST, "/api/showcase/projects", Some("maker@oneorigin.us"), project_body()),
        )
        .await;
        let (status, _) = call(
            &state,
            request(
                Method::POST,
                &format!("/api/showcase/projects/{}/demo-video", created["id"].as_str().unwrap()),
                Some("maker@oneorigin.us"),
                json!({"fileName": "demo.mp4", "contentType": "video/mp4", "size": 1024}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn runtime_config_reports_missing_keys() {
        let (status, body) = call(
            &state(),
            request(Method::GET, "/api/runtime-config", None, Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("apiKey"));
    }

    #[tokio::test]
    async fn flush_without_remote_is_config_error() {
        let (status, _) = call(
            &state(),
            request(Method::POST, "/api/admin/flush-cache", Some(ADMIN), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn quick_shorts_sources_round_trip() {
        let state = state();
        let (status, saved) = call(
            &state,
            request(
                Method::PUT,
                "/api/quick-shorts/sources",
                Some(ADMIN),
                json!({"handles": ["@rustlang"], "queries": ["rust"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["handles"], json!(["rustlang"]));

        let (status, shorts) = call(&state, request(Method::GET, "/api/quick-shorts", None, Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shorts, json!([]));
    }

    /// HTTP API (payload v2) event behind the JWT authorizer.
    fn token_request(path: &str, claim_email: &str, header_email: Option<&str>) -> Request {
        let mut headers = serde_json::Map::new();
        if let Some(email) = header_email {
            headers.insert("x-user-email".into(), email.into());
        }
        let event = json!({
            "version": "2.0",
            "routeKey": "$default",
            "rawPath": path,
            "rawQueryString": "",
            "headers": headers,
            "requestContext": {
                "accountId": "123456789012",
                "apiId": "api-id",
                "authorizer": {"jwt": {"claims": {"email": claim_email}, "scopes": null}},
                "domainName": "id.execute-api.us-east-1.amazonaws.com",
                "domainPrefix": "id",
                "http": {
                    "method": "GET",
                    "path": path,
                    "protocol": "HTTP/1.1",
                    "sourceIp": "192.0.2.1",
                    "userAgent": "agent"
                },
                "requestId": "id",
                "routeKey": "$default",
                "stage": "$default",
                "time": "12/Mar/2020:19:03:58 +0000",
                "timeEpoch": 1583348638390u64
            },
            "isBase64Encoded": false
        });
        lambda_http::request::from_str(&event.to_string()).unwrap()
    }

    #[tokio::test]
    async fn foreign_domain_cannot_write() {
        let state = state();
        let outsider = Some("outsider@gmail.com");

        let (status, _) = call(
            &state,
            request(Method::POST, "/api/showcase/projects", outsider, project_body()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, listed) = call(&state, request(Method::GET, "/api/showcase/projects", None, Value::Null)).await;
        assert_eq!(listed, json!([]));

        let (_, created) = call(
            &state,
            request(Method::POST, "/api/showcase/projects", Some("maker@oneorigin.us"), project_body()),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        for (uri, body) in [
            (format!("/api/showcase/projects/{}/upvote", id), Value::Null),
            (format!("/api/showcase/projects/{}/comments", id), json!({"body": "hi"})),
            (format!("/api/showcase/projects/{}/suggestions", id), json!({"toName": "Sam"})),
            ("/api/user-courses".to_string(), json!({"videoId": "dQw4w9WgXcQ"})),
        ] {
            let (status, _) = call(&state, request(Method::POST, &uri, outsider, body)).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        }
    }

    #[tokio::test]
    async fn token_identity_beats_headers() {
        let state = state();

        let (status, _) = call(&state, token_request("/api/users", ADMIN, None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &state,
            token_request("/api/users", "dev@oneorigin.us", Some(ADMIN)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&state, token_request("/api/users", "dev@oneorigin.us", None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn check_endpoints_reject_with_reason() {
        let state = state();
        let (status, body) = call(&state, request(Method::GET, "/api/url/check", None, Value::Null)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"ok": false, "reason": "Missing url"}));

        let bad_id = request(Method::GET, "/api/youtube/check", None, Value::Null)
            .with_query_string_parameters(HashMap::from([(
                "videoId".to_string(),
                "short".to_string(),
            )]));
        let (status, body) = call(&state, bad_id).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["reason"], "Invalid videoId format");
    }
}
