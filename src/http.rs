// HTTP interface: the axum router, request/response types and handlers.
// Handlers validate input (including select-style option ids against the
// reference lists), then call exactly one domain operation. Rendering is a
// JSON body; templating is the client's concern.

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path as AxumPath, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tower_http::services::ServeDir;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::Teacher,
    services::accounts::NewTeacher,
    services::pages::{NewPage, PageUpdate, Upload},
    services::profiles::ProfileUpdate,
    services::reference::all_known,
    services::search::SearchQuery,
    storage::FileStore,
};

// Authenticated identity, resolved from the bearer session token. Every
// handler that mutates state takes this explicitly.
pub struct AuthTeacher(pub Teacher);

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.to_string())
}

impl FromRequestParts<AppState> for AuthTeacher {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Authentication)?;
        let teacher = state.accounts.session_teacher(&token).await?;
        Ok(AuthTeacher(teacher))
    }
}

/// Viewer identity for pages that render differently when logged in but are
/// public either way. Never rejects.
pub struct OptionalAuth(pub Option<Teacher>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let teacher = match bearer_token(parts) {
            Some(token) => state.accounts.session_teacher(&token).await.ok(),
            None => None,
        };
        Ok(OptionalAuth(teacher))
    }
}

/// The raw session token, for logout.
pub struct SessionToken(pub String);

impl FromRequestParts<AppState> for SessionToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        bearer_token(parts)
            .map(SessionToken)
            .ok_or(AppError::Authentication)
    }
}

// Multipart intake: text fields by name plus any file-bearing fields.
async fn read_multipart(
    mut multipart: Multipart,
) -> AppResult<(HashMap<String, String>, HashMap<String, Upload>)> {
    let mut fields = HashMap::new();
    let mut files = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::Validation("malformed multipart form".to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(filename) = field.file_name() {
            let filename = filename.to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| AppError::Validation("malformed multipart form".to_string()))?;
            if !filename.is_empty() && !bytes.is_empty() {
                files.insert(
                    name,
                    Upload {
                        filename,
                        bytes: bytes.to_vec(),
                    },
                );
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|_| AppError::Validation("malformed multipart form".to_string()))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, files))
}

fn require<'a>(fields: &'a HashMap<String, String>, name: &str) -> AppResult<&'a str> {
    match fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(value) => Ok(value),
        None => Err(AppError::Validation(format!("{} is required", name))),
    }
}

fn optional(fields: &HashMap<String, String>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_id(value: &str, name: &str) -> AppResult<i64> {
    value
        .parse()
        .map_err(|_| AppError::Validation(format!("{} must be an id", name)))
}

/// Comma-joined id list, as submitted by multi-selects and the explore
/// filters. Empty input means an empty list.
fn parse_id_list(value: Option<&str>, name: &str) -> AppResult<Vec<i64>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| parse_id(s, name))
        .collect()
}

fn check_len(value: &str, max: usize, name: &str) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            name, max
        )));
    }
    Ok(())
}

fn teacher_view(teacher: &Teacher, avatar_url: String) -> Value {
    json!({
        "id": teacher.id,
        "username": teacher.username,
        "full_name": teacher.full_name,
        "about": teacher.about,
        "institution_id": teacher.institution_id,
        "avatar_url": avatar_url,
    })
}

// Account handlers

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    full_name: String,
    about: Option<String>,
    institution_id: Option<i64>,
    subject_ids: Vec<i64>,
}

async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    for (value, name) in [
        (&req.username, "username"),
        (&req.email, "email"),
        (&req.password, "password"),
        (&req.full_name, "full_name"),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{} is required", name)));
        }
    }
    if !req.email.contains('@') {
        return Err(AppError::Validation("invalid email address".to_string()));
    }
    if let Some(about) = &req.about {
        check_len(about, 256, "about")?;
    }
    if req.subject_ids.is_empty() {
        return Err(AppError::Validation(
            "select at least one subject".to_string(),
        ));
    }

    let subjects = state.reference.subjects().await?;
    if !all_known(&req.subject_ids, &subjects) {
        return Err(AppError::Validation("unknown subject".to_string()));
    }
    if let Some(institution_id) = req.institution_id {
        let institutions = state.reference.institutions().await?;
        if !all_known(&[institution_id], &institutions) {
            return Err(AppError::Validation(
                "unknown educational institution".to_string(),
            ));
        }
    }

    let teacher = state
        .accounts
        .register(NewTeacher {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            password: req.password,
            full_name: req.full_name.trim().to_string(),
            about: req.about,
            institution_id: req.institution_id,
            subject_ids: req.subject_ids,
        })
        .await?;

    let avatar_url = state.profiles.avatar_url(&teacher);
    Ok((StatusCode::CREATED, Json(teacher_view(&teacher, avatar_url))))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    let (teacher, token) = state.accounts.authenticate(&req.username, &req.password).await?;
    let avatar_url = state.profiles.avatar_url(&teacher);
    Ok(Json(json!({
        "token": token,
        "teacher": teacher_view(&teacher, avatar_url),
    })))
}

async fn logout_handler(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> AppResult<Json<Value>> {
    state.accounts.logout(&token).await?;
    Ok(Json(json!({"logged_out": true})))
}

#[derive(Deserialize)]
struct ResetRequestBody {
    email: String,
}

async fn reset_password_request_handler(
    State(state): State<AppState>,
    Json(req): Json<ResetRequestBody>,
) -> AppResult<Json<Value>> {
    if let Some(token) = state.accounts.request_password_reset(&req.email).await? {
        // mail delivery is an external collaborator; hand the token over
        // and log the dispatch
        tracing::info!("dispatching password reset mail (token {} chars)", token.len());
    }
    // identical response whether or not the address is registered
    Ok(Json(json!({
        "message": "check your email for the instructions to reset your password"
    })))
}

#[derive(Deserialize)]
struct ResetPasswordBody {
    password: String,
}

async fn reset_password_handler(
    State(state): State<AppState>,
    AxumPath(token): AxumPath<String>,
    Json(req): Json<ResetPasswordBody>,
) -> AppResult<Json<Value>> {
    if req.password.trim().is_empty() {
        return Err(AppError::Validation("password is required".to_string()));
    }
    state.accounts.reset_password(&token, &req.password).await?;
    Ok(Json(json!({"message": "your password has been reset"})))
}

// Profile handlers

async fn user_profile_handler(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    AxumPath(username): AxumPath<String>,
) -> AppResult<Json<Value>> {
    let teacher = state.accounts.teacher_by_username(&username).await?;
    let subjects = state.profiles.subjects_of(teacher.id).await?;
    let pages = state.pages.pages_by_author(teacher.id).await?;
    let followers = state.follows.follower_count(teacher.id).await?;
    let following = state.follows.following_count(teacher.id).await?;
    let avatar_url = state.profiles.avatar_url(&teacher);

    let is_following = match &viewer {
        Some(viewer) if viewer.id != teacher.id => {
            Some(state.follows.is_following(viewer.id, teacher.id).await?)
        }
        _ => None,
    };

    Ok(Json(json!({
        "teacher": teacher_view(&teacher, avatar_url),
        "subjects": subjects,
        "pages": pages,
        "followers": followers,
        "following": following,
        "is_following": is_following,
    })))
}

async fn edit_profile_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let (fields, files) = read_multipart(multipart).await?;

    let username = require(&fields, "username")?.to_string();
    let full_name = require(&fields, "full_name")?.to_string();
    let about = optional(&fields, "about");
    if let Some(about) = &about {
        check_len(about, 256, "about")?;
    }
    let institution_id = match optional(&fields, "institution") {
        Some(value) => Some(parse_id(&value, "institution")?),
        None => None,
    };
    let subject_ids = parse_id_list(fields.get("subjects").map(|s| s.as_str()), "subjects")?;
    if subject_ids.is_empty() {
        return Err(AppError::Validation(
            "select at least one subject".to_string(),
        ));
    }

    let subjects = state.reference.subjects().await?;
    if !all_known(&subject_ids, &subjects) {
        return Err(AppError::Validation("unknown subject".to_string()));
    }
    if let Some(institution_id) = institution_id {
        let institutions = state.reference.institutions().await?;
        if !all_known(&[institution_id], &institutions) {
            return Err(AppError::Validation(
                "unknown educational institution".to_string(),
            ));
        }
    }

    // reject a bad avatar before any state changes
    let avatar = files.get("avatar");
    if let Some(upload) = avatar {
        let allowed = &state.config.avatars.allowed_extensions;
        let ok = FileStore::extension(&upload.filename)
            .map(|ext| allowed.contains(&ext))
            .unwrap_or(false);
        if !ok {
            return Err(AppError::Validation(
                "avatar must be a png, jpg, jpeg or gif image".to_string(),
            ));
        }
    }

    let updated = state
        .profiles
        .edit_profile(
            teacher.id,
            ProfileUpdate {
                username,
                full_name,
                about,
                institution_id,
                subject_ids,
            },
        )
        .await?;

    if let Some(upload) = avatar {
        state
            .profiles
            .store_avatar(&updated.username, &upload.filename, &upload.bytes)?;
    }

    let avatar_url = state.profiles.avatar_url(&updated);
    Ok(Json(teacher_view(&updated, avatar_url)))
}

// Follow handlers

async fn follow_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    AxumPath(username): AxumPath<String>,
) -> AppResult<Json<Value>> {
    state.follows.follow(teacher.id, &username).await?;
    Ok(Json(json!({"following": username})))
}

async fn unfollow_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    AxumPath(username): AxumPath<String>,
) -> AppResult<Json<Value>> {
    state.follows.unfollow(teacher.id, &username).await?;
    Ok(Json(json!({"unfollowed": username})))
}

// Page handlers

#[derive(Deserialize)]
struct ExploreParams {
    search: Option<String>,
    subjects: Option<String>,
    grades: Option<String>,
    worktypes: Option<String>,
    page: Option<i64>,
}

async fn explore_handler(
    State(state): State<AppState>,
    Query(params): Query<ExploreParams>,
) -> AppResult<Json<Value>> {
    let query = SearchQuery {
        term: params.search.filter(|s| !s.trim().is_empty()),
        subject_ids: parse_id_list(params.subjects.as_deref(), "subjects")?,
        grade_ids: parse_id_list(params.grades.as_deref(), "grades")?,
        work_type_ids: parse_id_list(params.worktypes.as_deref(), "worktypes")?,
        page: params.page.unwrap_or(1),
        per_page: state.config.per_page,
    };
    let result = state.search.search_pages(&query).await?;
    Ok(Json(serde_json::to_value(result).map_err(|e| {
        AppError::Internal(format!("serialization failed: {}", e))
    })?))
}

struct PageForm {
    name: String,
    description: Option<String>,
    grade_id: i64,
    type_of_work_id: i64,
    subject_id: i64,
}

/// Shared validation for add and edit: lengths, then every select-style id
/// against its allowed option set. The subject must be one the author
/// teaches.
async fn validate_page_form(
    state: &AppState,
    author_id: i64,
    fields: &HashMap<String, String>,
) -> AppResult<PageForm> {
    let name = require(fields, "name")?.to_string();
    check_len(&name, 128, "name")?;
    let description = optional(fields, "description");
    if let Some(description) = &description {
        check_len(description, 512, "description")?;
    }

    let grade_id = parse_id(require(fields, "grade")?, "grade")?;
    let type_of_work_id = parse_id(require(fields, "type_of_work")?, "type_of_work")?;
    let subject_id = parse_id(require(fields, "subject")?, "subject")?;

    let grades = state.reference.grades().await?;
    if !all_known(&[grade_id], &grades) {
        return Err(AppError::Validation("unknown grade".to_string()));
    }
    let types = state.reference.types_of_work().await?;
    if !all_known(&[type_of_work_id], &types) {
        return Err(AppError::Validation("unknown type of work".to_string()));
    }
    let own_subjects = state.profiles.subjects_of(author_id).await?;
    if !all_known(&[subject_id], &own_subjects) {
        return Err(AppError::Validation(
            "you can only publish under a subject you teach".to_string(),
        ));
    }

    Ok(PageForm {
        name,
        description,
        grade_id,
        type_of_work_id,
        subject_id,
    })
}

async fn add_page_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let (fields, mut files) = read_multipart(multipart).await?;
    let form = validate_page_form(&state, teacher.id, &fields).await?;

    let page = state
        .pages
        .create_page(
            teacher.id,
            NewPage {
                name: form.name,
                description: form.description,
                grade_id: form.grade_id,
                type_of_work_id: form.type_of_work_id,
                subject_id: form.subject_id,
            },
            files.remove("file"),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::to_value(page).map_err(
        |e| AppError::Internal(format!("serialization failed: {}", e)),
    )?)))
}

async fn page_detail_handler(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    AxumPath(page_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    let page = state.pages.get_page(page_id).await?;
    let author = state.accounts.teacher_by_id(page.teacher_id).await?;
    let reviews = state.reviews.reviews_for_page(page_id).await?;

    let can_review = match &viewer {
        Some(viewer) if viewer.id != author.id => {
            !state.reviews.has_reviewed(page_id, viewer.id).await?
        }
        _ => false,
    };

    Ok(Json(json!({
        "page": page,
        "author": {
            "id": author.id,
            "username": author.username,
            "full_name": author.full_name,
        },
        "reviews": reviews,
        "can_review": can_review,
    })))
}

async fn edit_page_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    AxumPath(page_id): AxumPath<i64>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let (fields, mut files) = read_multipart(multipart).await?;
    let form = validate_page_form(&state, teacher.id, &fields).await?;

    let page = state
        .pages
        .edit_page(
            page_id,
            teacher.id,
            PageUpdate {
                name: form.name,
                description: form.description,
                grade_id: form.grade_id,
                type_of_work_id: form.type_of_work_id,
                subject_id: form.subject_id,
            },
            files.remove("file"),
        )
        .await?;

    Ok(Json(serde_json::to_value(page).map_err(|e| {
        AppError::Internal(format!("serialization failed: {}", e))
    })?))
}

async fn delete_page_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    AxumPath(page_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    state.pages.delete_page(page_id, teacher.id).await?;
    Ok(Json(json!({"deleted": page_id})))
}

async fn download_handler(
    State(state): State<AppState>,
    AxumPath(stored_name): AxumPath<String>,
) -> AppResult<Response> {
    let (path, original_name) = state.pages.resolve_download(&stored_name).await?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(format!("file '{}' not found", stored_name))
        } else {
            AppError::Io(e)
        }
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/octet-stream"),
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        original_name.replace(['"', '\r', '\n'], "_")
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        disposition
            .parse()
            .map_err(|_| AppError::Internal("bad filename".to_string()))?,
    );

    Ok((headers, bytes).into_response())
}

// Review handlers

#[derive(Deserialize)]
struct ReviewRequest {
    rate: i64,
    comment: String,
}

async fn add_review_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    AxumPath(page_id): AxumPath<i64>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    check_len(&req.comment, 256, "comment")?;
    let review = state
        .reviews
        .add_review(page_id, teacher.id, req.rate, req.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::to_value(review).map_err(
        |e| AppError::Internal(format!("serialization failed: {}", e)),
    )?)))
}

async fn delete_review_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    AxumPath(review_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    state.reviews.delete_review(review_id, teacher.id).await?;
    Ok(Json(json!({"deleted": review_id})))
}

// Notification handlers

async fn notifications_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
) -> AppResult<Json<Value>> {
    let notifications = state.notifications.unread_for(teacher.id).await?;
    Ok(Json(json!({"notifications": notifications})))
}

async fn mark_notification_read_handler(
    State(state): State<AppState>,
    AuthTeacher(teacher): AuthTeacher,
    AxumPath(notification_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    state
        .notifications
        .mark_read(notification_id, teacher.id)
        .await?;
    Ok(Json(json!({"read": notification_id})))
}

// Reference data handlers (cascading selects)

async fn settlements_by_region_handler(
    State(state): State<AppState>,
    AxumPath(region_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    let settlements = state.reference.settlements_by_region(region_id).await?;
    Ok(Json(json!(settlements)))
}

async fn institutions_by_settlement_handler(
    State(state): State<AppState>,
    AxumPath(settlement_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    let institutions = state
        .reference
        .institutions_by_settlement(settlement_id)
        .await?;
    Ok(Json(json!(institutions)))
}

// Router

pub fn create_router(state: AppState) -> Router {
    let avatar_dir = state.config.avatars.dir.clone();
    let max_content_length = state.config.uploads.max_content_length;

    Router::new()
        // accounts
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/reset_password_request", post(reset_password_request_handler))
        .route("/reset_password/{token}", post(reset_password_handler))
        // profiles and the follow graph
        .route("/user/{username}", get(user_profile_handler))
        .route("/edit_profile", post(edit_profile_handler))
        .route("/follow/{username}", post(follow_handler))
        .route("/unfollow/{username}", post(unfollow_handler))
        // pages and reviews
        .route("/explore", get(explore_handler))
        .route("/add_page", post(add_page_handler))
        .route("/page/{id}", get(page_detail_handler))
        .route("/page/{id}/reviews", post(add_review_handler))
        .route("/reviews/{id}", delete(delete_review_handler))
        .route("/edit_page/{id}", post(edit_page_handler))
        .route("/delete_page/{id}", get(delete_page_handler))
        .route("/download/{stored_name}", get(download_handler))
        // notifications
        .route("/notifications", get(notifications_handler))
        .route("/notifications/{id}/read", post(mark_notification_read_handler))
        // cascading select APIs
        .route(
            "/api/settlements_by_region/{id}",
            get(settlements_by_region_handler),
        )
        .route(
            "/api/institutions_by_settlement/{id}",
            get(institutions_by_settlement_handler),
        )
        // uploaded avatars, content type inferred from the extension
        .nest_service("/avatars", ServeDir::new(avatar_dir))
        .layer(DefaultBodyLimit::max(max_content_length))
        .with_state(state)
}
