use actix_web::{
    HttpRequest, HttpResponse, Responder, ResponseError, delete, get,
    dev::HttpServiceFactory, http::StatusCode, http::header, post, put, web,
};
use base64::Engine;
use payloads::{
    Role, SessionId,
    requests::{self, PASSWORD_MIN_LEN},
    responses::{
        ActiveSession, AuthResponse, Envelope, NotificationSettings, Page,
        SuccessMessage, TokenPair, UserStats,
    },
};
use serde::Serialize;
use uuid::Uuid;

use super::{Grant, MockBackend, Store};

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(login)
        .service(register)
        .service(logout)
        .service(refresh)
        .service(profile)
        .service(update_profile)
        .service(change_password)
        .service(forgot_password)
        .service(reset_password)
        .service(verify_email)
        .service(resend_verification)
        .service(upload_avatar)
        .service(update_avatar)
        .service(delete_avatar)
        .service(stats)
        .service(notification_settings)
        .service(update_notification_settings)
        .service(delete_account)
        .service(activity)
        .service(sessions)
        .service(revoke_session)
        .service(revoke_all_sessions)
        .service(list_events)
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("{0}")]
    AuthError(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("Something went wrong")]
    UnexpectedError,
}

impl APIError {
    fn code(&self) -> &'static str {
        match self {
            Self::AuthError(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::UnexpectedError => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for APIError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(Envelope::<()>::failure(
            self.to_string(),
            Some(self.code().to_string()),
        ))
    }
}

fn ok(data: impl Serialize) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::ok(data))
}

fn done() -> HttpResponse {
    HttpResponse::Ok().json(Envelope::<()> {
        success: true,
        data: None,
        error: None,
        code: None,
    })
}

fn message(text: &str) -> HttpResponse {
    ok(SuccessMessage {
        message: text.to_string(),
    })
}

/// Resolve the bearer token of the request to its grant.
fn authenticate(
    request: &HttpRequest,
    store: &Store,
) -> Result<Grant, APIError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| store.access_tokens.get(token))
        .copied()
        .ok_or(APIError::AuthError("Not authenticated"))
}

fn user_agent(request: &HttpRequest) -> Option<String> {
    request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn check_password(password: &str) -> Result<(), APIError> {
    if password.len() < PASSWORD_MIN_LEN {
        return Err(APIError::BadRequest(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

#[tracing::instrument(
    skip(credentials, backend, request),
    fields(email = %credentials.email)
)]
#[post("/auth/login")]
pub async fn login(
    request: HttpRequest,
    credentials: web::Json<requests::LoginCredentials>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let user = match store.account_by_email(&credentials.email) {
        Some(account) if account.password == credentials.password => {
            account.user.clone()
        }
        _ => return Err(APIError::AuthError("Invalid email or password")),
    };
    let tokens = store.issue_tokens(user.id, user_agent(&request));
    store.record(user.id, "login", "Signed in");
    Ok(ok(AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user,
    }))
}

#[tracing::instrument(
    skip(details, backend, request),
    fields(email = %details.email)
)]
#[post("/auth/register")]
pub async fn register(
    request: HttpRequest,
    details: web::Json<requests::RegisterData>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    if !requests::is_valid_email(details.email.trim()) {
        return Err(APIError::BadRequest("Invalid email address".into()));
    }
    check_password(&details.password)?;

    let mut store = backend.store();
    if store.account_by_email(&details.email).is_some() {
        return Err(APIError::Conflict("Email already registered"));
    }
    // Organizer accounts can be requested; anything higher is granted later.
    let role = match details.role {
        Some(Role::Organizer) => Role::Organizer,
        _ => Role::User,
    };
    let user = store.create_account(
        &details.email,
        &details.password,
        &details.first_name,
        &details.last_name,
        role,
    );
    store
        .verification_tokens
        .insert(Uuid::new_v4().to_string(), user.id);
    let tokens = store.issue_tokens(user.id, user_agent(&request));
    store.record(user.id, "register", "Created account");
    Ok(ok(AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user,
    }))
}

#[tracing::instrument(skip_all)]
#[post("/auth/logout")]
pub async fn logout(
    details: web::Json<requests::RefreshToken>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    if backend.logout_fails() {
        return Err(APIError::UnexpectedError);
    }
    let mut store = backend.store();
    if let Some(grant) =
        store.refresh_tokens.get(&details.refresh_token).copied()
    {
        store.end_session(grant.session_id);
        store.record(grant.user_id, "logout", "Signed out");
    }
    Ok(done())
}

#[tracing::instrument(skip_all)]
#[post("/auth/refresh")]
pub async fn refresh(
    details: web::Json<requests::RefreshToken>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = store
        .refresh_tokens
        .get(&details.refresh_token)
        .copied()
        .ok_or(APIError::AuthError("Invalid refresh token"))?;
    let tokens = store.rotate_tokens(grant);
    Ok(ok(TokenPair {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

#[get("/auth/profile")]
pub async fn profile(
    request: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let store = backend.store();
    let grant = authenticate(&request, &store)?;
    let account = store
        .accounts
        .get(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    Ok(ok(&account.user))
}

#[put("/auth/profile")]
pub async fn update_profile(
    request: HttpRequest,
    details: web::Json<requests::UpdateProfile>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    for name in [&details.first_name, &details.last_name].into_iter().flatten()
    {
        if name.trim().is_empty() {
            return Err(APIError::BadRequest("Names cannot be empty".into()));
        }
        if name.len() > requests::NAME_MAX_LEN {
            return Err(APIError::BadRequest("Name is too long".into()));
        }
    }
    let details = details.into_inner();
    let account = store
        .accounts
        .get_mut(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    if let Some(first_name) = details.first_name {
        account.user.first_name = first_name;
    }
    if let Some(last_name) = details.last_name {
        account.user.last_name = last_name;
    }
    if let Some(bio) = details.bio {
        account.user.bio = Some(bio);
    }
    if let Some(phone) = details.phone {
        account.user.phone = Some(phone);
    }
    let user = account.user.clone();
    store.record(grant.user_id, "profile_update", "Updated profile");
    Ok(ok(user))
}

#[post("/auth/change-password")]
pub async fn change_password(
    request: HttpRequest,
    details: web::Json<requests::ChangePassword>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    check_password(&details.new_password)?;
    let account = store
        .accounts
        .get_mut(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    if account.password != details.current_password {
        return Err(APIError::BadRequest(
            "Current password is incorrect".into(),
        ));
    }
    account.password = details.new_password.clone();
    store.record(grant.user_id, "password_change", "Changed password");
    Ok(message("Password changed"))
}

/// Always succeeds so the endpoint can't be used to probe for accounts.
#[post("/auth/forgot-password")]
pub async fn forgot_password(
    details: web::Json<requests::ForgotPassword>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    if let Some(user_id) = store.user_id_by_email(&details.email) {
        store.reset_tokens.retain(|_, owner| *owner != user_id);
        store.reset_tokens.insert(Uuid::new_v4().to_string(), user_id);
    }
    Ok(message("If that account exists, a reset email has been sent"))
}

#[post("/auth/reset-password")]
pub async fn reset_password(
    details: web::Json<requests::ResetPassword>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    check_password(&details.password)?;
    let mut store = backend.store();
    let user_id = store
        .reset_tokens
        .remove(&details.token)
        .ok_or_else(|| {
            APIError::BadRequest("Invalid or expired token".into())
        })?;
    if let Some(account) = store.accounts.get_mut(&user_id) {
        account.password = details.password.clone();
    }
    store.end_all_sessions(user_id);
    store.record(user_id, "password_reset", "Reset password");
    Ok(message("Password has been reset"))
}

#[post("/auth/verify-email")]
pub async fn verify_email(
    details: web::Json<requests::VerifyEmail>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let user_id = store
        .verification_tokens
        .remove(&details.token)
        .ok_or_else(|| {
            APIError::BadRequest("Invalid or expired token".into())
        })?;
    if let Some(account) = store.accounts.get_mut(&user_id) {
        account.user.email_verified = true;
    }
    Ok(message("Email verified"))
}

#[post("/auth/resend-verification")]
pub async fn resend_verification(
    details: web::Json<requests::ResendVerification>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let unverified = store
        .account_by_email(&details.email)
        .filter(|account| !account.user.email_verified)
        .map(|account| account.user.id);
    if let Some(user_id) = unverified {
        store.verification_tokens.retain(|_, owner| *owner != user_id);
        store
            .verification_tokens
            .insert(Uuid::new_v4().to_string(), user_id);
    }
    Ok(message("If the address needs verifying, an email has been sent"))
}

#[post("/auth/upload-avatar")]
pub async fn upload_avatar(
    request: HttpRequest,
    details: web::Json<requests::UploadAvatar>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    if !details.content_type.starts_with("image/") {
        return Err(APIError::BadRequest("Unsupported file type".into()));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&details.data)
        .map_err(|e| APIError::BadRequest(format!("Invalid image data: {e}")))?;
    if bytes.is_empty() || bytes.len() > MAX_AVATAR_BYTES {
        return Err(APIError::BadRequest("Image must be at most 5 MB".into()));
    }
    let account = store
        .accounts
        .get_mut(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    account.user.avatar = Some(format!(
        "/uploads/avatars/{}/{}",
        grant.user_id, details.file_name
    ));
    Ok(ok(&account.user))
}

#[post("/auth/avatar")]
pub async fn update_avatar(
    request: HttpRequest,
    details: web::Json<requests::UpdateAvatar>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    if details.avatar_url.trim().is_empty() {
        return Err(APIError::BadRequest("Avatar URL is required".into()));
    }
    let account = store
        .accounts
        .get_mut(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    account.user.avatar = Some(details.avatar_url.clone());
    Ok(ok(&account.user))
}

#[delete("/auth/avatar")]
pub async fn delete_avatar(
    request: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    let account = store
        .accounts
        .get_mut(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    account.user.avatar = None;
    Ok(ok(&account.user))
}

#[get("/auth/stats")]
pub async fn stats(
    request: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let store = backend.store();
    let grant = authenticate(&request, &store)?;
    let events_created = store
        .events
        .iter()
        .filter(|event| event.organizer_id == grant.user_id)
        .count();
    Ok(ok(UserStats {
        events_created: events_created as u32,
        ..Default::default()
    }))
}

#[get("/auth/notification-settings")]
pub async fn notification_settings(
    request: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let store = backend.store();
    let grant = authenticate(&request, &store)?;
    let account = store
        .accounts
        .get(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    Ok(ok(&account.notifications))
}

#[put("/auth/notification-settings")]
pub async fn update_notification_settings(
    request: HttpRequest,
    settings: web::Json<NotificationSettings>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    let account = store
        .accounts
        .get_mut(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    account.notifications = settings.into_inner();
    Ok(ok(&account.notifications))
}

#[delete("/auth/account")]
pub async fn delete_account(
    request: HttpRequest,
    details: web::Json<requests::DeleteAccount>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    let password_matches = store
        .accounts
        .get(&grant.user_id)
        .is_some_and(|account| account.password == details.password);
    if !password_matches {
        return Err(APIError::BadRequest("Password is incorrect".into()));
    }
    store.end_all_sessions(grant.user_id);
    store.accounts.remove(&grant.user_id);
    Ok(done())
}

#[get("/auth/activity")]
pub async fn activity(
    request: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let store = backend.store();
    let grant = authenticate(&request, &store)?;
    let account = store
        .accounts
        .get(&grant.user_id)
        .ok_or(APIError::NotFound("User not found"))?;
    // Newest first.
    let entries: Vec<_> = account.activity.iter().rev().cloned().collect();
    Ok(ok(entries))
}

#[get("/auth/sessions")]
pub async fn sessions(
    request: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let store = backend.store();
    let grant = authenticate(&request, &store)?;
    let mut sessions: Vec<ActiveSession> = store
        .sessions
        .iter()
        .filter(|(_, session)| session.user_id == grant.user_id)
        .map(|(id, session)| ActiveSession {
            id: *id,
            user_agent: session.user_agent.clone(),
            ip_address: Some("127.0.0.1".into()),
            created_at: session.created_at,
            current: *id == grant.session_id,
        })
        .collect();
    sessions.sort_by_key(|session| session.created_at);
    Ok(ok(sessions))
}

#[delete("/auth/sessions/{session_id}")]
pub async fn revoke_session(
    request: HttpRequest,
    path: web::Path<Uuid>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    let session_id = SessionId(path.into_inner());
    match store.sessions.get(&session_id) {
        Some(session) if session.user_id == grant.user_id => {}
        _ => return Err(APIError::NotFound("Session not found")),
    }
    store.end_session(session_id);
    Ok(done())
}

#[post("/auth/revoke-all-sessions")]
pub async fn revoke_all_sessions(
    request: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let mut store = backend.store();
    let grant = authenticate(&request, &store)?;
    store.end_all_sessions(grant.user_id);
    Ok(done())
}

#[get("/events")]
pub async fn list_events(
    query: web::Query<requests::PageRequest>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, APIError> {
    let requests::PageRequest { page, limit } = query.into_inner();
    if page == 0 || limit == 0 {
        return Err(APIError::BadRequest(
            "page and limit must be positive".into(),
        ));
    }
    let store = backend.store();
    let total = store.events.len();
    let start = (page as usize - 1).saturating_mul(limit as usize);
    let data = store
        .events
        .iter()
        .skip(start)
        .take(limit as usize)
        .cloned()
        .collect();
    Ok(ok(Page {
        data,
        total: total as u64,
        page,
        limit,
        total_pages: total.div_ceil(limit as usize) as u32,
    }))
}
