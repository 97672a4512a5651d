use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use daybook_core::Error as CoreError;
use daybook_core::models::{
    DEFAULT_PAGE_SIZE, DayView, MealEntry, MealInput, NewRecipe, Page, Recipe, RecipePage,
    TrackingDay, WorkoutEntry, WorkoutInput, parse_day,
};
use daybook_core::service::DaybookService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

/// Set by the identity layer in front of this service.
pub const OWNER_HEADER: &str = "x-owner-id";

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<DaybookService>>,
    api_key: Option<String>,
}

impl AppState {
    fn service(&self) -> MutexGuard<'_, DaybookService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct HistoryQuery {
    start: String,
    end: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetTargetRequest {
    calories_target: i64,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u32>,
    size: Option<u32>,
}

impl PageQuery {
    fn page(&self) -> Page {
        Page::new(
            self.page.unwrap_or(0),
            self.size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
    page: Option<u32>,
    size: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecipeQuery {
    external_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized(String),
    /// Body or query string that could not be decoded, with axum's status.
    Rejected(StatusCode, String),
    Internal(CoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Rejected(status, msg) => (status, msg),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            CoreError::Conflict { .. } => Self::Conflict(err.to_string()),
            CoreError::Invalid(msg) => Self::BadRequest(msg),
            CoreError::Storage(_) | CoreError::Corrupt(_) => Self::Internal(err),
        }
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, ApiError> {
    Ok(parse_day(date)?)
}

fn parse_id(entity: &str, id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("Invalid {entity} id '{id}'")))
}

// --- Extractors ---

/// `Json` whose rejections use the `{"error": ...}` body.
struct AppJson<T>(T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(ApiError::Rejected(rejection.status(), rejection.body_text())),
        }
    }
}

/// `Query` whose rejections use the `{"error": ...}` body.
struct AppQuery<T>(T);

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => Err(ApiError::Rejected(rejection.status(), rejection.body_text())),
        }
    }
}

/// Owner of the request, taken from the `X-Owner-Id` header.
struct OwnerId(Uuid);

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Owner-Id header".to_string()))?;
        let text = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("Invalid X-Owner-Id header".to_string()))?;
        Uuid::parse_str(text.trim())
            .map(OwnerId)
            .map_err(|_| ApiError::BadRequest(format!("Invalid owner id '{text}'")))
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Day tracking handlers ---

async fn get_history(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppQuery(query): AppQuery<HistoryQuery>,
) -> Result<Json<Vec<TrackingDay>>, ApiError> {
    let start = parse_date(&query.start)?;
    let end = parse_date(&query.end)?;
    let days = state.service().day_history(owner, start, end)?;
    Ok(Json(days))
}

async fn get_day(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(date): Path<String>,
) -> Result<Json<DayView>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.service().get_or_create_day(owner, date)?))
}

async fn set_target(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(date): Path<String>,
    AppJson(req): AppJson<SetTargetRequest>,
) -> Result<Json<DayView>, ApiError> {
    let date = parse_date(&date)?;
    let view = state
        .service()
        .set_calories_target(owner, date, req.calories_target)?;
    Ok(Json(view))
}

async fn add_meal(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(date): Path<String>,
    AppJson(input): AppJson<MealInput>,
) -> Result<(StatusCode, Json<DayView>), ApiError> {
    let date = parse_date(&date)?;
    let view = state.service().add_meal(owner, date, &input)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_meal(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((date, meal_id)): Path<(String, String)>,
) -> Result<Json<MealEntry>, ApiError> {
    let date = parse_date(&date)?;
    let meal_id = parse_id("meal", &meal_id)?;
    Ok(Json(state.service().get_meal(owner, date, meal_id)?))
}

async fn update_meal(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((date, meal_id)): Path<(String, String)>,
    AppJson(input): AppJson<MealInput>,
) -> Result<Json<DayView>, ApiError> {
    let date = parse_date(&date)?;
    let meal_id = parse_id("meal", &meal_id)?;
    let view = state.service().update_meal(owner, date, meal_id, &input)?;
    Ok(Json(view))
}

async fn delete_meal(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((date, meal_id)): Path<(String, String)>,
) -> Result<Json<DayView>, ApiError> {
    let date = parse_date(&date)?;
    let meal_id = parse_id("meal", &meal_id)?;
    Ok(Json(state.service().delete_meal(owner, date, meal_id)?))
}

async fn add_workout(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(date): Path<String>,
    AppJson(input): AppJson<WorkoutInput>,
) -> Result<(StatusCode, Json<DayView>), ApiError> {
    let date = parse_date(&date)?;
    let view = state.service().add_workout(owner, date, &input)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_workout(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((date, workout_id)): Path<(String, String)>,
) -> Result<Json<WorkoutEntry>, ApiError> {
    let date = parse_date(&date)?;
    let workout_id = parse_id("workout", &workout_id)?;
    Ok(Json(state.service().get_workout(owner, date, workout_id)?))
}

async fn update_workout(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((date, workout_id)): Path<(String, String)>,
    AppJson(input): AppJson<WorkoutInput>,
) -> Result<Json<DayView>, ApiError> {
    let date = parse_date(&date)?;
    let workout_id = parse_id("workout", &workout_id)?;
    let view = state
        .service()
        .update_workout(owner, date, workout_id, &input)?;
    Ok(Json(view))
}

async fn delete_workout(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path((date, workout_id)): Path<(String, String)>,
) -> Result<Json<DayView>, ApiError> {
    let date = parse_date(&date)?;
    let workout_id = parse_id("workout", &workout_id)?;
    Ok(Json(
        state.service().delete_workout(owner, date, workout_id)?,
    ))
}

// --- Recipe handlers ---

async fn list_recipes(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<RecipePage>, ApiError> {
    Ok(Json(state.service().list_recipes(query.page())?))
}

async fn search_recipes(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> Result<Json<RecipePage>, ApiError> {
    let page = Page::new(
        query.page.unwrap_or(0),
        query.size.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    let search = query.search.as_deref().unwrap_or("");
    Ok(Json(state.service().search_recipes(search, page)?))
}

async fn recipe_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.service().recipe_categories()?))
}

async fn create_recipe(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CreateRecipeQuery>,
    AppJson(req): AppJson<NewRecipe>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let recipe = state
        .service()
        .create_recipe(&req, query.external_id.as_deref())?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    let id = parse_id("recipe", &id)?;
    Ok(Json(state.service().get_recipe(id)?))
}

async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<NewRecipe>,
) -> Result<Json<Recipe>, ApiError> {
    let id = parse_id("recipe", &id)?;
    Ok(Json(state.service().update_recipe(id, &req)?))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id("recipe", &id)?;
    state.service().delete_recipe(id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/day-tracking", get(get_history))
        .route("/api/day-tracking/{date}", get(get_day))
        .route("/api/day-tracking/{date}/target", put(set_target))
        .route("/api/day-tracking/{date}/meals", post(add_meal))
        .route(
            "/api/day-tracking/{date}/meals/{id}",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
        .route("/api/day-tracking/{date}/workouts", post(add_workout))
        .route(
            "/api/day-tracking/{date}/workouts/{id}",
            get(get_workout).put(update_workout).delete(delete_workout),
        )
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route("/api/recipes/search", get(search_recipes))
        .route("/api/recipes/categories", get(recipe_categories))
        .route(
            "/api/recipes/{id}",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: DaybookService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let head = key.get(..4).unwrap_or_default();
        let tail = key.get(key.len().saturating_sub(4)..).unwrap_or_default();
        tracing::info!("API key: {head}...{tail} (see api_key file in data directory)");
    } else {
        tracing::warn!("Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        tracing::warn!(
            "Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
