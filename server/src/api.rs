use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

use highrise_engine::{AdTargeting, Engine, EngineError};
use highrise_types::{GameMode, ProfileHint};

use crate::broadcast;
use crate::notify::{bonus_game_completed_message, cap_reached_message, Notifier};

const DEFAULT_PAGE_LIMIT: i64 = 50;
const MAX_PAGE_LIMIT: i64 = 100;

pub struct AppState {
    pub engine: Arc<Engine>,
    pub notifier: Arc<Notifier>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/user", post(register_user))
        .route("/api/bonus/check", get(check_bonus))
        .route("/api/bonus/start", post(start_bonus))
        .route("/api/bonus/exchange", post(exchange_bonuses))
        .route("/api/bonus/history", get(bonus_history))
        .route("/api/game/save", post(save_game))
        .route("/api/promo/create", post(create_promo))
        .route("/api/promo/activate", post(activate_promo))
        .route("/api/stats", get(user_stats))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/admin/daily-stats", get(admin_daily_stats))
        .route("/api/admin/all-time-stats", get(admin_all_time_stats))
        .route("/api/admin/advertisement", post(admin_create_ad))
        .route("/api/admin/advertisements", get(admin_list_ads))
        .route("/api/admin/advertisement/:ad_id/send", post(admin_send_ad))
        .with_state(state)
}

/// Errors surfaced to HTTP callers. Business-rule conditions keep their
/// own statuses; only storage failures become opaque 500s.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::Engine(err) => {
                if err.is_business_rule() {
                    debug!(%err, "request rejected by business rule");
                } else if !err.is_not_found() {
                    error!(%err, "request failed");
                }
                match err {
                    EngineError::UserNotFound { .. } => {
                        (StatusCode::NOT_FOUND, json!({ "error": "user not found" }))
                    }
                    EngineError::PromoNotFound => (
                        StatusCode::NOT_FOUND,
                        json!({ "error": "promo code not found" }),
                    ),
                    EngineError::InsufficientBalance {
                        requested,
                        available,
                    } => (
                        StatusCode::BAD_REQUEST,
                        json!({
                            "error": "insufficient balance",
                            "requested": requested,
                            "available": available,
                        }),
                    ),
                    EngineError::AlreadyOnCooldown { next_available_at } => (
                        StatusCode::FORBIDDEN,
                        json!({
                            "error": "bonus game not available yet",
                            "nextAvailableAt": next_available_at,
                        }),
                    ),
                    EngineError::PromoAlreadyUsed => (
                        StatusCode::CONFLICT,
                        json!({ "error": "promo code already used" }),
                    ),
                    EngineError::PromoExpired => {
                        (StatusCode::GONE, json!({ "error": "promo code expired" }))
                    }
                    EngineError::CodeGenerationExhausted { .. } | EngineError::Storage(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": "internal error" }),
                    ),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    telegram_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

/// Authenticated caller identity, as supplied by the upstream auth proxy.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Caller {
    telegram_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveGameRequest {
    telegram_id: i64,
    mode: GameMode,
    score: i64,
    floors: i64,
    #[serde(default)]
    normal_count: u32,
    #[serde(default)]
    perfect_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmountRequest {
    telegram_id: i64,
    bonuses_amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivatePromoRequest {
    code: String,
    admin_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardQuery {
    limit: Option<i64>,
    telegram_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    telegram_id: i64,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAdRequest {
    title: String,
    message: String,
    #[serde(default = "default_true")]
    target_all_users: bool,
    #[serde(default)]
    min_games: i64,
    #[serde(default)]
    min_bonuses: i64,
}

fn default_true() -> bool {
    true
}

fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let hint = ProfileHint {
        telegram_id: request.telegram_id,
        username: request.username,
        first_name: request.first_name,
        last_name: request.last_name,
    };
    let now = Utc::now();
    let user = state.engine.get_or_create_user(&hint, now).await?;
    let stats = state.engine.user_stats(user.id).await?;
    let bonus_info = state.engine.check_bonus_eligibility(user.id, now).await?;
    Ok(Json(json!({
        "user": user,
        "stats": stats,
        "bonusInfo": bonus_info,
    })))
}

async fn check_bonus(
    State(state): State<Arc<AppState>>,
    Query(caller): Query<Caller>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .engine
        .require_user_by_telegram_id(caller.telegram_id)
        .await?;
    let eligibility = state
        .engine
        .check_bonus_eligibility(user.id, Utc::now())
        .await?;
    Ok(Json(json!(eligibility)))
}

async fn start_bonus(
    State(state): State<Arc<AppState>>,
    Json(caller): Json<Caller>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .engine
        .require_user_by_telegram_id(caller.telegram_id)
        .await?;
    state.engine.start_bonus_attempt(user.id, Utc::now()).await?;
    Ok(Json(json!({ "success": true })))
}

async fn save_game(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveGameRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.score < 0 || request.floors < 0 {
        return Err(ApiError::Validation(
            "score and floors must be non-negative".to_string(),
        ));
    }

    let user = state
        .engine
        .require_user_by_telegram_id(request.telegram_id)
        .await?;
    let outcome = state
        .engine
        .save_game_result(
            user.id,
            request.mode,
            request.score,
            request.floors,
            request.normal_count,
            request.perfect_count,
            Utc::now(),
        )
        .await?;

    // Completion pushes go out for bonus-mode games only, and never block
    // or fail the save.
    if request.mode == GameMode::Bonus && state.notifier.is_enabled() {
        let notifier = state.notifier.clone();
        let chat_id = user.telegram_id;
        let name = user.display_name().to_string();
        tokio::spawn(async move {
            let text =
                bonus_game_completed_message(&name, outcome.bonuses_earned, outcome.balance_after);
            if let Err(err) = notifier.send_message(chat_id, &text).await {
                notifier.log_failure("game-completed", chat_id, &err);
            }
            let crossed_cap = outcome.balance_before < highrise_types::BONUS_CAP
                && outcome.balance_after >= highrise_types::BONUS_CAP;
            if crossed_cap {
                if let Err(err) = notifier.send_message(chat_id, &cap_reached_message(&name)).await
                {
                    notifier.log_failure("cap-reached", chat_id, &err);
                }
            }
        });
    }

    Ok(Json(json!({
        "success": true,
        "bonusesEarned": outcome.bonuses_earned,
        "stats": outcome.stats,
    })))
}

async fn exchange_bonuses(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.bonuses_amount <= 0 {
        return Err(ApiError::Validation(
            "bonusesAmount must be positive".to_string(),
        ));
    }
    let user = state
        .engine
        .require_user_by_telegram_id(request.telegram_id)
        .await?;
    let receipt = state
        .engine
        .exchange_bonuses(user.id, request.bonuses_amount)
        .await?;
    Ok(Json(json!({ "success": true, "receipt": receipt })))
}

async fn bonus_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .engine
        .require_user_by_telegram_id(query.telegram_id)
        .await?;
    let history = state
        .engine
        .bonus_game_history(user.id, page_limit(query.limit))
        .await?;
    Ok(Json(json!({ "history": history })))
}

async fn create_promo(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.bonuses_amount <= 0 {
        return Err(ApiError::Validation(
            "bonusesAmount must be positive".to_string(),
        ));
    }
    let user = state
        .engine
        .require_user_by_telegram_id(request.telegram_id)
        .await?;
    let grant = state
        .engine
        .create_promo_code(user.id, request.bonuses_amount, Utc::now())
        .await?;
    Ok(Json(json!({ "success": true, "promo": grant })))
}

async fn activate_promo(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivatePromoRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.code.trim().is_empty() {
        return Err(ApiError::Validation("code must not be empty".to_string()));
    }
    let redemption = state
        .engine
        .activate_promo_code(&request.code, request.admin_id, Utc::now())
        .await?;
    Ok(Json(json!({ "success": true, "redemption": redemption })))
}

async fn user_stats(
    State(state): State<Arc<AppState>>,
    Query(caller): Query<Caller>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .engine
        .require_user_by_telegram_id(caller.telegram_id)
        .await?;
    let now = Utc::now();
    let stats = state.engine.user_stats(user.id).await?;
    let bonus_info = state.engine.check_bonus_eligibility(user.id, now).await?;
    let rank = state.engine.user_rank(user.id).await?;
    Ok(Json(json!({
        "stats": stats,
        "bonusInfo": bonus_info,
        "rank": rank,
    })))
}

async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entries = state
        .engine
        .leaderboard(query.limit.unwrap_or(10).clamp(1, MAX_PAGE_LIMIT))
        .await?;

    let user_rank = match query.telegram_id {
        Some(telegram_id) => match state.engine.user_by_telegram_id(telegram_id).await? {
            Some(user) => Some(state.engine.user_rank(user.id).await?),
            None => None,
        },
        None => None,
    };

    Ok(Json(json!({
        "leaderboard": entries,
        "userRank": user_rank,
    })))
}

async fn admin_daily_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let summary = state.engine.daily_summary(date).await?;
    let details = state.engine.daily_stats(date).await?;
    Ok(Json(json!({
        "date": date,
        "summary": summary,
        "details": details,
    })))
}

async fn admin_all_time_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.engine.all_time_stats(Utc::now()).await?;
    let users = state
        .engine
        .users_with_stats(page_limit(query.limit), query.offset.unwrap_or(0).max(0))
        .await?;
    Ok(Json(json!({ "stats": stats, "users": users })))
}

async fn admin_create_ad(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAdRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.title.trim().is_empty() || request.message.trim().is_empty() {
        return Err(ApiError::Validation(
            "title and message are required".to_string(),
        ));
    }
    let ad_id = state
        .engine
        .create_advertisement(
            &request.title,
            &request.message,
            AdTargeting {
                target_all_users: request.target_all_users,
                min_games: request.min_games,
                min_bonuses: request.min_bonuses,
            },
            Utc::now(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "advertisementId": ad_id })))
}

#[derive(Debug, Deserialize)]
struct AdListQuery {
    #[serde(default)]
    active: bool,
}

async fn admin_list_ads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ads = state.engine.advertisements(query.active).await?;
    Ok(Json(json!({ "advertisements": ads })))
}

async fn admin_send_ad(
    State(state): State<Arc<AppState>>,
    Path(ad_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.notifier.is_enabled() {
        return Err(ApiError::Validation(
            "notifier is disabled; configure a bot token".to_string(),
        ));
    }
    let ad = state
        .engine
        .advertisement(ad_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("advertisement not found".to_string()))?;

    let report = broadcast::send_advertisement(&state.engine, &state.notifier, &ad).await?;
    if report.errors > 0 {
        warn!(ad_id, errors = report.errors, "broadcast finished with failures");
    }
    Ok(Json(json!(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn test_state() -> Arc<AppState> {
        let engine = Engine::open_in_memory().await.unwrap();
        Arc::new(AppState {
            engine: Arc::new(engine),
            notifier: Arc::new(Notifier::disabled()),
        })
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(state: &Arc<AppState>, telegram_id: i64) {
        router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/user",
                json!({ "telegramId": telegram_id, "firstName": "Alex" }),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_then_check() {
        let state = test_state().await;
        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/user",
                json!({ "telegramId": 7, "firstName": "Alex", "username": "alex" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["telegram_id"], 7);
        assert_eq!(body["bonusInfo"]["canPlay"], true);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/bonus/check?telegramId=7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_caller_is_404() {
        let state = test_state().await;
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/bonus/check?telegramId=404")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_second_start_is_forbidden() {
        let state = test_state().await;
        register(&state, 7).await;

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/bonus/start",
                json!({ "telegramId": 7 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/api/bonus/start",
                json!({ "telegramId": 7 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert!(body["nextAvailableAt"].is_string());
    }

    #[tokio::test]
    async fn test_save_game_and_exchange_flow() {
        let state = test_state().await;
        register(&state, 7).await;

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/game/save",
                json!({
                    "telegramId": 7,
                    "mode": "normal",
                    "score": 120,
                    "floors": 12,
                    "normalCount": 10,
                    "perfectCount": 5,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["bonusesEarned"], 20);
        assert_eq!(body["stats"]["totalBonuses"], 20);

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/bonus/exchange",
                json!({ "telegramId": 7, "bonusesAmount": 20 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["receipt"]["requiredDeposit"], 10);

        // Balance is now zero; a second exchange is a client error.
        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/api/bonus/exchange",
                json!({ "telegramId": 7, "bonusesAmount": 20 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_negative_score_rejected() {
        let state = test_state().await;
        register(&state, 7).await;
        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/api/game/save",
                json!({ "telegramId": 7, "mode": "normal", "score": -1, "floors": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_promo_statuses_over_http() {
        let state = test_state().await;
        register(&state, 7).await;
        router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/game/save",
                json!({
                    "telegramId": 7,
                    "mode": "normal",
                    "score": 10,
                    "floors": 1,
                    "perfectCount": 50,
                }),
            ))
            .await
            .unwrap();

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/promo/create",
                json!({ "telegramId": 7, "bonusesAmount": 100 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let code = body["promo"]["code"].as_str().unwrap().to_string();
        assert_eq!(body["promo"]["requiredDeposit"], 50);

        let activate = json!({ "code": code, "adminId": 1 });
        let response = router(state.clone())
            .oneshot(json_request("POST", "/api/promo/activate", activate.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router(state.clone())
            .oneshot(json_request("POST", "/api/promo/activate", activate))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/api/promo/activate",
                json!({ "code": "ZZZZ9999", "adminId": 1 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
