//! REST API endpoint handlers.
//!
//! Every handler goes through the services in [`AppState`]; none of them
//! keeps state between requests.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/timer` | Current timer, all timers, or live messages |
//! | `POST` | `/timer/control` | Start, pause, reset, create, delete, save, select, message |
//! | `GET` `POST` `DELETE` | `/timer/message` | Message CRUD |
//! | `GET` `POST` `PUT` `DELETE` | `/timer/actions` | Timer action CRUD |
//! | `POST` | `/timer/actions/execute` | Fire one action now |
//! | `POST` | `/timer/actions/reset` | Re-arm a timer's actions |
//! | `GET` `POST` | `/status` | Status label and visitor counter |
//! | `GET` | `/time` | Authoritative server time |
//! | `GET` | `/health` | Store reachability |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::{Days, NaiveDate};
use eventops_core::timer;
use eventops_types::{
    ActionId, MessageId, NewTimerAction, NewTimerMessage, SessionRole, Timer, TimerActionPatch,
    TimerId, TimerReading, TimerSettings,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::auth::Session;
use crate::error::ApiError;
use crate::state::AppState;

/// Handler result: a JSON body or an [`ApiError`].
type ApiResult = Result<Json<serde_json::Value>, ApiError>;

// ---------------------------------------------------------------------------
// Request and response shapes
// ---------------------------------------------------------------------------

/// A timer together with its reading at response time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    /// The stored row.
    #[serde(flatten)]
    pub timer: Timer,
    /// Derived remaining/elapsed/overtime values.
    pub reading: TimerReading,
    /// Whether displays should render an hours field.
    pub shows_hours: bool,
}

impl TimerView {
    fn new(state: &AppState, timer: Timer) -> Self {
        let reading = state.timers.reading(&timer);
        let shows_hours = timer::shows_hours(&timer, &reading);
        Self {
            timer,
            reading,
            shows_hours,
        }
    }
}

/// Query parameters for `GET /timer`.
#[derive(Debug, Default, Deserialize)]
pub struct TimerQuery {
    /// `current` (default), `all`, or `messages`.
    pub action: Option<String>,
}

/// Body of `POST /timer/control`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRequest {
    /// Operation name.
    pub action: String,
    /// Target timer.
    #[serde(default)]
    pub timer_id: Option<TimerId>,
    /// Settings for `create` and `save`.
    #[serde(default)]
    pub settings: Option<TimerSettings>,
    /// Message for `message`.
    #[serde(default)]
    pub message: Option<NewTimerMessage>,
}

/// Query parameters for `/timer/message`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    /// Single message to fetch or delete.
    pub message_id: Option<MessageId>,
}

/// Body of `POST /timer/message`.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    /// The message to send.
    #[serde(default)]
    pub message: Option<NewTimerMessage>,
}

/// Query parameters for `GET /timer/actions`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsQuery {
    /// Restrict to one timer's actions.
    pub timer_id: Option<TimerId>,
    /// Single action, for `DELETE`.
    pub id: Option<ActionId>,
}

/// Body of `POST /timer/actions/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Action to fire.
    pub id: ActionId,
}

/// Body of `POST /timer/actions/reset`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetActionsRequest {
    /// Timer whose actions are re-armed.
    pub timer_id: TimerId,
}

/// Query parameters for `GET /status`.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// `visitors` returns only the count; `history` returns per-day counts.
    pub action: Option<String>,
    /// First day of a `history` range (default: six days before `to`).
    pub from: Option<NaiveDate>,
    /// Last day of a `history` range (default: today).
    pub to: Option<NaiveDate>,
}

/// Days before `to` that a `history` request covers when `from` is omitted.
pub const DEFAULT_HISTORY_DAYS: u64 = 6;

/// Body of `POST /status`.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    /// Operation name.
    pub action: String,
    /// New label for `update_status`.
    #[serde(default)]
    pub status: Option<String>,
    /// Delta for `increment_visitors` (default 1).
    #[serde(default)]
    pub increment: Option<i64>,
    /// Value for `set_visitors`.
    #[serde(default)]
    pub count: Option<i64>,
}

// ---------------------------------------------------------------------------
// GET /timer
// ---------------------------------------------------------------------------

/// Poll the current timer, all timers, or live messages.
///
/// # Query Parameters
///
/// - `action`: `current` | `all` | `messages` (default: `current`)
pub async fn get_timer(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TimerQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let server_time = state.now_ms();

    match query.action.as_deref() {
        Some("all") => {
            let timers: Vec<TimerView> = state
                .timers
                .all()
                .await?
                .into_iter()
                .map(|t| TimerView::new(&state, t))
                .collect();
            Ok(Json(json!({ "timers": timers, "serverTime": server_time })))
        }
        Some("messages") => {
            let messages = state.board.list().await?;
            Ok(Json(json!({ "messages": messages, "serverTime": server_time })))
        }
        _ => {
            let timer = state
                .timers
                .current()
                .await?
                .map(|t| TimerView::new(&state, t));
            Ok(Json(json!({ "timer": timer, "serverTime": server_time })))
        }
    }
}

// ---------------------------------------------------------------------------
// POST /timer/control
// ---------------------------------------------------------------------------

/// Apply one control operation. Requires an admin session.
pub async fn control_timer(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> ApiResult {
    session.require(SessionRole::Admin)?;
    let Json(req) = payload?;
    info!(action = %req.action, timer_id = ?req.timer_id, "Timer control");

    let timer_id = || req.timer_id.ok_or_else(|| ApiError::missing("timerId"));

    let body = match req.action.as_str() {
        "start" => {
            let timer = state.timers.start(timer_id()?).await?;
            json!({ "timer": TimerView::new(&state, timer) })
        }
        "pause" => {
            let timer = state.timers.pause(timer_id()?).await?;
            json!({ "timer": TimerView::new(&state, timer) })
        }
        "reset" => {
            let timer = state.timers.reset(timer_id()?).await?;
            json!({ "timer": TimerView::new(&state, timer) })
        }
        "select" => {
            let timer = state.timers.set_current(timer_id()?).await?;
            json!({ "timer": TimerView::new(&state, timer) })
        }
        "create" => {
            let settings = req.settings.ok_or_else(|| ApiError::missing("settings"))?;
            let timer = state.timers.create(settings).await?;
            json!({ "timer": TimerView::new(&state, timer) })
        }
        "delete" => {
            state.timers.delete(timer_id()?).await?;
            json!({ "success": true })
        }
        "save" => {
            let settings = req.settings.ok_or_else(|| ApiError::missing("settings"))?;
            let timer = state.timers.save(req.timer_id, settings).await?;
            json!({ "success": true, "timer": TimerView::new(&state, timer) })
        }
        "message" => {
            let message = req.message.ok_or_else(|| ApiError::missing("message"))?;
            let message = state.board.send(message).await?;
            json!({ "message": message })
        }
        other => {
            return Err(ApiError::InvalidInput(format!("unknown action: {other}")));
        }
    };
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// /timer/message
// ---------------------------------------------------------------------------

/// Fetch one message by id, or all live messages.
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MessageQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    if let Some(id) = query.message_id {
        let message = state.board.get(id).await?;
        return Ok(Json(json!({ "message": message })));
    }
    let messages = state.board.list().await?;
    Ok(Json(json!({ "messages": messages })))
}

/// Send a new message. Requires an admin session.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> ApiResult {
    session.require(SessionRole::Admin)?;
    let Json(req) = payload?;
    let new = req.message.ok_or_else(|| ApiError::missing("message"))?;
    let message = state.board.send(new).await?;
    Ok(Json(json!({ "message": message })))
}

/// Delete a message. `success` is `false` when it did not exist.
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    session: Session,
    query: Result<Query<MessageQuery>, QueryRejection>,
) -> ApiResult {
    session.require(SessionRole::Admin)?;
    let Query(query) = query?;
    let id = query.message_id.ok_or_else(|| ApiError::missing("messageId"))?;
    let success = state.board.delete(id).await?;
    Ok(Json(json!({ "success": success })))
}

// ---------------------------------------------------------------------------
// /timer/actions
// ---------------------------------------------------------------------------

/// List actions, optionally for one timer.
pub async fn list_actions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ActionsQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let actions = state.actions.list(query.timer_id).await?;
    Ok(Json(json!({ "actions": actions })))
}

/// Create an action. Requires an admin session.
pub async fn create_action(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Result<Json<NewTimerAction>, JsonRejection>,
) -> ApiResult {
    session.require(SessionRole::Admin)?;
    let Json(new) = payload?;
    let action = state.actions.create(new).await?;
    Ok(Json(json!({ "action": action })))
}

/// Update an action. Requires an admin session.
pub async fn update_action(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Result<Json<TimerActionPatch>, JsonRejection>,
) -> ApiResult {
    session.require(SessionRole::Admin)?;
    let Json(patch) = payload?;
    let action = state.actions.update(patch).await?;
    Ok(Json(json!({ "action": action })))
}

/// Delete an action. Requires an admin session.
pub async fn delete_action(
    State(state): State<Arc<AppState>>,
    session: Session,
    query: Result<Query<ActionsQuery>, QueryRejection>,
) -> ApiResult {
    session.require(SessionRole::Admin)?;
    let Query(query) = query?;
    let id = query.id.ok_or_else(|| ApiError::missing("id"))?;
    let success = state.actions.delete(id).await?;
    Ok(Json(json!({ "success": success })))
}

/// Fire an action immediately. `success` is `false` for disabled actions.
pub async fn execute_action(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> ApiResult {
    session.require(SessionRole::Admin)?;
    let Json(req) = payload?;
    let success = state.actions.execute(req.id).await?;
    Ok(Json(json!({ "success": success })))
}

/// Re-arm every action of a timer.
pub async fn reset_actions(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Result<Json<ResetActionsRequest>, JsonRejection>,
) -> ApiResult {
    session.require(SessionRole::Admin)?;
    let Json(req) = payload?;
    let reset = state.actions.reset(req.timer_id).await?;
    Ok(Json(json!({ "success": true, "reset": reset })))
}

// ---------------------------------------------------------------------------
// /status
// ---------------------------------------------------------------------------

/// Read the status label and today's visitor count.
///
/// # Query Parameters
///
/// - `action`: `visitors` returns only `{visitors}`; `history` returns
///   `{history}` with one entry per counted day in `from..=to`
/// - `from`, `to`: `YYYY-MM-DD` bounds for `history`
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    if query.action.as_deref() == Some("history") {
        let to = query.to.unwrap_or_else(|| state.status.today());
        let from = query
            .from
            .or_else(|| to.checked_sub_days(Days::new(DEFAULT_HISTORY_DAYS)))
            .unwrap_or(to);
        let history = state.status.visitor_history(from, to).await?;
        return Ok(Json(json!({ "history": history })));
    }
    let visitors = state.status.get_visitors().await?;
    if query.action.as_deref() == Some("visitors") {
        return Ok(Json(json!({ "visitors": visitors.count })));
    }
    let status = state.status.get_status().await?;
    Ok(Json(json!({
        "status": status.label,
        "visitors": visitors.count,
        "eventDate": visitors.event_date,
        "serverTime": state.now_ms(),
    })))
}

/// Update the status label or the visitor counter.
///
/// Staff sessions may `increment_visitors`; everything else needs admin.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    session: Session,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let required = if req.action == "increment_visitors" {
        SessionRole::Staff
    } else {
        SessionRole::Admin
    };
    session.require(required)?;

    let body = match req.action.as_str() {
        "update_status" => {
            let label = req.status.ok_or_else(|| ApiError::missing("status"))?;
            let status = state.status.set_status(&label).await?;
            json!({ "success": true, "status": status.label })
        }
        "increment_visitors" => {
            let counter = state
                .status
                .increment_visitors(req.increment.unwrap_or(1))
                .await?;
            json!({ "success": true, "visitors": counter.count })
        }
        "set_visitors" => {
            let count = req.count.ok_or_else(|| ApiError::missing("count"))?;
            let counter = state.status.set_visitors(count).await?;
            json!({ "success": true, "visitors": counter.count })
        }
        "reset_visitors" => {
            let counter = state.status.reset_visitors().await?;
            json!({ "success": true, "visitors": counter.count })
        }
        other => {
            return Err(ApiError::InvalidInput(format!("unknown action: {other}")));
        }
    };
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// GET /time, GET /health
// ---------------------------------------------------------------------------

/// Authoritative server time in Unix milliseconds.
pub async fn get_time(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "now": state.now_ms(),
        "timezone": state.timezone,
    }))
}

/// Ping both stores.
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult {
    state
        .timers
        .ping()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    state
        .status
        .ping()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(json!({ "status": "ok" })))
}
