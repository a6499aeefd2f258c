use axum::{
    Extension, Router,
    body::Bytes,
    extract::{Path, Query, rejection::PathRejection},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    DbSession,
    models::todo::{
        CreateTodo, Todo, TodoQuery, UpdateTodo, ValidationError, normalize_title, parse_due_date,
    },
    types::Priority,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ListTodosQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub sort: Option<String>,
}

impl ListTodosQuery {
    fn to_query(&self) -> TodoQuery {
        TodoQuery::from_params(
            self.q.as_deref(),
            self.status.as_deref(),
            self.priority.as_deref(),
            self.sort.as_deref(),
        )
    }
}

pub async fn list_todos(
    Extension(session): Extension<DbSession>,
    Query(params): Query<ListTodosQuery>,
) -> Result<ResponseJson<Vec<Todo>>, ApiError> {
    let conn = session.conn().await?;
    let todos = Todo::list(&*conn, &params.to_query()).await?;
    Ok(ResponseJson(todos))
}

pub async fn get_todo(
    Extension(session): Extension<DbSession>,
    todo_id: Result<Path<i64>, PathRejection>,
) -> Result<ResponseJson<Todo>, ApiError> {
    let todo_id = todo_id_from(todo_id)?;
    let conn = session.conn().await?;
    let todo = Todo::find_by_id(&*conn, todo_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ResponseJson(todo))
}

pub async fn create_todo(
    Extension(session): Extension<DbSession>,
    body: Bytes,
) -> Result<(StatusCode, ResponseJson<Todo>), ApiError> {
    let payload = json_object(&body)?;
    let data = create_from_json(&payload)?;

    let todo = {
        let conn = session.conn().await?;
        Todo::create(&*conn, &data).await?
    };
    session.commit().await?;

    tracing::debug!(todo_id = todo.id, "Created todo via API");
    Ok((StatusCode::CREATED, ResponseJson(todo)))
}

pub async fn update_todo(
    Extension(session): Extension<DbSession>,
    todo_id: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> Result<ResponseJson<Todo>, ApiError> {
    let todo_id = todo_id_from(todo_id)?;
    let payload = json_object(&body)?;

    let todo = {
        let conn = session.conn().await?;
        if Todo::find_by_id(&*conn, todo_id).await?.is_none() {
            return Err(ApiError::NotFound);
        }
        let changes = update_from_json(&payload)?;
        Todo::update(&*conn, todo_id, &changes).await?
    };
    session.commit().await?;

    Ok(ResponseJson(todo))
}

pub async fn delete_todo(
    Extension(session): Extension<DbSession>,
    todo_id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let todo_id = todo_id_from(todo_id)?;
    let removed = {
        let conn = session.conn().await?;
        Todo::delete(&*conn, todo_id).await?
    };
    if !removed {
        return Err(ApiError::NotFound);
    }
    session.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_todos(
    Extension(session): Extension<DbSession>,
) -> Result<ResponseJson<Value>, ApiError> {
    session.delete_all_todos().await?;
    Ok(ResponseJson(json!({ "ok": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{todo_id}",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .route("/_reset", post(reset_todos))
}

/// An id that is not an integer cannot name a todo.
fn todo_id_from(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(todo_id)| todo_id).map_err(|rejection| {
        tracing::debug!("Rejected todo id: {}", rejection);
        ApiError::NotFound
    })
}

/// Parses a request body as a JSON object regardless of content type. An
/// empty body or `null` counts as `{}`.
fn json_object(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(ApiError::BadRequest("expected a JSON object".to_string())),
        Err(err) => Err(ApiError::BadRequest(format!("invalid JSON body: {err}"))),
    }
}

/// Optional text field. Non-string scalars are kept as their JSON text so
/// they fail the regular validation instead of being silently dropped.
fn text_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(raw.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn create_from_json(payload: &Map<String, Value>) -> Result<CreateTodo, ValidationError> {
    let title = match payload.get("title") {
        Some(Value::String(raw)) => raw.as_str(),
        _ => "",
    };
    let priority = text_field(payload, "priority");
    let due_date = text_field(payload, "due_date");
    CreateTodo::parse(title, priority.as_deref(), due_date.as_deref())
}

/// Only keys present in the payload are updated; unknown keys are ignored.
fn update_from_json(payload: &Map<String, Value>) -> Result<UpdateTodo, ValidationError> {
    let mut changes = UpdateTodo::default();

    if let Some(title) = payload.get("title") {
        let title = title
            .as_str()
            .and_then(normalize_title)
            .ok_or(ValidationError::InvalidTitle)?;
        changes.title = Some(title);
    }
    if let Some(done) = payload.get("done") {
        changes.done = Some(done.as_bool().ok_or(ValidationError::InvalidDone)?);
    }
    if let Some(priority) = payload.get("priority") {
        let priority = priority
            .as_str()
            .and_then(Priority::parse)
            .ok_or(ValidationError::InvalidPriority)?;
        changes.priority = Some(priority);
    }
    if let Some(due_date) = payload.get("due_date") {
        let due_date = match due_date {
            Value::Null => None,
            Value::String(raw) => parse_due_date(raw)?,
            _ => return Err(ValidationError::InvalidDueDate),
        };
        changes.due_date = Some(due_date);
    }

    Ok(changes)
}
