//! Server-rendered list view and its form endpoints. Every write redirects
//! back to `/`; invalid input is dropped without an error page.

use axum::{
    Extension, Form, Router,
    extract::{
        Path, Query, State,
        rejection::{FormRejection, PathRejection},
    },
    response::{Html, Redirect},
    routing::{get, post},
};
use db::{
    DbSession,
    models::todo::{CreateTodo, Todo, TodoQuery, UpdateTodo, normalize_title, parse_due_date},
    types::{Priority, StatusFilter, TodoSort},
};
use serde::Deserialize;
use tera::Context;

use crate::{AppState, error::ApiError, templates};

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    /// Priority filter; named `p` to keep the form short.
    pub p: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TodoForm {
    pub title: String,
    pub priority: String,
    pub due_date: String,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(session): Extension<DbSession>,
    Query(params): Query<IndexQuery>,
) -> Result<Html<String>, ApiError> {
    let query = TodoQuery::from_params(
        params.q.as_deref(),
        params.status.as_deref(),
        params.p.as_deref(),
        params.sort.as_deref(),
    );
    let todos = {
        let conn = session.conn().await?;
        Todo::list(&*conn, &query).await?
    };

    let mut context = Context::new();
    context.insert("todos", &todos);
    context.insert("q", &query.search);
    context.insert("status", &query.status.to_string());
    context.insert(
        "p",
        &query
            .priority
            .map_or_else(|| "all".to_string(), |p| p.to_string()),
    );
    context.insert("sort", &query.sort.to_string());
    context.insert("priorities", &Priority::ALL);
    context.insert(
        "statuses",
        &[StatusFilter::All, StatusFilter::Active, StatusFilter::Done],
    );
    context.insert(
        "sorts",
        &[
            TodoSort::CreatedDesc,
            TodoSort::CreatedAsc,
            TodoSort::DueAsc,
            TodoSort::DueDesc,
        ],
    );

    let html = state.templates().render(templates::INDEX, &context)?;
    Ok(Html(html))
}

pub async fn add_todo(
    Extension(session): Extension<DbSession>,
    form: Result<Form<TodoForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let Ok(Form(form)) = form else {
        return Ok(home());
    };
    // An unreadable date is stored as "no due date" rather than rejected.
    let due_date = parse_due_date(&form.due_date).unwrap_or(None);
    let data = match CreateTodo::parse(&form.title, Some(&form.priority), None) {
        Ok(data) => data.with_due_date(due_date),
        Err(err) => {
            tracing::debug!("Ignoring invalid todo form: {}", err);
            return Ok(home());
        }
    };

    {
        let conn = session.conn().await?;
        Todo::create(&*conn, &data).await?;
    }
    session.commit().await?;
    Ok(home())
}

pub async fn toggle_todo(
    Extension(session): Extension<DbSession>,
    todo_id: Result<Path<i64>, PathRejection>,
) -> Result<Redirect, ApiError> {
    let Ok(Path(todo_id)) = todo_id else {
        return Ok(home());
    };
    let toggled = {
        let conn = session.conn().await?;
        Todo::toggle_done(&*conn, todo_id).await?
    };
    if toggled.is_some() {
        session.commit().await?;
    }
    Ok(home())
}

pub async fn edit_todo(
    Extension(session): Extension<DbSession>,
    todo_id: Result<Path<i64>, PathRejection>,
    form: Result<Form<TodoForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let (Ok(Path(todo_id)), Ok(Form(form))) = (todo_id, form) else {
        return Ok(home());
    };

    {
        let conn = session.conn().await?;
        let Some(existing) = Todo::find_by_id(&*conn, todo_id).await? else {
            return Ok(home());
        };
        let Some(changes) = edit_from_form(&form, existing.due_date) else {
            return Ok(home());
        };
        Todo::update(&*conn, todo_id, &changes).await?;
    }
    session.commit().await?;
    Ok(home())
}

pub async fn delete_todo(
    Extension(session): Extension<DbSession>,
    todo_id: Result<Path<i64>, PathRejection>,
) -> Result<Redirect, ApiError> {
    let Ok(Path(todo_id)) = todo_id else {
        return Ok(home());
    };
    let removed = {
        let conn = session.conn().await?;
        Todo::delete(&*conn, todo_id).await?
    };
    if removed {
        session.commit().await?;
    }
    Ok(home())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/add", post(add_todo))
        .route("/toggle/{todo_id}", post(toggle_todo))
        .route("/edit/{todo_id}", post(edit_todo))
        .route("/delete/{todo_id}", post(delete_todo))
}

fn home() -> Redirect {
    Redirect::to("/")
}

/// Turns the edit form into a full replacement of title, priority and due
/// date. `None` when the title or priority is invalid. An unreadable date
/// keeps `current`; a blank one clears it.
fn edit_from_form(
    form: &TodoForm,
    current: Option<chrono::NaiveDate>,
) -> Option<UpdateTodo> {
    let title = normalize_title(&form.title)?;
    let priority = if form.priority.trim().is_empty() {
        Priority::default()
    } else {
        Priority::parse(&form.priority)?
    };
    let due_date = parse_due_date(&form.due_date).unwrap_or(current);

    Some(UpdateTodo {
        title: Some(title),
        priority: Some(priority),
        due_date: Some(due_date),
        done: None,
    })
}
