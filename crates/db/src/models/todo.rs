use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, ExprTrait, Func, LikeExpr, Order};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Select, Set,
};
use serde::Serialize;
use thiserror::Error;

pub use crate::types::{Priority, StatusFilter, TodoSort};
use crate::entities::todo;

pub const TITLE_MAX_CHARS: usize = 200;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title required")]
    TitleRequired,
    #[error("invalid title")]
    InvalidTitle,
    #[error("invalid priority")]
    InvalidPriority,
    #[error("invalid due_date")]
    InvalidDueDate,
    #[error("invalid done")]
    InvalidDone,
}

#[derive(Debug, Error)]
pub enum TodoError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
}

/// Trims `raw` and checks it holds between 1 and 200 characters.
pub fn normalize_title(raw: &str) -> Option<String> {
    let title = raw.trim();
    let len = title.chars().count();
    (1..=TITLE_MAX_CHARS)
        .contains(&len)
        .then(|| title.to_string())
}

/// Parses a strict `YYYY-MM-DD` date. Blank input means "no due date".
pub fn parse_due_date(raw: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let bytes = raw.as_bytes();
    // chrono accepts single-digit months and days; the wire format does not.
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return Err(ValidationError::InvalidDueDate);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(Some)
        .map_err(|_| ValidationError::InvalidDueDate)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub done: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<todo::Model> for Todo {
    fn from(model: todo::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            done: model.done,
            priority: model.priority,
            due_date: model.due_date,
            created_at: model.created_at,
        }
    }
}

/// A todo that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTodo {
    pub title: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl CreateTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            priority: Priority::default(),
            due_date: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }

    /// Validates raw user input. The due date is checked first, then the
    /// title, then the priority; the first failure wins.
    pub fn parse(
        title: &str,
        priority: Option<&str>,
        due_date: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let due_date = match due_date {
            Some(raw) => parse_due_date(raw)?,
            None => None,
        };
        let title = normalize_title(title).ok_or(ValidationError::TitleRequired)?;
        let priority = match priority.map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => Priority::parse(raw).ok_or(ValidationError::InvalidPriority)?,
            None => Priority::default(),
        };
        Ok(Self {
            title,
            priority,
            due_date,
        })
    }
}

/// Partial update. `None` leaves the field untouched; `due_date: Some(None)`
/// clears the due date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub done: Option<bool>,
}

impl UpdateTodo {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.done.is_none()
    }
}

/// Filter and sort parameters of the list views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoQuery {
    pub search: String,
    pub status: StatusFilter,
    pub priority: Option<Priority>,
    pub sort: TodoSort,
}

impl TodoQuery {
    /// Builds a query from raw request parameters. Unknown values fall back to
    /// the defaults (`all` and `-created`) instead of failing.
    pub fn from_params(
        search: Option<&str>,
        status: Option<&str>,
        priority: Option<&str>,
        sort: Option<&str>,
    ) -> Self {
        Self {
            search: search.map(str::trim).unwrap_or_default().to_string(),
            status: status
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or_default(),
            priority: priority.and_then(Priority::parse),
            sort: sort.and_then(|s| s.trim().parse().ok()).unwrap_or_default(),
        }
    }

    pub fn select(&self) -> Select<todo::Entity> {
        let mut select = todo::Entity::find();

        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() {
            let pattern = LikeExpr::new(format!("%{}%", escape_like(&needle))).escape('\\');
            select = select.filter(Expr::expr(Func::lower(Expr::col(todo::Column::Title))).like(pattern));
        }

        match self.status {
            StatusFilter::All => {}
            StatusFilter::Active => select = select.filter(todo::Column::Done.eq(false)),
            StatusFilter::Done => select = select.filter(todo::Column::Done.eq(true)),
        }

        if let Some(priority) = self.priority {
            select = select.filter(todo::Column::Priority.eq(priority));
        }

        match self.sort {
            TodoSort::CreatedAsc => select
                .order_by_asc(todo::Column::CreatedAt)
                .order_by_asc(todo::Column::Id),
            TodoSort::CreatedDesc => select
                .order_by_desc(todo::Column::CreatedAt)
                .order_by_desc(todo::Column::Id),
            // Rows without a due date go last in both directions.
            TodoSort::DueAsc => select
                .order_by(Expr::col(todo::Column::DueDate).is_null(), Order::Asc)
                .order_by_asc(todo::Column::DueDate)
                .order_by_asc(todo::Column::Id),
            TodoSort::DueDesc => select
                .order_by(Expr::col(todo::Column::DueDate).is_null(), Order::Asc)
                .order_by_desc(todo::Column::DueDate)
                .order_by_asc(todo::Column::Id),
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl Todo {
    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        Ok(todo::Entity::find_by_id(id).one(db).await?.map(Self::from))
    }

    pub async fn list<C: ConnectionTrait>(db: &C, query: &TodoQuery) -> Result<Vec<Self>, DbErr> {
        let rows = query.select().all(db).await?;
        Ok(rows.into_iter().map(Self::from).collect())
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateTodo) -> Result<Self, TodoError> {
        let title = normalize_title(&data.title).ok_or(ValidationError::TitleRequired)?;
        let active = todo::ActiveModel {
            title: Set(title),
            done: Set(false),
            priority: Set(data.priority),
            due_date: Set(data.due_date),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        tracing::debug!(todo_id = model.id, "created todo");
        Ok(model.into())
    }

    /// Applies every supplied field or none of them.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        changes: &UpdateTodo,
    ) -> Result<Self, TodoError> {
        let title = match &changes.title {
            Some(raw) => Some(normalize_title(raw).ok_or(ValidationError::InvalidTitle)?),
            None => None,
        };

        let record = todo::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(TodoError::NotFound)?;
        if changes.is_empty() {
            return Ok(record.into());
        }

        let mut active: todo::ActiveModel = record.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(priority) = changes.priority {
            active.priority = Set(priority);
        }
        if let Some(due_date) = changes.due_date {
            active.due_date = Set(due_date);
        }
        if let Some(done) = changes.done {
            active.done = Set(done);
        }
        let model = active.update(db).await?;
        Ok(model.into())
    }

    /// Flips `done`. Returns `None` when the todo does not exist.
    pub async fn toggle_done<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let Some(record) = todo::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        let done = !record.done;
        let mut active: todo::ActiveModel = record.into();
        active.done = Set(done);
        let model = active.update(db).await?;
        Ok(Some(model.into()))
    }

    /// Returns whether a row was removed.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<bool, DbErr> {
        let result = todo::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Removes every todo. Callers gate this behind the reset flag, see
    /// [`crate::DbSession::delete_all_todos`].
    pub(crate) async fn delete_all<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        let result = todo::Entity::delete_many().exec(db).await?;
        Ok(result.rows_affected)
    }
}
