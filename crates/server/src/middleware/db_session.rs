use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use db::SessionMode;

use crate::AppState;

/// Gives every request its own [`db::DbSession`], reachable from handlers as
/// `Extension<DbSession>`, and closes it once the response is produced.
///
/// The schema is synchronized first so handlers always see the full column
/// set, even if the database file was swapped or downgraded underneath.
/// Requests with unsafe methods get a write session, which takes the write
/// lock on first use and keeps it until commit or close.
pub async fn with_db_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    state.db().sync_schema().await;

    let mode = if request.method().is_safe() {
        SessionMode::Read
    } else {
        SessionMode::Write
    };
    let session = state.db().session(mode);
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    session.close().await;
    response
}
