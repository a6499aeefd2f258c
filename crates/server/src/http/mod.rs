use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

use crate::{AppState, middleware::with_db_session, routes};

pub fn router(state: AppState) -> Router {
    let todo_routes = Router::new()
        .merge(routes::pages::router())
        .nest("/api", routes::todos::router())
        .layer(from_fn_with_state(state.clone(), with_db_session));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(todo_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use db::DBService;
    use sea_orm::{ConnectionTrait, Database};
    use serde_json::{Value, json};
    use test_support::TempDatabase;
    use tower::ServiceExt;

    use crate::AppState;

    async fn setup(allow_reset: bool) -> (TempDatabase, Router) {
        let temp = TempDatabase::new().unwrap();
        let db = DBService::new(&temp.url(), allow_reset).await.unwrap();
        let state = AppState::new(db).unwrap();
        (temp, super::router(state))
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        if bytes.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn text_body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn api(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = send(app, builder.body(body).unwrap()).await;
        let status = response.status();
        (status, json_body(response).await)
    }

    async fn post_form(app: &Router, uri: &str, form: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        send(app, request).await
    }

    fn assert_redirects_home(response: &Response) {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }

    async fn create(app: &Router, body: Value) -> Value {
        let (status, todo) = api(app, Method::POST, "/api/todos", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{todo}");
        todo
    }

    async fn list(app: &Router, uri: &str) -> Vec<Value> {
        let (status, body) = api(app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        body.as_array().unwrap().clone()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_temp, app) = setup(false).await;
        let (status, body) = api(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn created_todo_shows_up_in_the_list() {
        let (_temp, app) = setup(false).await;

        let todo = create(&app, json!({ "title": "Buy milk" })).await;
        assert_eq!(todo["title"], "Buy milk");
        assert_eq!(todo["done"], false);
        assert_eq!(todo["priority"], "medium");
        assert_eq!(todo["due_date"], Value::Null);
        assert!(todo["id"].as_i64().is_some());
        assert!(todo.get("created_at").is_none());

        let todos = list(&app, "/api/todos").await;
        assert_eq!(todos, vec![todo.clone()]);

        let id = todo["id"].as_i64().unwrap();
        let (status, fetched) = api(&app, Method::GET, &format!("/api/todos/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, todo);
    }

    #[tokio::test]
    async fn title_length_is_enforced() {
        let (_temp, app) = setup(false).await;

        for title in [String::new(), "   ".to_string(), "x".repeat(201)] {
            let (status, body) =
                api(&app, Method::POST, "/api/todos", Some(json!({ "title": title }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({ "error": "title required" }));
        }
        for title in ["x".to_string(), "x".repeat(200)] {
            let todo = create(&app, json!({ "title": title })).await;
            assert_eq!(todo["title"], title);
        }
        assert_eq!(list(&app, "/api/todos").await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_priority_and_due_date_are_rejected() {
        let (_temp, app) = setup(false).await;

        let (status, body) = api(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "x", "priority": "urgent" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "invalid priority" }));

        let (status, body) = api(
            &app,
            Method::POST,
            "/api/todos",
            Some(json!({ "title": "x", "due_date": "2030-1-5" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "invalid due_date" }));

        let todo = create(
            &app,
            json!({ "title": "x", "priority": "HIGH", "due_date": "2030-01-05" }),
        )
        .await;
        assert_eq!(todo["priority"], "high");
        assert_eq!(todo["due_date"], "2030-01-05");
    }

    #[tokio::test]
    async fn list_filters_by_priority() {
        let (_temp, app) = setup(false).await;
        create(&app, json!({ "title": "A", "priority": "high" })).await;
        create(&app, json!({ "title": "B", "priority": "low" })).await;

        let high = list(&app, "/api/todos?priority=high").await;
        assert_eq!(high.len(), 1);
        assert_eq!(high[0]["title"], "A");

        assert_eq!(list(&app, "/api/todos?priority=bogus").await.len(), 2);
    }

    #[tokio::test]
    async fn list_sorts_due_dates_with_missing_ones_last() {
        let (_temp, app) = setup(false).await;
        create(&app, json!({ "title": "none" })).await;
        create(&app, json!({ "title": "late", "due_date": "2030-12-01" })).await;
        create(&app, json!({ "title": "early", "due_date": "2030-01-01" })).await;

        let titles = |todos: Vec<Value>| {
            todos
                .into_iter()
                .map(|t| t["title"].as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(
            titles(list(&app, "/api/todos?sort=due").await),
            vec!["early", "late", "none"]
        );
        assert_eq!(
            titles(list(&app, "/api/todos?sort=-due").await),
            vec!["late", "early", "none"]
        );
        assert_eq!(
            titles(list(&app, "/api/todos?q=AR&sort=created").await),
            vec!["early"]
        );
    }

    #[tokio::test]
    async fn reset_is_forbidden_unless_enabled() {
        let (_temp, app) = setup(false).await;
        create(&app, json!({ "title": "stays" })).await;
        let (status, body) = api(&app, Method::POST, "/api/_reset", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "error": "forbidden" }));
        assert_eq!(list(&app, "/api/todos").await.len(), 1);

        let (_temp, app) = setup(true).await;
        create(&app, json!({ "title": "goes" })).await;
        let (status, body) = api(&app, Method::POST, "/api/_reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert!(list(&app, "/api/todos").await.is_empty());
    }

    #[tokio::test]
    async fn patch_rejects_non_boolean_done_and_leaves_record_alone() {
        let (_temp, app) = setup(false).await;
        let todo = create(&app, json!({ "title": "Walk dog" })).await;
        let uri = format!("/api/todos/{}", todo["id"]);

        let (status, body) = api(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "title": "Renamed", "done": "yes" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "invalid done" }));
        let (_, unchanged) = api(&app, Method::GET, &uri, None).await;
        assert_eq!(unchanged, todo);

        let (status, body) =
            api(&app, Method::PATCH, &uri, Some(json!({ "title": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "invalid title" }));

        let (status, updated) = api(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "done": true, "priority": "low", "due_date": "2031-03-04" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["done"], true);
        assert_eq!(updated["priority"], "low");
        assert_eq!(updated["due_date"], "2031-03-04");
        assert_eq!(updated["title"], "Walk dog");

        let (_, cleared) =
            api(&app, Method::PATCH, &uri, Some(json!({ "due_date": null }))).await;
        assert_eq!(cleared["due_date"], Value::Null);
    }

    #[tokio::test]
    async fn missing_todos_are_not_found() {
        let (_temp, app) = setup(false).await;
        let not_found = json!({ "error": "not found" });

        for (method, body) in [
            (Method::GET, None),
            (Method::PATCH, Some(json!({ "done": true }))),
            (Method::DELETE, None),
        ] {
            let (status, response) = api(&app, method, "/api/todos/999", body).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(response, not_found);
        }
    }

    #[tokio::test]
    async fn delete_removes_the_todo() {
        let (_temp, app) = setup(false).await;
        let todo = create(&app, json!({ "title": "Temporary" })).await;
        let uri = format!("/api/todos/{}", todo["id"]);

        let (status, body) = api(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = api(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(list(&app, "/api/todos").await.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_json_error() {
        let (_temp, app) = setup(false).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/todos")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn html_add_and_toggle_round_trip() {
        let (_temp, app) = setup(false).await;

        let response = post_form(&app, "/add", "title=Buy+milk&priority=high&due_date=bogus").await;
        assert_redirects_home(&response);

        let todos = list(&app, "/api/todos").await;
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0]["priority"], "high");
        assert_eq!(todos[0]["due_date"], Value::Null);
        let id = todos[0]["id"].as_i64().unwrap();

        let page = text_body(
            send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await,
        )
        .await;
        assert!(page.contains(r#"data-testid="todo-input""#));
        assert!(page.contains(r#"data-testid="todo-add""#));
        assert!(page.contains(r#"data-testid="todo-item""#));
        assert!(page.contains("Buy milk"));
        assert!(!page.contains(r#"class="title done""#));

        assert_redirects_home(&post_form(&app, &format!("/toggle/{id}"), "").await);
        let page = text_body(
            send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await,
        )
        .await;
        assert!(page.contains(r#"class="title done""#));

        let page = text_body(
            send(
                &app,
                Request::builder()
                    .uri("/?status=active")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await,
        )
        .await;
        assert!(!page.contains("Buy milk"));
    }

    #[tokio::test]
    async fn html_rejects_invalid_input_silently() {
        let (_temp, app) = setup(false).await;

        assert_redirects_home(&post_form(&app, "/add", "title=+++").await);
        assert_redirects_home(&post_form(&app, "/add", "title=ok&priority=urgent").await);
        assert!(list(&app, "/api/todos").await.is_empty());

        assert_redirects_home(&post_form(&app, "/toggle/42", "").await);
        assert_redirects_home(&post_form(&app, "/edit/42", "title=nope").await);
        assert_redirects_home(&post_form(&app, "/delete/42", "").await);
    }

    #[tokio::test]
    async fn html_edit_and_delete() {
        let (_temp, app) = setup(false).await;
        let todo = create(&app, json!({ "title": "Draft", "due_date": "2030-05-05" })).await;
        let id = todo["id"].as_i64().unwrap();
        let uri = format!("/api/todos/{id}");

        let response = post_form(
            &app,
            &format!("/edit/{id}"),
            "title=Final&priority=low&due_date=someday",
        )
        .await;
        assert_redirects_home(&response);
        let (_, edited) = api(&app, Method::GET, &uri, None).await;
        assert_eq!(edited["title"], "Final");
        assert_eq!(edited["priority"], "low");
        assert_eq!(edited["due_date"], "2030-05-05");

        post_form(&app, &format!("/edit/{id}"), "title=Final&priority=low&due_date=").await;
        let (_, cleared) = api(&app, Method::GET, &uri, None).await;
        assert_eq!(cleared["due_date"], Value::Null);

        post_form(&app, &format!("/edit/{id}"), "title=&priority=high").await;
        let (_, unchanged) = api(&app, Method::GET, &uri, None).await;
        assert_eq!(unchanged, cleared);

        assert_redirects_home(&post_form(&app, &format!("/delete/{id}"), "").await);
        let (status, _) = api(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_patches_all_succeed() {
        let (_temp, app) = setup(false).await;
        let todo = create(&app, json!({ "title": "Contended" })).await;
        let uri = format!("/api/todos/{}", todo["id"]);

        let mut handles = Vec::new();
        for n in 0..20 {
            let app = app.clone();
            let uri = uri.clone();
            handles.push(tokio::spawn(async move {
                let body = json!({ "title": format!("edit {n}"), "done": n % 2 == 0 });
                api(&app, Method::PATCH, &uri, Some(body)).await
            }));
        }
        for handle in handles {
            let (status, body) = handle.await.unwrap();
            assert_eq!(status, StatusCode::OK, "{body}");
        }

        let mut toggles = Vec::new();
        for _ in 0..10 {
            let app = app.clone();
            let id = todo["id"].clone();
            toggles.push(tokio::spawn(async move {
                post_form(&app, &format!("/toggle/{id}"), "").await.status()
            }));
        }
        for handle in toggles {
            assert_eq!(handle.await.unwrap(), StatusCode::SEE_OTHER);
        }

        let (status, body) = api(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["title"].as_str().unwrap().starts_with("edit "));
    }

    #[tokio::test]
    async fn non_numeric_ids_are_not_found() {
        let (_temp, app) = setup(false).await;
        let not_found = json!({ "error": "not found" });

        for (method, body) in [
            (Method::GET, None),
            (Method::PATCH, Some(json!({ "done": true }))),
            (Method::DELETE, None),
        ] {
            let (status, response) = api(&app, method, "/api/todos/abc", body).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(response, not_found);
        }

        assert_redirects_home(&post_form(&app, "/toggle/abc", "").await);
        assert_redirects_home(&post_form(&app, "/edit/abc", "title=x").await);
        assert_redirects_home(&post_form(&app, "/delete/abc", "").await);
    }

    #[tokio::test]
    async fn requests_are_served_when_schema_sync_fails() {
        let temp = TempDatabase::new().unwrap();
        {
            let seed = Database::connect(temp.url()).await.unwrap();
            seed.execute_unprepared("CREATE TABLE unrelated (id INTEGER PRIMARY KEY)")
                .await
                .unwrap();
        }

        // `todos` cannot be created through a read-only handle, so every
        // sync pass fails; requests still get structured answers.
        let read_only = DBService::new(&temp.read_only_url(), false).await.unwrap();
        let app = super::router(AppState::new(read_only).unwrap());
        for _ in 0..2 {
            let (status, body) = api(&app, Method::GET, "/api/todos", None).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body["error"].as_str().unwrap().starts_with("DatabaseError"));
        }
        let (status, _) = api(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        drop(app);

        let writable = DBService::new(&temp.url(), false).await.unwrap();
        let app = super::router(AppState::new(writable).unwrap());
        create(&app, json!({ "title": "Recovered" })).await;
        assert_eq!(list(&app, "/api/todos").await.len(), 1);
    }
}
