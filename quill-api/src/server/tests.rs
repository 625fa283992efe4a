use crate::{
    failing_store::{FailingStore, Operation},
    server::{ServerState, routes},
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use quill_db::{memory::MemoryStore, store::Store};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let router = routes().with_state(ServerState {
            store: store.clone(),
        });

        Self { router, store }
    }

    fn failing(operation: Operation) -> Self {
        let failing = FailingStore::failing(operation);
        let store = failing.inner();
        let router = routes().with_state(ServerState {
            store: Arc::new(failing),
        });

        Self { router, store }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    async fn create_author(&self, first_name: &str, last_name: &str, user_name: &str) -> Value {
        let (status, author) = self
            .post(
                "/authors",
                json!({ "firstName": first_name, "lastName": last_name, "userName": user_name }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        author
    }

    async fn create_post(&self, title: &str, author: &Value) -> Value {
        let (status, post) = self
            .post(
                "/posts",
                json!({ "title": title, "content": "C", "author": author["id"] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        post
    }

    async fn post_count(&self) -> usize {
        let (_, posts) = self.get("/posts").await;
        posts.as_array().unwrap().len()
    }
}

#[tokio::test]
async fn ada_lovelace_scenario() {
    let app = TestApp::new();

    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    assert_eq!(ada["name"], "Ada Lovelace");
    assert_eq!(ada["userName"], "ada");

    let post = app.create_post("T", &ada).await;
    assert_eq!(post["author"], "Ada Lovelace");
    assert_eq!(post["title"], "T");
    assert_eq!(post["content"], "C");
    assert_eq!(post["comments"], json!([]));

    let post_uri = format!("/posts/{}", post["id"]);
    let (status, fetched) = app.get(&post_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, post);

    let (status, body) = app.delete(&format!("/authors/{}", ada["id"])).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = app.get(&post_uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn create_post_requires_every_field() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    let complete = json!({ "title": "T", "content": "C", "author": ada["id"] });

    for field in ["title", "content", "author"] {
        let mut body = complete.clone();
        body.as_object_mut().unwrap().remove(field);

        let (status, error) = app.post("/posts", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["message"], format!("missing field {field}"));
    }

    let (status, error) = app.post("/posts", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "missing field title");

    assert_eq!(app.post_count().await, 0);
}

#[tokio::test]
async fn create_post_for_unknown_author() {
    let app = TestApp::new();

    let (status, error) = app
        .post("/posts", json!({ "title": "T", "content": "C", "author": 42 }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "author not found: 42");
    assert_eq!(app.post_count().await, 0);
}

#[tokio::test]
async fn create_post_with_comments_and_date() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;

    let (status, post) = app
        .post(
            "/posts",
            json!({
                "title": "T",
                "content": "C",
                "author": ada["id"],
                "comments": [{ "content": "nice" }],
                "created": "2025-02-03T04:05:06Z",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["comments"], json!([{ "content": "nice" }]));
    assert_eq!(post["created"], "2025-02-03T04:05:06Z");
}

#[tokio::test]
async fn list_posts_filters_and_limits() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    let grace = app.create_author("Grace", "Hopper", "grace").await;
    for _ in 0..12 {
        app.create_post("Engines", &ada).await;
    }
    app.create_post("Compilers", &grace).await;

    let (status, posts) = app.get("/posts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(posts.as_array().unwrap().len(), 10);

    let (_, posts) = app.get("/posts?title=Compilers").await;
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["author"], "Grace Hopper");

    let (_, posts) = app.get(&format!("/posts?author={}", grace["id"])).await;
    assert_eq!(posts.as_array().unwrap().len(), 1);

    let (_, posts) = app
        .get(&format!("/posts?title=Compilers&author={}", ada["id"]))
        .await;
    assert_eq!(posts, json!([]));

    let (status, _) = app.get("/posts?author=not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_post_applies_present_fields() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    let grace = app.create_author("Grace", "Hopper", "grace").await;
    let post = app.create_post("T", &ada).await;
    let post_uri = format!("/posts/{}", post["id"]);

    let (status, body) = app
        .put(&post_uri, json!({ "id": post["id"], "title": "New" }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, fetched) = app.get(&post_uri).await;
    assert_eq!(fetched["title"], "New");
    assert_eq!(fetched["content"], "C");
    assert_eq!(fetched["author"], "Ada Lovelace");

    let (status, _) = app
        .put(&post_uri, json!({ "id": post["id"], "author": grace["id"] }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, fetched) = app.get(&post_uri).await;
    assert_eq!(fetched["author"], "Grace Hopper");

    let (status, _) = app
        .put(&post_uri, json!({ "id": post["id"], "author": 42 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_post_with_mismatched_id() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    let post = app.create_post("T", &ada).await;
    let post_uri = format!("/posts/{}", post["id"]);

    let (status, error) = app
        .put(&post_uri, json!({ "id": 1, "title": "Changed" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        error["message"]
            .as_str()
            .unwrap()
            .starts_with("id mismatch")
    );

    let (status, _) = app.put(&post_uri, json!({ "title": "Changed" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, fetched) = app.get(&post_uri).await;
    assert_eq!(fetched, post);
}

#[tokio::test]
async fn update_missing_post() {
    let app = TestApp::new();

    let (status, _) = app.put("/posts/42", json!({ "id": 42, "title": "T" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, error) = app
        .put("/posts/42", json!({ "id": 42, "author": 42 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["status"], 404);
}

#[tokio::test]
async fn delete_post_is_idempotent() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    let post = app.create_post("T", &ada).await;
    let post_uri = format!("/posts/{}", post["id"]);

    let (status, _) = app.delete(&post_uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete(&post_uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete("/posts/42").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&post_uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_user_name_is_rejected() {
    let app = TestApp::new();
    app.create_author("Ada", "Lovelace", "ada").await;

    let (status, error) = app
        .post(
            "/authors",
            json!({ "firstName": "Ada", "lastName": "Byron", "userName": "ada" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "username taken: ada");

    let (_, authors) = app.get("/authors").await;
    assert_eq!(authors.as_array().unwrap().len(), 1);
    assert_eq!(app.store.fetch_authors().await.unwrap().len(), 1);

    let (status, _) = app
        .post(
            "/authors",
            json!({ "firstName": "Ada", "lastName": "Byron", "userName": "Ada" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn create_author_requires_every_field() {
    let app = TestApp::new();

    let (status, error) = app
        .post("/authors", json!({ "firstName": "Ada", "userName": "ada" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "missing field lastName");

    let (status, _) = app
        .post(
            "/authors",
            json!({ "firstName": "Ada", "lastName": "Lovelace", "userName": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, authors) = app.get("/authors").await;
    assert_eq!(authors, json!([]));
}

#[tokio::test]
async fn list_and_get_authors() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    let grace = app.create_author("Grace", "Hopper", "grace").await;

    let (status, authors) = app.get("/authors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(authors, json!([ada, grace]));

    let (status, fetched) = app.get(&format!("/authors/{}", ada["id"])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, ada);

    let (status, _) = app.get("/authors/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_author() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    app.create_author("Grace", "Hopper", "grace").await;
    let ada_uri = format!("/authors/{}", ada["id"]);

    let (status, updated) = app
        .put(&ada_uri, json!({ "id": ada["id"], "lastName": "King" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        updated,
        json!({ "id": ada["id"], "name": "Ada King", "userName": "ada" })
    );

    let (status, updated) = app
        .put(&ada_uri, json!({ "id": ada["id"], "userName": "ada" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["userName"], "ada");

    let (status, error) = app
        .put(&ada_uri, json!({ "id": ada["id"], "userName": "grace" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "username taken: grace");

    let (status, _) = app
        .put(&ada_uri, json!({ "id": 1, "lastName": "Byron" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put("/authors/42", json!({ "id": 42, "lastName": "Byron" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, fetched) = app.get(&ada_uri).await;
    assert_eq!(fetched["name"], "Ada King");
}

#[tokio::test]
async fn delete_author_cascades_to_posts() {
    let app = TestApp::new();
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    let grace = app.create_author("Grace", "Hopper", "grace").await;
    for title in ["A", "B", "C"] {
        app.create_post(title, &ada).await;
    }
    let kept = app.create_post("D", &grace).await;

    let (status, _) = app.delete(&format!("/authors/{}", ada["id"])).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, posts) = app.get(&format!("/posts?author={}", ada["id"])).await;
    assert_eq!(posts, json!([]));
    let (_, posts) = app.get("/posts").await;
    assert_eq!(posts, json!([kept]));

    let (_, authors) = app.get("/authors").await;
    assert_eq!(authors, json!([grace]));

    let (status, _) = app.delete(&format!("/authors/{}", ada["id"])).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = TestApp::new();

    let (status, error) = app.get("/comments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["status"], 404);

    let (status, _) = app.send(Method::PATCH, "/posts", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/posts/not-an-id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/authors")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_failures_are_hidden() {
    let app = TestApp::failing(Operation::FetchAuthors);

    let (status, error) = app.get("/authors").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error,
        json!({ "status": 500, "message": "Internal server error" })
    );
}

#[tokio::test]
async fn author_survives_failed_post_cleanup() {
    let app = TestApp::failing(Operation::DeletePostsByAuthor);
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    app.create_post("T", &ada).await;
    let author_uri = format!("/authors/{}", ada["id"]);

    let (status, error) = app.delete(&author_uri).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["message"], "Internal server error");

    let (status, fetched) = app.get(&author_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, ada);
    assert_eq!(app.post_count().await, 1);
}

#[tokio::test]
async fn author_removal_failing_after_post_cleanup() {
    let app = TestApp::failing(Operation::DeleteAuthor);
    let ada = app.create_author("Ada", "Lovelace", "ada").await;
    app.create_post("T", &ada).await;
    let author_uri = format!("/authors/{}", ada["id"]);

    let (status, error) = app.delete(&author_uri).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error,
        json!({ "status": 500, "message": "Internal server error" })
    );

    assert_eq!(app.post_count().await, 0);
    assert_eq!(app.store.fetch_authors().await.unwrap().len(), 1);
}
