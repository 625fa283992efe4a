use crate::server::{
    Result, ServerError, ServerRouter,
    extract::{Json, Query},
    validation::{parse_body, require_id_match},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    Id,
    post::{CreatePost, Post, PostFilter, PostMarker, SerializedPost, UpdatePost},
};
use quill_db::store::{DbError, Store};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

pub const POST_LIST_LIMIT: u32 = 10;

const CREATE_POST_FIELDS: &[&str] = &["title", "content", "author"];

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

#[derive(Deserialize)]
struct UpdatePostBody {
    id: Option<Id<PostMarker>>,
    #[serde(flatten)]
    update: UpdatePost,
}

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Vec<SerializedPost>>> {
    let posts = store.fetch_posts(&filter, POST_LIST_LIMIT).await?;

    Ok(Json(posts.iter().map(Post::serialize).collect()))
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<SerializedPost>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post.serialize()))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<SerializedPost>)> {
    let post: CreatePost = parse_body(body, CREATE_POST_FIELDS)?;

    let author = store
        .fetch_author(post.author)
        .await?
        .ok_or(ServerError::AuthorNotFound(post.author))?;

    // Not atomic with the lookup: an author removed in between is caught by
    // the store's reference check instead.
    let created = store.create_post(&post).await.map_err(|err| match err {
        DbError::ForeignKey => ServerError::AuthorNotFound(post.author),
        err => err.into(),
    })?;
    info!(post_id = %created.id, author_id = %author.id, "Created post");

    Ok((StatusCode::CREATED, Json(created.expand(author).serialize())))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    Json(body): Json<UpdatePostBody>,
) -> Result<StatusCode> {
    require_id_match(id, body.id)?;

    store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if let Some(author_id) = body.update.author {
        store
            .fetch_author(author_id)
            .await?
            .ok_or(ServerError::AuthorNotFound(author_id))?;
    }

    let updated = store
        .update_post(id, &body.update)
        .await
        .map_err(|err| match (err, body.update.author) {
            (DbError::ForeignKey, Some(author_id)) => ServerError::AuthorNotFound(author_id),
            (err, _) => err.into(),
        })?;

    if !updated {
        return Err(ServerError::PostByIdNotFound(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<StatusCode> {
    if store.delete_post(id).await? {
        info!(post_id = %id, "Deleted post");
    }

    Ok(StatusCode::NO_CONTENT)
}
