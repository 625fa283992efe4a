use crate::server::{
    Result, ServerError, ServerRouter,
    extract::Json,
    validation::{parse_body, require_id_match, require_unique_user_name},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    Id,
    author::{Author, AuthorMarker, CreateAuthor, SerializedAuthor, UpdateAuthor, UserName},
};
use quill_db::store::{DbError, Store};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

const CREATE_AUTHOR_FIELDS: &[&str] = &["firstName", "lastName", "userName"];

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_authors)
        .typed_post(create_author)
        .typed_get(get_author)
        .typed_put(update_author)
        .typed_delete(delete_author)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/authors", rejection(ServerError))]
struct AuthorsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/authors/{id}", rejection(ServerError))]
struct AuthorPath {
    id: Id<AuthorMarker>,
}

#[derive(Deserialize)]
struct UpdateAuthorBody {
    id: Option<Id<AuthorMarker>>,
    #[serde(flatten)]
    update: UpdateAuthor,
}

fn user_name_conflict(user_name: &UserName) -> impl FnOnce(DbError) -> ServerError {
    move |err| match err {
        DbError::UserNameTaken => ServerError::UserNameTaken(user_name.clone()),
        err => err.into(),
    }
}

async fn list_authors(
    AuthorsPath(): AuthorsPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<SerializedAuthor>>> {
    let authors = store.fetch_authors().await?;

    Ok(Json(authors.iter().map(Author::serialize).collect()))
}

async fn get_author(
    AuthorPath { id }: AuthorPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<SerializedAuthor>> {
    let author = store
        .fetch_author(id)
        .await?
        .ok_or(ServerError::AuthorByIdNotFound(id))?;

    Ok(Json(author.serialize()))
}

async fn create_author(
    AuthorsPath(): AuthorsPath,
    State(store): State<Arc<dyn Store>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<SerializedAuthor>)> {
    let author: CreateAuthor = parse_body(body, CREATE_AUTHOR_FIELDS)?;

    require_unique_user_name(store.as_ref(), &author.user_name, None).await?;
    let created = store
        .create_author(&author)
        .await
        .map_err(user_name_conflict(&author.user_name))?;
    info!(author_id = %created.id, "Created author");

    Ok((StatusCode::CREATED, Json(created.serialize())))
}

async fn update_author(
    AuthorPath { id }: AuthorPath,
    State(store): State<Arc<dyn Store>>,
    Json(body): Json<UpdateAuthorBody>,
) -> Result<Json<SerializedAuthor>> {
    require_id_match(id, body.id)?;

    let updated = match &body.update.user_name {
        Some(user_name) => {
            require_unique_user_name(store.as_ref(), user_name, Some(id)).await?;
            store
                .update_author(id, &body.update)
                .await
                .map_err(user_name_conflict(user_name))?
        }
        None => store.update_author(id, &body.update).await?,
    };
    let author = updated.ok_or(ServerError::AuthorByIdNotFound(id))?;

    Ok(Json(author.serialize()))
}

/// Removes the author's posts, then the author.
///
/// The two steps are not atomic. A post created for this author in between
/// makes the second step fail, which is reported as an internal error.
async fn delete_author(
    AuthorPath { id }: AuthorPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<StatusCode> {
    let removed_posts = store.delete_posts_by_author(id).await?;

    match store.delete_author(id).await {
        Ok(removed) => {
            if removed {
                info!(author_id = %id, removed_posts, "Deleted author");
            }
            Ok(StatusCode::NO_CONTENT)
        }
        Err(source) => {
            error!(
                author_id = %id,
                removed_posts,
                "Author posts were removed but the author was not"
            );
            Err(ServerError::AuthorDeletionAfterPostCleanup {
                author_id: id,
                removed_posts,
                source,
            })
        }
    }
}
