use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use extract::Json;
use quill_common::model::{
    Id,
    author::{AuthorMarker, UserName},
    post::PostMarker,
};
use quill_db::store::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use validation::ValidationError;

mod extract;
mod routes;
mod validation;

#[cfg(test)]
mod tests;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
}

pub fn routes() -> ServerRouter {
    routes::routes()
        .fallback(fallback)
        .method_not_allowed_fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    let parts = request.into_parts().0;
    ServerError::UnknownRoute(parts.method, parts.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0} {1}")]
    UnknownRoute(Method, Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("username taken: {}", .0.get())]
    UserNameTaken(UserName),
    #[error("author not found: {0}")]
    AuthorNotFound(Id<AuthorMarker>),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Author with id {0} was not found.")]
    AuthorByIdNotFound(Id<AuthorMarker>),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(
        "Removed {removed_posts} posts of author {author_id}, but removing the author failed: {source}"
    )]
    AuthorDeletionAfterPostCleanup {
        author_id: Id<AuthorMarker>,
        removed_posts: u64,
        source: DbError,
    },
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(..)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::AuthorByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::Validation(_)
            | ServerError::UserNameTaken(_)
            | ServerError::AuthorNotFound(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthorDeletionAfterPostCleanup { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
            "Internal server error".to_owned()
        } else {
            debug!(error = %self, %status, "Rejecting request");
            self.to_string()
        };

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message,
        };
        (status, Json(error_response)).into_response()
    }
}
