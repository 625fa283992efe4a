use async_trait::async_trait;
use quill_common::{
    model::{
        Id, ModelValidationError,
        author::{Author, AuthorMarker, CreateAuthor, UpdateAuthor, UserName},
        post::{CreatePost, PartialPost, Post, PostFilter, PostMarker, UpdatePost},
    },
    snowflake::SnowflakeTimeError,
};
use std::fmt::Debug;
use thiserror::Error;

const USER_NAME_CONSTRAINT: &str = "authors_user_name_key";

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate an id: {0}")]
    IdGeneration(#[from] SnowflakeTimeError),
    #[error("The user name is already taken")]
    UserNameTaken,
    #[error("A referenced entity is missing or an entity is still referenced")]
    ForeignKey,
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::Database(err)
                if err.is_unique_violation() && err.constraint() == Some(USER_NAME_CONSTRAINT) =>
            {
                DbError::UserNameTaken
            }
            sqlx::Error::Database(err) if err.is_foreign_key_violation() => DbError::ForeignKey,
            _ => DbError::Sqlx(value),
        }
    }
}

/// Document store holding authors and the posts referencing them.
///
/// Every method is a single store operation; nothing here spans more than one
/// of them atomically.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    async fn fetch_authors(&self) -> Result<Vec<Author>>;

    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>>;

    async fn fetch_author_by_user_name(&self, user_name: &UserName) -> Result<Option<Author>>;

    /// Fails with [`DbError::UserNameTaken`] if the user name exists.
    async fn create_author(&self, author: &CreateAuthor) -> Result<Author>;

    /// Returns `None` if no author has this id.
    async fn update_author(
        &self,
        author_id: Id<AuthorMarker>,
        update: &UpdateAuthor,
    ) -> Result<Option<Author>>;

    /// Fails with [`DbError::ForeignKey`] while posts still reference the
    /// author. Returns whether an author was removed.
    async fn delete_author(&self, author_id: Id<AuthorMarker>) -> Result<bool>;

    /// Posts matching `filter` in id order, with their authors expanded.
    async fn fetch_posts(&self, filter: &PostFilter, limit: u32) -> Result<Vec<Post>>;

    /// The post with its author expanded.
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Fails with [`DbError::ForeignKey`] if the author does not exist.
    async fn create_post(&self, post: &CreatePost) -> Result<PartialPost>;

    /// Returns whether a post with this id existed.
    async fn update_post(&self, post_id: Id<PostMarker>, update: &UpdatePost) -> Result<bool>;

    /// Returns whether a post with this id existed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    /// Returns the number of removed posts.
    async fn delete_posts_by_author(&self, author_id: Id<AuthorMarker>) -> Result<u64>;

    async fn close(&self);
}
