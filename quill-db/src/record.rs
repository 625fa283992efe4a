use quill_common::model::{
    ModelValidationError,
    author::{Author, UserName},
    post::{Comment, PartialPost, Post},
};
use sqlx::{FromRow, types::Json};
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct AuthorRecord {
    pub author_snowflake: i64,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct PartialPostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub content: String,
    pub author_snowflake: i64,
    pub comments: Json<Vec<Comment>>,
    pub created: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub content: String,
    pub comments: Json<Vec<Comment>>,
    pub created: OffsetDateTime,
    pub author_snowflake: i64,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
}

impl TryFrom<AuthorRecord> for Author {
    type Error = ModelValidationError;

    fn try_from(value: AuthorRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.author_snowflake.cast_unsigned().into(),
            first_name: value.first_name,
            last_name: value.last_name,
            user_name: UserName::new(value.user_name)?,
        })
    }
}

impl From<PartialPostRecord> for PartialPost {
    fn from(value: PartialPostRecord) -> Self {
        Self {
            id: value.post_snowflake.cast_unsigned().into(),
            title: value.title,
            content: value.content,
            author_id: value.author_snowflake.cast_unsigned().into(),
            comments: value.comments.0,
            created: value.created,
        }
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_snowflake.cast_unsigned().into(),
            title: value.title,
            content: value.content,
            author: Author {
                id: value.author_snowflake.cast_unsigned().into(),
                first_name: value.first_name,
                last_name: value.last_name,
                user_name: UserName::new(value.user_name)?,
            },
            comments: value.comments.0,
            created: value.created,
        })
    }
}
