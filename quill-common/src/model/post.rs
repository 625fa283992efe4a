use crate::model::{
    Id,
    author::{Author, AuthorMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub content: String,
}

/// A post with its author expanded.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: String,
    pub content: String,
    pub author: Author,
    pub comments: Vec<Comment>,
    pub created: OffsetDateTime,
}

/// A post as it is stored, referencing its author by id.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PartialPost {
    pub id: Id<PostMarker>,
    pub title: String,
    pub content: String,
    pub author_id: Id<AuthorMarker>,
    pub comments: Vec<Comment>,
    pub created: OffsetDateTime,
}

impl PartialPost {
    /// Attaches the author this post references.
    #[must_use]
    pub fn expand(self, author: Author) -> Post {
        debug_assert_eq!(author.id, self.author_id);

        Post {
            id: self.id,
            title: self.title,
            content: self.content,
            author,
            comments: self.comments,
            created: self.created,
        }
    }
}

impl Post {
    #[must_use]
    pub fn serialize(&self) -> SerializedPost {
        SerializedPost {
            id: self.id,
            title: self.title.clone(),
            content: self.content.clone(),
            author: self.author.display_name(),
            comments: self.comments.clone(),
            created: self.created,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct SerializedPost {
    pub id: Id<PostMarker>,
    pub title: String,
    pub content: String,
    pub author: String,
    pub comments: Vec<Comment>,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub author: Id<AuthorMarker>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
}

/// Only the fields that are `Some` are changed.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<Id<AuthorMarker>>,
}

impl UpdatePost {
    pub fn apply(&self, post: &mut PartialPost) {
        if let Some(title) = &self.title {
            post.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            post.content.clone_from(content);
        }
        if let Some(author) = self.author {
            post.author_id = author;
        }
    }
}

/// Exact match filters for listing posts.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostFilter {
    pub title: Option<String>,
    pub author: Option<Id<AuthorMarker>>,
}

impl PostFilter {
    #[must_use]
    pub fn matches(&self, post: &PartialPost) -> bool {
        self.title.as_ref().is_none_or(|title| *title == post.title)
            && self.author.is_none_or(|author| author == post.author_id)
    }
}
