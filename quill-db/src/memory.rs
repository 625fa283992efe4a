use crate::store::{DbError, Result, Store};
use async_trait::async_trait;
use quill_common::{
    model::{
        Id,
        author::{Author, AuthorMarker, CreateAuthor, UpdateAuthor, UserName},
        post::{CreatePost, PartialPost, Post, PostFilter, PostMarker, UpdatePost},
    },
    snowflake::{NodePart, SnowflakeGenerator},
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct Documents {
    snowflake_generator: SnowflakeGenerator,
    authors: BTreeMap<Id<AuthorMarker>, Author>,
    posts: BTreeMap<Id<PostMarker>, PartialPost>,
}

impl Documents {
    fn user_name_taken(&self, user_name: &UserName, except: Option<Id<AuthorMarker>>) -> bool {
        self.authors
            .values()
            .any(|author| author.user_name == *user_name && Some(author.id) != except)
    }

    fn expand(&self, post: &PartialPost) -> Option<Post> {
        let author = self.authors.get(&post.author_id)?.clone();
        Some(post.clone().expand(author))
    }
}

/// [`Store`] keeping everything in process memory, enforcing the same
/// uniqueness and reference constraints as the database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Documents>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: NodePart, process_id: NodePart) -> Self {
        Self {
            documents: Mutex::new(Documents {
                snowflake_generator: SnowflakeGenerator::new(worker_id, process_id),
                ..Documents::default()
            }),
        }
    }

    fn documents(&self) -> MutexGuard<'_, Documents> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_authors(&self) -> Result<Vec<Author>> {
        Ok(self.documents().authors.values().cloned().collect())
    }

    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>> {
        Ok(self.documents().authors.get(&author_id).cloned())
    }

    async fn fetch_author_by_user_name(&self, user_name: &UserName) -> Result<Option<Author>> {
        let documents = self.documents();
        let author = documents
            .authors
            .values()
            .find(|author| author.user_name == *user_name)
            .cloned();
        Ok(author)
    }

    async fn create_author(&self, author: &CreateAuthor) -> Result<Author> {
        let mut documents = self.documents();
        if documents.user_name_taken(&author.user_name, None) {
            return Err(DbError::UserNameTaken);
        }

        let id = documents.snowflake_generator.generate()?.into();
        let author = Author {
            id,
            first_name: author.first_name.clone(),
            last_name: author.last_name.clone(),
            user_name: author.user_name.clone(),
        };
        documents.authors.insert(id, author.clone());

        Ok(author)
    }

    async fn update_author(
        &self,
        author_id: Id<AuthorMarker>,
        update: &UpdateAuthor,
    ) -> Result<Option<Author>> {
        let mut documents = self.documents();
        if let Some(user_name) = &update.user_name
            && documents.user_name_taken(user_name, Some(author_id))
        {
            return Err(DbError::UserNameTaken);
        }

        let Some(author) = documents.authors.get_mut(&author_id) else {
            return Ok(None);
        };
        update.apply(author);

        Ok(Some(author.clone()))
    }

    async fn delete_author(&self, author_id: Id<AuthorMarker>) -> Result<bool> {
        let mut documents = self.documents();
        if documents
            .posts
            .values()
            .any(|post| post.author_id == author_id)
        {
            return Err(DbError::ForeignKey);
        }

        Ok(documents.authors.remove(&author_id).is_some())
    }

    async fn fetch_posts(&self, filter: &PostFilter, limit: u32) -> Result<Vec<Post>> {
        let documents = self.documents();
        let posts = documents
            .posts
            .values()
            .filter(|post| filter.matches(post))
            .take(limit as usize)
            .filter_map(|post| documents.expand(post))
            .collect();
        Ok(posts)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let documents = self.documents();
        let post = documents
            .posts
            .get(&post_id)
            .and_then(|post| documents.expand(post));
        Ok(post)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<PartialPost> {
        let mut documents = self.documents();
        if !documents.authors.contains_key(&post.author) {
            return Err(DbError::ForeignKey);
        }

        let id = documents.snowflake_generator.generate()?.into();
        let post = PartialPost {
            id,
            title: post.title.clone(),
            content: post.content.clone(),
            author_id: post.author,
            comments: post.comments.clone(),
            created: post.created.unwrap_or_else(OffsetDateTime::now_utc),
        };
        documents.posts.insert(id, post.clone());

        Ok(post)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, update: &UpdatePost) -> Result<bool> {
        let mut documents = self.documents();
        if let Some(author) = update.author
            && !documents.authors.contains_key(&author)
        {
            return Err(DbError::ForeignKey);
        }

        let Some(post) = documents.posts.get_mut(&post_id) else {
            return Ok(false);
        };
        update.apply(post);

        Ok(true)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        Ok(self.documents().posts.remove(&post_id).is_some())
    }

    async fn delete_posts_by_author(&self, author_id: Id<AuthorMarker>) -> Result<u64> {
        let mut documents = self.documents();
        let before = documents.posts.len();
        documents
            .posts
            .retain(|_, post| post.author_id != author_id);

        Ok((before - documents.posts.len()) as u64)
    }

    async fn close(&self) {}
}
