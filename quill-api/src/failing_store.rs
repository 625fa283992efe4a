use async_trait::async_trait;
use quill_common::model::{
    Id,
    author::{Author, AuthorMarker, CreateAuthor, UpdateAuthor, UserName},
    post::{CreatePost, PartialPost, Post, PostFilter, PostMarker, UpdatePost},
};
use quill_db::{
    memory::MemoryStore,
    store::{DbError, Result, Store},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Operation {
    FetchAuthors,
    DeleteAuthor,
    DeletePostsByAuthor,
}

/// [`MemoryStore`] that fails one chosen operation and remembers being closed.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: Arc<MemoryStore>,
    failing: Option<Operation>,
    closed: AtomicBool,
}

impl FailingStore {
    #[must_use]
    pub fn failing(operation: Operation) -> Self {
        Self {
            failing: Some(operation),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn inner(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.inner)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self, operation: Operation) -> Result<()> {
        if self.failing != Some(operation) {
            return Ok(());
        }

        Err(match operation {
            // A post slipped in between cleanup and removal.
            Operation::DeleteAuthor => DbError::ForeignKey,
            Operation::FetchAuthors | Operation::DeletePostsByAuthor => {
                DbError::Sqlx(sqlx::Error::PoolClosed)
            }
        })
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn fetch_authors(&self) -> Result<Vec<Author>> {
        self.check(Operation::FetchAuthors)?;
        self.inner.fetch_authors().await
    }

    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>> {
        self.inner.fetch_author(author_id).await
    }

    async fn fetch_author_by_user_name(&self, user_name: &UserName) -> Result<Option<Author>> {
        self.inner.fetch_author_by_user_name(user_name).await
    }

    async fn create_author(&self, author: &CreateAuthor) -> Result<Author> {
        self.inner.create_author(author).await
    }

    async fn update_author(
        &self,
        author_id: Id<AuthorMarker>,
        update: &UpdateAuthor,
    ) -> Result<Option<Author>> {
        self.inner.update_author(author_id, update).await
    }

    async fn delete_author(&self, author_id: Id<AuthorMarker>) -> Result<bool> {
        self.check(Operation::DeleteAuthor)?;
        self.inner.delete_author(author_id).await
    }

    async fn fetch_posts(&self, filter: &PostFilter, limit: u32) -> Result<Vec<Post>> {
        self.inner.fetch_posts(filter, limit).await
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        self.inner.fetch_post(post_id).await
    }

    async fn create_post(&self, post: &CreatePost) -> Result<PartialPost> {
        self.inner.create_post(post).await
    }

    async fn update_post(&self, post_id: Id<PostMarker>, update: &UpdatePost) -> Result<bool> {
        self.inner.update_post(post_id, update).await
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        self.inner.delete_post(post_id).await
    }

    async fn delete_posts_by_author(&self, author_id: Id<AuthorMarker>) -> Result<u64> {
        self.check(Operation::DeletePostsByAuthor)?;
        self.inner.delete_posts_by_author(author_id).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.close().await;
    }
}
