use crate::{
    record::{AuthorRecord, FullPostRecord, PartialPostRecord},
    store::{Result, Store},
};
use async_trait::async_trait;
use quill_common::{
    model::{
        Id,
        author::{Author, AuthorMarker, CreateAuthor, UpdateAuthor, UserName},
        post::{CreatePost, PartialPost, Post, PostFilter, PostMarker, UpdatePost},
    },
    snowflake::{NodePart, Snowflake, SnowflakeGenerator},
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, raw_sql, types::Json};
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;
use tracing::info;

const SCHEMA: &str = include_str!("../schema.sql");

const FULL_POST_SELECT: &str = "
    SELECT
        posts.post_snowflake,
        posts.title,
        posts.content,
        posts.comments,
        posts.created,
        authors.author_snowflake,
        authors.first_name,
        authors.last_name,
        authors.user_name
    FROM
        blog.posts JOIN blog.authors USING (author_snowflake)
";

/// [`Store`] backed by PostgreSQL.
#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<SnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: NodePart, process_id: NodePart) -> Self {
        let snowflake_generator = Mutex::new(SnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        worker_id: NodePart,
        process_id: NodePart,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool, worker_id, process_id))
    }

    /// Creates the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn generate_snowflake(&self) -> Result<Snowflake> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;
        Ok(snowflake)
    }
}

#[async_trait]
impl Store for DbClient {
    async fn fetch_authors(&self) -> Result<Vec<Author>> {
        let records = query_as::<_, AuthorRecord>(
            "
            SELECT author_snowflake, first_name, last_name, user_name
            FROM blog.authors
            ORDER BY author_snowflake
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let authors = records
            .into_iter()
            .map(Author::try_from)
            .collect::<Result<_, _>>()?;
        Ok(authors)
    }

    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>> {
        let record = query_as::<_, AuthorRecord>(
            "
            SELECT author_snowflake, first_name, last_name, user_name
            FROM blog.authors
            WHERE author_snowflake = $1
            ",
        )
        .bind(author_id.snowflake().get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        let author = record.map(Author::try_from).transpose()?;
        Ok(author)
    }

    async fn fetch_author_by_user_name(&self, user_name: &UserName) -> Result<Option<Author>> {
        let record = query_as::<_, AuthorRecord>(
            "
            SELECT author_snowflake, first_name, last_name, user_name
            FROM blog.authors
            WHERE user_name = $1
            ",
        )
        .bind(user_name.get())
        .fetch_optional(&self.pool)
        .await?;

        let author = record.map(Author::try_from).transpose()?;
        Ok(author)
    }

    async fn create_author(&self, author: &CreateAuthor) -> Result<Author> {
        let author_snowflake = self.generate_snowflake()?;

        let record = query_as::<_, AuthorRecord>(
            "
            INSERT INTO blog.authors (author_snowflake, first_name, last_name, user_name)
            VALUES ($1, $2, $3, $4)
            RETURNING author_snowflake, first_name, last_name, user_name
            ",
        )
        .bind(author_snowflake.get().cast_signed())
        .bind(&author.first_name)
        .bind(&author.last_name)
        .bind(author.user_name.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn update_author(
        &self,
        author_id: Id<AuthorMarker>,
        update: &UpdateAuthor,
    ) -> Result<Option<Author>> {
        let record = query_as::<_, AuthorRecord>(
            "
            UPDATE blog.authors
            SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                user_name = COALESCE($4, user_name)
            WHERE author_snowflake = $1
            RETURNING author_snowflake, first_name, last_name, user_name
            ",
        )
        .bind(author_id.snowflake().get().cast_signed())
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.user_name.as_ref().map(UserName::get))
        .fetch_optional(&self.pool)
        .await?;

        let author = record.map(Author::try_from).transpose()?;
        Ok(author)
    }

    async fn delete_author(&self, author_id: Id<AuthorMarker>) -> Result<bool> {
        let result = query("DELETE FROM blog.authors WHERE author_snowflake = $1")
            .bind(author_id.snowflake().get().cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_posts(&self, filter: &PostFilter, limit: u32) -> Result<Vec<Post>> {
        let sql = format!(
            "{FULL_POST_SELECT}
            WHERE
                ($1::TEXT IS NULL OR posts.title = $1)
                AND ($2::BIGINT IS NULL OR posts.author_snowflake = $2)
            ORDER BY posts.post_snowflake
            LIMIT $3
            "
        );
        let records = query_as::<_, FullPostRecord>(&sql)
            .bind(filter.title.as_deref())
            .bind(
                filter
                    .author
                    .map(|author| author.snowflake().get().cast_signed()),
            )
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!("{FULL_POST_SELECT} WHERE posts.post_snowflake = $1");
        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.snowflake().get().cast_signed())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<PartialPost> {
        let post_snowflake = self.generate_snowflake()?;
        let created = post.created.unwrap_or_else(OffsetDateTime::now_utc);

        let record = query_as::<_, PartialPostRecord>(
            "
            INSERT INTO blog.posts
                (post_snowflake, title, content, author_snowflake, comments, created)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING post_snowflake, title, content, author_snowflake, comments, created
            ",
        )
        .bind(post_snowflake.get().cast_signed())
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.author.snowflake().get().cast_signed())
        .bind(Json(&post.comments))
        .bind(created)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    async fn update_post(&self, post_id: Id<PostMarker>, update: &UpdatePost) -> Result<bool> {
        let result = query(
            "
            UPDATE blog.posts
            SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                author_snowflake = COALESCE($4, author_snowflake)
            WHERE post_snowflake = $1
            ",
        )
        .bind(post_id.snowflake().get().cast_signed())
        .bind(update.title.as_deref())
        .bind(update.content.as_deref())
        .bind(
            update
                .author
                .map(|author| author.snowflake().get().cast_signed()),
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM blog.posts WHERE post_snowflake = $1")
            .bind(post_id.snowflake().get().cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_posts_by_author(&self, author_id: Id<AuthorMarker>) -> Result<u64> {
        let result = query("DELETE FROM blog.posts WHERE author_snowflake = $1")
            .bind(author_id.snowflake().get().cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }
}
