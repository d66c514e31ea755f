use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// A feed joined with the name of the user who added it.
#[derive(Debug, Clone, FromRow)]
pub struct FeedWithOwner {
    pub name: String,
    pub url: String,
    pub user_name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedFollow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub user_name: String,
    pub feed_name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub feed_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub description: Option<&'a str>,
    pub published_at: DateTime<Utc>,
    pub feed_id: Uuid,
}

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

const FEED_FOLLOW_SELECT: &str = r#"
    SELECT
        feed_follows.id AS id,
        feed_follows.created_at AS created_at,
        feed_follows.updated_at AS updated_at,
        feed_follows.user_id AS user_id,
        feed_follows.feed_id AS feed_id,
        users.name AS user_name,
        feeds.name AS feed_name
    FROM feed_follows
    JOIN users ON users.id = feed_follows.user_id
    JOIN feeds ON feeds.id = feed_follows.feed_id
"#;

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                last_fetched_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_follows (
                id BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                UNIQUE(user_id, feed_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                description TEXT,
                published_at TEXT NOT NULL,
                feed_id BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_feed_published
            ON posts(feed_id, published_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns `None` when a user with this name already exists.
    pub async fn create_user(&self, name: &str) -> anyhow::Result<Option<User>> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, created_at, updated_at, name)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            RETURNING id, created_at, updated_at, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user(&self, name: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_users(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Deletes every user; feeds, follows and posts go with them.
    pub async fn delete_all_users(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Returns `None` when a feed with this url already exists.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Feed>> {
        let now = Utc::now();
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            RETURNING {FEED_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> anyhow::Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn get_feeds(&self) -> anyhow::Result<Vec<FeedWithOwner>> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT feeds.name AS name, feeds.url AS url, users.name AS user_name
            FROM feeds
            JOIN users ON users.id = feeds.user_id
            ORDER BY feeds.created_at, feeds.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// The feed fetched longest ago; never-fetched feeds come first.
    pub async fn next_feed_to_fetch(&self) -> anyhow::Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT * FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn mark_feed_fetched(&self, feed_id: Uuid) -> anyhow::Result<()> {
        let now = Utc::now();
        sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Selects the next feed to fetch and stamps it fetched in one statement.
    pub async fn claim_next_feed(&self) -> anyhow::Result<Option<Feed>> {
        let now = Utc::now();
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?1, updated_at = ?1
            WHERE id = (
                SELECT id FROM feeds
                ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC
                LIMIT 1
            )
            RETURNING {FEED_COLUMNS}
            "#
        ))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Returns `None` when the user already follows the feed.
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> anyhow::Result<Option<FeedFollow>> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, feed_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let follow = sqlx::query_as::<_, FeedFollow>(&format!(
            "{FEED_FOLLOW_SELECT} WHERE feed_follows.id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(follow))
    }

    pub async fn get_feed_follows_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<FeedFollow>> {
        let follows = sqlx::query_as::<_, FeedFollow>(&format!(
            "{FEED_FOLLOW_SELECT} WHERE feed_follows.user_id = ? ORDER BY feeds.name"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(follows)
    }

    /// Returns the unfollowed feed's name, or `None` if there was nothing to delete.
    pub async fn delete_feed_follow(&self, user_id: Uuid, url: &str) -> anyhow::Result<Option<String>> {
        let Some(feed) = self.get_feed_by_url(url).await? else {
            return Ok(None);
        };

        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed.id)
            .execute(&self.pool)
            .await?;

        Ok((result.rows_affected() > 0).then_some(feed.name))
    }

    /// Inserts a post unless one with the same url exists. Returns whether a row was written.
    pub async fn create_post(&self, post: &NewPost<'_>) -> anyhow::Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(post.title)
        .bind(post.url)
        .bind(post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Posts from the feeds a user follows, most recently published first.
    pub async fn get_posts_for_user(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT posts.* FROM posts
            JOIN feed_follows ON feed_follows.feed_id = posts.feed_id
            WHERE feed_follows.user_id = ?
            ORDER BY posts.published_at DESC, posts.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}
