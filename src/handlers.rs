use std::io::Write;

use async_trait::async_trait;

use crate::commands::{arg, CommandError, Handler, State, UserHandler};
use crate::db::User;
use crate::scraper::{parse_interval, Scraper};

const DEFAULT_BROWSE_LIMIT: i64 = 2;

pub struct Login;

#[async_trait]
impl Handler for Login {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<(), CommandError> {
        let name = arg(args, 0, "login <name>")?;
        let user = state
            .db
            .get_user(name)
            .await?
            .ok_or_else(|| CommandError::UserNotFound(name.to_string()))?;

        state.config.set_user(&user.name, &state.config_path)?;
        writeln!(state.out, "Logged in as {}", user.name)?;
        Ok(())
    }
}

pub struct Register;

#[async_trait]
impl Handler for Register {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<(), CommandError> {
        let name = arg(args, 0, "register <name>")?;
        let user = state
            .db
            .create_user(name)
            .await?
            .ok_or_else(|| CommandError::UserExists(name.to_string()))?;

        state.config.set_user(&user.name, &state.config_path)?;
        writeln!(state.out, "Created user {} ({})", user.name, user.id)?;
        Ok(())
    }
}

pub struct Reset;

#[async_trait]
impl Handler for Reset {
    async fn run(&self, state: &mut State, _args: &[String]) -> Result<(), CommandError> {
        let deleted = state.db.delete_all_users().await?;
        writeln!(state.out, "Deleted {} users", deleted)?;
        Ok(())
    }
}

pub struct Users;

#[async_trait]
impl Handler for Users {
    async fn run(&self, state: &mut State, _args: &[String]) -> Result<(), CommandError> {
        let users = state.db.get_users().await?;
        let current = state.config.current_user();

        for user in &users {
            if current == Some(user.name.as_str()) {
                writeln!(state.out, "* {} (current)", user.name)?;
            } else {
                writeln!(state.out, "* {}", user.name)?;
            }
        }
        Ok(())
    }
}

pub struct Agg;

#[async_trait]
impl Handler for Agg {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<(), CommandError> {
        let raw = arg(args, 0, "agg <interval>")?;
        let interval = parse_interval(raw).map_err(|reason| CommandError::InvalidInterval {
            input: raw.to_string(),
            reason,
        })?;

        writeln!(
            state.out,
            "Collecting feeds every {}",
            humantime::format_duration(interval)
        )?;
        state.out.flush()?;

        let scraper = Scraper::new(state.db.clone(), state.fetcher.clone());
        scraper.run(interval).await;
        Ok(())
    }
}

pub struct AddFeed;

#[async_trait]
impl UserHandler for AddFeed {
    async fn run(
        &self,
        state: &mut State,
        args: &[String],
        user: User,
    ) -> Result<(), CommandError> {
        const USAGE: &str = "addfeed <name> <url>";
        let name = arg(args, 0, USAGE)?;
        let url = arg(args, 1, USAGE)?;

        let feed = state
            .db
            .create_feed(name, url, user.id)
            .await?
            .ok_or_else(|| CommandError::FeedExists(url.to_string()))?;
        writeln!(state.out, "Added feed {} ({})", feed.name, feed.url)?;

        // The creator always follows a feed they add
        if let Some(follow) = state.db.create_feed_follow(user.id, feed.id).await? {
            writeln!(state.out, "{} now follows {}", follow.user_name, follow.feed_name)?;
        }
        Ok(())
    }
}

pub struct Feeds;

#[async_trait]
impl Handler for Feeds {
    async fn run(&self, state: &mut State, _args: &[String]) -> Result<(), CommandError> {
        let feeds = state.db.get_feeds().await?;

        for feed in &feeds {
            writeln!(
                state.out,
                "Name: {}, URL: {}, User: {}",
                feed.name, feed.url, feed.user_name
            )?;
        }
        Ok(())
    }
}

pub struct Follow;

#[async_trait]
impl UserHandler for Follow {
    async fn run(
        &self,
        state: &mut State,
        args: &[String],
        user: User,
    ) -> Result<(), CommandError> {
        let url = arg(args, 0, "follow <url>")?;
        let feed = state
            .db
            .get_feed_by_url(url)
            .await?
            .ok_or_else(|| CommandError::FeedNotFound(url.to_string()))?;

        let follow = state
            .db
            .create_feed_follow(user.id, feed.id)
            .await?
            .ok_or_else(|| CommandError::AlreadyFollowing(feed.name.clone()))?;

        writeln!(state.out, "{} now follows {}", follow.user_name, follow.feed_name)?;
        Ok(())
    }
}

pub struct Following;

#[async_trait]
impl UserHandler for Following {
    async fn run(
        &self,
        state: &mut State,
        _args: &[String],
        user: User,
    ) -> Result<(), CommandError> {
        let follows = state.db.get_feed_follows_for_user(user.id).await?;

        writeln!(state.out, "Feeds followed by {}:", user.name)?;
        for follow in &follows {
            writeln!(state.out, "* {}", follow.feed_name)?;
        }
        Ok(())
    }
}

pub struct Unfollow;

#[async_trait]
impl UserHandler for Unfollow {
    async fn run(
        &self,
        state: &mut State,
        args: &[String],
        user: User,
    ) -> Result<(), CommandError> {
        let url = arg(args, 0, "unfollow <url>")?;
        let feed_name = state
            .db
            .delete_feed_follow(user.id, url)
            .await?
            .ok_or_else(|| CommandError::NotFollowing(url.to_string()))?;

        writeln!(state.out, "{} unfollowed {}", user.name, feed_name)?;
        Ok(())
    }
}

pub struct Browse;

#[async_trait]
impl UserHandler for Browse {
    async fn run(
        &self,
        state: &mut State,
        args: &[String],
        user: User,
    ) -> Result<(), CommandError> {
        let limit = match args.first() {
            Some(raw) => parse_limit(raw)?,
            None => DEFAULT_BROWSE_LIMIT,
        };

        let posts = state.db.get_posts_for_user(user.id, limit).await?;

        for post in &posts {
            writeln!(
                state.out,
                "{} {}",
                post.published_at.format("%Y-%m-%d %H:%M"),
                post.title
            )?;
            writeln!(state.out, "    {}", post.url)?;
        }
        Ok(())
    }
}

fn parse_limit(raw: &str) -> Result<i64, CommandError> {
    match raw.trim().parse::<i64>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(CommandError::InvalidLimit(raw.to_string())),
    }
}
