//! Command registry.
//!
//! Every CLI command is a [`Handler`] registered under its name. Commands that
//! act on behalf of the logged-in user implement [`UserHandler`] instead and
//! are registered wrapped in [`LoggedIn`], which resolves the current user
//! from the config before the inner handler runs.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::db::{Database, User};
use crate::fetcher::Fetcher;
use crate::handlers;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument, usage: {0}")]
    MissingArgument(&'static str),
    #[error("user '{0}' does not exist")]
    UserNotFound(String),
    #[error("user '{0}' already exists")]
    UserExists(String),
    #[error("no user is logged in, run `login <name>` first")]
    NotLoggedIn,
    #[error("a feed with url {0} already exists")]
    FeedExists(String),
    #[error("no feed with url {0}")]
    FeedNotFound(String),
    #[error("already following '{0}'")]
    AlreadyFollowing(String),
    #[error("not following {0}")]
    NotFollowing(String),
    #[error("invalid interval '{input}': {reason}")]
    InvalidInterval { input: String, reason: String },
    #[error("invalid limit '{0}', expected a positive integer")]
    InvalidLimit(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write output")]
    Output(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Everything a handler may touch, passed explicitly instead of living in globals.
pub struct State {
    pub db: Database,
    pub fetcher: Fetcher,
    pub config: Config,
    pub config_path: PathBuf,
    pub out: Box<dyn Write + Send>,
}

impl State {
    pub fn new(db: Database, fetcher: Fetcher, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            fetcher,
            config,
            config_path,
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn with_output(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<(), CommandError>;
}

#[async_trait]
pub trait UserHandler: Send + Sync {
    async fn run(&self, state: &mut State, args: &[String], user: User)
        -> Result<(), CommandError>;
}

/// Runs the inner handler only when the config names an existing user.
pub struct LoggedIn<H>(pub H);

#[async_trait]
impl<H: UserHandler> Handler for LoggedIn<H> {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<(), CommandError> {
        let name = state
            .config
            .current_user()
            .ok_or(CommandError::NotLoggedIn)?
            .to_string();
        let user = state
            .db
            .get_user(&name)
            .await?
            .ok_or(CommandError::UserNotFound(name))?;

        self.0.run(state, args, user).await
    }
}

#[derive(Default)]
pub struct Commands {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Commands {
    pub fn register(&mut self, name: &'static str, handler: impl Handler + 'static) {
        self.handlers.insert(name, Box::new(handler));
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub async fn run(
        &self,
        state: &mut State,
        name: &str,
        args: &[String],
    ) -> Result<(), CommandError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
        handler.run(state, args).await
    }
}

/// The registry of every command the binary understands.
pub fn registry() -> Commands {
    let mut commands = Commands::default();
    commands.register("login", handlers::Login);
    commands.register("register", handlers::Register);
    commands.register("reset", handlers::Reset);
    commands.register("users", handlers::Users);
    commands.register("agg", handlers::Agg);
    commands.register("addfeed", LoggedIn(handlers::AddFeed));
    commands.register("feeds", handlers::Feeds);
    commands.register("follow", LoggedIn(handlers::Follow));
    commands.register("following", LoggedIn(handlers::Following));
    commands.register("unfollow", LoggedIn(handlers::Unfollow));
    commands.register("browse", LoggedIn(handlers::Browse));
    commands
}

/// The argument at `index`, or a usage error.
pub(crate) fn arg<'a>(
    args: &'a [String],
    index: usize,
    usage: &'static str,
) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(String::as_str)
        .ok_or(CommandError::MissingArgument(usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for Counting {
        async fn run(&self, _state: &mut State, _args: &[String]) -> Result<(), CommandError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Greet;

    #[async_trait]
    impl UserHandler for Greet {
        async fn run(
            &self,
            state: &mut State,
            _args: &[String],
            user: User,
        ) -> Result<(), CommandError> {
            writeln!(state.out, "hello {}", user.name)?;
            Ok(())
        }
    }

    async fn test_state(current_user: &str) -> State {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        let config = Config {
            db_url: "sqlite::memory:".to_string(),
            current_user_name: current_user.to_string(),
        };
        State::new(db, Fetcher::new().unwrap(), config, PathBuf::from("unused.json"))
            .with_output(std::io::sink())
    }

    #[test]
    fn test_registry_contains_every_command() {
        assert_eq!(
            registry().names(),
            vec![
                "addfeed",
                "agg",
                "browse",
                "feeds",
                "follow",
                "following",
                "login",
                "register",
                "reset",
                "unfollow",
                "users",
            ]
        );
    }

    #[test]
    fn test_arg_reports_usage() {
        let args = vec!["alice".to_string()];
        assert_eq!(arg(&args, 0, "login <name>").unwrap(), "alice");

        let err = arg(&args, 1, "addfeed <name> <url>").unwrap_err();
        assert_eq!(err.to_string(), "missing argument, usage: addfeed <name> <url>");
    }

    #[tokio::test]
    async fn test_run_dispatches_by_name() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut commands = Commands::default();
        commands.register("count", Counting(calls.clone()));

        let mut state = test_state("").await;
        commands.run(&mut state, "count", &[]).await.unwrap();
        commands.run(&mut state, "count", &[]).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_command_names_the_command() {
        let commands = Commands::default();
        let mut state = test_state("").await;

        let err = commands.run(&mut state, "frobnicate", &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::UnknownCommand(_)));
        assert_eq!(err.to_string(), "unknown command: frobnicate");
    }

    #[tokio::test]
    async fn test_logged_in_requires_current_user() {
        let mut state = test_state("").await;
        let err = LoggedIn(Greet).run(&mut state, &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_logged_in_requires_existing_user() {
        let mut state = test_state("ghost").await;
        let err = LoggedIn(Greet).run(&mut state, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "user 'ghost' does not exist");
    }

    #[tokio::test]
    async fn test_logged_in_passes_user_through() {
        let mut state = test_state("alice").await;
        state.db.create_user("alice").await.unwrap();

        let result = LoggedIn(Greet).run(&mut state, &[]).await;
        assert!(result.is_ok());
    }
}
