//! Gator - a command-line RSS aggregator
//!
//! Users register, follow RSS feeds and browse the posts that a polling loop
//! collects into a SQLite database.

pub mod commands;
pub mod config;
pub mod db;
pub mod fetcher;
pub mod handlers;
pub mod rss;
pub mod scraper;
