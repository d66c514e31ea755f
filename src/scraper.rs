use std::time::Duration;

use chrono::{DateTime, Utc, Weekday};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{Database, Feed, NewPost};
use crate::fetcher::Fetcher;
use crate::rss::RssItem;

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`,
/// after the leading weekday has been split off.
const PUB_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Result of one scheduler cycle that found a feed to fetch.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub feed: Feed,
    pub channel_title: String,
    pub stats: IngestStats,
}

pub struct Scraper {
    db: Database,
    fetcher: Fetcher,
}

impl Scraper {
    pub fn new(db: Database, fetcher: Fetcher) -> Self {
        Self { db, fetcher }
    }

    /// Run one cycle now and then one per `every`, forever. Cycles run back
    /// to back on this task so they never overlap; a failed cycle is logged
    /// and the next tick proceeds.
    pub async fn run(&self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.scrape_next_feed().await {
                error!("Feed cycle failed: {:#}", e);
            }
        }
    }

    /// Claim the least recently fetched feed, download it and store its posts.
    /// Returns `None` when there are no feeds at all.
    pub async fn scrape_next_feed(&self) -> anyhow::Result<Option<CycleReport>> {
        let Some(feed) = self.db.claim_next_feed().await? else {
            info!("No feeds to fetch");
            return Ok(None);
        };
        info!(feed = %feed.name, url = %feed.url, "Fetching feed");

        let rss = self.fetcher.fetch_feed(&feed.url).await?;
        let stats = ingest_items(&self.db, feed.id, &rss.channel.items).await?;

        info!(
            feed = %feed.name,
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            skipped = stats.skipped,
            "Stored posts for '{}'",
            rss.channel.title
        );

        Ok(Some(CycleReport {
            feed,
            channel_title: rss.channel.title,
            stats,
        }))
    }
}

/// Store every item of a fetched feed. A url that is already stored is
/// counted as a duplicate; any other database error stops the remaining items.
pub async fn ingest_items(
    db: &Database,
    feed_id: Uuid,
    items: &[RssItem],
) -> anyhow::Result<IngestStats> {
    let mut stats = IngestStats::default();

    for item in items {
        if item.link.trim().is_empty() {
            warn!("Skipping item with no link: {}", item.title);
            stats.skipped += 1;
            continue;
        }

        let published_at = parse_pub_date(&item.pub_date).unwrap_or_else(|| {
            warn!(pub_date = %item.pub_date, "Could not parse publish date, using current time");
            Utc::now()
        });

        let post = NewPost {
            title: &item.title,
            url: item.link.trim(),
            description: normalize_description(&item.description),
            published_at,
            feed_id,
        };

        if db.create_post(&post).await? {
            stats.inserted += 1;
        } else {
            stats.duplicates += 1;
        }
    }

    Ok(stats)
}

/// Empty descriptions are stored as absent rather than as an empty string.
pub fn normalize_description(description: &str) -> Option<&str> {
    (!description.is_empty()).then_some(description)
}

/// The weekday must be a valid name but is not checked against the date;
/// plenty of feeds get it wrong.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let (weekday, rest) = raw.trim().split_once(',')?;
    weekday.parse::<Weekday>().ok()?;

    DateTime::parse_from_str(rest.trim(), PUB_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a human-readable polling interval such as `30s`, `1m` or `1h30m`.
pub fn parse_interval(raw: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(raw.trim()).map_err(|e| e.to_string())?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}
