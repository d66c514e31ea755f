//! RSS 2.0 document model.
//!
//! Only the fields the aggregator stores are modelled; everything else in the
//! feed is ignored during deserialization.

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::DeError;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RssFeed {
    pub channel: Channel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub title: String,
    /// Text of the first non-empty `<link>`. Channels often carry an
    /// `<atom:link href=".." rel="self"/>` next to it, which arrives under
    /// the same local name.
    #[serde(default, deserialize_with = "first_link_text")]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "item", default)]
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RssItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "pubDate", default)]
    pub pub_date: String,
}

#[derive(Deserialize)]
struct LinkElement {
    #[serde(rename = "$text", default)]
    text: String,
}

fn first_link_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let links = Vec::<LinkElement>::deserialize(deserializer)?;
    Ok(links
        .into_iter()
        .map(|link| link.text.trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_default())
}

/// Parse an RSS document and decode HTML entities in titles and descriptions.
pub fn parse(bytes: &[u8]) -> Result<RssFeed, DeError> {
    let mut feed: RssFeed = quick_xml::de::from_reader(bytes)?;
    feed.decode_entities();
    Ok(feed)
}

impl RssFeed {
    fn decode_entities(&mut self) {
        let channel = &mut self.channel;
        channel.title = unescape_html(&channel.title);
        channel.description = unescape_html(&channel.description);

        for item in &mut channel.items {
            item.title = unescape_html(&item.title);
            item.description = unescape_html(&item.description);
        }
    }
}

/// Decode named and numeric HTML entities one reference at a time. A bare
/// `&` or an unknown reference is copied through as written.
pub fn unescape_html(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        match decode_reference(tail) {
            Some((value, consumed)) => {
                decoded.push_str(&value);
                rest = &tail[consumed..];
            }
            None => {
                decoded.push('&');
                rest = &tail[1..];
            }
        }
    }

    decoded.push_str(rest);
    decoded
}

/// Decode the `&name;` or `&#num;` reference at the start of `tail`, returning
/// the replacement and the number of bytes it spans.
fn decode_reference(tail: &str) -> Option<(String, usize)> {
    let end = tail.find(';')?;
    let name = &tail[1..end];
    if name.is_empty() || name.contains(|c: char| c == '&' || c.is_whitespace()) {
        return None;
    }

    let reference = &tail[..=end];
    let value = unescape_with(reference, resolve_html5_entity).ok()?;
    Some((value.into_owned(), reference.len()))
}
