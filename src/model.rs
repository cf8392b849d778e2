use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a remote item as published by the feed endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded remote record. Field names follow the item endpoint's JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    #[serde(rename = "by")]
    pub author: String,
    #[serde(rename = "descendants")]
    pub descendant_count: i64,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(rename = "time", default)]
    pub created_at: Option<i64>,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl Item {
    pub fn item_id(&self) -> ItemId {
        ItemId(self.id)
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}

/// Fields captured from an [`Item`] when it is saved; `saved_at` and the
/// row sequence are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFavorite {
    pub item_id: i64,
    pub author: String,
    pub descendant_count: i64,
    pub score: Option<i64>,
    pub created_at: Option<i64>,
    pub title: String,
    pub kind: String,
    pub url: Option<String>,
}

impl From<&Item> for NewFavorite {
    fn from(item: &Item) -> Self {
        Self {
            item_id: item.id,
            author: item.author.clone(),
            descendant_count: item.descendant_count,
            score: item.score,
            created_at: item.created_at,
            title: item.title.clone(),
            kind: item.kind.clone(),
            url: item.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteRecord {
    /// Monotonic insertion sequence; breaks `saved_at` ties.
    pub seq: i64,
    pub item_id: i64,
    pub author: String,
    pub descendant_count: i64,
    pub score: Option<i64>,
    pub created_at: Option<i64>,
    pub title: String,
    pub kind: String,
    pub url: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl FavoriteRecord {
    pub fn to_item(&self) -> Item {
        Item {
            id: self.item_id,
            author: self.author.clone(),
            descendant_count: self.descendant_count,
            score: self.score,
            created_at: self.created_at,
            title: self.title.clone(),
            kind: self.kind.clone(),
            url: self.url.clone(),
        }
    }

    /// Listing order: newest `saved_at` first, later insertions first on ties.
    pub fn listing_cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .saved_at
            .cmp(&self.saved_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DateLocale {
    #[default]
    EnUs,
    ItIt,
}

impl DateLocale {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateLocale::EnUs => "en_US",
            DateLocale::ItIt => "it_IT",
        }
    }

    pub fn parse_locale(s: &str) -> Option<Self> {
        match s {
            "en_US" => Some(DateLocale::EnUs),
            "it_IT" => Some(DateLocale::ItIt),
            _ => None,
        }
    }
}
