//! User settings persisted as scalars in the `settings` table.
use thiserror::Error;
use tracing::warn;

use crate::db::{self, Pool};
use crate::error::StorageError;
use crate::model::DateLocale;

pub const MIN_LOAD_LIMIT: usize = 1;
pub const MAX_LOAD_LIMIT: usize = 100;
pub const DEFAULT_LOAD_LIMIT: usize = 40;

const KEY_LOAD_LIMIT: &str = "load_limit";
const KEY_DATE_LOCALE: &str = "date_locale";
const KEY_ENTERS_READER: &str = "enters_reader";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("load limit {0} outside 1..=100")]
    LoadLimitOutOfRange(usize),
    #[error("unknown date locale: {0}")]
    UnknownLocale(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Number of feed items fetched per cycle.
    pub load_limit: usize,
    /// Only read by the presentation layer.
    pub date_locale: DateLocale,
    /// Open links in reader mode when available.
    pub enters_reader: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            load_limit: DEFAULT_LOAD_LIMIT,
            date_locale: DateLocale::default(),
            enters_reader: true,
        }
    }
}

pub fn validate_load_limit(limit: usize) -> Result<usize, SettingsError> {
    if (MIN_LOAD_LIMIT..=MAX_LOAD_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(SettingsError::LoadLimitOutOfRange(limit))
    }
}

pub fn parse_locale_arg(raw: &str) -> Result<DateLocale, SettingsError> {
    DateLocale::parse_locale(raw).ok_or_else(|| SettingsError::UnknownLocale(raw.to_string()))
}

impl Settings {
    /// Read persisted settings. Missing or unreadable values fall back to defaults.
    pub async fn load(pool: &Pool) -> Result<Self, StorageError> {
        let mut settings = Settings::default();

        if let Some(raw) = db::get_setting(pool, KEY_LOAD_LIMIT).await? {
            match raw.parse::<usize>().ok().map(validate_load_limit) {
                Some(Ok(limit)) => settings.load_limit = limit,
                _ => warn!(value = %raw, "ignoring invalid stored load_limit"),
            }
        }
        if let Some(raw) = db::get_setting(pool, KEY_DATE_LOCALE).await? {
            match DateLocale::parse_locale(&raw) {
                Some(locale) => settings.date_locale = locale,
                None => warn!(value = %raw, "ignoring invalid stored date_locale"),
            }
        }
        if let Some(raw) = db::get_setting(pool, KEY_ENTERS_READER).await? {
            match raw.parse::<bool>() {
                Ok(v) => settings.enters_reader = v,
                Err(_) => warn!(value = %raw, "ignoring invalid stored enters_reader"),
            }
        }
        Ok(settings)
    }

    pub async fn persist_load_limit(pool: &Pool, limit: usize) -> Result<(), SettingsError> {
        let limit = validate_load_limit(limit)?;
        db::put_setting(pool, KEY_LOAD_LIMIT, &limit.to_string()).await?;
        Ok(())
    }

    pub async fn persist_date_locale(pool: &Pool, locale: DateLocale) -> Result<(), SettingsError> {
        db::put_setting(pool, KEY_DATE_LOCALE, locale.as_str()).await?;
        Ok(())
    }

    pub async fn persist_enters_reader(pool: &Pool, enabled: bool) -> Result<(), SettingsError> {
        db::put_setting(pool, KEY_ENTERS_READER, &enabled.to_string()).await?;
        Ok(())
    }
}
