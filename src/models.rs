use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sites::SiteKey;

/// Opaque user grouping key.
pub type UserId = String;

/// One observed price at a point in time (milliseconds since epoch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

/// A user's tracked product plus its observed-price state.
///
/// Fields the tracker does not own (display name, creation time, anything the
/// UI layer adds later) are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: String,
    #[serde(default)]
    pub site_key: SiteKey,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_try_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub history: Vec<PricePoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Favorite {
    pub fn new(id: impl Into<String>, site_key: SiteKey, url: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            site_key,
            url: url.into(),
            query: query.into(),
            last_price: None,
            last_checked_at: None,
            last_success_at: None,
            next_try_at: None,
            last_error: None,
            history: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Display name set by the UI layer, if any.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }

    /// The page the tracker fetches: the stored URL, or the site's search page
    /// for `query` when no URL was given.
    pub fn target_url(&self) -> Option<String> {
        let url = self.url.trim();
        if !url.is_empty() {
            return Some(url.to_string());
        }
        self.site_key.search_url(&self.query)
    }
}

/// Appends one history entry, trimming the oldest entries past `cap`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryAppend {
    pub entry: PricePoint,
    pub cap: usize,
}

/// Partial write produced by one check. Only fields set here are touched.
///
/// `last_error: Some(None)` clears the stored error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FavoritePatch {
    pub last_checked_at: Option<i64>,
    pub last_success_at: Option<i64>,
    pub next_try_at: Option<i64>,
    pub last_price: Option<f64>,
    pub last_error: Option<Option<String>>,
    pub append_history: Option<HistoryAppend>,
}

impl FavoritePatch {
    pub fn apply_to(&self, favorite: &mut Favorite) {
        if let Some(ts) = self.last_checked_at {
            favorite.last_checked_at = Some(ts);
        }
        if let Some(ts) = self.last_success_at {
            favorite.last_success_at = Some(ts);
        }
        if let Some(ts) = self.next_try_at {
            favorite.next_try_at = Some(ts);
        }
        if let Some(price) = self.last_price {
            favorite.last_price = Some(price);
        }
        if let Some(error) = &self.last_error {
            favorite.last_error = error.clone();
        }
        if let Some(append) = self.append_history {
            push_history(&mut favorite.history, append.entry, append.cap);
        }
    }
}

/// Append to a time-ordered history and drop the oldest entries past `cap`.
/// An entry older than the current tail is clamped to the tail's timestamp.
pub fn push_history(history: &mut Vec<PricePoint>, mut entry: PricePoint, cap: usize) {
    if let Some(last) = history.last() {
        if entry.timestamp < last.timestamp {
            entry.timestamp = last.timestamp;
        }
    }
    history.push(entry);
    if history.len() > cap {
        let excess = history.len() - cap;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_fields_survive_round_trip() {
        let raw = r#"{
            "id": "fav-1",
            "siteKey": "trendyol",
            "url": "https://www.trendyol.com/x-p-1",
            "query": "kulaklik",
            "name": "Headphones",
            "createdAt": 1700000000000
        }"#;
        let favorite: Favorite = serde_json::from_str(raw).unwrap();
        assert_eq!(favorite.name(), Some("Headphones"));
        assert_eq!(favorite.site_key, SiteKey::Trendyol);

        let written = serde_json::to_value(&favorite).unwrap();
        assert_eq!(written["createdAt"], 1700000000000_i64);
        assert_eq!(written["name"], "Headphones");
        assert!(written.get("lastPrice").is_none());
    }

    #[test]
    fn test_unknown_site_key_maps_to_other() {
        let favorite: Favorite =
            serde_json::from_str(r#"{"id":"a","siteKey":"somewhere-new","url":"https://x.test"}"#).unwrap();
        assert_eq!(favorite.site_key, SiteKey::Other);
    }

    #[test]
    fn test_target_url_falls_back_to_search() {
        let favorite = Favorite::new("a", SiteKey::Hepsiburada, "", "airfryer xl");
        let url = favorite.target_url().unwrap();
        assert!(url.starts_with("https://www.hepsiburada.com/ara?q="));
        assert!(url.contains("airfryer"));

        let orphan = Favorite::new("b", SiteKey::Other, "  ", "anything");
        assert!(orphan.target_url().is_none());
    }

    #[test]
    fn test_push_history_caps_from_head() {
        let mut history = Vec::new();
        for i in 0..5 {
            push_history(&mut history, PricePoint { timestamp: i, price: i as f64 }, 3);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].timestamp, 2);
        assert_eq!(history[2].timestamp, 4);
    }

    #[test]
    fn test_push_history_keeps_time_order() {
        let mut history = vec![PricePoint { timestamp: 100, price: 1.0 }];
        push_history(&mut history, PricePoint { timestamp: 50, price: 2.0 }, 10);
        assert_eq!(history[1].timestamp, 100);
    }

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut favorite = Favorite::new("a", SiteKey::N11, "https://www.n11.com/urun/x", "");
        favorite.last_price = Some(500.0);
        favorite.extra.insert("name".into(), Value::String("Kettle".into()));

        let patch = FavoritePatch {
            last_checked_at: Some(10),
            next_try_at: Some(20),
            last_error: Some(Some("HTTP 503".into())),
            ..Default::default()
        };
        patch.apply_to(&mut favorite);

        assert_eq!(favorite.last_price, Some(500.0));
        assert_eq!(favorite.last_error.as_deref(), Some("HTTP 503"));
        assert_eq!(favorite.name(), Some("Kettle"));
        assert!(favorite.history.is_empty());

        let clear = FavoritePatch {
            last_error: Some(None),
            ..Default::default()
        };
        clear.apply_to(&mut favorite);
        assert!(favorite.last_error.is_none());
    }
}
