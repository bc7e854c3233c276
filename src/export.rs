use serde::Serialize;
use std::io::Write;

use crate::models::{Favorite, PricePoint, UserId};

/// One favorite flattened for JSONL export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord<'a> {
    pub user_id: &'a str,
    pub favorite_id: &'a str,
    pub site: &'a str,
    pub name: Option<&'a str>,
    pub url: Option<String>,
    pub last_price: Option<f64>,
    pub last_checked_at: Option<i64>,
    pub last_success_at: Option<i64>,
    pub next_try_at: Option<i64>,
    pub last_error: Option<&'a str>,
    pub history: &'a [PricePoint],
}

impl<'a> ExportRecord<'a> {
    pub fn new(user_id: &'a str, favorite: &'a Favorite) -> Self {
        Self {
            user_id,
            favorite_id: &favorite.id,
            site: favorite.site_key.as_str(),
            name: favorite.name(),
            url: favorite.target_url(),
            last_price: favorite.last_price,
            last_checked_at: favorite.last_checked_at,
            last_success_at: favorite.last_success_at,
            next_try_at: favorite.next_try_at,
            last_error: favorite.last_error.as_deref(),
            history: &favorite.history,
        }
    }
}

/// Write each favorite as a single line of JSON. Returns the number of lines.
pub fn export_to_jsonl<'a, W, I>(favorites: I, writer: &mut W) -> Result<usize, Box<dyn std::error::Error>>
where
    W: Write,
    I: IntoIterator<Item = &'a (UserId, Favorite)>,
{
    let mut count = 0;
    for (user_id, favorite) in favorites {
        serde_json::to_writer(&mut *writer, &ExportRecord::new(user_id, favorite))?;
        writer.write_all(b"\n")?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}
