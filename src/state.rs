use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::models::{Favorite, FavoritePatch, UserId};

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("Database creation error: {0}")]
    RedbCreate(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Favorite {favorite_id} not found for user {user_id}")]
    MissingFavorite { user_id: String, favorite_id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent home of users' favorites and push tokens.
///
/// `merge_update` must only touch the fields set in the patch; everything else
/// on the stored record (including fields this crate does not know about)
/// survives the write.
pub trait FavoriteStore: Send + Sync {
    fn list_users(&self) -> Result<Vec<UserId>, StateError>;

    fn list_favorites(&self, user_id: &str) -> Result<Vec<Favorite>, StateError>;

    fn get_favorite(&self, user_id: &str, favorite_id: &str) -> Result<Option<Favorite>, StateError>;

    fn merge_update(&self, user_id: &str, favorite_id: &str, patch: &FavoritePatch) -> Result<(), StateError>;

    /// Push tokens for a user; an empty list means "nobody to notify".
    fn list_recipient_tokens(&self, user_id: &str) -> Result<Vec<String>, StateError>;
}

/// redb-backed store. Favorites are keyed by `(user, favorite id)` and kept
/// as JSON so unknown fields round-trip.
pub struct TrackerState {
    db: Arc<Database>,
}

impl TrackerState {
    const FAVORITES: TableDefinition<'_, (&str, &str), &[u8]> = TableDefinition::new("favorites");
    const TOKENS: TableDefinition<'_, &str, &[u8]> = TableDefinition::new("push_tokens");

    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, StateError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        Self::open(data_dir.as_ref().join(Config::DB_FILE_NAME))
    }

    /// Open (or create) the database file at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StateError> {
        let db = Database::create(db_path.as_ref())?;

        // Create tables up front so read transactions never hit a missing table.
        let write_txn = db.begin_write()?;
        {
            let _favorites = write_txn.open_table(Self::FAVORITES)?;
            let _tokens = write_txn.open_table(Self::TOKENS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========================================================================
    // FAVORITES
    // ========================================================================

    /// Insert or replace a whole favorite record.
    pub fn put_favorite(&self, user_id: &str, favorite: &Favorite) -> Result<(), StateError> {
        let bytes = serde_json::to_vec(favorite)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::FAVORITES)?;
            table.insert((user_id, favorite.id.as_str()), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Returns whether a record was removed.
    pub fn remove_favorite(&self, user_id: &str, favorite_id: &str) -> Result<bool, StateError> {
        let write_txn = self.db.begin_write()?;
        let removed = write_txn
            .open_table(Self::FAVORITES)?
            .remove((user_id, favorite_id))?
            .is_some();
        write_txn.commit()?;
        Ok(removed)
    }

    /// Every stored favorite with its owner, in key order.
    pub fn all_favorites(&self) -> Result<Vec<(UserId, Favorite)>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::FAVORITES)?;

        let mut favorites = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            let (user_id, _) = key.value();
            let favorite: Favorite = serde_json::from_slice(value.value())?;
            favorites.push((user_id.to_string(), favorite));
        }
        Ok(favorites)
    }

    pub fn favorite_count(&self) -> Result<usize, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::FAVORITES)?;
        Ok(table.len()? as usize)
    }

    // ========================================================================
    // PUSH TOKENS
    // ========================================================================

    /// Register a push token for a user. Returns false if it was already known.
    pub fn add_token(&self, user_id: &str, token: &str) -> Result<bool, StateError> {
        let write_txn = self.db.begin_write()?;
        let added = {
            let mut table = write_txn.open_table(Self::TOKENS)?;
            let mut tokens: Vec<String> = match table.get(user_id)? {
                Some(bytes) => serde_json::from_slice(bytes.value())?,
                None => Vec::new(),
            };
            if tokens.iter().any(|t| t == token) {
                false
            } else {
                tokens.push(token.to_string());
                let bytes = serde_json::to_vec(&tokens)?;
                table.insert(user_id, bytes.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(added)
    }

    /// Returns whether the token was registered.
    pub fn remove_token(&self, user_id: &str, token: &str) -> Result<bool, StateError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(Self::TOKENS)?;
            let mut tokens: Vec<String> = match table.get(user_id)? {
                Some(bytes) => serde_json::from_slice(bytes.value())?,
                None => Vec::new(),
            };
            let before = tokens.len();
            tokens.retain(|t| t != token);
            let removed = tokens.len() != before;
            if removed {
                let bytes = serde_json::to_vec(&tokens)?;
                table.insert(user_id, bytes.as_slice())?;
            }
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

impl FavoriteStore for TrackerState {
    fn list_users(&self) -> Result<Vec<UserId>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::FAVORITES)?;

        let mut users = BTreeSet::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            let (user_id, _) = key.value();
            users.insert(user_id.to_string());
        }
        Ok(users.into_iter().collect())
    }

    fn list_favorites(&self, user_id: &str) -> Result<Vec<Favorite>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::FAVORITES)?;

        let mut favorites = Vec::new();
        for entry in table.range((user_id, "")..)? {
            let (key, value) = entry?;
            let (owner, _) = key.value();
            if owner != user_id {
                break;
            }
            favorites.push(serde_json::from_slice(value.value())?);
        }
        Ok(favorites)
    }

    fn get_favorite(&self, user_id: &str, favorite_id: &str) -> Result<Option<Favorite>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::FAVORITES)?;
        match table.get((user_id, favorite_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn merge_update(&self, user_id: &str, favorite_id: &str, patch: &FavoritePatch) -> Result<(), StateError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::FAVORITES)?;
            let existing = table.get((user_id, favorite_id))?.map(|bytes| bytes.value().to_vec());
            let Some(existing) = existing else {
                return Err(StateError::MissingFavorite {
                    user_id: user_id.to_string(),
                    favorite_id: favorite_id.to_string(),
                });
            };

            let mut favorite: Favorite = serde_json::from_slice(&existing)?;
            patch.apply_to(&mut favorite);
            let bytes = serde_json::to_vec(&favorite)?;
            table.insert((user_id, favorite_id), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_recipient_tokens(&self, user_id: &str) -> Result<Vec<String>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::TOKENS)?;
        match table.get(user_id)? {
            Some(bytes) => Ok(serde_json::from_slice(bytes.value())?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryAppend, PricePoint};
    use crate::sites::SiteKey;
    use tempfile::TempDir;

    fn state() -> (TempDir, TrackerState) {
        let dir = TempDir::new().unwrap();
        let state = TrackerState::new(dir.path()).unwrap();
        (dir, state)
    }

    fn favorite(id: &str) -> Favorite {
        Favorite::new(id, SiteKey::Trendyol, format!("https://www.trendyol.com/{id}-p-1"), "")
    }

    #[test]
    fn test_state_creation() {
        let (_dir, state) = state();
        assert_eq!(state.favorite_count().unwrap(), 0);
        assert!(state.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_favorites_grouped_by_user() {
        let (_dir, state) = state();
        state.put_favorite("alice", &favorite("a1")).unwrap();
        state.put_favorite("alice", &favorite("a2")).unwrap();
        state.put_favorite("bob", &favorite("b1")).unwrap();
        state.put_favorite("alicia", &favorite("c1")).unwrap();

        assert_eq!(state.list_users().unwrap(), vec!["alice", "alicia", "bob"]);
        let ids: Vec<String> = state.list_favorites("alice").unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
        assert_eq!(state.list_favorites("bob").unwrap().len(), 1);
        assert!(state.list_favorites("carol").unwrap().is_empty());
        assert_eq!(state.all_favorites().unwrap().len(), 4);
        assert_eq!(state.favorite_count().unwrap(), 4);
    }

    #[test]
    fn test_get_through_store_trait() {
        let (_dir, state) = state();
        state.put_favorite("alice", &favorite("a1")).unwrap();

        let store: &dyn FavoriteStore = &state;
        let found = store.get_favorite("alice", "a1").unwrap().unwrap();
        assert_eq!(found.id, "a1");
        assert!(store.get_favorite("bob", "a1").unwrap().is_none());
    }

    #[test]
    fn test_merge_update_keeps_untouched_fields() {
        let (_dir, state) = state();
        let mut fav = favorite("a1");
        fav.extra.insert("name".to_string(), serde_json::json!("Kulaklık"));
        fav.last_price = Some(500.0);
        fav.last_error = Some("HTTP 503".to_string());
        state.put_favorite("alice", &fav).unwrap();

        let patch = FavoritePatch {
            last_checked_at: Some(10),
            next_try_at: Some(20),
            last_error: Some(None),
            append_history: Some(HistoryAppend {
                entry: PricePoint { timestamp: 10, price: 450.0 },
                cap: 120,
            }),
            ..Default::default()
        };
        state.merge_update("alice", "a1", &patch).unwrap();

        let stored = state.get_favorite("alice", "a1").unwrap().unwrap();
        assert_eq!(stored.name(), Some("Kulaklık"));
        assert_eq!(stored.last_price, Some(500.0));
        assert_eq!(stored.last_checked_at, Some(10));
        assert_eq!(stored.next_try_at, Some(20));
        assert_eq!(stored.last_error, None);
        assert_eq!(stored.history, vec![PricePoint { timestamp: 10, price: 450.0 }]);
        assert_eq!(stored.url, fav.url);
    }

    #[test]
    fn test_merge_update_missing_favorite() {
        let (_dir, state) = state();
        let err = state.merge_update("alice", "nope", &FavoritePatch::default()).unwrap_err();
        assert!(matches!(err, StateError::MissingFavorite { .. }));
    }

    #[test]
    fn test_tokens() {
        let (_dir, state) = state();
        assert!(state.list_recipient_tokens("alice").unwrap().is_empty());
        assert!(state.add_token("alice", "tok-1").unwrap());
        assert!(!state.add_token("alice", "tok-1").unwrap());
        assert!(state.add_token("alice", "tok-2").unwrap());
        assert_eq!(state.list_recipient_tokens("alice").unwrap(), vec!["tok-1", "tok-2"]);
        assert!(state.remove_token("alice", "tok-1").unwrap());
        assert!(!state.remove_token("alice", "tok-1").unwrap());
        assert_eq!(state.list_recipient_tokens("alice").unwrap(), vec!["tok-2"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let state = TrackerState::new(dir.path()).unwrap();
            state.put_favorite("alice", &favorite("a1")).unwrap();
        }
        let state = TrackerState::new(dir.path()).unwrap();
        assert!(state.get_favorite("alice", "a1").unwrap().is_some());
        assert!(state.remove_favorite("alice", "a1").unwrap());
        assert!(state.get_favorite("alice", "a1").unwrap().is_none());
    }
}
