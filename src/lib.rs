pub mod backoff;
pub mod cli;
pub mod config;
pub mod export;
pub mod extraction;
pub mod logging;
pub mod models;
pub mod network;
pub mod notifier;
pub mod orchestration;
pub mod policy;
pub mod sites;
pub mod state;
pub mod tracker;

// Re-export main types for library usage
pub use config::{Config, ConfigError, TrackerConfig};
pub use extraction::{extract_price, extract_price_match, parse_price, PriceMatch, Strategy};
pub use models::{Favorite, FavoritePatch, PricePoint, UserId};
pub use network::{FetchError, FetchResult, HttpClient, PageFetcher};
pub use notifier::{Notifier, NotifyError, PushMessage, PushTransport};
pub use policy::{CheckError, PriceDrop, UpdatePolicy};
pub use sites::{default_selectors, selectors_for, PageKind, SiteKey};
pub use state::{FavoriteStore, StateError, TrackerState};
pub use tracker::{PriceTracker, RunSummary, TrackerError};
