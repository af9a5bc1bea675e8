//! USD pricing: the external feed, the refreshed price cache and conversion on top of it.

pub mod cache;
pub mod clock;
pub mod conversion;
pub mod feed;

pub use cache::{
    PriceCache, PricePoint, PriceSnapshot, RefreshOutcome, SnapshotSource, FALLBACK_PRICES,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use conversion::{
    convert_with_snapshot, lookup_price, Conversion, PriceLookup, UsdConverter, FALLBACK_FEED_IDS,
};
pub use feed::{FeedPrices, FeedQuote, HttpPriceFeed, PriceFeed};
