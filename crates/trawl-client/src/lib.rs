pub mod extract;
pub mod fetcher;
pub mod proxy;
pub mod user_agent;

pub use extract::{MovieExtractor, StockListingExtractor};
pub use fetcher::{ReqwestFetcher, SiteProfile};
pub use proxy::{PoolProxyBroker, ProxyConfig};
