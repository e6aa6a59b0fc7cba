pub mod gateway;
pub mod page_fetcher;

pub use gateway::HttpGateway;
pub use page_fetcher::GatewayPageFetcher;
