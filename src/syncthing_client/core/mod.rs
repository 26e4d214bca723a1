mod aggregator;
mod http;

pub use aggregator::DataAggregator;
pub use http::HttpClient;
