pub mod holding_queries;
pub mod portfolio_queries;
pub mod ticker_queries;
