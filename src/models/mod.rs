mod commentary;
mod filing_chunk;
mod holding;
mod portfolio;
mod ticker;

pub use commentary::{PortfolioCommentaryResponse, PortfolioOverview, TickerCommentary, TickerOutcome};
pub use filing_chunk::FilingChunk;
pub use holding::PortfolioHolding;
pub use portfolio::UserPortfolio;
pub use ticker::TickerInfo;
