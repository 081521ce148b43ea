pub mod cache;
pub mod campaigns;
pub mod donations;
pub mod error;
pub mod sanitize;
pub mod slug;
pub mod summary;

pub use cache::LedgerCaches;
pub use campaigns::CampaignService;
pub use donations::DonationService;
pub use error::Error;
pub use summary::SummaryService;
