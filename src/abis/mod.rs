pub mod campaign;
pub mod token;

pub use campaign::{CampaignInfo, Donation, ICampaignRegistry};
pub use token::IERC20Metadata;
