pub mod local_feed;
pub mod remote_feed;
pub mod view_promoter;

pub use local_feed::LocalFeed;
pub use remote_feed::RemoteFeed;
pub use view_promoter::ViewPromoter;
