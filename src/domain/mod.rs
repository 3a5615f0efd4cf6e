pub mod aggregate;
pub mod feed;
pub mod identity;
pub mod item;

pub use aggregate::Aggregate;
pub use feed::{Feed, FeedMetadata, Folder, ViewType};
pub use identity::{resolve_id, resolve_value_id, GuidValue, RawItem};
pub use item::{parse_date, FeedItem};
