//! Notification bell: feed aggregation and background polling

mod aggregator;
mod poller;

pub use aggregator::{unread_count, FeedLimits, NotificationAggregator};
pub use poller::NotificationPoller;
