mod online_counts;
mod presence_tracker;

pub use online_counts::*;
pub use presence_tracker::*;
