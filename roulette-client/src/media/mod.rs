mod devices;
mod media_track;

pub use devices::*;
pub use media_track::*;
