pub mod model;
pub mod paths;
pub mod utils;

pub use model::*;
