mod memory_store;
mod rendezvous_store;

pub use memory_store::*;
pub use rendezvous_store::*;
