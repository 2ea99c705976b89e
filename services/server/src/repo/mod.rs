pub mod chunks;
pub mod producer_state;
pub mod streams;

pub use chunks::Chunk;
pub use streams::Stream;
