pub mod aggregate;
pub mod facts;

pub use aggregate::{Aggregate, TopicFacts, aggregate};
pub use facts::dedupe_preserve_order;
