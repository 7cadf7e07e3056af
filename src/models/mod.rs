//! Data units that flow through the stream: chunk descriptors discovered by data interfaces and
//! records handed to the consumer.

pub mod chunk;
pub mod record;

pub use chunk::*;
pub use record::*;

pub use bgpkit_parser::models::BgpElem;
