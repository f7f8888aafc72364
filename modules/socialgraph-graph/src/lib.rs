pub mod client;
pub mod migrate;
pub mod reader;
pub mod writer;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use neo4rs::query;
pub use reader::{GraphCounts, GraphReader, GroupDegree, MutualPair, UserDegree, UserRef};
pub use writer::GraphWriter;
