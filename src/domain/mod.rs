pub mod error;
pub mod linkgraph;
pub mod partition;
pub mod textindex;

pub use error::{Error, ErrorKind, Result};
