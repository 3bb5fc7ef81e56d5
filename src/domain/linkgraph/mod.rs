pub mod link;

pub use link::{Edge, Link};
