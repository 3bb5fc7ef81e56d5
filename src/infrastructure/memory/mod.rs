pub mod graph;

pub use graph::InMemoryGraph;
