pub mod linkgraph;
pub mod ports;
pub mod textindex;
