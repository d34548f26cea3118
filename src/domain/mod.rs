// Domain layer: count records, reference data and ports. No I/O.

pub mod catalog;
pub mod model;
pub mod ports;
