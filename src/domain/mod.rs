// Domain layer: Netilion API objects and the parsing contract they share.

pub mod model;
pub mod ports;
