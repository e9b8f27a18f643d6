// Domain layer: request model and the ports the relay talks through.

pub mod model;
pub mod ports;
