// Domain layer: core models and ports (interfaces). No transport or storage details.

pub mod model;
pub mod ports;
