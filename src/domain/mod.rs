// Domain layer: core models and ports (interfaces). No hardware access here.

pub mod model;
pub mod ports;
