mod validated;
mod tracing_layer;
mod metrics_layer;

pub use validated::*;
pub use tracing_layer::*;
pub use metrics_layer::*;
