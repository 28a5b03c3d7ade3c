mod envelope;
mod metrics;
mod port;

pub use envelope::*;
pub use metrics::*;
pub use port::*;
