mod node_id;
mod normalized;
mod sensor_fields;

pub use node_id::*;
pub use normalized::*;
pub use sensor_fields::*;
