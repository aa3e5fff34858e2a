mod load;
mod types;

pub use load::{load_default, load_from};
pub use types::{EngineConfig, HttpConfig, RelayConfig};
