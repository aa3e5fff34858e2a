pub mod config;
pub mod error;
pub mod event;
pub mod launcher;
pub mod relay;
pub mod request;
pub mod skills;
pub mod sync;

pub use config::RelayConfig;
pub use error::RelayError;
pub use event::EngineEvent;
pub use request::QueryRequest;
