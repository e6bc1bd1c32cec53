pub mod cli;
pub mod config;
pub mod gateway;
pub mod portal;
pub mod session;

pub use config::Config;
pub use gateway::{ApiClient, GatewayError, ResponseEnvelope};
pub use portal::{Portal, PortalError};
pub use session::{Session, SessionStore};
