pub mod config;
pub mod error;
pub mod http;
pub mod target;
pub mod traits;
pub mod validate;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpGateway;
pub use target::Target;
pub use traits::Gateway;
