//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_admin_transport;

pub use http_admin_transport::{AdminTransportConfig, HttpAdminTransport};
