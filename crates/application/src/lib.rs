//! Application services and ports.

#![forbid(unsafe_code)]

mod admin_transport_ports;
mod rbac_group_service;

pub use admin_transport_ports::{AdminRequest, AdminResponse, AdminTransport};
pub use rbac_group_service::RbacGroupService;
