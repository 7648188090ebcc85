//! Admin API entities and pagination cursors.

#![forbid(unsafe_code)]

mod pagination;
mod rbac;

pub use pagination::{DEFAULT_PAGE_SIZE, ListOpt, ListPage, null_as_empty};
pub use rbac::{GroupRoleBinding, RbacGroup, RbacGroupRole, RbacRole, Workspace};
