use std::sync::Arc;

use http::Method;
use serde::Deserialize;
use tracing::debug;

use kadmin_core::{AppError, AppResult, NonEmptyString};
use kadmin_domain::{
    GroupRoleBinding, ListOpt, ListPage, RbacGroup, RbacGroupRole, RbacRole, Workspace,
    null_as_empty,
};

use crate::{AdminRequest, AdminTransport};

const GROUPS: &str = "groups";
const ROLES: &str = "roles";

#[derive(Debug, Deserialize)]
struct GroupRolesResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    data: Vec<RbacGroupRole>,
}

/// Client for RBAC group administration on the Admin API.
///
/// Every call is one independent request against the transport; nothing is
/// cached between calls.
#[derive(Clone)]
pub struct RbacGroupService {
    transport: Arc<dyn AdminTransport>,
}

impl RbacGroupService {
    /// Creates a new service over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn AdminTransport>) -> Self {
        Self { transport }
    }

    /// Creates a group and returns the service-assigned entity.
    pub async fn create(&self, group: &RbacGroup) -> AppResult<RbacGroup> {
        if group.name.as_deref().is_none_or(|name| name.trim().is_empty()) {
            return Err(AppError::Validation(
                "cannot create a group that is absent: a group name is required".to_owned(),
            ));
        }

        let request = AdminRequest::new(Method::POST, [GROUPS]).with_json(group)?;
        self.transport.send(request).await?.json()
    }

    /// Fetches a group by name or id.
    pub async fn get(&self, name_or_id: &str) -> AppResult<RbacGroup> {
        let key = NonEmptyString::required(Some(name_or_id), "name_or_id")?;

        let request = AdminRequest::new(Method::GET, [GROUPS, key.as_str()]);
        self.transport.send(request).await?.json()
    }

    /// Sends the set fields of a group as a partial update.
    ///
    /// The group is addressed by id when present, otherwise by name.
    pub async fn update(&self, group: &RbacGroup) -> AppResult<RbacGroup> {
        let key = NonEmptyString::required(group.lookup_key(), "group id or name")?;

        let request =
            AdminRequest::new(Method::PATCH, [GROUPS, key.as_str()]).with_json(group)?;
        self.transport.send(request).await?.json()
    }

    /// Deletes a group by name or id.
    pub async fn delete(&self, name_or_id: &str) -> AppResult<()> {
        let key = NonEmptyString::required(Some(name_or_id), "name_or_id")?;

        let request = AdminRequest::new(Method::DELETE, [GROUPS, key.as_str()]);
        let response = self.transport.send(request).await?;
        debug!(group = %key.as_str(), status = response.status, "group deleted");
        Ok(())
    }

    /// Fetches one page of groups and the cursor for the next page.
    pub async fn list(&self, opt: &ListOpt) -> AppResult<(Vec<RbacGroup>, Option<ListOpt>)> {
        let request = AdminRequest::new(Method::GET, [GROUPS, ""]).with_query(opt.query_pairs());
        let page: ListPage<RbacGroup> = self.transport.send(request).await?.json()?;
        Ok(page.into_parts(opt))
    }

    /// Fetches every group by following page cursors until exhausted.
    pub async fn list_all(&self) -> AppResult<Vec<RbacGroup>> {
        let mut groups = Vec::new();
        let mut cursor = Some(ListOpt::default());

        while let Some(opt) = cursor {
            let (page, next) = self.list(&opt).await?;
            groups.extend(page);
            cursor = next;
        }

        Ok(groups)
    }

    /// Grants a workspace-scoped role to a group.
    pub async fn add_role(
        &self,
        name_or_id: &str,
        role: &RbacRole,
        workspace: &Workspace,
    ) -> AppResult<RbacGroupRole> {
        let (key, binding) = role_binding(name_or_id, role, workspace)?;

        let request =
            AdminRequest::new(Method::POST, [GROUPS, key.as_str(), ROLES]).with_json(&binding)?;
        self.transport.send(request).await?.json()
    }

    /// Revokes a workspace-scoped role from a group.
    ///
    /// The service may close the connection before the response completes
    /// even though the role was removed; that case is reported as success.
    pub async fn delete_role(
        &self,
        name_or_id: &str,
        role: &RbacRole,
        workspace: &Workspace,
    ) -> AppResult<()> {
        let (key, binding) = role_binding(name_or_id, role, workspace)?;

        let request = AdminRequest::new(Method::DELETE, [GROUPS, key.as_str(), ROLES])
            .with_json(&binding)?;
        match self.transport.send(request).await {
            Ok(_) => Ok(()),
            Err(error) if error.is_premature_close() => {
                debug!(
                    group = %key.as_str(),
                    rbac_role_id = %binding.rbac_role_id,
                    error = %error,
                    "ignoring early connection close on group role delete"
                );
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Lists every role association of a group in one call.
    pub async fn list_roles(&self, name_or_id: &str) -> AppResult<Vec<RbacGroupRole>> {
        let key = NonEmptyString::required(Some(name_or_id), "name_or_id")?;

        let request = AdminRequest::new(Method::GET, [GROUPS, key.as_str(), ROLES]);
        let response: GroupRolesResponse = self.transport.send(request).await?.json()?;
        Ok(response.data)
    }
}

fn role_binding(
    name_or_id: &str,
    role: &RbacRole,
    workspace: &Workspace,
) -> AppResult<(NonEmptyString, GroupRoleBinding)> {
    let key = NonEmptyString::required(Some(name_or_id), "name_or_id")?;
    let rbac_role_id = NonEmptyString::required(role.id.as_deref(), "role id")?;
    let workspace_id = NonEmptyString::required(workspace.id.as_deref(), "workspace id")?;

    Ok((
        key,
        GroupRoleBinding {
            rbac_role_id: rbac_role_id.into(),
            workspace_id: workspace_id.into(),
        },
    ))
}

#[cfg(test)]
mod tests;
