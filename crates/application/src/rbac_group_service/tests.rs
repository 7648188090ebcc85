use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use kadmin_core::{AppError, AppResult, TransportError, TransportErrorKind};
use kadmin_domain::{
    DEFAULT_PAGE_SIZE, GroupRoleBinding, ListOpt, RbacGroup, RbacGroupRole, RbacRole, Workspace,
};

use crate::{AdminRequest, AdminResponse, AdminTransport};

use super::RbacGroupService;

#[derive(Default)]
struct FakeAdminState {
    groups: Vec<RbacGroup>,
    group_roles: Vec<(String, GroupRoleBinding)>,
    requests: Vec<AdminRequest>,
    next_id: u32,
    close_early_on_role_delete: bool,
}

impl FakeAdminState {
    fn next_id(&mut self) -> String {
        self.next_id = self.next_id.saturating_add(1);
        format!("group-{:05}", self.next_id)
    }

    fn position(&self, key: &str) -> AppResult<usize> {
        self.groups
            .iter()
            .position(|group| {
                group.id.as_deref() == Some(key) || group.name.as_deref() == Some(key)
            })
            .ok_or_else(|| AppError::NotFound(format!("/groups/{key}")))
    }
}

/// In-memory stand-in for the Admin API group endpoints.
#[derive(Default)]
struct FakeAdminApi {
    state: Mutex<FakeAdminState>,
}

impl FakeAdminApi {
    async fn seed_groups(&self, count: usize) {
        let mut state = self.state.lock().await;
        for index in 0..count {
            let id = state.next_id();
            state.groups.push(RbacGroup {
                id: Some(id),
                name: Some(format!("seeded-{index}")),
                ..RbacGroup::default()
            });
        }
    }

    async fn requests(&self) -> Vec<AdminRequest> {
        self.state.lock().await.requests.clone()
    }

    fn handle(state: &mut FakeAdminState, request: &AdminRequest) -> AppResult<AdminResponse> {
        let segments: Vec<&str> = request.segments.iter().map(String::as_str).collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["groups"]) => {
                let mut group: RbacGroup = decode_body(request)?;
                group.id = Some(state.next_id());
                group.created_at = Some(1_700_000_000);
                state.groups.push(group.clone());
                Ok(respond(201, &group))
            }
            ("GET", ["groups", ""]) => Ok(list_page(state, request)),
            ("GET", ["groups", key]) => {
                let position = state.position(key)?;
                Ok(respond(200, &state.groups[position]))
            }
            ("PATCH", ["groups", key]) => {
                let patch: RbacGroup = decode_body(request)?;
                let position = state.position(key)?;
                let group = &mut state.groups[position];
                if patch.name.is_some() {
                    group.name = patch.name;
                }
                if patch.comment.is_some() {
                    group.comment = patch.comment;
                }
                Ok(respond(200, &*group))
            }
            ("DELETE", ["groups", key]) => {
                let position = state.position(key)?;
                state.groups.remove(position);
                Ok(AdminResponse::empty(204))
            }
            ("POST", ["groups", key, "roles"]) => {
                let binding: GroupRoleBinding = decode_body(request)?;
                let position = state.position(key)?;
                let group = state.groups[position].clone();
                let group_id = group.id.clone().unwrap_or_default();
                state.group_roles.push((group_id, binding.clone()));
                Ok(respond(201, &association(group, &binding)))
            }
            ("DELETE", ["groups", key, "roles"]) => {
                let binding: GroupRoleBinding = decode_body(request)?;
                let position = state.position(key)?;
                let group_id = state.groups[position].id.clone().unwrap_or_default();
                state
                    .group_roles
                    .retain(|(stored_group_id, stored)| {
                        !(stored_group_id == &group_id && stored == &binding)
                    });
                if state.close_early_on_role_delete {
                    return Err(TransportError::new(
                        TransportErrorKind::PrematureClose,
                        "connection closed before message completed",
                    )
                    .into());
                }
                Ok(AdminResponse::empty(204))
            }
            ("GET", ["groups", key, "roles"]) => {
                let position = state.position(key)?;
                let group = state.groups[position].clone();
                let group_id = group.id.clone().unwrap_or_default();
                let data: Vec<RbacGroupRole> = state
                    .group_roles
                    .iter()
                    .filter(|(stored_group_id, _)| stored_group_id == &group_id)
                    .map(|(_, binding)| association(group.clone(), binding))
                    .collect();
                Ok(respond(200, &json!({ "data": data })))
            }
            _ => Err(AppError::Service {
                status: 405,
                message: format!("no route for {} {}", request.method, request.path()),
            }),
        }
    }
}

#[async_trait]
impl AdminTransport for FakeAdminApi {
    async fn send(&self, request: AdminRequest) -> AppResult<AdminResponse> {
        let mut state = self.state.lock().await;
        state.requests.push(request.clone());
        Self::handle(&mut state, &request)
    }
}

/// Transport whose every call fails with the same transport error.
struct FailingTransport {
    kind: TransportErrorKind,
}

#[async_trait]
impl AdminTransport for FailingTransport {
    async fn send(&self, _request: AdminRequest) -> AppResult<AdminResponse> {
        Err(TransportError::new(self.kind, "connection reset by peer").into())
    }
}

/// Transport that answers every call with the same JSON body.
struct StaticTransport {
    body: Value,
}

#[async_trait]
impl AdminTransport for StaticTransport {
    async fn send(&self, _request: AdminRequest) -> AppResult<AdminResponse> {
        Ok(AdminResponse::json_value(200, &self.body))
    }
}

fn decode_body<T: serde::de::DeserializeOwned>(request: &AdminRequest) -> AppResult<T> {
    serde_json::from_value(request.body.clone().unwrap_or(Value::Null))
        .map_err(|error| AppError::Service {
            status: 400,
            message: format!("schema violation: {error}"),
        })
}

fn respond<T: serde::Serialize>(status: u16, body: &T) -> AdminResponse {
    AdminResponse::json_value(status, &serde_json::to_value(body).unwrap_or(Value::Null))
}

fn association(group: RbacGroup, binding: &GroupRoleBinding) -> RbacGroupRole {
    RbacGroupRole {
        group: Some(group),
        rbac_role: Some(RbacRole::with_id(binding.rbac_role_id.clone())),
        workspace: Some(Workspace::with_id(binding.workspace_id.clone())),
        created_at: Some(1_700_000_000),
    }
}

fn list_page(state: &FakeAdminState, request: &AdminRequest) -> AdminResponse {
    let query_value = |name: &str| {
        request
            .query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    let size = query_value("size")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(100);
    let start = query_value("offset")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let end = start.saturating_add(size).min(state.groups.len());
    let data = state.groups.get(start..end).unwrap_or_default();
    let offset = (end < state.groups.len()).then(|| end.to_string());

    respond(
        200,
        &json!({
            "data": data,
            "next": offset.as_ref().map(|offset| format!("/groups?offset={offset}")),
            "offset": offset,
        }),
    )
}

fn build_service() -> (RbacGroupService, Arc<FakeAdminApi>) {
    let api = Arc::new(FakeAdminApi::default());
    (RbacGroupService::new(api.clone()), api)
}

fn role(id: &str) -> RbacRole {
    RbacRole {
        id: Some(id.to_owned()),
        name: Some(format!("{id}-name")),
        ..RbacRole::default()
    }
}

#[tokio::test]
async fn created_group_can_be_fetched_by_id() {
    let (service, _api) = build_service();

    let created = service
        .create(&RbacGroup::named("test-group").with_comment("testing"))
        .await;
    assert!(created.is_ok());
    let created = created.unwrap_or_default();
    assert!(created.id.is_some());

    let fetched = service
        .get(created.id.as_deref().unwrap_or_default())
        .await
        .unwrap_or_default();
    assert_eq!(fetched.name.as_deref(), Some("test-group"));
    assert_eq!(fetched.comment.as_deref(), Some("testing"));
}

#[tokio::test]
async fn updated_comment_is_visible_on_refetch() {
    let (service, _api) = build_service();
    let created = service
        .create(&RbacGroup::named("test-group").with_comment("testing"))
        .await
        .unwrap_or_default();

    let mut group = created.clone();
    group.comment = Some("new comment".to_owned());
    let updated = service.update(&group).await;
    assert!(updated.is_ok());
    assert_eq!(
        updated.unwrap_or_default().comment.as_deref(),
        Some("new comment")
    );

    let fetched = service
        .get(created.id.as_deref().unwrap_or_default())
        .await
        .unwrap_or_default();
    assert_eq!(fetched.comment.as_deref(), Some("new comment"));
}

#[tokio::test]
async fn update_addresses_group_by_name_when_id_is_absent() {
    let (service, api) = build_service();
    service
        .create(&RbacGroup::named("ops"))
        .await
        .unwrap_or_default();

    let result = service
        .update(&RbacGroup::named("ops").with_comment("pager"))
        .await;

    assert!(result.is_ok());
    let requests = api.requests().await;
    assert_eq!(
        requests.last().map(AdminRequest::path),
        Some("/groups/ops".to_owned())
    );
    assert_eq!(
        requests.last().and_then(|request| request.body.clone()),
        Some(json!({"name": "ops", "comment": "pager"}))
    );
}

#[tokio::test]
async fn deleted_group_is_not_found() {
    let (service, _api) = build_service();
    let created = service
        .create(&RbacGroup::named("short-lived"))
        .await
        .unwrap_or_default();
    let id = created.id.unwrap_or_default();

    assert!(service.delete(id.as_str()).await.is_ok());

    let result = service.get(id.as_str()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn empty_keys_are_rejected_without_network_call() {
    let (service, api) = build_service();
    let workspace = Workspace::with_id("ws-1");

    assert!(matches!(service.get("").await, Err(AppError::Validation(_))));
    assert!(matches!(service.delete("  ").await, Err(AppError::Validation(_))));
    assert!(matches!(service.list_roles("").await, Err(AppError::Validation(_))));
    assert!(matches!(
        service.add_role("", &role("role-a"), &workspace).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        service.delete_role("", &role("role-a"), &workspace).await,
        Err(AppError::Validation(_))
    ));

    assert!(api.requests().await.is_empty());
}

#[tokio::test]
async fn incomplete_bodies_are_rejected_without_network_call() {
    let (service, api) = build_service();

    assert!(matches!(
        service.create(&RbacGroup::default()).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        service
            .update(&RbacGroup {
                comment: Some("orphan".to_owned()),
                ..RbacGroup::default()
            })
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        service
            .add_role("ops", &RbacRole::default(), &Workspace::with_id("ws-1"))
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        service
            .add_role("ops", &role("role-a"), &Workspace::default())
            .await,
        Err(AppError::Validation(_))
    ));

    assert!(api.requests().await.is_empty());
}

#[tokio::test]
async fn create_without_group_name_explains_what_is_missing() {
    let (service, _api) = build_service();

    let result = service.create(&RbacGroup::named("   ")).await;

    assert!(matches!(
        result,
        Err(AppError::Validation(message)) if message.contains("absent") && message.contains("name")
    ));
}

#[tokio::test]
async fn null_role_list_reads_as_no_roles() {
    let service = RbacGroupService::new(Arc::new(StaticTransport {
        body: json!({ "data": null }),
    }));

    let roles = service.list_roles("ops").await;

    assert!(roles.is_ok());
    assert!(roles.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn null_group_page_reads_as_last_empty_page() {
    let service = RbacGroupService::new(Arc::new(StaticTransport {
        body: json!({ "data": null, "next": null, "offset": null }),
    }));

    let groups = service.list_all().await;

    assert!(groups.is_ok());
    assert!(groups.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn group_roles_can_be_added_listed_and_removed() {
    let (service, api) = build_service();
    let workspace = Workspace::with_id("ws-1");
    let group = service
        .create(&RbacGroup::named("test-group"))
        .await
        .unwrap_or_default();
    let group_id = group.id.unwrap_or_default();

    let added = service
        .add_role(group_id.as_str(), &role("role-a"), &workspace)
        .await;
    assert!(added.is_ok());
    assert_eq!(
        added
            .unwrap_or_default()
            .rbac_role
            .and_then(|role| role.id)
            .as_deref(),
        Some("role-a")
    );
    assert_eq!(
        api.requests().await.last().and_then(|request| request.body.clone()),
        Some(json!({"rbac_role_id": "role-a", "workspace_id": "ws-1"}))
    );

    assert!(service
        .add_role(group_id.as_str(), &role("role-b"), &workspace)
        .await
        .is_ok());

    let roles = service.list_roles(group_id.as_str()).await;
    assert!(roles.is_ok());
    assert_eq!(roles.unwrap_or_default().len(), 2);

    let deleted = service
        .delete_role(group_id.as_str(), &role("role-a"), &workspace)
        .await;
    assert!(deleted.is_ok());

    let roles = service
        .list_roles(group_id.as_str())
        .await
        .unwrap_or_default();
    assert_eq!(roles.len(), 1);
    assert_eq!(
        roles[0].rbac_role.as_ref().and_then(|role| role.id.as_deref()),
        Some("role-b")
    );
}

#[tokio::test]
async fn delete_role_tolerates_early_connection_close() {
    let (service, api) = build_service();
    let workspace = Workspace::with_id("ws-1");
    service
        .create(&RbacGroup::named("ops"))
        .await
        .unwrap_or_default();
    service
        .add_role("ops", &role("role-a"), &workspace)
        .await
        .unwrap_or_default();
    api.state.lock().await.close_early_on_role_delete = true;

    let result = service.delete_role("ops", &role("role-a"), &workspace).await;

    assert!(result.is_ok());
    assert!(service.list_roles("ops").await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn early_close_is_an_error_outside_delete_role() {
    let service = RbacGroupService::new(Arc::new(FailingTransport {
        kind: TransportErrorKind::PrematureClose,
    }));

    let result = service.delete("ops").await;
    assert!(matches!(
        result,
        Err(AppError::Transport(error)) if error.kind() == TransportErrorKind::PrematureClose
    ));
}

#[tokio::test]
async fn delete_role_propagates_other_transport_errors() {
    let service = RbacGroupService::new(Arc::new(FailingTransport {
        kind: TransportErrorKind::Connect,
    }));

    let result = service
        .delete_role("ops", &role("role-a"), &Workspace::with_id("ws-1"))
        .await;
    assert!(matches!(
        result,
        Err(AppError::Transport(error)) if error.kind() == TransportErrorKind::Connect
    ));
}

#[tokio::test]
async fn list_returns_cursor_until_exhausted() {
    let (service, api) = build_service();
    api.seed_groups(5).await;

    let first = service.list(&ListOpt::with_size(2)).await;
    assert!(first.is_ok());
    let (page, next) = first.unwrap_or_default();
    assert_eq!(page.len(), 2);
    assert_eq!(next.as_ref().and_then(|opt| opt.offset.as_deref()), Some("2"));

    let (page, next) = service
        .list(&next.unwrap_or_default())
        .await
        .unwrap_or_default();
    assert_eq!(page.len(), 2);

    let (page, next) = service
        .list(&next.unwrap_or_default())
        .await
        .unwrap_or_default();
    assert_eq!(page.len(), 1);
    assert!(next.is_none());

    let paths: Vec<String> = api.requests().await.iter().map(AdminRequest::path).collect();
    assert!(paths.iter().all(|path| path == "/groups/"));
}

#[tokio::test]
async fn list_all_returns_every_group_once_in_request_order() {
    let (service, api) = build_service();
    let total = DEFAULT_PAGE_SIZE * 2 + 350;
    api.seed_groups(total).await;

    let groups = service.list_all().await;
    assert!(groups.is_ok());
    let groups = groups.unwrap_or_default();

    assert_eq!(groups.len(), total);
    let unique: HashSet<&str> = groups
        .iter()
        .filter_map(|group| group.id.as_deref())
        .collect();
    assert_eq!(unique.len(), total);
    assert_eq!(groups.first().and_then(|group| group.name.as_deref()), Some("seeded-0"));
    assert_eq!(
        groups.last().and_then(|group| group.name.as_deref()),
        Some(format!("seeded-{}", total - 1).as_str())
    );
    assert_eq!(api.requests().await.len(), 3);
}

#[tokio::test]
async fn list_all_on_empty_service_makes_one_call() {
    let (service, api) = build_service();

    let groups = service.list_all().await;

    assert!(groups.is_ok());
    assert!(groups.unwrap_or_default().is_empty());
    assert_eq!(api.requests().await.len(), 1);
}
