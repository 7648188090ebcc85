//! kadmin: command-line client for RBAC group administration.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kadmin_application::RbacGroupService;
use kadmin_core::{AppError, AppResult};
use kadmin_domain::{ListOpt, RbacGroup, RbacRole, Workspace};
use kadmin_infrastructure::{AdminTransportConfig, HttpAdminTransport};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CLI_USER_AGENT: &str = concat!("kadmin-cli/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Parser)]
#[command(name = "kadmin", about = "Manage RBAC groups through the gateway Admin API")]
struct Cli {
    /// Base URL of the Admin API.
    #[arg(long, env = "KADMIN_ADMIN_URL", default_value = "http://127.0.0.1:8001")]
    admin_url: String,

    /// Token sent in the admin token header.
    #[arg(long, env = "KADMIN_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Workspace used as path prefix for every call.
    #[arg(long, env = "KADMIN_WORKSPACE")]
    workspace: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "KADMIN_TIMEOUT_SECS", default_value_t = 15)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// RBAC group operations.
    #[command(subcommand)]
    Groups(GroupCommand),
}

#[derive(Debug, Subcommand)]
enum GroupCommand {
    /// Create a group.
    Create {
        /// Unique group name.
        #[arg(long)]
        name: String,
        /// Free-text comment.
        #[arg(long)]
        comment: Option<String>,
    },
    /// Fetch a group.
    Get {
        /// Group name or id.
        name_or_id: String,
    },
    /// Change the name or comment of a group.
    Update {
        /// Group name or id.
        name_or_id: String,
        /// New group name.
        #[arg(long)]
        name: Option<String>,
        /// New comment.
        #[arg(long)]
        comment: Option<String>,
    },
    /// Delete a group.
    Delete {
        /// Group name or id.
        name_or_id: String,
    },
    /// Fetch one page of groups.
    List {
        /// Page size.
        #[arg(long, default_value_t = 100)]
        size: usize,
        /// Continuation token from a previous page.
        #[arg(long)]
        offset: Option<String>,
        /// Tag filter (comma-separated).
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Require every tag instead of any.
        #[arg(long)]
        match_all_tags: bool,
    },
    /// Fetch every group.
    ListAll,
    /// Grant a workspace role to a group.
    AddRole {
        /// Group name or id.
        name_or_id: String,
        /// Role id.
        #[arg(long)]
        role_id: String,
        /// Workspace id.
        #[arg(long)]
        workspace_id: String,
    },
    /// Revoke a workspace role from a group.
    DeleteRole {
        /// Group name or id.
        name_or_id: String,
        /// Role id.
        #[arg(long)]
        role_id: String,
        /// Workspace id.
        #[arg(long)]
        workspace_id: String,
    },
    /// List the role associations of a group.
    ListRoles {
        /// Group name or id.
        name_or_id: String,
    },
}

#[derive(Debug, Serialize)]
struct PageOutput {
    data: Vec<RbacGroup>,
    offset: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = cli.transport_config()?;
    info!(
        admin_url = %config.base_url(),
        workspace = config.workspace().unwrap_or("default"),
        "kadmin configured"
    );

    let service = RbacGroupService::new(Arc::new(HttpAdminTransport::new(config)?));

    match cli.command {
        Command::Groups(command) => run_group_command(&service, command).await,
    }
}

async fn run_group_command(service: &RbacGroupService, command: GroupCommand) -> AppResult<()> {
    match command {
        GroupCommand::Create { name, comment } => {
            let group = RbacGroup {
                comment,
                ..RbacGroup::named(name)
            };
            print_json(&service.create(&group).await?)
        }
        GroupCommand::Get { name_or_id } => print_json(&service.get(name_or_id.as_str()).await?),
        GroupCommand::Update {
            name_or_id,
            name,
            comment,
        } => {
            if name.is_none() && comment.is_none() {
                return Err(AppError::Validation(
                    "update requires --name or --comment".to_owned(),
                ));
            }
            let fetched = service.get(name_or_id.as_str()).await?;
            print_json(&service.update(&update_body(fetched.id, name, comment)).await?)
        }
        GroupCommand::Delete { name_or_id } => {
            service.delete(name_or_id.as_str()).await?;
            info!(group = %name_or_id, "group deleted");
            Ok(())
        }
        GroupCommand::List {
            size,
            offset,
            tags,
            match_all_tags,
        } => {
            let opt = ListOpt {
                size,
                offset,
                tags,
                match_all_tags,
            };
            let (data, next) = service.list(&opt).await?;
            print_json(&PageOutput {
                data,
                offset: next.and_then(|next| next.offset),
            })
        }
        GroupCommand::ListAll => print_json(&service.list_all().await?),
        GroupCommand::AddRole {
            name_or_id,
            role_id,
            workspace_id,
        } => print_json(
            &service
                .add_role(
                    name_or_id.as_str(),
                    &RbacRole::with_id(role_id),
                    &Workspace::with_id(workspace_id),
                )
                .await?,
        ),
        GroupCommand::DeleteRole {
            name_or_id,
            role_id,
            workspace_id,
        } => {
            service
                .delete_role(
                    name_or_id.as_str(),
                    &RbacRole::with_id(role_id.as_str()),
                    &Workspace::with_id(workspace_id),
                )
                .await?;
            info!(group = %name_or_id, rbac_role_id = %role_id, "group role deleted");
            Ok(())
        }
        GroupCommand::ListRoles { name_or_id } => {
            print_json(&service.list_roles(name_or_id.as_str()).await?)
        }
    }
}

impl Cli {
    fn transport_config(&self) -> AppResult<AdminTransportConfig> {
        if self.timeout_secs == 0 {
            return Err(AppError::Validation(
                "KADMIN_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(AdminTransportConfig::new(self.admin_url.as_str())?
            .with_workspace(self.workspace.clone())
            .with_admin_token(self.admin_token.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_user_agent(CLI_USER_AGENT))
    }
}

/// Builds a patch carrying the group id plus only the fields given on the
/// command line.
fn update_body(id: Option<String>, name: Option<String>, comment: Option<String>) -> RbacGroup {
    RbacGroup {
        id,
        name,
        comment,
        ..RbacGroup::default()
    }
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|error| {
        AppError::Serialization(format!("failed to render output: {error}"))
    })?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
