//! Account management for super admins.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{UserQuery, UserStats, UserSummary};
use duka_core::validation::validate_admin_account;
use duka_core::{Role, UserId};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, is_rejection};
use crate::filters;
use crate::middleware::RequireSuperAdmin;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::{PageContext, Pagination, non_empty, query_string};

use super::uploads::first_message;

const USERS_PATH: &str = "/users";
const PAGE_SIZE: u32 = 20;

const fn role_label(role: Role) -> &'static str {
    match role {
        Role::SuperAdmin => "Super admin",
        Role::Admin => "Admin",
        Role::Customer => "Customer",
    }
}

/// Query parameters for the users list.
#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<u32>,
}

/// New admin form.
#[derive(Debug, Deserialize)]
pub struct NewAdminForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role_label: &'static str,
    pub joined: String,
    /// Super admins and the viewer's own account stay.
    pub deletable: bool,
}

impl UserRow {
    fn new(user: &UserSummary, viewer: UserId) -> Self {
        Self {
            id: user.id.as_i64(),
            username: user.username.clone(),
            email: user.email.clone(),
            role_label: role_label(user.role),
            joined: user
                .created_at
                .map(|d| d.format("%d %b %Y").to_string())
                .unwrap_or_default(),
            deletable: user.role != Role::SuperAdmin && user.id != viewer,
        }
    }
}

/// Role filter choice.
#[derive(Debug, Clone)]
pub struct RoleFilter {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn role_filters(selected: Option<Role>) -> Vec<RoleFilter> {
    std::iter::once(RoleFilter {
        value: "",
        label: "All roles",
        selected: selected.is_none(),
    })
    .chain(
        [Role::SuperAdmin, Role::Admin, Role::Customer]
            .into_iter()
            .map(|role| RoleFilter {
                value: match role {
                    Role::SuperAdmin => "SUPERADMIN",
                    Role::Admin => "admin",
                    Role::Customer => "customer",
                },
                label: role_label(role),
                selected: selected == Some(role),
            }),
    )
    .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "users/index.html")]
pub struct UsersTemplate {
    pub ctx: PageContext,
    pub stats: UserStats,
    pub users: Vec<UserRow>,
    pub roles: Vec<RoleFilter>,
    pub search: String,
    pub pagination: Pagination,
}

/// Users with counts per role.
#[instrument(skip(state, ctx, admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Query(query): Query<UsersQuery>,
) -> Result<UsersTemplate> {
    let role = query.role.as_deref().and_then(|r| r.parse::<Role>().ok());
    let search = non_empty(query.search.as_deref());
    let user_query = UserQuery {
        page: query.page.unwrap_or(1).max(1),
        limit: PAGE_SIZE,
        search: search.clone(),
        role,
    };

    let (result, stats) = tokio::join!(
        state.api().list_users(&admin.token, &user_query),
        state.api().user_stats(&admin.token),
    );
    let result = result?;
    let stats = stats?;

    let pagination = Pagination::new(&result, |page| {
        format!(
            "{USERS_PATH}{}",
            query_string(&[
                ("search", search.clone()),
                ("role", role.map(|r| r.to_string())),
                ("page", Some(page.to_string())),
            ])
        )
    });

    Ok(UsersTemplate {
        ctx,
        stats,
        users: result
            .items
            .iter()
            .map(|u| UserRow::new(u, admin.user_id))
            .collect(),
        roles: role_filters(role),
        search: search.unwrap_or_default(),
        pagination,
    })
}

/// Create an admin account.
#[instrument(skip(state, session, admin, form), fields(username = %form.username))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Form(form): Form<NewAdminForm>,
) -> Result<Response> {
    let username = form.username.trim();
    let email = form.email.trim();
    let flash = match validate_admin_account(username, email, &form.password, &form.password_confirm) {
        Err(errors) => Flash::error(first_message(&errors)),
        Ok(()) => {
            let password = SecretString::from(form.password);
            match state
                .api()
                .create_admin(&admin.token, username, email, &password)
                .await
            {
                Ok(_) => {
                    tracing::info!(created_by = %admin.username, "Admin account created");
                    Flash::success(format!("Admin {username} created"))
                }
                Err(e) if is_rejection(&e) => Flash::error(e.user_message()),
                Err(e) => return Err(e.into()),
            }
        }
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(USERS_PATH).into_response())
}

/// Delete an admin or customer account.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Path(id): Path<i64>,
) -> Result<Response> {
    let id = UserId::new(id);
    let flash = if id == admin.user_id {
        Flash::error("You cannot delete your own account")
    } else {
        match state.api().delete_user(&admin.token, id).await {
            Ok(response) => {
                tracing::info!(user_id = %id, deleted_by = %admin.username, "Account deleted");
                Flash::success(response.message)
            }
            Err(e) if is_rejection(&e) => Flash::error(e.user_message()),
            Err(e) => return Err(e.into()),
        }
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(USERS_PATH).into_response())
}
