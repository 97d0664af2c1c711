//! Caller identity and permission checks
//!
//! Authentication happens in the gateway in front of this service, which
//! forwards the authenticated user id in the `x-praise-user-id` header. Every
//! service operation starts with an explicit [`require_permission`] call on
//! the caller's role set.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use once_cell::sync::Lazy;
use praise_common::db::Role;
use praise_common::Error;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-praise-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    PraiseView,
    PraiseCreate,
    PraiseQuantify,
    PeriodView,
    PeriodCreate,
    PeriodUpdate,
    PeriodAssign,
    PeriodSettingsUpdate,
    SettingsView,
    SettingsUpdate,
    UsersView,
    UsersCreate,
    UsersManageRoles,
    UserAccountsCreate,
    EventLogView,
}

static ROLE_PERMISSIONS: Lazy<HashMap<Role, Vec<Permission>>> = Lazy::new(|| {
    use Permission::*;

    let user = vec![PraiseView, PeriodView, SettingsView, UsersView, EventLogView];

    let mut quantifier = user.clone();
    quantifier.push(PraiseQuantify);

    let mut forwarder = user.clone();
    forwarder.push(PraiseCreate);

    let mut admin = user.clone();
    admin.extend([
        PraiseCreate,
        PeriodCreate,
        PeriodUpdate,
        PeriodAssign,
        PeriodSettingsUpdate,
        SettingsUpdate,
        UsersCreate,
        UsersManageRoles,
        UserAccountsCreate,
    ]);

    HashMap::from([
        (Role::User, user),
        (Role::Quantifier, quantifier),
        (Role::Forwarder, forwarder),
        (Role::Admin, admin),
    ])
});

/// True when any of the roles grants the permission
pub fn has_permission(roles: &[Role], permission: Permission) -> bool {
    roles.iter().any(|role| {
        ROLE_PERMISSIONS
            .get(role)
            .is_some_and(|granted| granted.contains(&permission))
    })
}

/// Fail with `Forbidden` unless the roles grant the permission
pub fn require_permission(roles: &[Role], permission: Permission) -> praise_common::Result<()> {
    if has_permission(roles, permission) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "Missing permission {:?}",
            permission
        )))
    }
}

/// The authenticated user making a request
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

impl Caller {
    pub fn new(user_id: Uuid, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    pub fn require(&self, permission: Permission) -> praise_common::Result<()> {
        require_permission(&self.roles, permission)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))?;

        let user_id = header
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| ApiError::Unauthorized("Malformed user id".to_string()))?;

        let mut conn = state.db.acquire().await?;
        let user = crate::db::users::find_user(&mut conn, user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

        Ok(Caller::new(user.id, user.roles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantifier_can_quantify() {
        assert!(has_permission(&[Role::User, Role::Quantifier], Permission::PraiseQuantify));
    }

    #[test]
    fn test_plain_user_cannot_quantify_or_assign() {
        assert!(!has_permission(&[Role::User], Permission::PraiseQuantify));
        assert!(!has_permission(&[Role::User], Permission::PeriodAssign));
        assert!(has_permission(&[Role::User], Permission::PeriodView));
    }

    #[test]
    fn test_admin_is_not_implicitly_quantifier() {
        assert!(has_permission(&[Role::Admin], Permission::PeriodAssign));
        assert!(!has_permission(&[Role::Admin], Permission::PraiseQuantify));
    }

    #[test]
    fn test_require_permission_error_kind() {
        let result = require_permission(&[Role::Forwarder], Permission::UsersManageRoles);
        assert!(matches!(result, Err(Error::Forbidden(_))));
        assert!(require_permission(&[Role::Forwarder], Permission::PraiseCreate).is_ok());
    }

    #[test]
    fn test_no_roles_no_permissions() {
        assert!(!has_permission(&[], Permission::PraiseView));
    }
}
