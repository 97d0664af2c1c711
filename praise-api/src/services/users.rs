//! Users and role management

use praise_common::db::{Role, User};
use praise_common::events::{EventLog, EventLogTypeKey, NewEvent};
use praise_common::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Caller, Permission};
use crate::db::{quantifications, users};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    pub username: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeInput {
    pub role: Role,
}

pub struct UserService {
    db: SqlitePool,
    events: EventLog,
}

impl UserService {
    pub fn new(db: SqlitePool, events: EventLog) -> Self {
        Self { db, events }
    }

    /// Create a user; every user holds the USER role
    pub async fn create_user(&self, caller: &Caller, input: &CreateUserInput) -> Result<User> {
        caller.require(Permission::UsersCreate)?;
        let username = input.username.trim();
        if username.is_empty() {
            return Err(Error::validation("Username must not be empty"));
        }

        let mut roles = vec![Role::User];
        for role in &input.roles {
            if !roles.contains(role) {
                roles.push(*role);
            }
        }

        let mut tx = self.db.begin().await?;
        if users::find_user_by_username(&mut *tx, username).await?.is_some() {
            return Err(Error::validation(format!("Username \"{}\" is already taken", username)));
        }
        let user = users::insert_user(&mut *tx, username, &roles).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "Created user {}", user.username);
        Ok(user)
    }

    /// Make sure at least one admin exists, creating or promoting `username`
    ///
    /// Returns the user when a change was made. Called at startup, before any
    /// caller can exist.
    pub async fn bootstrap_admin(&self, username: &str) -> Result<Option<User>> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::validation("Admin username must not be empty"));
        }

        let mut tx = self.db.begin().await?;
        if users::count_with_role(&mut *tx, Role::Admin).await? > 0 {
            return Ok(None);
        }

        let user = match users::find_user_by_username(&mut *tx, username).await? {
            Some(existing) => {
                users::add_role(&mut *tx, existing.id, Role::Admin).await?;
                users::find_user(&mut *tx, existing.id)
                    .await?
                    .ok_or_else(|| Error::not_found("User"))?
            }
            None => users::insert_user(&mut *tx, username, &[Role::User, Role::Admin]).await?,
        };

        let event = NewEvent::new(
            EventLogTypeKey::Permission,
            format!("Granted initial admin role to user \"{}\"", user.username),
        );
        let entry = self.events.log(&mut *tx, event).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "Bootstrapped admin {}", user.username);
        self.events.publish(entry);
        Ok(Some(user))
    }

    pub async fn find(&self, caller: &Caller, id: Uuid) -> Result<User> {
        caller.require(Permission::UsersView)?;
        let mut conn = self.db.acquire().await?;
        users::find_user(&mut conn, id)
            .await?
            .ok_or_else(|| Error::not_found("User"))
    }

    pub async fn find_all(&self, caller: &Caller) -> Result<Vec<User>> {
        caller.require(Permission::UsersView)?;
        let mut conn = self.db.acquire().await?;
        users::find_all_users(&mut conn).await
    }

    pub async fn add_role(&self, caller: &Caller, id: Uuid, role: Role) -> Result<User> {
        caller.require(Permission::UsersManageRoles)?;

        let mut tx = self.db.begin().await?;
        let user = users::find_user(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::not_found("User"))?;

        if !users::add_role(&mut *tx, id, role).await? {
            tx.commit().await?;
            return Ok(user);
        }

        let event = NewEvent::new(
            EventLogTypeKey::Permission,
            format!("Added role \"{}\" to user \"{}\"", role, user.username),
        )
        .by(caller.user_id);
        let entry = self.events.log(&mut *tx, event).await?;
        let updated = users::find_user(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::not_found("User"))?;
        tx.commit().await?;

        self.events.publish(entry);
        Ok(updated)
    }

    /// Remove a role
    ///
    /// Refuses to remove USER, the last ADMIN, or QUANTIFIER while the user
    /// still holds assignments in a period being quantified.
    pub async fn remove_role(&self, caller: &Caller, id: Uuid, role: Role) -> Result<User> {
        caller.require(Permission::UsersManageRoles)?;
        if role == Role::User {
            return Err(Error::validation("The USER role cannot be removed"));
        }

        let mut tx = self.db.begin().await?;
        let user = users::find_user(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::not_found("User"))?;
        if !user.has_role(role) {
            tx.commit().await?;
            return Ok(user);
        }

        match role {
            Role::Admin => {
                if users::count_with_role(&mut *tx, Role::Admin).await? <= 1 {
                    return Err(Error::conflict("It is not allowed to remove the last admin"));
                }
            }
            Role::Quantifier => {
                let active = quantifications::count_in_quantifying_periods(&mut *tx, id).await?;
                if active > 0 {
                    return Err(Error::conflict(format!(
                        "Cannot remove quantifier currently assigned to a quantification period ({} assignments)",
                        active
                    )));
                }
            }
            Role::User | Role::Forwarder => {}
        }

        users::remove_role(&mut *tx, id, role).await?;
        let event = NewEvent::new(
            EventLogTypeKey::Permission,
            format!("Removed role \"{}\" from user \"{}\"", role, user.username),
        )
        .by(caller.user_id);
        let entry = self.events.log(&mut *tx, event).await?;
        let updated = users::find_user(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::not_found("User"))?;
        tx.commit().await?;

        self.events.publish(entry);
        Ok(updated)
    }
}
