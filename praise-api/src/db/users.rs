//! Users, roles and user accounts

use praise_common::db::{Role, User, UserAccount};
use praise_common::time::{now, to_millis};
use praise_common::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

async fn load_roles(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Vec<Role>> {
    let names: Vec<String> =
        sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
    let mut roles = names
        .iter()
        .map(|name| name.parse())
        .collect::<Result<Vec<Role>>>()?;
    roles.sort();
    Ok(roles)
}

pub async fn insert_user(conn: &mut SqliteConnection, username: &str, roles: &[Role]) -> Result<User> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(username)
        .bind(to_millis(now()))
        .execute(&mut *conn)
        .await?;

    for role in roles {
        add_role(conn, id, *role).await?;
    }

    find_user(conn, id)
        .await?
        .ok_or_else(|| praise_common::Error::Internal("Inserted user vanished".to_string()))
}

pub async fn find_user(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let roles = load_roles(conn, id).await?;
            Ok(Some(User::from_row(&row, roles)?))
        }
        None => Ok(None),
    }
}

pub async fn find_user_by_username(conn: &mut SqliteConnection, username: &str) -> Result<Option<User>> {
    let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
    match id {
        Some(id) => find_user(conn, id).await,
        None => Ok(None),
    }
}

pub async fn find_all_users(conn: &mut SqliteConnection) -> Result<Vec<User>> {
    let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users ORDER BY username")
        .fetch_all(&mut *conn)
        .await?;

    let mut users = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = find_user(conn, id).await? {
            users.push(user);
        }
    }
    Ok(users)
}

pub async fn add_role(conn: &mut SqliteConnection, user_id: Uuid, role: Role) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
        .bind(user_id)
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_role(conn: &mut SqliteConnection, user_id: Uuid, role: Role) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role = ?")
        .bind(user_id)
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_with_role(conn: &mut SqliteConnection, role: Role) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role = ?")
        .bind(role.as_str())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Ids of every user holding the QUANTIFIER role, in a stable order
pub async fn quantifier_pool(conn: &mut SqliteConnection) -> Result<Vec<Uuid>> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT u.id FROM users u
        JOIN user_roles r ON r.user_id = u.id
        WHERE r.role = 'QUANTIFIER'
        ORDER BY u.username
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

pub async fn insert_account(
    conn: &mut SqliteConnection,
    account_id: &str,
    name: &str,
    platform: &str,
    user_id: Option<Uuid>,
) -> Result<UserAccount> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO user_accounts (id, account_id, name, platform, user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(account_id)
    .bind(name)
    .bind(platform)
    .bind(user_id)
    .bind(to_millis(now()))
    .execute(&mut *conn)
    .await?;

    find_account(conn, id)
        .await?
        .ok_or_else(|| praise_common::Error::Internal("Inserted account vanished".to_string()))
}

pub async fn find_account(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<UserAccount>> {
    let row = sqlx::query("SELECT * FROM user_accounts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(UserAccount::from_row).transpose()
}

pub async fn find_account_by_platform_id(
    conn: &mut SqliteConnection,
    platform: &str,
    account_id: &str,
) -> Result<Option<UserAccount>> {
    let row = sqlx::query("SELECT * FROM user_accounts WHERE platform = ? AND account_id = ?")
        .bind(platform)
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(UserAccount::from_row).transpose()
}
