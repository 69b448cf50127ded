//! Database repositories for users and sessions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use passit_core::UserId;
use passit_platform_access::{
    DirectoryError, Session, SessionId, SessionStore, SessionStoreError, SessionUser, User,
    UserDirectory, UserRecord,
};
use rootcause::Report;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, provider_id, username, email, first_name, last_name, \
     date_of_birth, phone_number, address, is_active, is_admin, created_at, updated_at, deleted_at";

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    provider_id: Option<String>,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    date_of_birth: Option<NaiveDate>,
    phone_number: Option<String>,
    address: Option<String>,
    is_active: bool,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::from_record(UserRecord {
            id: UserId::from_uuid(row.id),
            provider_id: row.provider_id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            phone_number: row.phone_number,
            address: row.address,
            is_active: row.is_active,
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    access_token: String,
    id_token: String,
    username: String,
    email: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session::from_parts(
            SessionId::new(row.id),
            row.access_token,
            row.id_token,
            SessionUser {
                username: row.username,
                email: row.email,
                is_admin: row.is_admin,
            },
            row.created_at,
            row.expires_at,
        )
    }
}

fn query_error(err: sqlx::Error) -> DirectoryError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DirectoryError::Duplicate {
            details: db.constraint().unwrap_or("unique constraint").to_string(),
        },
        other => DirectoryError::Query {
            details: other.to_string(),
        },
    }
}

/// PostgreSQL-backed user directory.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        column: &str,
        bind: FindKey<'_>,
    ) -> Result<Option<User>, Report<DirectoryError>> {
        let sql = match bind {
            FindKey::Id(_) => format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"),
            FindKey::Text(_) => {
                format!("SELECT {USER_COLUMNS} FROM users WHERE lower({column}) = lower($1)")
            }
        };
        let query = sqlx::query_as::<_, UserRow>(&sql);
        let query = match bind {
            FindKey::Id(id) => query.bind(id),
            FindKey::Text(text) => query.bind(text.trim()),
        };
        let row = query.fetch_optional(&self.pool).await.map_err(query_error)?;
        Ok(row.map(User::from))
    }

    async fn list_where(&self, active: bool) -> Result<Vec<User>, Report<DirectoryError>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE is_active = $1 ORDER BY created_at");
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(active)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}

enum FindKey<'a> {
    Id(Uuid),
    Text(&'a str),
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn create(&self, user: &User) -> Result<(), Report<DirectoryError>> {
        sqlx::query(
            r#"
            INSERT INTO users (id, provider_id, username, email, first_name, last_name,
                               date_of_birth, phone_number, address, is_active, is_admin,
                               created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.provider_id())
        .bind(user.username())
        .bind(user.email())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.date_of_birth())
        .bind(user.phone_number())
        .bind(user.address())
        .bind(user.is_active())
        .bind(user.is_admin())
        .bind(user.created_at())
        .bind(user.updated_at())
        .bind(user.deleted_at())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<DirectoryError>> {
        self.find_one("id", FindKey::Id(id.as_uuid())).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Report<DirectoryError>> {
        self.find_one("email", FindKey::Text(email)).await
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Report<DirectoryError>> {
        self.find_one("username", FindKey::Text(username)).await
    }

    async fn list(&self) -> Result<Vec<User>, Report<DirectoryError>> {
        self.list_where(true).await
    }

    async fn list_inactive(&self) -> Result<Vec<User>, Report<DirectoryError>> {
        self.list_where(false).await
    }

    async fn update(&self, user: &User) -> Result<(), Report<DirectoryError>> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET provider_id = COALESCE($2, provider_id),
                username = $3, email = $4, first_name = $5, last_name = $6,
                date_of_birth = $7, phone_number = $8, address = $9,
                is_active = $10, is_admin = $11, updated_at = $12, deleted_at = $13
            WHERE id = $1
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.provider_id())
        .bind(user.username())
        .bind(user.email())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.date_of_birth())
        .bind(user.phone_number())
        .bind(user.address())
        .bind(user.is_active())
        .bind(user.is_admin())
        .bind(user.updated_at())
        .bind(user.deleted_at())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(DirectoryError::NotFound { id: user.id() }.into());
        }
        Ok(())
    }

    async fn provider_id_of(&self, id: UserId) -> Result<Option<String>, Report<DirectoryError>> {
        let provider_id: Option<Option<String>> =
            sqlx::query_scalar("SELECT provider_id FROM users WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;
        Ok(provider_id.flatten())
    }

    async fn any_admin(&self) -> Result<bool, Report<DirectoryError>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE is_admin)")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(exists)
    }

    async fn ping(&self) -> Result<(), Report<DirectoryError>> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}

/// PostgreSQL-backed session store.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, Report<SessionStoreError>> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(result.rows_affected())
    }
}

fn backend_error(err: sqlx::Error) -> SessionStoreError {
    SessionStoreError::Backend {
        details: err.to_string(),
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session) -> Result<(), Report<SessionStoreError>> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, access_token, id_token, username, email, is_admin,
                                  created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id().as_str())
        .bind(session.access_token())
        .bind(session.id_token())
        .bind(&session.user().username)
        .bind(&session.user().email)
        .bind(session.user().is_admin)
        .bind(session.created_at())
        .bind(session.expires_at())
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, Report<SessionStoreError>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, access_token, id_token, username, email, is_admin, created_at, expires_at
            FROM sessions
            WHERE id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(row.map(Session::from))
    }

    async fn delete(&self, id: &SessionId) -> Result<(), Report<SessionStoreError>> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }
}
