//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the storage ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Multi-record actions (rescue dispatch, bulk off-duty) run inside a single
//! transaction or statement, so they either apply completely or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driverroom_core::domain::{
    Chat, ChatKind, ChatMessage, Company, DispatchStatus, Driver, DutyStatus, Feedback, NewUser,
    Notice, Post, ProfileUpdate, RescueDispatch, ReturnIncident, Role, User, UserCredentials,
};
use driverroom_core::ports::{
    DutyStore, IdentityService, MessagingStore, PortError, PortResult, ReturnsStore,
    SnapshotStream,
};
use driverroom_core::rescue::check_participants;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::adapters::feed::{Change, ChangeFeed};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    feed: ChangeFeed,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::default(),
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Runs a duty update for one user and announces it to the user's company roster.
    async fn update_duty(&self, driver_id: Uuid, assignments: &str) -> PortResult<()> {
        let sql = format!(
            "UPDATE users SET {assignments} WHERE user_id = $1 AND role IN ('driver', 'trainer') RETURNING company_id"
        );
        let company_id = sqlx::query_scalar::<_, Option<Uuid>>(&sql)
            .bind(driver_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Driver {} not found", driver_id)))?;
        if let Some(company_id) = company_id {
            self.feed.publish(Change::Roster(company_id));
        }
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn parse_role(value: &str) -> PortResult<Role> {
    Role::parse(value).ok_or_else(|| PortError::Unexpected(format!("Unknown role '{}'", value)))
}

const OFF_DUTY_ASSIGNMENTS: &str =
    "on_duty = FALSE, checked_in = FALSE, rescuing = FALSE, rts_confirmed = FALSE";

const USER_COLUMNS: &str = "u.user_id, u.name, u.email, u.company_id, c.name AS company_name, \
     u.role, u.activated, u.phone, u.created_at";

const DRIVER_COLUMNS: &str = "user_id AS id, name, role, company_id, on_duty, on_duty_since, \
     checked_in, rescuing, rescued, rts_confirmed";

const SHIFT_WORKERS: &str = "company_id IS NOT NULL AND role IN ('driver', 'trainer')";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CompanyRecord {
    id: Uuid,
    name: String,
    rescue_enabled: bool,
}
impl CompanyRecord {
    fn to_domain(self) -> Company {
        Company {
            id: self.id,
            name: self.name,
            rescue_enabled: self.rescue_enabled,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    name: String,
    email: String,
    company_id: Option<Uuid>,
    company_name: Option<String>,
    role: String,
    activated: bool,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            user_id: self.user_id,
            name: self.name,
            email: self.email,
            company_id: self.company_id,
            company_name: self.company_name,
            role: parse_role(&self.role)?,
            activated: self.activated,
            phone: self.phone,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct DriverRecord {
    id: Uuid,
    name: String,
    role: String,
    company_id: Uuid,
    on_duty: bool,
    on_duty_since: Option<DateTime<Utc>>,
    checked_in: bool,
    rescuing: bool,
    rescued: bool,
    rts_confirmed: bool,
}
impl DriverRecord {
    fn to_domain(self) -> PortResult<Driver> {
        Ok(Driver {
            id: self.id,
            name: self.name,
            role: parse_role(&self.role)?,
            company_id: self.company_id,
            duty: DutyStatus {
                on_duty: self.on_duty,
                on_duty_since: self.on_duty_since,
                checked_in: self.checked_in,
                rescuing: self.rescuing,
                rescued: self.rescued,
                rts_confirmed: self.rts_confirmed,
            },
        })
    }
}

#[derive(FromRow)]
struct DispatchRecord {
    id: Uuid,
    company_id: Uuid,
    rescuer_id: Uuid,
    rescuer_name: String,
    rescuee_id: Uuid,
    rescuee_name: String,
    address: String,
    created_at: DateTime<Utc>,
}
impl DispatchRecord {
    fn to_domain(self) -> RescueDispatch {
        RescueDispatch {
            id: self.id,
            company_id: self.company_id,
            rescuer_id: self.rescuer_id,
            rescuer_name: self.rescuer_name,
            rescuee_id: self.rescuee_id,
            rescuee_name: self.rescuee_name,
            address: self.address,
            status: DispatchStatus::Dispatched,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ReturnRecord {
    id: Uuid,
    driver_id: Uuid,
    driver_name: String,
    company_id: Uuid,
    has_returns: bool,
    count: i32,
    reasons: Vec<String>,
    notified: bool,
    created_at: DateTime<Utc>,
}
impl ReturnRecord {
    fn to_domain(self) -> ReturnIncident {
        ReturnIncident {
            id: self.id,
            driver_id: self.driver_id,
            driver_name: self.driver_name,
            company_id: self.company_id,
            has_returns: self.has_returns,
            count: self.count.max(0) as u32,
            reasons: self.reasons,
            notified: self.notified,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ChatRecord {
    id: Uuid,
    company_id: Uuid,
    kind: String,
    title: Option<String>,
    members: Vec<Uuid>,
    created_at: DateTime<Utc>,
}
impl ChatRecord {
    fn to_domain(self) -> PortResult<Chat> {
        let kind = ChatKind::parse(&self.kind)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown chat kind '{}'", self.kind)))?;
        Ok(Chat {
            id: self.id,
            company_id: self.company_id,
            kind,
            title: self.title,
            members: self.members,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_id: Uuid,
    sender_id: Uuid,
    sender_name: String,
    body: String,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            body: self.body,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct NoticeRecord {
    id: Uuid,
    company_id: Uuid,
    author_id: Uuid,
    title: String,
    body: String,
    created_at: DateTime<Utc>,
}
impl NoticeRecord {
    fn to_domain(self) -> Notice {
        Notice {
            id: self.id,
            company_id: self.company_id,
            author_id: self.author_id,
            title: self.title,
            body: self.body,
            created_at: self.created_at,
        }
    }
}

/// Shared shape of `posts` and `feedback` rows.
#[derive(FromRow)]
struct AuthoredRecord {
    id: Uuid,
    company_id: Uuid,
    author_id: Uuid,
    author_name: String,
    body: String,
    created_at: DateTime<Utc>,
}
impl AuthoredRecord {
    fn to_post(self) -> Post {
        Post {
            id: self.id,
            company_id: self.company_id,
            author_id: self.author_id,
            author_name: self.author_name,
            body: self.body,
            created_at: self.created_at,
        }
    }

    fn to_feedback(self) -> Feedback {
        Feedback {
            id: self.id,
            company_id: self.company_id,
            author_id: self.author_id,
            author_name: self.author_name,
            body: self.body,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// Standalone queries (shared by trait methods and watch streams)
//=========================================================================================

async fn fetch_on_duty(pool: &PgPool, company_id: Option<Uuid>) -> PortResult<Vec<Driver>> {
    let records = match company_id {
        Some(company_id) => {
            let sql = format!(
                "SELECT {DRIVER_COLUMNS} FROM users WHERE {SHIFT_WORKERS} AND on_duty AND company_id = $1"
            );
            sqlx::query_as::<_, DriverRecord>(&sql)
                .bind(company_id)
                .fetch_all(pool)
                .await
        }
        None => {
            let sql = format!("SELECT {DRIVER_COLUMNS} FROM users WHERE {SHIFT_WORKERS} AND on_duty");
            sqlx::query_as::<_, DriverRecord>(&sql).fetch_all(pool).await
        }
    }
    .map_err(unexpected)?;
    records.into_iter().map(|r| r.to_domain()).collect()
}

async fn fetch_returns(pool: &PgPool, company_id: Uuid) -> PortResult<Vec<ReturnIncident>> {
    let records = sqlx::query_as::<_, ReturnRecord>(
        "SELECT id, driver_id, driver_name, company_id, has_returns, count, reasons, notified, created_at \
         FROM return_incidents WHERE company_id = $1 ORDER BY created_at DESC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
    .map_err(unexpected)?;
    Ok(records.into_iter().map(|r| r.to_domain()).collect())
}

async fn fetch_messages(pool: &PgPool, chat_id: Uuid) -> PortResult<Vec<ChatMessage>> {
    let records = sqlx::query_as::<_, MessageRecord>(
        "SELECT id, chat_id, sender_id, sender_name, body, created_at \
         FROM chat_messages WHERE chat_id = $1 ORDER BY created_at ASC",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await
    .map_err(unexpected)?;
    Ok(records.into_iter().map(|r| r.to_domain()).collect())
}

async fn insert_user(conn: &mut PgConnection, new_user: &NewUser) -> PortResult<Uuid> {
    let user_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (user_id, name, email, hashed_password, company_id, role, activated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(user_id)
    .bind(&new_user.name)
    .bind(&new_user.email)
    .bind(&new_user.hashed_password)
    .bind(new_user.company_id)
    .bind(new_user.role.as_str())
    .bind(new_user.activated)
    .execute(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(format!("Email {} is already registered", new_user.email))
        }
        _ => PortError::Unexpected(e.to_string()),
    })?;
    Ok(user_id)
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn create_company(&self, name: &str, rescue_enabled: bool) -> PortResult<Company> {
        let record = sqlx::query_as::<_, CompanyRecord>(
            "INSERT INTO companies (id, name, rescue_enabled) VALUES ($1, $2, $3) \
             RETURNING id, name, rescue_enabled",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(rescue_enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_company(&self, company_id: Uuid) -> PortResult<Company> {
        let record = sqlx::query_as::<_, CompanyRecord>(
            "SELECT id, name, rescue_enabled FROM companies WHERE id = $1",
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Company {} not found", company_id)))?;
        Ok(record.to_domain())
    }

    async fn create_company_account(
        &self,
        company_name: &str,
        rescue_enabled: bool,
        mut owner: NewUser,
    ) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let company_id = Uuid::new_v4();
        sqlx::query("INSERT INTO companies (id, name, rescue_enabled) VALUES ($1, $2, $3)")
            .bind(company_id)
            .bind(company_name)
            .bind(rescue_enabled)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        owner.company_id = Some(company_id);
        // A failed insert drops the transaction, taking the company with it.
        let user_id = insert_user(&mut *tx, &owner).await?;
        tx.commit().await.map_err(unexpected)?;
        self.get_profile(user_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut conn = self.pool.acquire().await.map_err(unexpected)?;
        let user_id = insert_user(&mut *conn, &new_user).await?;
        self.get_profile(user_id).await
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User with email {} not found", email)))?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN companies c ON c.id = u.company_id WHERE u.user_id = $1"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("User {} not found", user_id)))?
            .to_domain()
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        let result = sqlx::query(
            "UPDATE users SET name = COALESCE($2, name), \
             phone = CASE WHEN $3::text IS NULL THEN phone ELSE NULLIF($3::text, '') END \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(update.name)
        .bind(update.phone)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        self.get_profile(user_id).await
    }

    async fn set_activated(&self, user_id: Uuid, activated: bool) -> PortResult<User> {
        let result = sqlx::query("UPDATE users SET activated = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(activated)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        self.get_profile(user_id).await
    }

    async fn list_company_members(&self, company_id: Uuid) -> PortResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN companies c ON c.id = u.company_id \
             WHERE u.company_id = $1 ORDER BY lower(u.name)"
        );
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(company_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `DutyStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DutyStore for DbAdapter {
    async fn get_driver(&self, driver_id: Uuid) -> PortResult<Driver> {
        let sql = format!("SELECT {DRIVER_COLUMNS} FROM users WHERE {SHIFT_WORKERS} AND user_id = $1");
        sqlx::query_as::<_, DriverRecord>(&sql)
            .bind(driver_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Driver {} not found", driver_id)))?
            .to_domain()
    }

    async fn list_on_duty(&self, company_id: Uuid) -> PortResult<Vec<Driver>> {
        fetch_on_duty(&self.pool, Some(company_id)).await
    }

    async fn list_all_on_duty(&self) -> PortResult<Vec<Driver>> {
        fetch_on_duty(&self.pool, None).await
    }

    async fn start_shift(&self, driver_id: Uuid, now: DateTime<Utc>) -> PortResult<Driver> {
        let sql = format!(
            "UPDATE users SET on_duty = TRUE, on_duty_since = $2, checked_in = FALSE, \
             rts_confirmed = FALSE \
             WHERE {SHIFT_WORKERS} AND user_id = $1 RETURNING {DRIVER_COLUMNS}"
        );
        let driver = sqlx::query_as::<_, DriverRecord>(&sql)
            .bind(driver_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Driver {} not found", driver_id)))?
            .to_domain()?;
        self.feed.publish(Change::Roster(driver.company_id));
        Ok(driver)
    }

    async fn check_in(&self, driver_id: Uuid) -> PortResult<Driver> {
        self.update_duty(driver_id, "checked_in = TRUE").await?;
        self.get_driver(driver_id).await
    }

    async fn set_off_duty(&self, driver_id: Uuid) -> PortResult<()> {
        self.update_duty(driver_id, OFF_DUTY_ASSIGNMENTS).await
    }

    async fn bulk_set_off_duty(&self, company_id: Uuid, driver_ids: &[Uuid]) -> PortResult<usize> {
        let sql = format!(
            "UPDATE users SET {OFF_DUTY_ASSIGNMENTS} \
             WHERE {SHIFT_WORKERS} AND on_duty AND company_id = $1 AND user_id = ANY($2)"
        );
        let result = sqlx::query(&sql)
            .bind(company_id)
            .bind(driver_ids.to_vec())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        self.feed.publish(Change::Roster(company_id));
        Ok(result.rows_affected() as usize)
    }

    async fn request_rescue(&self, driver_id: Uuid) -> PortResult<()> {
        self.update_duty(driver_id, "rescued = TRUE, rts_confirmed = FALSE").await
    }

    async fn dispatch_rescue(&self, dispatch: &RescueDispatch) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Both rows stay locked until commit, so a concurrent dispatch sees the new flags.
        let sql = format!(
            "SELECT {DRIVER_COLUMNS} FROM users \
             WHERE {SHIFT_WORKERS} AND company_id = $1 AND user_id = ANY($2) \
             ORDER BY user_id FOR UPDATE"
        );
        let locked = sqlx::query_as::<_, DriverRecord>(&sql)
            .bind(dispatch.company_id)
            .bind(vec![dispatch.rescuer_id, dispatch.rescuee_id])
            .fetch_all(&mut *tx)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(|r| r.to_domain())
            .collect::<PortResult<Vec<Driver>>>()?;
        let participant = |id: Uuid| {
            locked
                .iter()
                .find(|d| d.id == id)
                .ok_or_else(|| PortError::NotFound(format!("Driver {} not found", id)))
        };
        check_participants(participant(dispatch.rescuer_id)?, participant(dispatch.rescuee_id)?)
            .map_err(|e| PortError::Conflict(e.to_string()))?;

        sqlx::query(
            "INSERT INTO rescue_dispatches \
             (id, company_id, rescuer_id, rescuer_name, rescuee_id, rescuee_name, address, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(dispatch.id)
        .bind(dispatch.company_id)
        .bind(dispatch.rescuer_id)
        .bind(&dispatch.rescuer_name)
        .bind(dispatch.rescuee_id)
        .bind(&dispatch.rescuee_name)
        .bind(&dispatch.address)
        .bind(dispatch.status.as_str())
        .bind(dispatch.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        for (driver_id, assignment) in [
            (dispatch.rescuee_id, "rescued = TRUE"),
            (dispatch.rescuer_id, "rescuing = TRUE"),
        ] {
            let sql = format!("UPDATE users SET {assignment} WHERE user_id = $1");
            sqlx::query(&sql)
                .bind(driver_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        self.feed.publish(Change::Roster(dispatch.company_id));
        Ok(())
    }

    async fn confirm_rts(&self, driver_id: Uuid) -> PortResult<()> {
        self.update_duty(driver_id, "rescued = FALSE, rescuing = FALSE, rts_confirmed = TRUE")
            .await
    }

    async fn list_dispatches(&self, company_id: Uuid) -> PortResult<Vec<RescueDispatch>> {
        let records = sqlx::query_as::<_, DispatchRecord>(
            "SELECT id, company_id, rescuer_id, rescuer_name, rescuee_id, rescuee_name, address, created_at \
             FROM rescue_dispatches WHERE company_id = $1 ORDER BY created_at DESC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn watch_roster(&self, company_id: Uuid) -> PortResult<SnapshotStream<Driver>> {
        let pool = self.pool.clone();
        Ok(self.feed.snapshots(Change::Roster(company_id), move || {
            let pool = pool.clone();
            async move { fetch_on_duty(&pool, Some(company_id)).await }
        }))
    }
}

//=========================================================================================
// `ReturnsStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReturnsStore for DbAdapter {
    async fn create_return(&self, incident: &ReturnIncident) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO return_incidents \
             (id, driver_id, driver_name, company_id, has_returns, count, reasons, notified, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(incident.id)
        .bind(incident.driver_id)
        .bind(&incident.driver_name)
        .bind(incident.company_id)
        .bind(incident.has_returns)
        .bind(i32::try_from(incident.count).unwrap_or(i32::MAX))
        .bind(&incident.reasons)
        .bind(incident.notified)
        .bind(incident.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        self.feed.publish(Change::Returns(incident.company_id));
        Ok(())
    }

    async fn list_returns(&self, company_id: Uuid) -> PortResult<Vec<ReturnIncident>> {
        fetch_returns(&self.pool, company_id).await
    }

    async fn mark_returns_notified(&self, company_id: Uuid, incident_id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE return_incidents SET notified = TRUE WHERE id = $1 AND company_id = $2",
        )
        .bind(incident_id)
        .bind(company_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Return incident {} not found", incident_id)));
        }
        self.feed.publish(Change::Returns(company_id));
        Ok(())
    }

    async fn watch_returns(&self, company_id: Uuid) -> PortResult<SnapshotStream<ReturnIncident>> {
        let pool = self.pool.clone();
        Ok(self.feed.snapshots(Change::Returns(company_id), move || {
            let pool = pool.clone();
            async move { fetch_returns(&pool, company_id).await }
        }))
    }
}

//=========================================================================================
// `MessagingStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl MessagingStore for DbAdapter {
    async fn create_chat(&self, chat: &Chat) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chats (id, company_id, kind, title, members, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(chat.id)
        .bind(chat.company_id)
        .bind(chat.kind.as_str())
        .bind(&chat.title)
        .bind(&chat.members)
        .bind(chat.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
        sqlx::query_as::<_, ChatRecord>(
            "SELECT id, company_id, kind, title, members, created_at FROM chats WHERE id = $1",
        )
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Chat {} not found", chat_id)))?
        .to_domain()
    }

    async fn list_chats_for_member(&self, company_id: Uuid, user_id: Uuid) -> PortResult<Vec<Chat>> {
        let records = sqlx::query_as::<_, ChatRecord>(
            "SELECT id, company_id, kind, title, members, created_at FROM chats \
             WHERE company_id = $1 AND $2 = ANY(members) ORDER BY created_at DESC",
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn post_message(&self, message: &ChatMessage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, chat_id, sender_id, sender_name, body, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        self.feed.publish(Change::Chat(message.chat_id));
        Ok(())
    }

    async fn list_messages(&self, chat_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        fetch_messages(&self.pool, chat_id).await
    }

    async fn watch_messages(&self, chat_id: Uuid) -> PortResult<SnapshotStream<ChatMessage>> {
        let pool = self.pool.clone();
        Ok(self.feed.snapshots(Change::Chat(chat_id), move || {
            let pool = pool.clone();
            async move { fetch_messages(&pool, chat_id).await }
        }))
    }

    async fn create_notice(&self, notice: &Notice) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO notices (id, company_id, author_id, title, body, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(notice.id)
        .bind(notice.company_id)
        .bind(notice.author_id)
        .bind(&notice.title)
        .bind(&notice.body)
        .bind(notice.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_notices(&self, company_id: Uuid) -> PortResult<Vec<Notice>> {
        let records = sqlx::query_as::<_, NoticeRecord>(
            "SELECT id, company_id, author_id, title, body, created_at FROM notices \
             WHERE company_id = $1 ORDER BY created_at DESC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_post(&self, post: &Post) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO posts (id, company_id, author_id, author_name, body, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(post.id)
        .bind(post.company_id)
        .bind(post.author_id)
        .bind(&post.author_name)
        .bind(&post.body)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_posts(&self, company_id: Uuid) -> PortResult<Vec<Post>> {
        let records = sqlx::query_as::<_, AuthoredRecord>(
            "SELECT id, company_id, author_id, author_name, body, created_at FROM posts \
             WHERE company_id = $1 ORDER BY created_at DESC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_post()).collect())
    }

    async fn create_feedback(&self, feedback: &Feedback) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO feedback (id, company_id, author_id, author_name, body, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(feedback.id)
        .bind(feedback.company_id)
        .bind(feedback.author_id)
        .bind(&feedback.author_name)
        .bind(&feedback.body)
        .bind(feedback.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_feedback(&self, company_id: Uuid) -> PortResult<Vec<Feedback>> {
        let records = sqlx::query_as::<_, AuthoredRecord>(
            "SELECT id, company_id, author_id, author_name, body, created_at FROM feedback \
             WHERE company_id = $1 ORDER BY created_at DESC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_feedback()).collect())
    }
}
