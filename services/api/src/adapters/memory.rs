//! services/api/src/adapters/memory.rs
//!
//! An in-memory implementation of every storage port, used by the test suite and
//! for running the service without PostgreSQL. Each multi-record action runs under
//! one write lock, which gives it the same all-or-nothing behaviour as the
//! database transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driverroom_core::domain::{
    AuthSession, Chat, ChatMessage, Company, Driver, DutyStatus, Feedback, NewUser, Notice, Post,
    ProfileUpdate, RescueDispatch, ReturnIncident, User, UserCredentials,
};
use driverroom_core::ports::{
    DutyStore, IdentityService, MessagingStore, PortError, PortResult, ReturnsStore,
    SnapshotStream,
};
use driverroom_core::rescue::check_participants;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adapters::feed::{Change, ChangeFeed};

struct StoredUser {
    profile: User,
    hashed_password: String,
    duty: DutyStatus,
}

impl StoredUser {
    fn as_driver(&self) -> Option<Driver> {
        let company_id = self.profile.company_id?;
        self.profile.role.works_shifts().then(|| Driver {
            id: self.profile.user_id,
            name: self.profile.name.clone(),
            role: self.profile.role,
            company_id,
            duty: self.duty.clone(),
        })
    }
}

#[derive(Default)]
struct Tables {
    companies: HashMap<Uuid, Company>,
    users: HashMap<Uuid, StoredUser>,
    sessions: HashMap<String, AuthSession>,
    dispatches: Vec<RescueDispatch>,
    returns: Vec<ReturnIncident>,
    chats: HashMap<Uuid, Chat>,
    messages: Vec<ChatMessage>,
    notices: Vec<Notice>,
    posts: Vec<Post>,
    feedback: Vec<Feedback>,
}

impl Tables {
    fn profile(&self, user_id: Uuid) -> PortResult<User> {
        let stored = self
            .users
            .get(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        let mut profile = stored.profile.clone();
        profile.company_name = profile
            .company_id
            .and_then(|id| self.companies.get(&id))
            .map(|c| c.name.clone());
        Ok(profile)
    }

    fn insert_user(&mut self, new_user: NewUser) -> PortResult<Uuid> {
        let taken = self
            .users
            .values()
            .any(|u| u.profile.email.eq_ignore_ascii_case(&new_user.email));
        if taken {
            return Err(PortError::Conflict(format!(
                "Email {} is already registered",
                new_user.email
            )));
        }
        let user_id = Uuid::new_v4();
        let profile = User {
            user_id,
            name: new_user.name,
            email: new_user.email,
            company_id: new_user.company_id,
            company_name: None,
            role: new_user.role,
            activated: new_user.activated,
            phone: None,
            created_at: Utc::now(),
        };
        self.users.insert(
            user_id,
            StoredUser {
                profile,
                hashed_password: new_user.hashed_password,
                duty: DutyStatus::default(),
            },
        );
        Ok(user_id)
    }

    fn driver_mut(&mut self, driver_id: Uuid) -> PortResult<&mut StoredUser> {
        self.users
            .get_mut(&driver_id)
            .filter(|u| u.profile.role.works_shifts() && u.profile.company_id.is_some())
            .ok_or_else(|| PortError::NotFound(format!("Driver {} not found", driver_id)))
    }

    fn on_duty(&self, company_id: Option<Uuid>) -> Vec<Driver> {
        self.users
            .values()
            .filter_map(StoredUser::as_driver)
            .filter(|d| d.duty.on_duty)
            .filter(|d| company_id.map_or(true, |id| d.company_id == id))
            .collect()
    }

    fn returns_for(&self, company_id: Uuid) -> Vec<ReturnIncident> {
        newest_first(
            self.returns
                .iter()
                .filter(|r| r.company_id == company_id)
                .cloned()
                .collect(),
            |r| r.created_at,
        )
    }

    fn messages_for(&self, chat_id: Uuid) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        messages
    }
}

fn newest_first<T>(mut items: Vec<T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    feed: ChangeFeed,
    writes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write operations that reached the store.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// While set, every write fails with `PortError::Unexpected` and changes nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every stored company, in no particular order.
    pub async fn companies(&self) -> Vec<Company> {
        self.tables.read().await.companies.values().cloned().collect()
    }

    fn begin_write(&self) -> PortResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("store is unavailable".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Applies `update` to one driver's duty flags and announces the roster change.
    async fn update_duty(
        &self,
        driver_id: Uuid,
        update: impl FnOnce(&mut DutyStatus),
    ) -> PortResult<Driver> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let stored = tables.driver_mut(driver_id)?;
        update(&mut stored.duty);
        let driver = stored
            .as_driver()
            .ok_or_else(|| PortError::NotFound(format!("Driver {} not found", driver_id)))?;
        drop(tables);
        self.feed.publish(Change::Roster(driver.company_id));
        Ok(driver)
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for InMemoryStore {
    async fn create_company(&self, name: &str, rescue_enabled: bool) -> PortResult<Company> {
        self.begin_write()?;
        let company = Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
            rescue_enabled,
        };
        self.tables
            .write()
            .await
            .companies
            .insert(company.id, company.clone());
        Ok(company)
    }

    async fn get_company(&self, company_id: Uuid) -> PortResult<Company> {
        self.tables
            .read()
            .await
            .companies
            .get(&company_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Company {} not found", company_id)))
    }

    async fn create_company_account(
        &self,
        company_name: &str,
        rescue_enabled: bool,
        mut owner: NewUser,
    ) -> PortResult<User> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let company = Company {
            id: Uuid::new_v4(),
            name: company_name.to_string(),
            rescue_enabled,
        };
        owner.company_id = Some(company.id);
        let user_id = tables.insert_user(owner)?;
        tables.companies.insert(company.id, company);
        tables.profile(user_id)
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let user_id = tables.insert_user(new_user)?;
        tables.profile(user_id)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.profile.email.eq_ignore_ascii_case(email))
            .map(|u| UserCredentials {
                user_id: u.profile.user_id,
                email: u.profile.email.clone(),
                hashed_password: u.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<User> {
        self.tables.read().await.profile(user_id)
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let stored = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        if let Some(name) = update.name {
            stored.profile.name = name;
        }
        if let Some(phone) = update.phone {
            stored.profile.phone = Some(phone).filter(|p| !p.is_empty());
        }
        tables.profile(user_id)
    }

    async fn set_activated(&self, user_id: Uuid, activated: bool) -> PortResult<User> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?
            .profile
            .activated = activated;
        tables.profile(user_id)
    }

    async fn list_company_members(&self, company_id: Uuid) -> PortResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut members = tables
            .users
            .values()
            .filter(|u| u.profile.company_id == Some(company_id))
            .map(|u| tables.profile(u.profile.user_id))
            .collect::<PortResult<Vec<User>>>()?;
        members.sort_by_key(|u| u.name.to_lowercase());
        Ok(members)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.begin_write()?;
        self.tables.write().await.sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        self.tables
            .read()
            .await
            .sessions
            .get(session_id)
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.user_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.begin_write()?;
        self.tables.write().await.sessions.remove(session_id);
        Ok(())
    }
}

//=========================================================================================
// `DutyStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DutyStore for InMemoryStore {
    async fn get_driver(&self, driver_id: Uuid) -> PortResult<Driver> {
        self.tables
            .read()
            .await
            .users
            .get(&driver_id)
            .and_then(StoredUser::as_driver)
            .ok_or_else(|| PortError::NotFound(format!("Driver {} not found", driver_id)))
    }

    async fn list_on_duty(&self, company_id: Uuid) -> PortResult<Vec<Driver>> {
        Ok(self.tables.read().await.on_duty(Some(company_id)))
    }

    async fn list_all_on_duty(&self) -> PortResult<Vec<Driver>> {
        Ok(self.tables.read().await.on_duty(None))
    }

    async fn start_shift(&self, driver_id: Uuid, now: DateTime<Utc>) -> PortResult<Driver> {
        self.update_duty(driver_id, |duty| duty.start_shift(now))
            .await
    }

    async fn check_in(&self, driver_id: Uuid) -> PortResult<Driver> {
        self.update_duty(driver_id, |duty| duty.checked_in = true).await
    }

    async fn set_off_duty(&self, driver_id: Uuid) -> PortResult<()> {
        self.update_duty(driver_id, DutyStatus::clear_off_duty).await?;
        Ok(())
    }

    async fn bulk_set_off_duty(&self, company_id: Uuid, driver_ids: &[Uuid]) -> PortResult<usize> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for id in driver_ids {
            if let Some(stored) = tables.users.get_mut(id) {
                let on_roster = stored
                    .as_driver()
                    .is_some_and(|d| d.company_id == company_id && d.duty.on_duty);
                if on_roster {
                    stored.duty.clear_off_duty();
                    updated += 1;
                }
            }
        }
        drop(tables);
        self.feed.publish(Change::Roster(company_id));
        Ok(updated)
    }

    async fn request_rescue(&self, driver_id: Uuid) -> PortResult<()> {
        self.update_duty(driver_id, |duty| {
            duty.rescued = true;
            duty.rts_confirmed = false;
        })
        .await?;
        Ok(())
    }

    async fn dispatch_rescue(&self, dispatch: &RescueDispatch) -> PortResult<()> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let mut participants = Vec::with_capacity(2);
        for id in [dispatch.rescuer_id, dispatch.rescuee_id] {
            let driver = tables
                .users
                .get(&id)
                .and_then(StoredUser::as_driver)
                .filter(|d| d.company_id == dispatch.company_id)
                .ok_or_else(|| PortError::NotFound(format!("Driver {} not found", id)))?;
            participants.push(driver);
        }
        // Re-checked under the lock: flags may have moved since the caller read them.
        check_participants(&participants[0], &participants[1])
            .map_err(|e| PortError::Conflict(e.to_string()))?;

        if let Some(rescuee) = tables.users.get_mut(&dispatch.rescuee_id) {
            rescuee.duty.rescued = true;
        }
        if let Some(rescuer) = tables.users.get_mut(&dispatch.rescuer_id) {
            rescuer.duty.rescuing = true;
        }
        tables.dispatches.push(dispatch.clone());
        drop(tables);
        self.feed.publish(Change::Roster(dispatch.company_id));
        Ok(())
    }

    async fn confirm_rts(&self, driver_id: Uuid) -> PortResult<()> {
        self.update_duty(driver_id, DutyStatus::confirm_rts).await?;
        Ok(())
    }

    async fn list_dispatches(&self, company_id: Uuid) -> PortResult<Vec<RescueDispatch>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .dispatches
                .iter()
                .filter(|d| d.company_id == company_id)
                .cloned()
                .collect(),
            |d| d.created_at,
        ))
    }

    async fn watch_roster(&self, company_id: Uuid) -> PortResult<SnapshotStream<Driver>> {
        let tables = self.tables.clone();
        Ok(self.feed.snapshots(Change::Roster(company_id), move || {
            let tables = tables.clone();
            async move { Ok(tables.read().await.on_duty(Some(company_id))) }
        }))
    }
}

//=========================================================================================
// `ReturnsStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReturnsStore for InMemoryStore {
    async fn create_return(&self, incident: &ReturnIncident) -> PortResult<()> {
        self.begin_write()?;
        self.tables.write().await.returns.push(incident.clone());
        self.feed.publish(Change::Returns(incident.company_id));
        Ok(())
    }

    async fn list_returns(&self, company_id: Uuid) -> PortResult<Vec<ReturnIncident>> {
        Ok(self.tables.read().await.returns_for(company_id))
    }

    async fn mark_returns_notified(&self, company_id: Uuid, incident_id: Uuid) -> PortResult<()> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let incident = tables
            .returns
            .iter_mut()
            .find(|r| r.id == incident_id && r.company_id == company_id)
            .ok_or_else(|| PortError::NotFound(format!("Return incident {} not found", incident_id)))?;
        incident.notified = true;
        drop(tables);
        self.feed.publish(Change::Returns(company_id));
        Ok(())
    }

    async fn watch_returns(&self, company_id: Uuid) -> PortResult<SnapshotStream<ReturnIncident>> {
        let tables = self.tables.clone();
        Ok(self.feed.snapshots(Change::Returns(company_id), move || {
            let tables = tables.clone();
            async move { Ok(tables.read().await.returns_for(company_id)) }
        }))
    }
}

//=========================================================================================
// `MessagingStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl MessagingStore for InMemoryStore {
    async fn create_chat(&self, chat: &Chat) -> PortResult<()> {
        self.begin_write()?;
        self.tables.write().await.chats.insert(chat.id, chat.clone());
        Ok(())
    }

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
        self.tables
            .read()
            .await
            .chats
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Chat {} not found", chat_id)))
    }

    async fn list_chats_for_member(&self, company_id: Uuid, user_id: Uuid) -> PortResult<Vec<Chat>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .chats
                .values()
                .filter(|c| c.company_id == company_id && c.members.contains(&user_id))
                .cloned()
                .collect(),
            |c| c.created_at,
        ))
    }

    async fn post_message(&self, message: &ChatMessage) -> PortResult<()> {
        self.begin_write()?;
        self.tables.write().await.messages.push(message.clone());
        self.feed.publish(Change::Chat(message.chat_id));
        Ok(())
    }

    async fn list_messages(&self, chat_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        Ok(self.tables.read().await.messages_for(chat_id))
    }

    async fn watch_messages(&self, chat_id: Uuid) -> PortResult<SnapshotStream<ChatMessage>> {
        let tables = self.tables.clone();
        Ok(self.feed.snapshots(Change::Chat(chat_id), move || {
            let tables = tables.clone();
            async move { Ok(tables.read().await.messages_for(chat_id)) }
        }))
    }

    async fn create_notice(&self, notice: &Notice) -> PortResult<()> {
        self.begin_write()?;
        self.tables.write().await.notices.push(notice.clone());
        Ok(())
    }

    async fn list_notices(&self, company_id: Uuid) -> PortResult<Vec<Notice>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .notices
                .iter()
                .filter(|n| n.company_id == company_id)
                .cloned()
                .collect(),
            |n| n.created_at,
        ))
    }

    async fn create_post(&self, post: &Post) -> PortResult<()> {
        self.begin_write()?;
        self.tables.write().await.posts.push(post.clone());
        Ok(())
    }

    async fn list_posts(&self, company_id: Uuid) -> PortResult<Vec<Post>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .posts
                .iter()
                .filter(|p| p.company_id == company_id)
                .cloned()
                .collect(),
            |p| p.created_at,
        ))
    }

    async fn create_feedback(&self, feedback: &Feedback) -> PortResult<()> {
        self.begin_write()?;
        self.tables.write().await.feedback.push(feedback.clone());
        Ok(())
    }

    async fn list_feedback(&self, company_id: Uuid) -> PortResult<Vec<Feedback>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .feedback
                .iter()
                .filter(|f| f.company_id == company_id)
                .cloned()
                .collect(),
            |f| f.created_at,
        ))
    }
}
