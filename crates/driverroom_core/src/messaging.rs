//! crates/driverroom_core/src/messaging.rs
//!
//! Company-scoped chats, notices, posts and feedback.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Chat, ChatKind, ChatMessage, Feedback, Notice, Post, User};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{IdentityService, MessagingStore, SnapshotStream};
use crate::session::{company_scope, dispatcher_scope};

/// A chat as requested by its creator.
#[derive(Debug, Clone)]
pub struct NewChat {
    pub kind: ChatKind,
    pub title: Option<String>,
    pub members: Vec<Uuid>,
}

fn non_blank(value: &str, what: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{what} cannot be empty.")));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct MessagingDesk {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn MessagingStore>,
}

impl MessagingDesk {
    pub fn new(identity: Arc<dyn IdentityService>, store: Arc<dyn MessagingStore>) -> Self {
        Self { identity, store }
    }

    // --- Chats ---

    pub async fn create_chat(&self, creator: &User, request: NewChat) -> ServiceResult<Chat> {
        let company_id = company_scope(creator)?;
        let company_members: BTreeSet<Uuid> = self
            .identity
            .list_company_members(company_id)
            .await?
            .into_iter()
            .map(|u| u.user_id)
            .collect();

        let mut members: BTreeSet<Uuid> = match request.kind {
            ChatKind::Team => company_members.clone(),
            ChatKind::Group | ChatKind::Direct => request.members.iter().copied().collect(),
        };
        members.insert(creator.user_id);

        if let Some(outsider) = members.iter().find(|id| !company_members.contains(*id)) {
            return Err(ServiceError::validation(format!(
                "User {outsider} is not a member of this company."
            )));
        }
        match request.kind {
            ChatKind::Direct if members.len() != 2 => {
                return Err(ServiceError::validation(
                    "A direct chat needs exactly one other person.",
                ))
            }
            ChatKind::Group if members.len() < 2 => {
                return Err(ServiceError::validation("A group chat needs at least two members."))
            }
            _ => {}
        }

        let title = match request.title {
            Some(title) if !title.trim().is_empty() => Some(title.trim().to_string()),
            _ => None,
        };
        let chat = Chat {
            id: Uuid::new_v4(),
            company_id,
            kind: request.kind,
            title,
            members: members.into_iter().collect(),
            created_at: Utc::now(),
        };
        self.store.create_chat(&chat).await?;
        info!(
            "{} created a {} chat with {} members",
            creator.name,
            chat.kind.as_str(),
            chat.members.len()
        );
        Ok(chat)
    }

    pub async fn list_chats(&self, user: &User) -> ServiceResult<Vec<Chat>> {
        let company_id = company_scope(user)?;
        Ok(self.store.list_chats_for_member(company_id, user.user_id).await?)
    }

    /// Loads a chat the user belongs to.
    pub async fn member_chat(&self, user: &User, chat_id: Uuid) -> ServiceResult<Chat> {
        let company_id = company_scope(user)?;
        let chat = self.store.get_chat(chat_id).await?;
        if chat.company_id != company_id || !chat.members.contains(&user.user_id) {
            return Err(ServiceError::forbidden("not a member of this chat"));
        }
        Ok(chat)
    }

    pub async fn send_message(
        &self,
        sender: &User,
        chat_id: Uuid,
        body: &str,
    ) -> ServiceResult<ChatMessage> {
        let chat = self.member_chat(sender, chat_id).await?;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            chat_id: chat.id,
            sender_id: sender.user_id,
            sender_name: sender.name.clone(),
            body: non_blank(body, "Message")?,
            created_at: Utc::now(),
        };
        self.store.post_message(&message).await?;
        Ok(message)
    }

    pub async fn list_messages(&self, user: &User, chat_id: Uuid) -> ServiceResult<Vec<ChatMessage>> {
        let chat = self.member_chat(user, chat_id).await?;
        Ok(self.store.list_messages(chat.id).await?)
    }

    pub async fn watch_messages(
        &self,
        user: &User,
        chat_id: Uuid,
    ) -> ServiceResult<SnapshotStream<ChatMessage>> {
        let chat = self.member_chat(user, chat_id).await?;
        Ok(self.store.watch_messages(chat.id).await?)
    }

    // --- Notices ---

    pub async fn publish_notice(&self, author: &User, title: &str, body: &str) -> ServiceResult<Notice> {
        let company_id = dispatcher_scope(author)?;
        let notice = Notice {
            id: Uuid::new_v4(),
            company_id,
            author_id: author.user_id,
            title: non_blank(title, "Title")?,
            body: non_blank(body, "Notice")?,
            created_at: Utc::now(),
        };
        self.store.create_notice(&notice).await?;
        info!("Notice '{}' published", notice.title);
        Ok(notice)
    }

    pub async fn list_notices(&self, user: &User) -> ServiceResult<Vec<Notice>> {
        let company_id = company_scope(user)?;
        Ok(self.store.list_notices(company_id).await?)
    }

    // --- Posts ---

    pub async fn create_post(&self, author: &User, body: &str) -> ServiceResult<Post> {
        let company_id = company_scope(author)?;
        let post = Post {
            id: Uuid::new_v4(),
            company_id,
            author_id: author.user_id,
            author_name: author.name.clone(),
            body: non_blank(body, "Post")?,
            created_at: Utc::now(),
        };
        self.store.create_post(&post).await?;
        Ok(post)
    }

    pub async fn list_posts(&self, user: &User) -> ServiceResult<Vec<Post>> {
        let company_id = company_scope(user)?;
        Ok(self.store.list_posts(company_id).await?)
    }

    // --- Feedback ---

    pub async fn send_feedback(&self, author: &User, body: &str) -> ServiceResult<Feedback> {
        let company_id = company_scope(author)?;
        if !author.role.works_shifts() {
            return Err(ServiceError::forbidden("feedback is sent by drivers and trainers"));
        }
        let feedback = Feedback {
            id: Uuid::new_v4(),
            company_id,
            author_id: author.user_id,
            author_name: author.name.clone(),
            body: non_blank(body, "Feedback")?,
            created_at: Utc::now(),
        };
        self.store.create_feedback(&feedback).await?;
        info!("Feedback received from {}", feedback.author_name);
        Ok(feedback)
    }

    pub async fn list_feedback(&self, operator: &User) -> ServiceResult<Vec<Feedback>> {
        let company_id = dispatcher_scope(operator)?;
        Ok(self.store.list_feedback(company_id).await?)
    }
}
