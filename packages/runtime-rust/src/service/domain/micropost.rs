//! Micropost operations: creation and logical removal.
//!
//! A removed micropost stays in the store with `removed_at`/`removed_id` set
//! and is hidden from [`list_microposts`].

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use logicbase_core::{Messages, Reason, BASE};
use serde::{Deserialize, Serialize};

use super::{MICROPOSTS, USERS};
use crate::service::operation::{Operation, OperationError, Report};
use crate::storage::{StoreError, Transaction, TransactionalStore};

/// Content length bounds, in characters, after trimming.
pub const CONTENT_MIN: usize = 5;
pub const CONTENT_MAX: usize = 30;

#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Micropost {
    pub id: String,
    pub user_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    #[serde(default)]
    pub removed_at: Option<i64>,
    #[serde(default)]
    pub removed_id: Option<String>,
}

impl Micropost {
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed_id.is_some()
    }

    /// Marks this micropost as removed without deleting it.
    pub fn logical_delete(&mut self) {
        self.removed_at = Some(now_millis());
        self.removed_id = Some(self.id.clone());
    }
}

/// Store `user` directly, outside any operation.
///
/// # Errors
///
/// Returns any store failure.
pub async fn seed_user(store: &dyn TransactionalStore, user: &User) -> Result<(), StoreError> {
    let tx = store.begin().await?;
    tx.put(USERS, &user.id, serde_json::to_value(user)?).await?;
    tx.commit().await
}

async fn load_micropost(
    store: &dyn TransactionalStore,
    id: &str,
) -> Result<Option<Micropost>, OperationError> {
    match store.get(MICROPOSTS, id).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Committed, not-removed microposts ordered by creation time, optionally
/// restricted to one author.
///
/// # Errors
///
/// Returns any store failure or a record that does not decode.
pub async fn list_microposts(
    store: &dyn TransactionalStore,
    user_id: Option<&str>,
) -> Result<Vec<Micropost>, OperationError> {
    let mut posts = Vec::new();
    for (_, value) in store.scan(MICROPOSTS).await? {
        let post: Micropost = serde_json::from_value(value)?;
        if post.is_removed() || user_id.is_some_and(|id| id != post.user_id) {
            continue;
        }
        posts.push(post);
    }
    posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(posts)
}

// ---------------------------------------------------------------------------
// CreateMicropost
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMicropostInput {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Value returned by a successful [`CreateMicropost`].
///
/// Carries the warnings recorded on the way, since a returned value replaces
/// the `{errors, warnings}` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub micropost: Micropost,
    pub warnings: Messages,
}

/// Creates a micropost for an existing user.
pub struct CreateMicropost {
    store: Arc<dyn TransactionalStore>,
}

impl CreateMicropost {
    #[must_use]
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Operation for CreateMicropost {
    type Input = CreateMicropostInput;
    type Output = Created;

    fn name(&self) -> &'static str {
        "CreateMicropost"
    }

    async fn authorize(
        &self,
        input: &CreateMicropostInput,
        report: &mut Report,
    ) -> Result<(), OperationError> {
        let Some(user_id) = input.user_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            return Ok(());
        };
        if self.store.get(USERS, user_id).await?.is_none() {
            report.errors.add("user_id", "does not exist");
        }
        Ok(())
    }

    async fn validate(
        &self,
        input: &CreateMicropostInput,
        report: &mut Report,
    ) -> Result<(), OperationError> {
        if input.user_id.is_none() && input.content.is_none() {
            report.errors.add(BASE, Reason::Invalid);
            return Ok(());
        }

        if is_blank(input.user_id.as_deref()) {
            report.errors.add("user_id", Reason::Blank);
        }

        let raw = input.content.as_deref().unwrap_or_default();
        let content = raw.trim();
        let length = content.chars().count();
        if content.is_empty() {
            report.errors.add("content", Reason::Blank);
        } else if length < CONTENT_MIN {
            report.errors.add("content", Reason::TooShort { min: CONTENT_MIN });
        } else if length > CONTENT_MAX {
            report.errors.add("content", Reason::TooLong { max: CONTENT_MAX });
        }

        if !content.is_empty() && content.len() != raw.len() {
            report
                .warnings
                .add("content", "has surrounding whitespace that was removed");
        }
        Ok(())
    }

    async fn execute(
        &self,
        input: &CreateMicropostInput,
        report: &mut Report,
        tx: &dyn Transaction,
    ) -> Result<Option<Created>, OperationError> {
        let post = Micropost {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: input.user_id.clone().unwrap_or_default(),
            content: input.content.as_deref().unwrap_or_default().trim().to_string(),
            created_at: now_millis(),
            removed_at: None,
            removed_id: None,
        };
        tx.insert(MICROPOSTS, &post.id, serde_json::to_value(&post)?)
            .await?;
        tracing::debug!(micropost_id = %post.id, user_id = %post.user_id, "micropost created");
        Ok(Some(Created {
            micropost: post,
            warnings: report.warnings.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// RemoveMicropost
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMicropostInput {
    pub micropost_id: String,
    /// The user requesting the removal.
    pub user_id: String,
}

/// Logically deletes a micropost on behalf of its author.
pub struct RemoveMicropost {
    store: Arc<dyn TransactionalStore>,
}

impl RemoveMicropost {
    #[must_use]
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Operation for RemoveMicropost {
    type Input = RemoveMicropostInput;
    type Output = Micropost;

    fn name(&self) -> &'static str {
        "RemoveMicropost"
    }

    async fn authorize(
        &self,
        input: &RemoveMicropostInput,
        report: &mut Report,
    ) -> Result<(), OperationError> {
        match load_micropost(self.store.as_ref(), &input.micropost_id).await? {
            None => report.errors.add("micropost_id", "does not exist"),
            Some(post) if post.user_id != input.user_id => {
                report.errors.add(BASE, "is not permitted");
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn validate(
        &self,
        input: &RemoveMicropostInput,
        report: &mut Report,
    ) -> Result<(), OperationError> {
        let removed = load_micropost(self.store.as_ref(), &input.micropost_id)
            .await?
            .is_some_and(|post| post.is_removed());
        if removed {
            report.errors.add(BASE, "has already been removed");
        }
        Ok(())
    }

    async fn execute(
        &self,
        input: &RemoveMicropostInput,
        report: &mut Report,
        tx: &dyn Transaction,
    ) -> Result<Option<Micropost>, OperationError> {
        // Re-read inside the transaction; the post may have changed since validate.
        let Some(value) = tx.get(MICROPOSTS, &input.micropost_id).await? else {
            report.errors.add("micropost_id", "does not exist");
            return Ok(None);
        };
        let mut post: Micropost = serde_json::from_value(value)?;
        if post.is_removed() {
            report.errors.add(BASE, "has already been removed");
            return Ok(None);
        }

        post.logical_delete();
        tx.put(MICROPOSTS, &post.id, serde_json::to_value(&post)?)
            .await?;
        tracing::debug!(micropost_id = %post.id, "micropost removed");
        Ok(Some(post))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
