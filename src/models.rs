use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub type Id = Uuid;

/// Text a reply carries after its author deletes it.
pub const DELETED_TEXT: &str = "[deleted]";
/// Threads returned by a board listing.
pub const BOARD_PAGE_SIZE: usize = 10;
/// Replies previewed per thread in a board listing.
pub const REPLY_PREVIEW: usize = 3;

// Stored records. These carry the password hash and moderation flag and are
// never serialized into an HTTP response; use the views below for that.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thread {
    pub id: Id,
    pub board: String,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
    pub reported: bool,
    pub delete_password_hash: String,
    #[sqlx(skip)]
    pub replies: Vec<Reply>, // insertion (creation) order
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reply {
    pub id: Id,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
    pub reported: bool,
    pub delete_password_hash: String,
}

impl Thread {
    pub fn reply(&self, id: Id) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == id)
    }

    /// Board listing view: newest `REPLY_PREVIEW` replies, oldest first.
    pub fn summary(&self) -> ThreadSummary {
        let skip = self.replies.len().saturating_sub(REPLY_PREVIEW);
        ThreadSummary {
            id: self.id,
            text: self.text.clone(),
            created_on: self.created_on,
            bumped_on: self.bumped_on,
            replies: self.replies[skip..].iter().map(ReplyView::from).collect(),
            replycount: self.replies.len(),
        }
    }

    /// Single thread view with every reply.
    pub fn view(&self) -> ThreadView {
        ThreadView {
            id: self.id,
            text: self.text.clone(),
            created_on: self.created_on,
            bumped_on: self.bumped_on,
            replies: self.replies.iter().map(ReplyView::from).collect(),
        }
    }
}

// ---------------- Client facing views ----------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReplyView {
    #[serde(rename = "_id")]
    pub id: Id,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
}

impl From<&Reply> for ReplyView {
    fn from(r: &Reply) -> Self {
        Self { id: r.id, text: r.text.clone(), created_on: r.created_on, bumped_on: r.bumped_on }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThreadSummary {
    #[serde(rename = "_id")]
    pub id: Id,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
    pub replies: Vec<ReplyView>,
    pub replycount: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThreadView {
    #[serde(rename = "_id")]
    pub id: Id,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
    pub replies: Vec<ReplyView>,
}

// ---------------- Request bodies ----------------
// Every field is optional at the wire level so a missing field surfaces as a
// validation error naming it instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NewThread {
    pub text: Option<String>,
    pub delete_password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ReportThread {
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DeleteThread {
    pub thread_id: Option<String>,
    pub delete_password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct RepliesQuery {
    /// Thread to fetch
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NewReply {
    pub thread_id: Option<String>,
    pub text: Option<String>,
    pub delete_password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ReportReply {
    pub thread_id: Option<String>,
    pub reply_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DeleteReply {
    pub thread_id: Option<String>,
    pub reply_id: Option<String>,
    pub delete_password: Option<String>,
}
