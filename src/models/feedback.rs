use super::{Directory, Populated};
use crate::{
    access::{Owned, Principal},
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    Academic,
    Infrastructure,
    Hostel,
    Food,
    Transport,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    Pending,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackTicket<U = Uuid> {
    pub id: Uuid,
    pub ticket_code: String,
    pub title: String,
    pub description: String,
    pub category: FeedbackCategory,
    pub priority: Priority,
    pub status: TicketStatus,
    pub is_anonymous: bool,
    pub submitted_by: U,
    pub assigned_to: Option<U>,
    #[serde(default)]
    pub responses: Vec<TicketResponse<U>>,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(FeedbackTicket, "feedback", "Feedback");

impl Owned for FeedbackTicket {
    fn owner(&self) -> Uuid {
        self.submitted_by
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse<U = Uuid> {
    pub id: Uuid,
    pub message: String,
    pub responded_by: U,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    pub title: String,
    pub description: String,
    pub category: FeedbackCategory,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Staff triage. Only the provided fields change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triage {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackFilter {
    pub category: Option<FeedbackCategory>,
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
}

impl FeedbackFilter {
    pub fn matches(&self, ticket: &FeedbackTicket) -> bool {
        self.category.map_or(true, |c| c == ticket.category)
            && self.status.map_or(true, |s| s == ticket.status)
            && self.priority.map_or(true, |p| p == ticket.priority)
    }
}

/// `FB-<year>-<seq>`, the sequence padded to at least three digits.
pub fn ticket_code(year: i32, sequence: i64) -> String {
    format!("FB-{year}-{sequence:03}")
}

impl NewFeedback {
    pub fn validate(&self) -> AppResult<()> {
        super::required_max("title", &self.title, 100)?;
        super::required_max("description", &self.description, 1000)
    }

    pub fn into_ticket(self, ticket_code: String, submitted_by: Uuid, now: DateTime<Utc>) -> FeedbackTicket {
        FeedbackTicket {
            id: Uuid::new_v4(),
            ticket_code,
            title: self.title.trim().to_string(),
            description: self.description,
            category: self.category,
            priority: self.priority.unwrap_or(Priority::Medium),
            status: TicketStatus::Pending,
            is_anonymous: self.is_anonymous,
            submitted_by,
            assigned_to: None,
            responses: Vec::new(),
            attachments: self.attachments,
            rating: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl FeedbackTicket {
    pub fn triage(&mut self, triage: Triage) {
        if let Some(status) = triage.status {
            self.status = status;
        }
        if let Some(priority) = triage.priority {
            self.priority = priority;
        }
        if triage.assigned_to.is_some() {
            self.assigned_to = triage.assigned_to;
        }
    }

    /// Appends a staff response. The first response on a pending ticket
    /// moves it to in-progress.
    pub fn respond(&mut self, responder: Uuid, message: String, now: DateTime<Utc>) -> AppResult<()> {
        super::required_max("message", &message, 1000)?;
        self.responses.push(TicketResponse {
            id: Uuid::new_v4(),
            message,
            responded_by: responder,
            responded_at: now,
        });
        if self.status == TicketStatus::Pending {
            self.status = TicketStatus::InProgress;
        }
        Ok(())
    }

    pub fn rate(&mut self, rating: u8) -> AppResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::validation("rating", "rating must be between 1 and 5"));
        }
        if !matches!(self.status, TicketStatus::Resolved | TicketStatus::Closed) {
            return Err(AppError::invalid_state(
                "feedback can only be rated once it is resolved or closed",
            ));
        }
        self.rating = Some(rating);
        Ok(())
    }

    pub fn user_ids(&self) -> Vec<Uuid> {
        std::iter::once(self.submitted_by)
            .chain(self.assigned_to)
            .chain(self.responses.iter().map(|r| r.responded_by))
            .collect()
    }

    pub fn populate(self, users: &Directory) -> FeedbackTicket<Populated> {
        let user = |id| users.summary(id);
        FeedbackTicket {
            id: self.id,
            ticket_code: self.ticket_code,
            title: self.title,
            description: self.description,
            category: self.category,
            priority: self.priority,
            status: self.status,
            is_anonymous: self.is_anonymous,
            submitted_by: user(self.submitted_by),
            assigned_to: self.assigned_to.map(user),
            responses: self
                .responses
                .into_iter()
                .map(|r| TicketResponse {
                    id: r.id,
                    message: r.message,
                    responded_by: user(r.responded_by),
                    responded_at: r.responded_at,
                })
                .collect(),
            attachments: self.attachments,
            rating: self.rating,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Renders the ticket for `viewer` with its users resolved, hiding the
    /// submitter of anonymous tickets from everyone but the submitter and
    /// admins.
    pub fn present(&self, viewer: &Principal, users: &Directory) -> AppResult<serde_json::Value> {
        let hidden = self.is_anonymous && viewer.id != self.submitted_by && !viewer.is_admin();
        let mut value = serde_json::to_value(self.clone().populate(users)).map_err(anyhow::Error::from)?;
        if hidden {
            if let Some(fields) = value.as_object_mut() {
                fields.remove("submittedBy");
            }
        }
        Ok(value)
    }
}
