use super::{Department, Directory, Populated};
use crate::{
    access::Owned,
    error::AppResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementType {
    Emergency,
    Placement,
    Exam,
    Hostel,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    All,
    Students,
    Faculty,
    Specific,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement<U = Uuid> {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: AnnouncementType,
    pub is_pinned: bool,
    pub target_audience: Audience,
    #[serde(default)]
    pub specific_departments: Vec<Department>,
    #[serde(default)]
    pub specific_years: Vec<u8>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: U,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Announcement, "announcements", "Announcement");

impl Owned for Announcement {
    fn owner(&self) -> Uuid {
        self.created_by
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: Option<AnnouncementType>,
    #[serde(default)]
    pub is_pinned: bool,
    pub target_audience: Option<Audience>,
    #[serde(default)]
    pub specific_departments: Vec<Department>,
    #[serde(default)]
    pub specific_years: Vec<u8>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<AnnouncementType>,
    pub is_pinned: Option<bool>,
    pub target_audience: Option<Audience>,
    pub specific_departments: Option<Vec<Department>>,
    pub specific_years: Option<Vec<u8>>,
    pub attachments: Option<Vec<Attachment>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementFilter {
    #[serde(rename = "type")]
    pub kind: Option<AnnouncementType>,
    pub is_pinned: Option<bool>,
}

impl AnnouncementFilter {
    pub fn matches(&self, announcement: &Announcement) -> bool {
        self.kind.map_or(true, |k| k == announcement.kind)
            && self.is_pinned.map_or(true, |p| p == announcement.is_pinned)
    }
}

fn check_text(title: Option<&str>, content: Option<&str>) -> AppResult<()> {
    if let Some(title) = title {
        super::required_max("title", title, 200)?;
    }
    if let Some(content) = content {
        super::required_max("content", content, 2000)?;
    }
    Ok(())
}

fn check_years(years: &[u8]) -> AppResult<()> {
    years
        .iter()
        .try_for_each(|year| super::year("specificYears", *year))
}

impl NewAnnouncement {
    pub fn validate(&self) -> AppResult<()> {
        check_text(Some(&self.title), Some(&self.content))?;
        check_years(&self.specific_years)
    }

    pub fn into_announcement(self, created_by: Uuid, now: DateTime<Utc>) -> Announcement {
        Announcement {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            content: self.content,
            kind: self.kind.unwrap_or(AnnouncementType::General),
            is_pinned: self.is_pinned,
            target_audience: self.target_audience.unwrap_or(Audience::All),
            specific_departments: self.specific_departments,
            specific_years: self.specific_years,
            attachments: self.attachments,
            expires_at: self.expires_at,
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Announcement {
    pub fn apply(&mut self, patch: AnnouncementPatch) -> AppResult<()> {
        check_text(patch.title.as_deref(), patch.content.as_deref())?;
        if let Some(years) = &patch.specific_years {
            check_years(years)?;
        }

        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(pinned) = patch.is_pinned {
            self.is_pinned = pinned;
        }
        if let Some(audience) = patch.target_audience {
            self.target_audience = audience;
        }
        if let Some(departments) = patch.specific_departments {
            self.specific_departments = departments;
        }
        if let Some(years) = patch.specific_years {
            self.specific_years = years;
        }
        if let Some(attachments) = patch.attachments {
            self.attachments = attachments;
        }
        if patch.expires_at.is_some() {
            self.expires_at = patch.expires_at;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        Ok(())
    }

    /// Active and not past its expiry.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |at| at >= now)
    }

    pub fn populate(self, users: &Directory) -> Announcement<Populated> {
        Announcement {
            id: self.id,
            title: self.title,
            content: self.content,
            kind: self.kind,
            is_pinned: self.is_pinned,
            target_audience: self.target_audience,
            specific_departments: self.specific_departments,
            specific_years: self.specific_years,
            attachments: self.attachments,
            expires_at: self.expires_at,
            is_active: self.is_active,
            created_by: users.summary(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Pinned first, then newest first.
pub fn board_order(a: &Announcement, b: &Announcement) -> Ordering {
    b.is_pinned
        .cmp(&a.is_pinned)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn new_announcement(pinned: bool) -> NewAnnouncement {
        NewAnnouncement {
            title: "Exam schedule".into(),
            content: "Midterms start Monday".into(),
            kind: Some(AnnouncementType::Exam),
            is_pinned: pinned,
            target_audience: None,
            specific_departments: vec![],
            specific_years: vec![],
            attachments: vec![],
            expires_at: None,
        }
    }

    #[test]
    fn expired_announcements_are_not_live() {
        let now = Utc::now();
        let mut a = new_announcement(false).into_announcement(Uuid::new_v4(), now);
        assert!(a.is_live(now));
        a.expires_at = Some(now - Duration::minutes(1));
        assert!(!a.is_live(now));
        a.expires_at = None;
        a.is_active = false;
        assert!(!a.is_live(now));
    }

    #[test]
    fn pinned_sorts_before_newer_unpinned() {
        let now = Utc::now();
        let pinned = new_announcement(true).into_announcement(Uuid::new_v4(), now - Duration::days(3));
        let fresh = new_announcement(false).into_announcement(Uuid::new_v4(), now);
        let mut board = vec![fresh, pinned];
        board.sort_by(board_order);
        assert!(board[0].is_pinned);
    }

    #[test]
    fn content_limit() {
        let mut req = new_announcement(false);
        req.content = "x".repeat(2001);
        assert!(req.validate().is_err());
    }
}
