use super::{Directory, Populated};
use crate::{
    access::Owned,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCategory {
    Electronics,
    Books,
    Accessories,
    #[serde(rename = "ID Cards")]
    IdCards,
    Clothing,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Lost,
    Found,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Claimed,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

/// Most images a single report or update may attach.
pub const MAX_ITEM_IMAGES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LostFoundItem<U = Uuid> {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: ItemCategory,
    #[serde(rename = "type")]
    pub kind: ItemType,
    pub location: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<String>,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: Option<String>,
    pub status: ItemStatus,
    #[serde(default)]
    pub claims: Vec<Claim<U>>,
    pub posted_by: U,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(LostFoundItem, "lost_found", "Item");

impl Owned for LostFoundItem {
    fn owner(&self) -> Uuid {
        self.posted_by
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim<U = Uuid> {
    pub id: Uuid,
    pub claimed_by: U,
    pub message: String,
    pub status: ClaimStatus,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub category: ItemCategory,
    #[serde(rename = "type")]
    pub kind: ItemType,
    pub location: String,
    pub date: Option<DateTime<Utc>>,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<ItemCategory>,
    #[serde(rename = "type")]
    pub kind: Option<ItemType>,
    pub location: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilter {
    #[serde(rename = "type")]
    pub kind: Option<ItemType>,
    pub category: Option<ItemCategory>,
    pub status: Option<ItemStatus>,
    pub search: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &LostFoundItem) -> bool {
        self.kind.map_or(true, |k| k == item.kind)
            && self.category.map_or(true, |c| c == item.category)
            && self.status.map_or(true, |s| s == item.status)
            && self.search.as_deref().map_or(true, |needle| {
                super::matches_text(
                    needle,
                    [
                        item.title.as_str(),
                        item.description.as_str(),
                        item.location.as_str(),
                    ],
                )
            })
    }
}

fn check_email(email: Option<&str>) -> AppResult<()> {
    match email {
        Some(email) if !email.is_empty() => super::email("contactEmail", email),
        _ => Ok(()),
    }
}

impl NewItem {
    pub fn validate(&self) -> AppResult<()> {
        super::required_max("title", &self.title, 100)?;
        super::required_max("description", &self.description, 500)?;
        super::required("location", &self.location)?;
        super::required("contactName", &self.contact_name)?;
        super::phone("contactPhone", &self.contact_phone)?;
        check_email(self.contact_email.as_deref())
    }

    pub fn into_item(self, posted_by: Uuid, images: Vec<String>, now: DateTime<Utc>) -> LostFoundItem {
        LostFoundItem {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            description: self.description,
            category: self.category,
            kind: self.kind,
            location: self.location,
            date: self.date.unwrap_or(now),
            images,
            contact_name: self.contact_name,
            contact_phone: self.contact_phone,
            contact_email: self.contact_email.filter(|e| !e.is_empty()),
            status: ItemStatus::Active,
            claims: Vec::new(),
            posted_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl LostFoundItem {
    /// Applies an owner edit. New images are appended, never replacing the
    /// existing ones. The only status an edit may set is `resolved`.
    pub fn apply(&mut self, patch: ItemPatch, new_images: Vec<String>) -> AppResult<()> {
        if let Some(status) = patch.status {
            if status != self.status && status != ItemStatus::Resolved {
                return Err(AppError::invalid_state(
                    "item status can only be changed to resolved",
                ));
            }
            self.status = status;
        }
        if let Some(title) = patch.title {
            super::required_max("title", &title, 100)?;
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            super::required_max("description", &description, 500)?;
            self.description = description;
        }
        if let Some(location) = patch.location {
            super::required("location", &location)?;
            self.location = location;
        }
        if let Some(name) = patch.contact_name {
            super::required("contactName", &name)?;
            self.contact_name = name;
        }
        if let Some(phone) = patch.contact_phone {
            super::phone("contactPhone", &phone)?;
            self.contact_phone = phone;
        }
        if patch.contact_email.is_some() {
            check_email(patch.contact_email.as_deref())?;
            self.contact_email = patch.contact_email.filter(|e| !e.is_empty());
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        self.images.extend(new_images);
        Ok(())
    }

    pub fn claim(&mut self, user: Uuid, message: String, now: DateTime<Utc>) -> AppResult<()> {
        super::required("message", &message)?;
        if self.status != ItemStatus::Active {
            return Err(AppError::invalid_state(
                "item is no longer available for claiming",
            ));
        }
        if self.claims.iter().any(|c| c.claimed_by == user) {
            return Err(AppError::conflict("you have already claimed this item"));
        }

        self.claims.push(Claim {
            id: Uuid::new_v4(),
            claimed_by: user,
            message,
            status: ClaimStatus::Pending,
            claimed_at: now,
        });
        Ok(())
    }

    /// Decides a pending claim. Approving hands the item over: it becomes
    /// `claimed` and every other pending claim is rejected.
    pub fn decide_claim(&mut self, claim_id: Uuid, decision: ClaimStatus) -> AppResult<()> {
        if decision == ClaimStatus::Pending {
            return Err(AppError::validation(
                "status",
                "status must be approved or rejected",
            ));
        }
        let item_status = self.status;
        let claim = self
            .claims
            .iter_mut()
            .find(|c| c.id == claim_id)
            .ok_or(AppError::NotFound("Claim"))?;
        if claim.status != ClaimStatus::Pending {
            return Err(AppError::invalid_state("claim has already been decided"));
        }
        if decision == ClaimStatus::Approved && item_status != ItemStatus::Active {
            return Err(AppError::invalid_state(
                "item is no longer available for claiming",
            ));
        }
        claim.status = decision;

        if decision == ClaimStatus::Approved {
            self.status = ItemStatus::Claimed;
            for other in self.claims.iter_mut().filter(|c| c.id != claim_id) {
                if other.status == ClaimStatus::Pending {
                    other.status = ClaimStatus::Rejected;
                }
            }
        }
        Ok(())
    }

    pub fn user_ids(&self) -> Vec<Uuid> {
        std::iter::once(self.posted_by)
            .chain(self.claims.iter().map(|c| c.claimed_by))
            .collect()
    }

    /// The poster and claimants are points of contact, so their phone
    /// numbers are included.
    pub fn populate(self, users: &Directory) -> LostFoundItem<Populated> {
        LostFoundItem {
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            kind: self.kind,
            location: self.location,
            date: self.date,
            images: self.images,
            contact_name: self.contact_name,
            contact_phone: self.contact_phone,
            contact_email: self.contact_email,
            status: self.status,
            claims: self
                .claims
                .into_iter()
                .map(|c| Claim {
                    id: c.id,
                    claimed_by: users.contact(c.claimed_by),
                    message: c.message,
                    status: c.status,
                    claimed_at: c.claimed_at,
                })
                .collect(),
            posted_by: users.contact(self.posted_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
