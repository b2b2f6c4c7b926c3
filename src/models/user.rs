use super::Department;
use crate::{
    access::{Owned, Principal, Role},
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub department: Option<Department>,
    pub year: Option<u8>,
    pub phone: Option<String>,
    #[serde(default)]
    pub profile_picture: String,
    pub bio: Option<String>,
    #[serde(default)]
    pub registered_clubs: Vec<Uuid>,
    #[serde(default)]
    pub registered_events: Vec<Uuid>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(User, "users", "User");

impl Owned for User {
    fn owner(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub department: Option<Department>,
    pub year: Option<u8>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

/// What other users and the owner get to see. Never carries the hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<Department>,
    pub year: Option<u8>,
    pub phone: Option<String>,
    pub profile_picture: String,
    pub bio: Option<String>,
    pub registered_clubs: Vec<Uuid>,
    pub registered_events: Vec<Uuid>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            department: user.department,
            year: user.year,
            phone: user.phone.clone(),
            profile_picture: user.profile_picture.clone(),
            bio: user.bio.clone(),
            registered_clubs: user.registered_clubs.clone(),
            registered_events: user.registered_events.clone(),
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

/// The part of a user shown where another document refers to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<Department>,
    pub year: Option<u8>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub profile_picture: String,
    /// Only filled in where the reference is a point of contact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            department: user.department,
            year: user.year,
            profile_picture: user.profile_picture.clone(),
            phone: None,
        }
    }
}

/// A user reference resolved for display, `None` once the account is gone.
pub type Populated = Option<UserSummary>;

/// The users a read refers to, loaded once and shared by every reference.
#[derive(Debug, Default)]
pub struct Directory {
    users: HashMap<Uuid, (UserSummary, Option<String>)>,
}

impl Directory {
    pub fn insert(&mut self, user: &User) {
        self.users
            .insert(user.id, (UserSummary::from(user), user.phone.clone()));
    }

    pub fn summary(&self, id: Uuid) -> Populated {
        self.users.get(&id).map(|(summary, _)| summary.clone())
    }

    /// Like [`Directory::summary`], with the phone number.
    pub fn contact(&self, id: Uuid) -> Populated {
        self.users.get(&id).map(|(summary, phone)| UserSummary {
            phone: phone.clone(),
            ..summary.clone()
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl RegisterUser {
    pub fn validate(&self) -> AppResult<()> {
        super::required_max("name", &self.name, 50)?;
        super::email("email", self.email.trim())?;
        if self.password.chars().count() < 6 {
            return Err(AppError::validation(
                "password",
                "password must be at least 6 characters",
            ));
        }
        if self.role == Some(Role::Admin) {
            return Err(AppError::validation(
                "role",
                "admin accounts cannot be self-registered",
            ));
        }
        if let Some(phone) = &self.phone {
            super::phone("phone", phone)?;
        }
        check_role_fields(self.role.unwrap_or(Role::Student), self.department, self.year)
    }

    pub fn into_user(self, password_hash: String, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            password_hash,
            role: self.role.unwrap_or(Role::Student),
            department: self.department,
            year: self.year,
            phone: self.phone,
            profile_picture: String::new(),
            bio: None,
            registered_clubs: Vec::new(),
            registered_events: Vec::new(),
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Students need a department and a year, faculty a department.
fn check_role_fields(role: Role, department: Option<Department>, year: Option<u8>) -> AppResult<()> {
    if matches!(role, Role::Student | Role::Faculty) && department.is_none() {
        return Err(AppError::validation("department", "please provide department"));
    }
    match (role, year) {
        (Role::Student, None) => Err(AppError::validation("year", "please provide year")),
        (_, Some(year)) => super::year("year", year),
        _ => Ok(()),
    }
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            role: self.role,
        }
    }

    pub fn apply(&mut self, patch: UserPatch) -> AppResult<()> {
        if let Some(name) = patch.name {
            super::required_max("name", &name, 50)?;
            self.name = name.trim().to_string();
        }
        if let Some(phone) = patch.phone {
            super::phone("phone", &phone)?;
            self.phone = Some(phone);
        }
        if let Some(bio) = patch.bio {
            super::max_len("bio", &bio, 500)?;
            self.bio = Some(bio);
        }
        if let Some(role) = patch.role {
            check_role_fields(role, self.department, self.year)?;
            self.role = role;
        }
        Ok(())
    }

    /// Adds or removes a club from the user's side of the membership pair.
    pub fn track_club(&mut self, club: Uuid, member: bool) {
        track(&mut self.registered_clubs, club, member);
    }

    pub fn track_event(&mut self, event: Uuid, registered: bool) {
        track(&mut self.registered_events, event, registered);
    }
}

fn track(set: &mut Vec<Uuid>, id: Uuid, present: bool) {
    let position = set.iter().position(|x| *x == id);
    match (present, position) {
        (true, None) => set.push(id),
        (false, Some(i)) => {
            set.remove(i);
        }
        _ => {}
    }
}
