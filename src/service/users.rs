use crate::{
    access::{authorize, Action, Principal, Role},
    auth::{hash_password, verify_password, AuthService},
    blob::{BlobStore, Upload, UploadKind},
    error::{AppError, AppResult},
    models::{normalize_email, Club, Department, Event, RegisterUser, User, UserPatch, UserProfile},
    store::Store,
};
use anyhow::anyhow;
use chrono::Utc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key namespace holding one entry per registered email.
const EMAIL_KEYS: &str = "user-email";

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub department: Option<Department>,
    pub year: Option<u8>,
}

impl UserFilter {
    fn matches(&self, user: &User) -> bool {
        self.role.map_or(true, |r| r == user.role)
            && self.department.map_or(true, |d| Some(d) == user.department)
            && self.year.map_or(true, |y| Some(y) == user.year)
    }
}

fn session(auth: &AuthService, user: &User) -> AppResult<AuthResponse> {
    Ok(AuthResponse {
        token: auth.issue_token(user.id, user.role)?,
        user: user.into(),
    })
}

pub async fn register_user(store: &Store, auth: &AuthService, data: RegisterUser) -> AppResult<AuthResponse> {
    data.validate()?;
    let password_hash = hash_password(&data.password).map_err(|e| anyhow!("failed to hash password: {e}"))?;
    let user = data.into_user(password_hash, Utc::now());

    if !store.reserve_key(EMAIL_KEYS, &user.email, user.id).await? {
        return Err(AppError::conflict("user already exists with this email"));
    }
    if let Err(err) = store.create(&user).await {
        store.release_key(EMAIL_KEYS, &user.email).await?;
        return Err(err);
    }

    tracing::info!(user = %user.id, role = ?user.role, "registered user");
    session(auth, &user)
}

pub async fn login(store: &Store, auth: &AuthService, credentials: Credentials) -> AppResult<AuthResponse> {
    let email = normalize_email(&credentials.email);
    let Some(id) = store.key_owner(EMAIL_KEYS, &email).await? else {
        return Err(AppError::InvalidCredentials);
    };
    let user = store.find::<User>(id).await?.ok_or(AppError::InvalidCredentials)?;

    let valid = verify_password(&credentials.password, &user.password_hash)
        .map_err(|e| anyhow!("stored password hash is unreadable: {e}"))?;
    if !valid || !user.is_active {
        return Err(AppError::InvalidCredentials);
    }

    let now = Utc::now();
    let (user, ()) = store
        .modify::<User, _, _>(user.id, |u| {
            u.last_login = Some(now);
            Ok(())
        })
        .await?;
    session(auth, &user)
}

pub async fn current_user(store: &Store, principal: &Principal) -> AppResult<UserProfile> {
    Ok((&store.get::<User>(principal.id).await?).into())
}

pub async fn list_users(store: &Store, principal: &Principal, filter: UserFilter) -> AppResult<Vec<UserProfile>> {
    authorize(Some(principal), Action::ListUsers, None)?;
    Ok(store
        .all::<User>()
        .await?
        .into_iter()
        .filter(|u| u.is_active && filter.matches(u))
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
        .map(|u| UserProfile::from(&u))
        .collect())
}

pub async fn get_user(store: &Store, principal: &Principal, id: Uuid) -> AppResult<UserProfile> {
    authorize(Some(principal), Action::ViewUser, None)?;
    Ok((&store.get::<User>(id).await?).into())
}

pub async fn update_user(store: &Store, principal: &Principal, id: Uuid, patch: UserPatch) -> AppResult<UserProfile> {
    authorize(Some(principal), Action::UpdateUser, Some(id))?;
    if patch.role.is_some() {
        authorize(Some(principal), Action::ChangeRole, None)?;
    }
    let (user, ()) = store.modify::<User, _, _>(id, |u| u.apply(patch.clone())).await?;
    Ok((&user).into())
}

pub async fn deactivate_user(store: &Store, principal: &Principal, id: Uuid) -> AppResult<()> {
    authorize(Some(principal), Action::DeactivateUser, None)?;
    store
        .modify::<User, _, _>(id, |u| {
            u.is_active = false;
            Ok(())
        })
        .await?;
    tracing::info!(user = %id, by = %principal.id, "deactivated user");
    Ok(())
}

pub async fn upload_profile_picture(
    store: &Store,
    blobs: &dyn BlobStore,
    principal: &Principal,
    upload: Option<Upload>,
) -> AppResult<UserProfile> {
    let upload = upload.ok_or_else(|| AppError::validation("file", "please upload a file"))?;
    let url = blobs.store(UploadKind::ProfilePicture, &upload).await?;
    let (user, ()) = store
        .modify::<User, _, _>(principal.id, |u| {
            u.profile_picture = url.clone();
            Ok(())
        })
        .await?;
    Ok((&user).into())
}

/// Rebuilds the user's club and event lists from the clubs' members and
/// the events' registrations.
pub async fn reconcile_user(store: &Store, principal: &Principal, id: Uuid) -> AppResult<UserProfile> {
    authorize(Some(principal), Action::ReconcileUser, None)?;

    let clubs: Vec<Uuid> = store
        .all::<Club>()
        .await?
        .into_iter()
        .filter(|c| c.is_member(id))
        .map(|c| c.id)
        .collect();
    let events: Vec<Uuid> = store
        .all::<Event>()
        .await?
        .into_iter()
        .filter(|e| e.is_registered(id))
        .map(|e| e.id)
        .collect();

    let (user, changed) = store
        .modify::<User, _, _>(id, |u| {
            let changed = u.registered_clubs != clubs || u.registered_events != events;
            u.registered_clubs = clubs.clone();
            u.registered_events = events.clone();
            Ok(changed)
        })
        .await?;
    if changed {
        tracing::info!(user = %id, "reconciled user memberships");
    }
    Ok((&user).into())
}
