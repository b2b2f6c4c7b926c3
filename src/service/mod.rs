//! Business operations. Every function authorizes the caller first, then
//! applies the model's state transition through [`Store::modify`].
//!
//! Memberships and registrations are recorded on both the parent document
//! and the user. The parent is written first; if the user write fails the
//! parent write is undone. A failed undo is logged and left for
//! [`users::reconcile_user`] to repair.

use crate::{
    error::AppResult,
    models::{Directory, User},
    store::Store,
};
use itertools::Itertools;
use std::future::Future;
use uuid::Uuid;

pub mod announcements;
pub mod clubs;
pub mod events;
pub mod feedback;
pub mod lost_found;
pub mod users;

/// Applies the user half of a paired write, running `undo` if it fails.
pub(crate) async fn sync_user<F, U>(store: &Store, user: Uuid, mut change: F, undo: U) -> AppResult<()>
where
    F: FnMut(&mut User) + Send,
    U: Future<Output = AppResult<()>> + Send,
{
    let result = store
        .modify::<User, _, _>(user, |u| {
            change(u);
            Ok(())
        })
        .await;

    if let Err(err) = result {
        tracing::warn!(%user, error = %err, "user side of a paired write failed, undoing");
        if let Err(undo_err) = undo.await {
            tracing::error!(
                %user,
                error = %undo_err,
                "failed to undo paired write, user needs reconciliation"
            );
        }
        return Err(err);
    }
    Ok(())
}

/// Best effort removal of a deleted parent from its users.
pub(crate) async fn detach_users<F>(store: &Store, users: Vec<Uuid>, change: F)
where
    F: Fn(&mut User) + Send + Sync,
{
    for user in users {
        let result = store
            .modify::<User, _, _>(user, |u| {
                change(u);
                Ok(())
            })
            .await;
        if let Err(err) = result {
            tracing::error!(%user, error = %err, "failed to detach deleted document from user");
        }
    }
}

/// Loads the users a read refers to. Accounts that no longer exist are
/// left out and render as `null`.
pub(crate) async fn directory(store: &Store, ids: Vec<Uuid>) -> AppResult<Directory> {
    let mut users = Directory::default();
    for id in ids.into_iter().unique() {
        if let Some(user) = store.find::<User>(id).await? {
            users.insert(&user);
        }
    }
    Ok(users)
}
