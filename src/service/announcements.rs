use super::directory;
use crate::{
    access::{authorize, authorize_on, Action, Principal},
    error::AppResult,
    models::{board_order, Announcement, AnnouncementFilter, AnnouncementPatch, NewAnnouncement, Populated},
    store::Store,
};
use chrono::Utc;
use itertools::Itertools;
use uuid::Uuid;

/// Live announcements, pinned first, then newest first.
pub async fn list_announcements(
    store: &Store,
    filter: AnnouncementFilter,
) -> AppResult<Vec<Announcement<Populated>>> {
    authorize(None, Action::ListAnnouncements, None)?;
    let now = Utc::now();
    let board = store
        .all::<Announcement>()
        .await?
        .into_iter()
        .filter(|a| a.is_live(now) && filter.matches(a))
        .sorted_by(board_order)
        .collect_vec();
    let users = directory(store, board.iter().map(|a| a.created_by).collect()).await?;
    Ok(board.into_iter().map(|a| a.populate(&users)).collect())
}

pub async fn get_announcement(store: &Store, id: Uuid) -> AppResult<Announcement<Populated>> {
    authorize(None, Action::ViewAnnouncement, None)?;
    let announcement = store.get::<Announcement>(id).await?;
    let users = directory(store, vec![announcement.created_by]).await?;
    Ok(announcement.populate(&users))
}

pub async fn create_announcement(store: &Store, principal: &Principal, data: NewAnnouncement) -> AppResult<Announcement> {
    authorize(Some(principal), Action::CreateAnnouncement, None)?;
    data.validate()?;
    let announcement = data.into_announcement(principal.id, Utc::now());
    store.create(&announcement).await?;
    tracing::info!(announcement = %announcement.id, kind = ?announcement.kind, "published announcement");
    Ok(announcement)
}

pub async fn update_announcement(
    store: &Store,
    principal: &Principal,
    id: Uuid,
    patch: AnnouncementPatch,
) -> AppResult<Announcement> {
    let announcement = store.get::<Announcement>(id).await?;
    authorize_on(principal, Action::UpdateAnnouncement, &announcement)?;
    let (announcement, ()) = store
        .modify::<Announcement, _, _>(id, |a| a.apply(patch.clone()))
        .await?;
    Ok(announcement)
}

pub async fn delete_announcement(store: &Store, principal: &Principal, id: Uuid) -> AppResult<()> {
    let announcement = store.get::<Announcement>(id).await?;
    authorize_on(principal, Action::DeleteAnnouncement, &announcement)?;
    store.delete::<Announcement>(id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access::Role,
        error::AppError,
        models::{announcement::tests::new_announcement, Audience},
        service::tests::user,
    };
    use chrono::Duration;

    #[tokio::test]
    async fn pinned_comes_first_regardless_of_age() {
        let store = Store::memory();
        let faculty = user(&store, Role::Faculty).await;

        let pinned = create_announcement(&store, &faculty, new_announcement(true)).await.unwrap();
        store
            .modify::<Announcement, _, _>(pinned.id, |a| {
                a.created_at -= Duration::days(3);
                Ok(())
            })
            .await
            .unwrap();
        create_announcement(&store, &faculty, new_announcement(false)).await.unwrap();
        create_announcement(&store, &faculty, new_announcement(false)).await.unwrap();

        let board = list_announcements(&store, AnnouncementFilter::default()).await.unwrap();
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].id, pinned.id);
    }

    #[tokio::test]
    async fn expired_and_inactive_are_hidden() {
        let store = Store::memory();
        let faculty = user(&store, Role::Faculty).await;

        let mut expired = new_announcement(false);
        expired.expires_at = Some(Utc::now() - Duration::minutes(1));
        create_announcement(&store, &faculty, expired).await.unwrap();

        let retired = create_announcement(&store, &faculty, new_announcement(false)).await.unwrap();
        let patch = AnnouncementPatch {
            is_active: Some(false),
            ..Default::default()
        };
        update_announcement(&store, &faculty, retired.id, patch).await.unwrap();

        let mut live = new_announcement(false);
        live.expires_at = Some(Utc::now() + Duration::days(1));
        let live = create_announcement(&store, &faculty, live).await.unwrap();

        let board = list_announcements(&store, AnnouncementFilter::default()).await.unwrap();
        assert_eq!(board.iter().map(|a| a.id).collect::<Vec<_>>(), vec![live.id]);
    }

    #[tokio::test]
    async fn every_caller_sees_the_same_board() {
        let store = Store::memory();
        let faculty = user(&store, Role::Faculty).await;

        let mut staff_only = new_announcement(false);
        staff_only.target_audience = Some(Audience::Faculty);
        create_announcement(&store, &faculty, staff_only).await.unwrap();
        create_announcement(&store, &faculty, new_announcement(false)).await.unwrap();

        let board = list_announcements(&store, AnnouncementFilter::default()).await.unwrap();
        assert_eq!(board.len(), 2);
        assert!(board.iter().any(|a| a.target_audience == Audience::Faculty));
        assert_eq!(board[0].created_by.as_ref().unwrap().id, faculty.id);
    }

    #[tokio::test]
    async fn only_author_or_admin_edits() {
        let store = Store::memory();
        let author = user(&store, Role::Faculty).await;
        let colleague = user(&store, Role::Faculty).await;
        let student = user(&store, Role::Student).await;
        let admin = user(&store, Role::Admin).await;

        assert!(matches!(
            create_announcement(&store, &student, new_announcement(false)).await,
            Err(AppError::Forbidden(_))
        ));
        let announcement = create_announcement(&store, &author, new_announcement(false)).await.unwrap();
        assert!(matches!(
            delete_announcement(&store, &colleague, announcement.id).await,
            Err(AppError::Forbidden(_))
        ));
        delete_announcement(&store, &admin, announcement.id).await.unwrap();
        assert!(matches!(
            get_announcement(&store, announcement.id).await,
            Err(AppError::NotFound("Announcement"))
        ));
    }
}
