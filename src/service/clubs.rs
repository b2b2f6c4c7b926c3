use super::{detach_users, directory, sync_user};
use crate::{
    access::{authorize, Action, Principal},
    blob::{BlobStore, Upload, UploadKind},
    error::{AppError, AppResult},
    models::{
        club_name_key, Club, ClubPatch, ClubView, ForumPost, GalleryImage, Member, NewClub, Populated, Resource,
    },
    store::Store,
};
use chrono::Utc;
use itertools::Itertools;
use uuid::Uuid;

/// Key namespace holding one entry per club name.
const NAME_KEYS: &str = "club-name";

/// Most gallery images a single upload may carry.
pub const MAX_GALLERY_UPLOAD: usize = 10;

async fn reserve_name(store: &Store, name: &str, club: Uuid) -> AppResult<String> {
    let key = club_name_key(name);
    if !store.reserve_key(NAME_KEYS, &key, club).await? {
        return Err(AppError::conflict("a club with this name already exists"));
    }
    Ok(key)
}

fn ensure_active(club: &Club) -> AppResult<()> {
    if !club.is_active {
        return Err(AppError::invalid_state("club is not active"));
    }
    Ok(())
}

pub async fn list_clubs(store: &Store) -> AppResult<Vec<ClubView<Populated>>> {
    let clubs = store
        .all::<Club>()
        .await?
        .into_iter()
        .filter(|c| c.is_active)
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
        .collect_vec();
    let users = directory(store, clubs.iter().flat_map(|c| c.user_ids()).collect()).await?;
    Ok(clubs.into_iter().map(|c| c.populate(&users).into()).collect())
}

pub async fn get_club(store: &Store, id: Uuid) -> AppResult<ClubView<Populated>> {
    authorize(None, Action::ViewClub, None)?;
    let club = store.get::<Club>(id).await?;
    let users = directory(store, club.user_ids()).await?;
    Ok(club.populate(&users).into())
}

pub async fn create_club(store: &Store, principal: &Principal, data: NewClub) -> AppResult<ClubView> {
    authorize(Some(principal), Action::CreateClub, None)?;
    data.validate()?;
    let club = data.into_club(Utc::now());

    let key = reserve_name(store, &club.name, club.id).await?;
    if let Err(err) = store.create(&club).await {
        store.release_key(NAME_KEYS, &key).await?;
        return Err(err);
    }
    tracing::info!(club = %club.id, name = %club.name, "created club");
    Ok(club.into())
}

pub async fn update_club(store: &Store, principal: &Principal, id: Uuid, patch: ClubPatch) -> AppResult<ClubView> {
    authorize(Some(principal), Action::UpdateClub, None)?;
    patch.validate()?;
    let current = store.get::<Club>(id).await?;

    let new_key = match &patch.name {
        Some(name) if club_name_key(name) != club_name_key(&current.name) => {
            Some(reserve_name(store, name, id).await?)
        }
        _ => None,
    };

    let result = store
        .modify::<Club, _, _>(id, |c| {
            let previous = c.name.clone();
            if let Some(name) = &patch.name {
                // the name moved underneath us, so `new_key` was decided on a stale read
                if new_key.is_none() && club_name_key(name) != club_name_key(&previous) {
                    return Err(AppError::conflict("club was renamed concurrently, please retry"));
                }
            }
            c.apply(patch.clone());
            Ok(previous)
        })
        .await;
    match result {
        Ok((club, previous)) => {
            let previous_key = club_name_key(&previous);
            if previous_key != club_name_key(&club.name) {
                if let Err(err) = store.release_key(NAME_KEYS, &previous_key).await {
                    tracing::error!(club = %id, name = %previous, error = %err, "failed to release old club name");
                }
            }
            Ok(club.into())
        }
        Err(err) => {
            if let Some(key) = new_key {
                store.release_key(NAME_KEYS, &key).await?;
            }
            Err(err)
        }
    }
}

pub async fn delete_club(store: &Store, principal: &Principal, id: Uuid) -> AppResult<()> {
    authorize(Some(principal), Action::DeleteClub, None)?;
    let Some(club) = store.delete::<Club>(id).await? else {
        return Err(AppError::NotFound("Club"));
    };
    let users: Vec<Uuid> = club.members.iter().map(|m| m.user).collect();
    detach_users(store, users, |u| u.track_club(id, false)).await;
    if let Err(err) = store.release_key(NAME_KEYS, &club_name_key(&club.name)).await {
        tracing::error!(club = %id, name = %club.name, error = %err, "failed to release deleted club's name");
    }
    tracing::info!(club = %id, by = %principal.id, "deleted club");
    Ok(())
}

pub async fn join_club(store: &Store, principal: &Principal, id: Uuid) -> AppResult<ClubView> {
    authorize(Some(principal), Action::JoinClub, None)?;
    let user = principal.id;
    let now = Utc::now();

    let (club, ()) = store
        .modify::<Club, _, _>(id, |c| {
            ensure_active(c)?;
            c.join(user, now)
        })
        .await?;
    sync_user(store, user, |u| u.track_club(id, true), async {
        store
            .modify::<Club, _, _>(id, |c| Ok(c.leave(user)))
            .await
            .map(drop)
    })
    .await?;

    tracing::info!(club = %id, %user, "joined club");
    Ok(club.into())
}

/// Removes the caller from the club. Succeeds when they were not a member.
pub async fn leave_club(store: &Store, principal: &Principal, id: Uuid) -> AppResult<ClubView> {
    authorize(Some(principal), Action::LeaveClub, None)?;
    let user = principal.id;

    let (club, removed) = store
        .modify::<Club, _, _>(id, |c| {
            let removed = c.members.iter().find(|m| m.user == user).cloned();
            c.leave(user);
            Ok(removed)
        })
        .await?;
    sync_user(store, user, |u| u.track_club(id, false), async {
        match &removed {
            Some(member) => store
                .modify::<Club, _, _>(id, |c| {
                    if !c.is_member(user) {
                        c.members.push(member.clone());
                    }
                    Ok(())
                })
                .await
                .map(drop),
            None => Ok(()),
        }
    })
    .await?;

    Ok(club.into())
}

pub async fn upload_gallery_images(
    store: &Store,
    blobs: &dyn BlobStore,
    principal: &Principal,
    id: Uuid,
    uploads: Vec<Upload>,
    caption: Option<String>,
) -> AppResult<Vec<GalleryImage>> {
    authorize(Some(principal), Action::UploadGallery, None)?;
    if uploads.is_empty() {
        return Err(AppError::validation("images", "please upload at least one image"));
    }
    if uploads.len() > MAX_GALLERY_UPLOAD {
        return Err(AppError::validation(
            "images",
            format!("at most {MAX_GALLERY_UPLOAD} images can be uploaded at once"),
        ));
    }
    store.get::<Club>(id).await?;

    let mut urls = Vec::with_capacity(uploads.len());
    for upload in &uploads {
        urls.push(blobs.store(UploadKind::ClubImage, upload).await?);
    }
    let caption = caption.unwrap_or_default();
    let now = Utc::now();
    let (club, ()) = store
        .modify::<Club, _, _>(id, |c| {
            c.add_gallery(urls.clone(), &caption, principal.id, now);
            Ok(())
        })
        .await?;
    Ok(club.gallery)
}

pub async fn upload_resource(
    store: &Store,
    blobs: &dyn BlobStore,
    principal: &Principal,
    id: Uuid,
    upload: Option<Upload>,
    name: Option<String>,
) -> AppResult<Vec<Resource>> {
    authorize(Some(principal), Action::UploadResource, None)?;
    let upload = upload.ok_or_else(|| AppError::validation("file", "please upload a file"))?;
    store.get::<Club>(id).await?;

    let url = blobs.store(UploadKind::ClubResource, &upload).await?;
    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| upload.file_name.clone());
    let now = Utc::now();
    let (club, ()) = store
        .modify::<Club, _, _>(id, |c| {
            c.add_resource(name.clone(), url.clone(), upload.len(), principal.id, now);
            Ok(())
        })
        .await?;
    Ok(club.resources)
}

pub async fn post_forum_message(
    store: &Store,
    principal: &Principal,
    id: Uuid,
    message: String,
) -> AppResult<Vec<ForumPost<Populated>>> {
    authorize(Some(principal), Action::PostForumMessage, None)?;
    let now = Utc::now();
    let (club, ()) = store
        .modify::<Club, _, _>(id, |c| c.post(principal.id, message.clone(), now))
        .await?;
    let users = directory(store, club.forum_posts.iter().map(|p| p.user).collect()).await?;
    Ok(club.populate(&users).forum_posts)
}

pub async fn list_members(store: &Store, principal: &Principal, id: Uuid) -> AppResult<Vec<Member<Populated>>> {
    authorize(Some(principal), Action::ListClubMembers, None)?;
    let members = store.get::<Club>(id).await?.members;
    let users = directory(store, members.iter().map(|m| m.user).collect()).await?;
    Ok(members.into_iter().map(|m| m.with_contact(&users)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access::Role,
        blob::{tests::pdf, tests::png, LocalBlobStore},
        models::{club::tests::new_club, ClubCategory, User},
        service::tests::user,
        store::{Document, RacingStore},
    };
    use std::sync::Arc;

    async fn seeded() -> (Store, Principal, Uuid) {
        let store = Store::memory();
        let admin = user(&store, Role::Admin).await;
        let club = create_club(&store, &admin, new_club("Tech Club")).await.unwrap();
        (store, admin, club.club.id)
    }

    #[tokio::test]
    async fn tech_club_scenario() {
        let (store, _, id) = seeded().await;
        let club = store.get::<Club>(id).await.unwrap();
        assert_eq!(club.category, ClubCategory::Technical);
        let student = user(&store, Role::Student).await;

        let view = join_club(&store, &student, id).await.unwrap();
        assert_eq!(view.member_count, 1);
        assert!(store.get::<User>(student.id).await.unwrap().registered_clubs.contains(&id));

        assert!(matches!(
            join_club(&store, &student, id).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(get_club(&store, id).await.unwrap().member_count, 1);
    }

    #[tokio::test]
    async fn join_then_leave_restores_counts() {
        let (store, _, id) = seeded().await;
        let student = user(&store, Role::Student).await;
        let before = get_club(&store, id).await.unwrap().member_count;

        join_club(&store, &student, id).await.unwrap();
        let view = leave_club(&store, &student, id).await.unwrap();
        assert_eq!(view.member_count, before);
        assert!(store.get::<User>(student.id).await.unwrap().registered_clubs.is_empty());

        assert_eq!(leave_club(&store, &student, id).await.unwrap().member_count, before);
    }

    #[tokio::test]
    async fn failed_user_write_undoes_membership() {
        let (store, _, id) = seeded().await;
        let ghost = crate::access::tests::principal(Role::Student);

        assert!(join_club(&store, &ghost, id).await.is_err());
        assert_eq!(get_club(&store, id).await.unwrap().member_count, 0);
    }

    #[tokio::test]
    async fn names_are_unique_ignoring_case() {
        let (store, admin, id) = seeded().await;
        assert!(matches!(
            create_club(&store, &admin, new_club("tech club ")).await,
            Err(AppError::Conflict(_))
        ));

        let other = create_club(&store, &admin, new_club("Drama")).await.unwrap();
        let rename = |name: &str| ClubPatch {
            name: Some(name.into()),
            ..Default::default()
        };
        assert!(matches!(
            update_club(&store, &admin, other.club.id, rename("TECH CLUB")).await,
            Err(AppError::Conflict(_))
        ));

        update_club(&store, &admin, id, rename("Robotics")).await.unwrap();
        assert!(create_club(&store, &admin, new_club("Tech Club")).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_renames_hold_only_the_final_name() {
        let racing = Arc::new(RacingStore::new(<Club as Document>::COLLECTION, 2));
        let store = Store::new(racing.clone());
        let admin = user(&store, Role::Admin).await;
        let id = create_club(&store, &admin, new_club("Tech Club")).await.unwrap().club.id;
        racing.arm();

        let rename = |name: &str| ClubPatch {
            name: Some(name.into()),
            ..ClubPatch::default()
        };
        let (a, b) = tokio::join!(
            update_club(&store, &admin, id, rename("Alpha")),
            update_club(&store, &admin, id, rename("Beta")),
        );
        a.unwrap();
        b.unwrap();

        let name = store.get::<Club>(id).await.unwrap().name;
        let other = if name == "Alpha" { "Beta" } else { "Alpha" };
        create_club(&store, &admin, new_club(other)).await.unwrap();
        create_club(&store, &admin, new_club("Tech Club")).await.unwrap();
        assert!(matches!(
            create_club(&store, &admin, new_club(&name)).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn delete_detaches_members_when_the_name_cannot_be_freed() {
        let racing = Arc::new(RacingStore::new(<Club as Document>::COLLECTION, 1));
        let store = Store::new(racing.clone());
        let admin = user(&store, Role::Admin).await;
        let student = user(&store, Role::Student).await;
        let id = create_club(&store, &admin, new_club("Tech Club")).await.unwrap().club.id;
        join_club(&store, &student, id).await.unwrap();

        racing.fail_key_release();
        delete_club(&store, &admin, id).await.unwrap();

        assert!(store.get::<User>(student.id).await.unwrap().registered_clubs.is_empty());
        assert!(store.find::<Club>(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn only_admins_manage_clubs() {
        let store = Store::memory();
        let faculty = user(&store, Role::Faculty).await;
        assert!(matches!(
            create_club(&store, &faculty, new_club("Chess")).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn delete_frees_name_and_members() {
        let (store, admin, id) = seeded().await;
        let student = user(&store, Role::Student).await;
        join_club(&store, &student, id).await.unwrap();

        delete_club(&store, &admin, id).await.unwrap();
        assert!(store.get::<User>(student.id).await.unwrap().registered_clubs.is_empty());
        assert!(create_club(&store, &admin, new_club("Tech Club")).await.is_ok());
    }

    #[tokio::test]
    async fn forum_is_newest_first() {
        let (store, _, id) = seeded().await;
        let student = user(&store, Role::Student).await;

        post_forum_message(&store, &student, id, "first".into()).await.unwrap();
        let posts = post_forum_message(&store, &student, id, "second".into()).await.unwrap();
        assert_eq!(posts[0].message, "second");
        assert_eq!(posts[0].user.as_ref().unwrap().id, student.id);
        assert!(matches!(
            post_forum_message(&store, &student, id, "x".repeat(1001)).await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn gallery_and_resources() {
        let (store, _, id) = seeded().await;
        let dir = tempfile::tempdir().unwrap();
        let blobs = LocalBlobStore::new(dir.path());
        let student = user(&store, Role::Student).await;

        assert!(matches!(
            upload_gallery_images(&store, &blobs, &student, id, vec![], None).await,
            Err(AppError::Validation { .. })
        ));
        let gallery = upload_gallery_images(
            &store,
            &blobs,
            &student,
            id,
            vec![png("a.png"), png("b.png")],
            Some("Demo day".into()),
        )
        .await
        .unwrap();
        assert_eq!(gallery.len(), 2);
        assert!(gallery.iter().all(|g| g.caption == "Demo day" && g.uploaded_by == student.id));

        let resources = upload_resource(&store, &blobs, &student, id, Some(pdf("slides.pdf")), None)
            .await
            .unwrap();
        assert_eq!(resources[0].name, "slides.pdf");
        assert!(resources[0].size.ends_with(" KB"));
        assert!(matches!(
            upload_resource(&store, &blobs, &student, id, None, None).await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn club_page_shows_who_is_involved() {
        let (store, admin, id) = seeded().await;
        let student = user(&store, Role::Student).await;
        let patch = ClubPatch {
            president: Some(student.id),
            ..Default::default()
        };
        update_club(&store, &admin, id, patch).await.unwrap();
        join_club(&store, &student, id).await.unwrap();
        post_forum_message(&store, &student, id, "welcome".into()).await.unwrap();

        let page = serde_json::to_value(get_club(&store, id).await.unwrap()).unwrap();
        assert_eq!(page["president"]["name"], "Student user");
        assert_eq!(page["members"][0]["user"]["name"], "Student user");
        assert_eq!(page["members"][0]["user"]["year"], 2);
        assert_eq!(page["forumPosts"][0]["user"]["id"], student.id.to_string());
        assert!(page["vicePresident"].is_null());

        let stored = store.get::<Club>(id).await.unwrap();
        assert_eq!(stored.members[0].user, student.id);

        // a deleted account still leaves its membership behind
        store.delete::<User>(student.id).await.unwrap();
        let page = get_club(&store, id).await.unwrap();
        assert!(page.club.members[0].user.is_none());
        assert_eq!(list_clubs(&store).await.unwrap()[0].member_count, 1);
    }

    #[tokio::test]
    async fn members_are_admin_only() {
        let (store, admin, id) = seeded().await;
        let student = user(&store, Role::Student).await;
        join_club(&store, &student, id).await.unwrap();

        let members = list_members(&store, &admin, id).await.unwrap();
        assert_eq!(members.len(), 1);
        let email = store.get::<User>(student.id).await.unwrap().email;
        assert_eq!(members[0].user.as_ref().unwrap().email, email);
        assert!(matches!(
            list_members(&store, &student, id).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
