use super::{Directory, Populated};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClubCategory {
    Technical,
    Cultural,
    Sports,
    Academic,
    Social,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Member,
    Coordinator,
    Lead,
}

pub const MAX_FORUM_MESSAGE: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club<U = Uuid> {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: ClubCategory,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub cover_image: String,
    pub president: Option<U>,
    pub vice_president: Option<U>,
    pub faculty: Option<U>,
    #[serde(default)]
    pub members: Vec<Member<U>>,
    #[serde(default)]
    pub gallery: Vec<GalleryImage<U>>,
    #[serde(default)]
    pub resources: Vec<Resource<U>>,
    /// Newest first.
    #[serde(default)]
    pub forum_posts: Vec<ForumPost<U>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Club, "clubs", "Club");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member<U = Uuid> {
    pub user: U,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage<U = Uuid> {
    pub id: Uuid,
    pub url: String,
    pub caption: String,
    pub uploaded_by: U,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<U = Uuid> {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub size: String,
    pub uploaded_by: U,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost<U = Uuid> {
    pub id: Uuid,
    pub user: U,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClub {
    pub name: String,
    pub description: String,
    pub category: ClubCategory,
    pub logo: Option<String>,
    pub cover_image: Option<String>,
    pub president: Option<Uuid>,
    pub vice_president: Option<Uuid>,
    pub faculty: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ClubCategory>,
    pub logo: Option<String>,
    pub cover_image: Option<String>,
    pub president: Option<Uuid>,
    pub vice_president: Option<Uuid>,
    pub faculty: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubView<U = Uuid> {
    #[serde(flatten)]
    pub club: Club<U>,
    pub member_count: usize,
}

impl<U> From<Club<U>> for ClubView<U> {
    fn from(club: Club<U>) -> Self {
        Self {
            member_count: club.members.len(),
            club,
        }
    }
}

/// Key under which a club name is reserved. Names are unique ignoring case.
pub fn club_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Human readable file size, as shown next to club resources.
pub fn format_size(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

fn check_name(name: &str) -> AppResult<()> {
    super::required_max("name", name, 100)
}

fn check_description(description: &str) -> AppResult<()> {
    super::required_max("description", description, 500)
}

impl NewClub {
    pub fn validate(&self) -> AppResult<()> {
        check_name(&self.name)?;
        check_description(&self.description)
    }

    pub fn into_club(self, now: DateTime<Utc>) -> Club {
        Club {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description,
            category: self.category,
            logo: self.logo.unwrap_or_default(),
            cover_image: self.cover_image.unwrap_or_default(),
            president: self.president,
            vice_president: self.vice_president,
            faculty: self.faculty,
            members: Vec::new(),
            gallery: Vec::new(),
            resources: Vec::new(),
            forum_posts: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl ClubPatch {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        Ok(())
    }
}

impl Club {
    pub fn is_member(&self, user: Uuid) -> bool {
        self.members.iter().any(|m| m.user == user)
    }

    /// Applies an already validated patch.
    pub fn apply(&mut self, patch: ClubPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(logo) = patch.logo {
            self.logo = logo;
        }
        if let Some(cover) = patch.cover_image {
            self.cover_image = cover;
        }
        if patch.president.is_some() {
            self.president = patch.president;
        }
        if patch.vice_president.is_some() {
            self.vice_president = patch.vice_president;
        }
        if patch.faculty.is_some() {
            self.faculty = patch.faculty;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
    }

    pub fn join(&mut self, user: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        if self.is_member(user) {
            return Err(AppError::conflict("already a member of this club"));
        }
        self.members.push(Member {
            user,
            role: MemberRole::Member,
            joined_at: now,
        });
        Ok(())
    }

    /// Returns whether a membership was removed.
    pub fn leave(&mut self, user: Uuid) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.user != user);
        before != self.members.len()
    }

    pub fn add_gallery(&mut self, urls: Vec<String>, caption: &str, uploader: Uuid, now: DateTime<Utc>) {
        self.gallery.extend(urls.into_iter().map(|url| GalleryImage {
            id: Uuid::new_v4(),
            url,
            caption: caption.to_string(),
            uploaded_by: uploader,
            uploaded_at: now,
        }));
    }

    pub fn add_resource(&mut self, name: String, url: String, bytes: usize, uploader: Uuid, now: DateTime<Utc>) {
        self.resources.push(Resource {
            id: Uuid::new_v4(),
            name,
            url,
            size: format_size(bytes),
            uploaded_by: uploader,
            uploaded_at: now,
        });
    }

    pub fn post(&mut self, user: Uuid, message: String, now: DateTime<Utc>) -> AppResult<()> {
        super::required_max("message", &message, MAX_FORUM_MESSAGE)?;
        self.forum_posts.insert(
            0,
            ForumPost {
                id: Uuid::new_v4(),
                user,
                message,
                created_at: now,
            },
        );
        Ok(())
    }

    /// Every user the club refers to, possibly repeated.
    pub fn user_ids(&self) -> Vec<Uuid> {
        self.president
            .into_iter()
            .chain(self.vice_president)
            .chain(self.faculty)
            .chain(self.members.iter().map(|m| m.user))
            .chain(self.gallery.iter().map(|g| g.uploaded_by))
            .chain(self.resources.iter().map(|r| r.uploaded_by))
            .chain(self.forum_posts.iter().map(|p| p.user))
            .collect()
    }

    pub fn populate(self, users: &Directory) -> Club<Populated> {
        let user = |id| users.summary(id);
        Club {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            logo: self.logo,
            cover_image: self.cover_image,
            president: self.president.map(user),
            vice_president: self.vice_president.map(user),
            faculty: self.faculty.map(user),
            members: self.members.into_iter().map(|m| m.populate(users)).collect(),
            gallery: self
                .gallery
                .into_iter()
                .map(|g| GalleryImage {
                    id: g.id,
                    url: g.url,
                    caption: g.caption,
                    uploaded_by: user(g.uploaded_by),
                    uploaded_at: g.uploaded_at,
                })
                .collect(),
            resources: self
                .resources
                .into_iter()
                .map(|r| Resource {
                    id: r.id,
                    name: r.name,
                    url: r.url,
                    size: r.size,
                    uploaded_by: user(r.uploaded_by),
                    uploaded_at: r.uploaded_at,
                })
                .collect(),
            forum_posts: self
                .forum_posts
                .into_iter()
                .map(|p| ForumPost {
                    id: p.id,
                    user: user(p.user),
                    message: p.message,
                    created_at: p.created_at,
                })
                .collect(),
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Member {
    pub fn populate(self, users: &Directory) -> Member<Populated> {
        Member {
            user: users.summary(self.user),
            role: self.role,
            joined_at: self.joined_at,
        }
    }

    /// For the member roster, which also shows phone numbers.
    pub fn with_contact(self, users: &Directory) -> Member<Populated> {
        Member {
            user: users.contact(self.user),
            role: self.role,
            joined_at: self.joined_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_club(name: &str) -> NewClub {
        NewClub {
            name: name.into(),
            description: "Builders and tinkerers".into(),
            category: ClubCategory::Technical,
            logo: None,
            cover_image: None,
            president: None,
            vice_president: None,
            faculty: None,
        }
    }

    #[test]
    fn join_twice_conflicts() {
        let mut club = new_club("Tech Club").into_club(Utc::now());
        let user = Uuid::new_v4();
        club.join(user, Utc::now()).unwrap();
        assert!(matches!(club.join(user, Utc::now()), Err(AppError::Conflict(_))));
        assert_eq!(club.members.len(), 1);
        assert_eq!(club.members[0].role, MemberRole::Member);
    }

    #[test]
    fn forum_is_newest_first() {
        let mut club = new_club("Tech Club").into_club(Utc::now());
        let user = Uuid::new_v4();
        club.post(user, "first".into(), Utc::now()).unwrap();
        club.post(user, "second".into(), Utc::now()).unwrap();
        assert_eq!(club.forum_posts[0].message, "second");
        assert_eq!(club.forum_posts[1].message, "first");
    }

    #[test]
    fn forum_rejects_long_or_empty_messages() {
        let mut club = new_club("Tech Club").into_club(Utc::now());
        let user = Uuid::new_v4();
        assert!(club.post(user, "x".repeat(MAX_FORUM_MESSAGE + 1), Utc::now()).is_err());
        assert!(club.post(user, "   ".into(), Utc::now()).is_err());
        assert!(club.forum_posts.is_empty());
    }

    #[test]
    fn sizes_render_in_kilobytes() {
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
    }

    #[test]
    fn name_key_ignores_case_and_padding() {
        assert_eq!(club_name_key("  Tech Club "), club_name_key("tech club"));
    }

    #[test]
    fn populate_resolves_every_reference() {
        let author = crate::models::RegisterUser {
            name: "Ravi".into(),
            email: "ravi@campus.edu".into(),
            password: "hunter22".into(),
            role: None,
            department: Some(crate::models::Department::Cse),
            year: Some(3),
            phone: None,
        }
        .into_user("hash".into(), Utc::now());
        let gone = Uuid::new_v4();

        let mut club = new_club("Tech Club").into_club(Utc::now());
        club.president = Some(author.id);
        club.join(author.id, Utc::now()).unwrap();
        club.join(gone, Utc::now()).unwrap();
        club.post(author.id, "hello".into(), Utc::now()).unwrap();
        club.add_gallery(vec!["/uploads/a.png".into()], "", author.id, Utc::now());
        assert_eq!(club.user_ids().len(), 5);

        let mut users = Directory::default();
        users.insert(&author);
        let club = club.populate(&users);

        assert_eq!(club.president.unwrap().unwrap().name, "Ravi");
        assert_eq!(club.members[0].user.as_ref().unwrap().year, Some(3));
        assert!(club.members[1].user.is_none());
        assert_eq!(club.forum_posts[0].user.as_ref().unwrap().id, author.id);
        assert_eq!(club.gallery[0].uploaded_by.as_ref().unwrap().email, "ravi@campus.edu");
        assert!(club.faculty.is_none());
    }
}
