//! Role model and the single authorization gate every operation goes through.
//!
//! Each [`Action`] maps to exactly one [`Rule`]; services never inspect roles
//! directly but ask [`authorize`] with the principal and, for owned
//! resources, the owner reference.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Public,
    Authenticated,
    RoleIn(&'static [Role]),
    OwnerOrAdmin,
    OwnerOrRoleIn(&'static [Role]),
    Owner,
}

const STAFF: &[Role] = &[Role::Faculty, Role::Admin];
const ADMIN: &[Role] = &[Role::Admin];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListEvents,
    ViewEvent,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    RegisterForEvent,
    UnregisterFromEvent,

    ListItems,
    ViewItem,
    ReportItem,
    UpdateItem,
    DeleteItem,
    ClaimItem,
    ReviewClaim,

    ListClubs,
    ViewClub,
    CreateClub,
    UpdateClub,
    DeleteClub,
    JoinClub,
    LeaveClub,
    UploadGallery,
    UploadResource,
    PostForumMessage,
    ListClubMembers,

    ListAnnouncements,
    ViewAnnouncement,
    CreateAnnouncement,
    UpdateAnnouncement,
    DeleteAnnouncement,

    SubmitFeedback,
    ListOwnFeedback,
    ListAllFeedback,
    ViewFeedback,
    TriageFeedback,
    RespondToFeedback,
    RateFeedback,

    ViewProfile,
    ListUsers,
    ViewUser,
    UpdateUser,
    ChangeRole,
    DeactivateUser,
    ReconcileUser,
}

impl Action {
    pub const fn rule(self) -> Rule {
        use Action::*;

        match self {
            ListEvents | ViewEvent | ListItems | ViewItem | ListClubs | ViewClub
            | ListAnnouncements | ViewAnnouncement => Rule::Public,

            RegisterForEvent | UnregisterFromEvent | ReportItem | ClaimItem | JoinClub
            | LeaveClub | UploadGallery | UploadResource | PostForumMessage | SubmitFeedback
            | ListOwnFeedback | ViewProfile | ViewUser => Rule::Authenticated,

            CreateEvent | CreateAnnouncement | ListAllFeedback | TriageFeedback
            | RespondToFeedback => Rule::RoleIn(STAFF),

            ReviewClaim | CreateClub | UpdateClub | DeleteClub | ListClubMembers | ListUsers
            | ChangeRole | DeactivateUser | ReconcileUser => Rule::RoleIn(ADMIN),

            UpdateEvent | DeleteEvent | UpdateItem | DeleteItem | UpdateAnnouncement
            | DeleteAnnouncement | UpdateUser => Rule::OwnerOrAdmin,

            ViewFeedback => Rule::OwnerOrRoleIn(STAFF),

            RateFeedback => Rule::Owner,
        }
    }
}

/// Anything with an owning user reference.
pub trait Owned {
    fn owner(&self) -> Uuid;
}

/// Decides whether `principal` may perform `action` on a resource owned by
/// `owner`. Owner rules with no owner given only admit the role part.
pub fn authorize(principal: Option<&Principal>, action: Action, owner: Option<Uuid>) -> AppResult<()> {
    let rule = action.rule();
    if rule == Rule::Public {
        return Ok(());
    }
    let principal = principal.ok_or(AppError::Unauthenticated)?;
    let is_owner = owner.map_or(false, |owner| owner == principal.id);

    let allowed = match rule {
        Rule::Public | Rule::Authenticated => true,
        Rule::RoleIn(roles) => roles.contains(&principal.role),
        Rule::OwnerOrAdmin => is_owner || principal.is_admin(),
        Rule::OwnerOrRoleIn(roles) => is_owner || roles.contains(&principal.role),
        Rule::Owner => is_owner,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "not authorized to {}",
            describe(action)
        )))
    }
}

/// Shorthand for owner-scoped actions on a loaded resource.
pub fn authorize_on(principal: &Principal, action: Action, resource: &impl Owned) -> AppResult<()> {
    authorize(Some(principal), action, Some(resource.owner()))
}

fn describe(action: Action) -> &'static str {
    use Action::*;

    match action {
        CreateEvent => "create events",
        UpdateEvent => "update this event",
        DeleteEvent => "delete this event",
        UpdateItem => "update this item",
        DeleteItem => "delete this item",
        ReviewClaim => "review claims",
        CreateClub | UpdateClub | DeleteClub => "manage clubs",
        ListClubMembers => "view club members",
        CreateAnnouncement => "create announcements",
        UpdateAnnouncement => "update this announcement",
        DeleteAnnouncement => "delete this announcement",
        ListAllFeedback => "view all feedback",
        ViewFeedback => "view this feedback",
        TriageFeedback => "update this feedback",
        RespondToFeedback => "respond to feedback",
        RateFeedback => "rate this feedback",
        ListUsers => "list users",
        UpdateUser => "update this user",
        ChangeRole => "change roles",
        DeactivateUser => "deactivate users",
        ReconcileUser => "reconcile users",
        _ => "perform this action",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[rstest]
    #[case(Action::ListEvents)]
    #[case(Action::ViewClub)]
    #[case(Action::ListAnnouncements)]
    fn public_actions_need_no_principal(#[case] action: Action) {
        assert!(authorize(None, action, None).is_ok());
    }

    #[rstest]
    #[case(Action::JoinClub)]
    #[case(Action::CreateEvent)]
    #[case(Action::UpdateItem)]
    fn private_actions_reject_anonymous(#[case] action: Action) {
        assert!(matches!(
            authorize(None, action, None),
            Err(AppError::Unauthenticated)
        ));
    }

    #[rstest]
    #[case(Role::Student, false)]
    #[case(Role::Faculty, true)]
    #[case(Role::Admin, true)]
    fn staff_rules_check_role(#[case] role: Role, #[case] allowed: bool) {
        let p = principal(role);
        assert_eq!(authorize(Some(&p), Action::CreateEvent, None).is_ok(), allowed);
        assert_eq!(authorize(Some(&p), Action::RespondToFeedback, None).is_ok(), allowed);
    }

    #[test]
    fn owner_or_admin() {
        let owner = principal(Role::Faculty);
        let other = principal(Role::Faculty);
        let admin = principal(Role::Admin);

        assert!(authorize(Some(&owner), Action::UpdateEvent, Some(owner.id)).is_ok());
        assert!(authorize(Some(&admin), Action::UpdateEvent, Some(owner.id)).is_ok());
        assert!(matches!(
            authorize(Some(&other), Action::UpdateEvent, Some(owner.id)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn owner_or_staff_lets_submitter_and_staff_view() {
        let student = principal(Role::Student);
        let stranger = principal(Role::Student);
        let faculty = principal(Role::Faculty);

        assert!(authorize(Some(&student), Action::ViewFeedback, Some(student.id)).is_ok());
        assert!(authorize(Some(&faculty), Action::ViewFeedback, Some(student.id)).is_ok());
        assert!(authorize(Some(&stranger), Action::ViewFeedback, Some(student.id)).is_err());
    }

    #[test]
    fn owner_only_excludes_admin() {
        let admin = principal(Role::Admin);
        assert!(authorize(Some(&admin), Action::RateFeedback, Some(Uuid::new_v4())).is_err());
    }
}
