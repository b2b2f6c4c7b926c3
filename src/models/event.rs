use super::{Directory, Populated};
use crate::{
    access::Owned,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCategory {
    Technical,
    Cultural,
    Sports,
    Academic,
    Workshop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

const DEFAULT_ELIGIBILITY: &str = "Open to all students";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event<U = Uuid> {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub full_description: Option<String>,
    pub date: DateTime<Utc>,
    pub time: String,
    pub end_time: Option<String>,
    pub venue: String,
    pub category: EventCategory,
    #[serde(default)]
    pub poster: String,
    pub organizer: String,
    pub organizer_contact: Option<String>,
    pub eligibility: String,
    pub prerequisites: Option<String>,
    pub max_capacity: u32,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub status: EventStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub registrations: Vec<Registration<U>>,
    pub created_by: U,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Event, "events", "Event");

impl Owned for Event {
    fn owner(&self) -> Uuid {
        self.created_by
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration<U = Uuid> {
    pub id: Uuid,
    pub user: U,
    pub registration_data: RegistrationForm,
    pub registered_at: DateTime<Utc>,
}

/// Whatever the registrant typed into the form, kept as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub full_description: Option<String>,
    pub date: DateTime<Utc>,
    pub time: String,
    pub end_time: Option<String>,
    pub venue: String,
    pub category: EventCategory,
    pub organizer: String,
    pub organizer_contact: Option<String>,
    pub eligibility: Option<String>,
    pub prerequisites: Option<String>,
    pub max_capacity: u32,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub time: Option<String>,
    pub end_time: Option<String>,
    pub venue: Option<String>,
    pub category: Option<EventCategory>,
    pub organizer: Option<String>,
    pub organizer_contact: Option<String>,
    pub eligibility: Option<String>,
    pub prerequisites: Option<String>,
    pub max_capacity: Option<u32>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub status: Option<EventStatus>,
    pub search: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.category.map_or(true, |c| c == event.category)
            && self.status.map_or(true, |s| s == event.status)
            && self.search.as_deref().map_or(true, |needle| {
                super::matches_text(
                    needle,
                    [event.title.as_str(), event.description.as_str()]
                        .into_iter()
                        .chain(event.tags.iter().map(String::as_str)),
                )
            })
    }
}

/// An event as returned to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView<U = Uuid> {
    #[serde(flatten)]
    pub event: Event<U>,
    pub registered_count: usize,
}

impl<U> From<Event<U>> for EventView<U> {
    fn from(event: Event<U>) -> Self {
        Self {
            registered_count: event.registrations.len(),
            event,
        }
    }
}

fn check_capacity(max_capacity: u32) -> AppResult<()> {
    if max_capacity < 1 {
        return Err(AppError::validation(
            "maxCapacity",
            "capacity must be at least 1",
        ));
    }
    Ok(())
}

fn check_contact(contact: Option<&str>) -> AppResult<()> {
    match contact {
        Some(contact) if !contact.is_empty() => super::email("organizerContact", contact),
        _ => Ok(()),
    }
}

impl NewEvent {
    pub fn validate(&self) -> AppResult<()> {
        super::required_max("title", &self.title, 100)?;
        super::required_max("description", &self.description, 500)?;
        if let Some(full) = &self.full_description {
            super::max_len("fullDescription", full, 2000)?;
        }
        super::required("time", &self.time)?;
        super::required("venue", &self.venue)?;
        super::required("organizer", &self.organizer)?;
        check_contact(self.organizer_contact.as_deref())?;
        check_capacity(self.max_capacity)
    }

    pub fn into_event(self, created_by: Uuid, now: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            description: self.description,
            full_description: self.full_description,
            date: self.date,
            time: self.time,
            end_time: self.end_time,
            venue: self.venue,
            category: self.category,
            poster: String::new(),
            organizer: self.organizer,
            organizer_contact: self.organizer_contact,
            eligibility: self
                .eligibility
                .unwrap_or_else(|| DEFAULT_ELIGIBILITY.to_string()),
            prerequisites: self.prerequisites,
            max_capacity: self.max_capacity,
            registration_deadline: self.registration_deadline,
            status: self.status.unwrap_or(EventStatus::Upcoming),
            tags: self.tags,
            registrations: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Event {
    pub fn registered_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_full(&self) -> bool {
        self.registrations.len() >= self.max_capacity as usize
    }

    pub fn is_registered(&self, user: Uuid) -> bool {
        self.registrations.iter().any(|r| r.user == user)
    }

    pub fn apply(&mut self, patch: EventPatch) -> AppResult<()> {
        if let Some(title) = patch.title {
            super::required_max("title", &title, 100)?;
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            super::required_max("description", &description, 500)?;
            self.description = description;
        }
        if let Some(full) = patch.full_description {
            super::max_len("fullDescription", &full, 2000)?;
            self.full_description = Some(full);
        }
        if let Some(max_capacity) = patch.max_capacity {
            check_capacity(max_capacity)?;
            if (max_capacity as usize) < self.registrations.len() {
                return Err(AppError::validation(
                    "maxCapacity",
                    "capacity cannot be lower than the number of registrations",
                ));
            }
            self.max_capacity = max_capacity;
        }
        if patch.organizer_contact.is_some() {
            check_contact(patch.organizer_contact.as_deref())?;
            self.organizer_contact = patch.organizer_contact;
        }
        if let Some(time) = patch.time {
            super::required("time", &time)?;
            self.time = time;
        }
        if let Some(venue) = patch.venue {
            super::required("venue", &venue)?;
            self.venue = venue;
        }
        if let Some(organizer) = patch.organizer {
            super::required("organizer", &organizer)?;
            self.organizer = organizer;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if patch.end_time.is_some() {
            self.end_time = patch.end_time;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(eligibility) = patch.eligibility {
            self.eligibility = eligibility;
        }
        if patch.prerequisites.is_some() {
            self.prerequisites = patch.prerequisites;
        }
        if patch.registration_deadline.is_some() {
            self.registration_deadline = patch.registration_deadline;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        Ok(())
    }

    /// Appends a registration for `user` if the event still accepts one.
    pub fn register(&mut self, user: Uuid, form: RegistrationForm, now: DateTime<Utc>) -> AppResult<()> {
        if matches!(self.status, EventStatus::Cancelled | EventStatus::Completed) {
            return Err(AppError::invalid_state("event is no longer open for registration"));
        }
        if self.registration_deadline.map_or(false, |deadline| deadline < now) {
            return Err(AppError::invalid_state("registration deadline has passed"));
        }
        if self.is_full() {
            return Err(AppError::CapacityExceeded);
        }
        if self.is_registered(user) {
            return Err(AppError::conflict("already registered for this event"));
        }

        self.registrations.push(Registration {
            id: Uuid::new_v4(),
            user,
            registration_data: form,
            registered_at: now,
        });
        Ok(())
    }

    /// Returns whether a registration was removed.
    pub fn unregister(&mut self, user: Uuid) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.user != user);
        before != self.registrations.len()
    }

    pub fn user_ids(&self) -> Vec<Uuid> {
        std::iter::once(self.created_by)
            .chain(self.registrations.iter().map(|r| r.user))
            .collect()
    }

    pub fn populate(self, users: &Directory) -> Event<Populated> {
        Event {
            id: self.id,
            title: self.title,
            description: self.description,
            full_description: self.full_description,
            date: self.date,
            time: self.time,
            end_time: self.end_time,
            venue: self.venue,
            category: self.category,
            poster: self.poster,
            organizer: self.organizer,
            organizer_contact: self.organizer_contact,
            eligibility: self.eligibility,
            prerequisites: self.prerequisites,
            max_capacity: self.max_capacity,
            registration_deadline: self.registration_deadline,
            status: self.status,
            tags: self.tags,
            registrations: self
                .registrations
                .into_iter()
                .map(|r| Registration {
                    id: r.id,
                    user: users.summary(r.user),
                    registration_data: r.registration_data,
                    registered_at: r.registered_at,
                })
                .collect(),
            created_by: users.summary(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn new_event(max_capacity: u32) -> NewEvent {
        NewEvent {
            title: "Hackathon".into(),
            description: "24h build".into(),
            full_description: None,
            date: Utc::now() + Duration::days(7),
            time: "09:00".into(),
            end_time: None,
            venue: "Main hall".into(),
            category: EventCategory::Technical,
            organizer: "CS dept".into(),
            organizer_contact: Some("cs@campus.edu".into()),
            eligibility: None,
            prerequisites: None,
            max_capacity,
            registration_deadline: Some(Utc::now() + Duration::days(5)),
            status: None,
            tags: vec!["coding".into()],
        }
    }

    #[test]
    fn defaults_on_create() {
        let event = new_event(10).into_event(Uuid::new_v4(), Utc::now());
        assert_eq!(event.status, EventStatus::Upcoming);
        assert_eq!(event.eligibility, DEFAULT_ELIGIBILITY);
        assert_eq!(event.registered_count(), 0);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = new_event(0).validate().unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "maxCapacity", .. }));
    }

    #[test]
    fn capacity_and_duplicates() {
        let mut event = new_event(1).into_event(Uuid::new_v4(), Utc::now());
        let a = Uuid::new_v4();
        event.register(a, RegistrationForm::default(), Utc::now()).unwrap();

        assert!(matches!(
            event.register(a, RegistrationForm::default(), Utc::now()),
            Err(AppError::CapacityExceeded)
        ));
        event.max_capacity = 2;
        assert!(matches!(
            event.register(a, RegistrationForm::default(), Utc::now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn deadline_and_status_close_registration() {
        let mut event = new_event(5).into_event(Uuid::new_v4(), Utc::now());
        event.registration_deadline = Some(Utc::now() - Duration::hours(1));
        assert!(matches!(
            event.register(Uuid::new_v4(), RegistrationForm::default(), Utc::now()),
            Err(AppError::InvalidStateTransition(_))
        ));

        event.registration_deadline = None;
        event.status = EventStatus::Cancelled;
        assert!(event
            .register(Uuid::new_v4(), RegistrationForm::default(), Utc::now())
            .is_err());
    }

    #[test]
    fn capacity_cannot_drop_below_registrations() {
        let mut event = new_event(3).into_event(Uuid::new_v4(), Utc::now());
        event.register(Uuid::new_v4(), RegistrationForm::default(), Utc::now()).unwrap();
        event.register(Uuid::new_v4(), RegistrationForm::default(), Utc::now()).unwrap();

        let patch = EventPatch {
            max_capacity: Some(1),
            ..Default::default()
        };
        assert!(event.apply(patch).is_err());
        assert_eq!(event.max_capacity, 3);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut event = new_event(3).into_event(Uuid::new_v4(), Utc::now());
        let user = Uuid::new_v4();
        event.register(user, RegistrationForm::default(), Utc::now()).unwrap();
        assert!(event.unregister(user));
        assert!(!event.unregister(user));
    }

    #[test]
    fn filter_searches_tags() {
        let event = new_event(3).into_event(Uuid::new_v4(), Utc::now());
        let filter = EventFilter {
            search: Some("CODING".into()),
            ..Default::default()
        };
        assert!(filter.matches(&event));
        let filter = EventFilter {
            category: Some(EventCategory::Sports),
            ..Default::default()
        };
        assert!(!filter.matches(&event));
    }
}
