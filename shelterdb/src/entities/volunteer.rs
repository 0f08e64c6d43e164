use bson::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelterdb_core::{
    backend::StoreBackend,
    document::Document,
    error::StoreResult,
    filter::{FilterFields, FilterSpec, Predicates},
    page::Listing,
    query::Filter,
    stats::{AggregationSpec, StatsPreset, SumSpec},
    store::{DocumentStore, IndexSpec, Indexed},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VolunteerStatus {
    Active,
    Inactive,
    OnHold,
    Suspended,
    Alumni,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Volunteer {
    pub id: Uuid,
    /// Login account, when the volunteer has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: VolunteerStatus,
    pub skills: Vec<String>,
    pub application_date: bson::DateTime,
    pub total_hours: f64,
    pub last_activity_date: Option<bson::DateTime>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl Volunteer {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: Uuid::new(),
            user_id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone: None,
            status: VolunteerStatus::Active,
            skills: Vec::new(),
            application_date: now,
            total_hours: 0.0,
            last_activity_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Volunteer {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "volunteers"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolunteerFilter {
    pub status: Option<VolunteerStatus>,
    pub skills: Vec<String>,
    pub has_user_id: Option<bool>,
    pub min_hours: Option<f64>,
    pub from: Option<bson::DateTime>,
    pub to: Option<bson::DateTime>,
    pub search: Option<String>,
}

impl FilterSpec for VolunteerFilter {
    const SEARCH_FIELDS: &'static [&'static str] = &["first_name", "last_name", "email"];

    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("status", self.status.as_ref())
            .any_of("skills", &self.skills)
            .exists("user_id", self.has_user_id)
            .range("total_hours", self.min_hours.as_ref(), None)
            .date_range("application_date", self.from, self.to)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            status: fields.parse("status"),
            skills: fields.list("skills"),
            has_user_id: fields.flag("has_user_id"),
            min_hours: fields.number("min_hours"),
            from: fields.datetime("from"),
            to: fields.datetime("to"),
            search: fields.text("search"),
        }
    }
}

impl Listing for Volunteer {
    type Filter = VolunteerFilter;

    const DEFAULT_SORT_FIELD: &'static str = "created_at";
    const SORTABLE_FIELDS: &'static [&'static str] =
        &["created_at", "last_name", "application_date", "total_hours", "last_activity_date"];
}

impl StatsPreset for Volunteer {
    const DATE_FIELD: &'static str = "application_date";
    const GROUPABLE_FIELDS: &'static [&'static str] = &["status"];

    fn aggregation() -> AggregationSpec {
        AggregationSpec::new()
            .group_by("status")
            .sum(SumSpec::new("total_hours").with_average())
            .count("active_volunteers", Filter::eq("status", "active"))
            .count("inactive_volunteers", Filter::eq("status", "inactive"))
    }
}

impl Indexed for Volunteer {
    const INDEXES: &'static [IndexSpec] = &[
        IndexSpec::unique("email"),
        IndexSpec::new("status"),
        IndexSpec::new("skills"),
    ];
}

/// Adds a worked shift to the volunteer's running hours.
pub async fn log_hours<B: StoreBackend>(
    store: &DocumentStore<B>,
    volunteer_id: Uuid,
    hours: f64,
    worked_at: DateTime<Utc>,
) -> StoreResult<()> {
    store
        .typed_collection::<Volunteer>()
        .counter(volunteer_id)
        .add("total_hours", hours)
        .touch("last_activity_date", worked_at)
        .apply()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_presence_compiles_to_existence() {
        let filter = VolunteerFilter::from_fields(&FilterFields::new().with("has_user_id", "no"));
        assert_eq!(filter.compile(), Some(Filter::not_exists("user_id")));
    }
}
