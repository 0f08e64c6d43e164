use bson::Uuid;
use serde::{Deserialize, Serialize};
use tracing::debug;

use shelterdb_core::{
    backend::StoreBackend,
    document::{Document, chrono_datetime},
    error::StoreResult,
    filter::{FilterFields, FilterSpec, Predicates},
    page::Listing,
    query::Filter,
    stats::{AggregationSpec, StatsPreset, SumSpec},
    store::{DocumentStore, IndexSpec, Indexed},
};

use super::donation::{Donation, DonationStatus};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DonorType {
    Individual,
    Organization,
    Corporate,
    Foundation,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DonorStatus {
    Active,
    Inactive,
    Lapsed,
    Major,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DonorContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Donor {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: DonorType,
    pub status: DonorStatus,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_name: Option<String>,
    pub contact: DonorContact,
    pub tags: Vec<String>,
    /// Running totals, maintained only through counters.
    pub total_donated: f64,
    pub donation_count: i64,
    pub last_donation_date: Option<bson::DateTime>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl Donor {
    pub fn individual(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: Uuid::new(),
            kind: DonorType::Individual,
            status: DonorStatus::Active,
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            organization_name: None,
            contact: DonorContact::default(),
            tags: Vec::new(),
            total_donated: 0.0,
            donation_count: 0,
            last_donation_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.organization_name, &self.first_name, &self.last_name) {
            (Some(organization), _, _) => organization.clone(),
            (None, first, last) => [first.as_deref(), last.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl Document for Donor {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "donors"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonorFilter {
    pub kind: Option<DonorType>,
    pub status: Option<DonorStatus>,
    pub min_total_donated: Option<f64>,
    pub max_total_donated: Option<f64>,
    pub tags: Vec<String>,
    pub from: Option<bson::DateTime>,
    pub to: Option<bson::DateTime>,
    pub search: Option<String>,
}

impl FilterSpec for DonorFilter {
    const SEARCH_FIELDS: &'static [&'static str] =
        &["first_name", "last_name", "organization_name", "contact.email"];

    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("type", self.kind.as_ref())
            .eq("status", self.status.as_ref())
            .range("total_donated", self.min_total_donated.as_ref(), self.max_total_donated.as_ref())
            .any_of("tags", &self.tags)
            .date_range("created_at", self.from, self.to)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            kind: fields.parse("type"),
            status: fields.parse("status"),
            min_total_donated: fields.number("min_total_donated"),
            max_total_donated: fields.number("max_total_donated"),
            tags: fields.list("tags"),
            from: fields.datetime("from"),
            to: fields.datetime("to"),
            search: fields.text("search"),
        }
    }
}

impl Listing for Donor {
    type Filter = DonorFilter;

    const DEFAULT_SORT_FIELD: &'static str = "created_at";
    const SORTABLE_FIELDS: &'static [&'static str] =
        &["created_at", "last_name", "organization_name", "total_donated", "donation_count", "last_donation_date"];
}

impl StatsPreset for Donor {
    const DATE_FIELD: &'static str = "created_at";
    const GROUPABLE_FIELDS: &'static [&'static str] = &["type", "status"];

    fn aggregation() -> AggregationSpec {
        AggregationSpec::new()
            .group_by("type")
            .group_by("status")
            .sum(SumSpec::new("total_donated").with_average())
            .count("major_donors", Filter::eq("status", "major"))
    }
}

impl Indexed for Donor {
    const INDEXES: &'static [IndexSpec] = &[
        IndexSpec::new("status"),
        IndexSpec::new("type"),
        IndexSpec::new("contact.email"),
        IndexSpec::new("total_donated"),
    ];
}

/// Stores `donation` and, when it is completed, adds it to its donor's running totals.
///
/// The two writes are independent: the donation stays stored if the donor update fails.
///
/// # Errors
///
/// [`StoreError::NotFound`](shelterdb_core::error::StoreError::NotFound) when the donor does
/// not exist.
pub async fn record_donation<B: StoreBackend>(store: &DocumentStore<B>, donation: Donation) -> StoreResult<Donation> {
    store
        .typed_collection::<Donation>()
        .insert(vec![donation.clone()])
        .await?;

    if donation.status == DonationStatus::Completed {
        store
            .typed_collection::<Donor>()
            .counter(donation.donor_id)
            .add("total_donated", donation.amount)
            .add("donation_count", 1i64)
            .touch("last_donation_date", chrono_datetime(donation.donation_date))
            .apply()
            .await?;

        debug!(donor = %donation.donor_id, amount = donation.amount, "donor totals updated");
    }

    Ok(donation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_organization() {
        let mut donor = Donor::individual("Ada", "Lovelace");
        assert_eq!(donor.display_name(), "Ada Lovelace");

        donor.organization_name = Some("Paws Foundation".into());
        assert_eq!(donor.display_name(), "Paws Foundation");
    }

    #[test]
    fn tags_compile_to_membership() {
        let fields = FilterFields::new().with("tags", "monthly, gala");
        assert_eq!(
            DonorFilter::from_fields(&fields).compile(),
            Some(Filter::any_of("tags", ["monthly", "gala"])),
        );
    }
}
