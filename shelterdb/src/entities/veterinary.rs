//! Veterinary visits and vaccinations, listed separately or as one medical history.
//!
//! The medical history merges both collections into a single feed ordered by the date of
//! care: `visit_date` for visits, `date_administered` for vaccinations. Its filter is written
//! in the shared vocabulary (`date`, `animal_id`, `veterinarian`).

use bson::Uuid;
use serde::{Deserialize, Serialize};

use shelterdb_core::{
    backend::StoreBackend,
    document::{Document, DocumentExt},
    error::{StoreError, StoreResult},
    filter::{FilterFields, FilterSpec, Predicates},
    merge::{MERGED_DATE_FIELD, MergeSource, MergedRecord},
    page::{Listing, PageRequest, PageResult},
    stats::{AggregationSpec, StatsPreset, SumSpec},
    store::{DocumentStore, IndexSpec, Indexed},
};

pub const VISIT_KIND: &str = "visit";
pub const VACCINATION_KIND: &str = "vaccination";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    Checkup,
    Vaccination,
    Emergency,
    Surgery,
    Dental,
    SpayNeuter,
    FollowUp,
    Treatment,
    Diagnostic,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VeterinaryVisit {
    pub id: Uuid,
    pub animal_id: Uuid,
    pub visit_type: VisitType,
    pub status: VisitStatus,
    pub visit_date: bson::DateTime,
    pub veterinarian_name: String,
    pub clinic_name: Option<String>,
    pub chief_complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub cost: f64,
    pub follow_up_date: Option<bson::DateTime>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl VeterinaryVisit {
    pub fn new(animal_id: Uuid, visit_type: VisitType, visit_date: bson::DateTime, veterinarian: impl Into<String>) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: Uuid::new(),
            animal_id,
            visit_type,
            status: VisitStatus::Scheduled,
            visit_date,
            veterinarian_name: veterinarian.into(),
            clinic_name: None,
            chief_complaint: None,
            diagnosis: None,
            treatment: None,
            cost: 0.0,
            follow_up_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for VeterinaryVisit {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "veterinary_visits"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VaccineType {
    Rabies,
    Dhpp,
    Bordetella,
    Leptospirosis,
    Lyme,
    CanineInfluenza,
    Fvrcp,
    Felv,
    Fip,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VaccinationStatus {
    Current,
    Due,
    Overdue,
    Expired,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Vaccination {
    pub id: Uuid,
    pub animal_id: Uuid,
    pub vaccine_type: VaccineType,
    pub vaccine_name: String,
    pub dose_number: i32,
    pub date_administered: bson::DateTime,
    pub next_due_date: Option<bson::DateTime>,
    pub status: VaccinationStatus,
    pub administered_by: String,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl Vaccination {
    pub fn new(
        animal_id: Uuid,
        vaccine_type: VaccineType,
        vaccine_name: impl Into<String>,
        date_administered: bson::DateTime,
        administered_by: impl Into<String>,
    ) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: Uuid::new(),
            animal_id,
            vaccine_type,
            vaccine_name: vaccine_name.into(),
            dose_number: 1,
            date_administered,
            next_due_date: None,
            status: VaccinationStatus::Current,
            administered_by: administered_by.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Vaccination {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "vaccinations"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitFilter {
    pub animal_id: Option<Uuid>,
    pub visit_type: Option<VisitType>,
    pub status: Option<VisitStatus>,
    pub veterinarian_name: Option<String>,
    pub from: Option<bson::DateTime>,
    pub to: Option<bson::DateTime>,
    pub search: Option<String>,
}

impl FilterSpec for VisitFilter {
    const SEARCH_FIELDS: &'static [&'static str] =
        &["chief_complaint", "diagnosis", "treatment", "veterinarian_name", "clinic_name"];

    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("animal_id", self.animal_id.as_ref())
            .eq("visit_type", self.visit_type.as_ref())
            .eq("status", self.status.as_ref())
            .eq("veterinarian_name", self.veterinarian_name.as_ref())
            .date_range("visit_date", self.from, self.to)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            animal_id: fields.parse("animal_id"),
            visit_type: fields.parse("visit_type"),
            status: fields.parse("status"),
            veterinarian_name: fields.text("veterinarian_name"),
            from: fields.datetime("from"),
            to: fields.datetime("to"),
            search: fields.text("search"),
        }
    }
}

impl Listing for VeterinaryVisit {
    type Filter = VisitFilter;

    const DEFAULT_SORT_FIELD: &'static str = "visit_date";
    const SORTABLE_FIELDS: &'static [&'static str] = &["visit_date", "created_at", "cost", "status"];
}

impl StatsPreset for VeterinaryVisit {
    const DATE_FIELD: &'static str = "visit_date";
    const GROUPABLE_FIELDS: &'static [&'static str] = &["visit_type", "status", "veterinarian_name"];

    fn aggregation() -> AggregationSpec {
        AggregationSpec::new()
            .group_by("visit_type")
            .group_by("status")
            .sum(SumSpec::new("cost").with_average())
    }
}

impl Indexed for VeterinaryVisit {
    const INDEXES: &'static [IndexSpec] = &[IndexSpec::new("animal_id"), IndexSpec::new("visit_date")];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VaccinationFilter {
    pub animal_id: Option<Uuid>,
    pub vaccine_type: Option<VaccineType>,
    pub status: Option<VaccinationStatus>,
    pub due_from: Option<bson::DateTime>,
    pub due_to: Option<bson::DateTime>,
    pub search: Option<String>,
}

impl FilterSpec for VaccinationFilter {
    const SEARCH_FIELDS: &'static [&'static str] = &["vaccine_name", "administered_by"];

    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("animal_id", self.animal_id.as_ref())
            .eq("vaccine_type", self.vaccine_type.as_ref())
            .eq("status", self.status.as_ref())
            .date_range("next_due_date", self.due_from, self.due_to)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            animal_id: fields.parse("animal_id"),
            vaccine_type: fields.parse("vaccine_type"),
            status: fields.parse("status"),
            due_from: fields.datetime("due_from"),
            due_to: fields.datetime("due_to"),
            search: fields.text("search"),
        }
    }
}

impl Listing for Vaccination {
    type Filter = VaccinationFilter;

    const DEFAULT_SORT_FIELD: &'static str = "date_administered";
    const SORTABLE_FIELDS: &'static [&'static str] = &["date_administered", "next_due_date", "created_at"];
}

impl Indexed for Vaccination {
    const INDEXES: &'static [IndexSpec] = &[
        IndexSpec::new("animal_id"),
        IndexSpec::new("date_administered"),
        IndexSpec::new("next_due_date"),
    ];
}

/// The two sources of the medical history, visits first.
pub fn history_sources() -> [MergeSource; 2] {
    [
        MergeSource::new(VeterinaryVisit::collection_name(), VISIT_KIND, "visit_date")
            .map_field("veterinarian", "veterinarian_name"),
        MergeSource::new(Vaccination::collection_name(), VACCINATION_KIND, "date_administered")
            .map_field("veterinarian", "administered_by"),
    ]
}

/// Filter over the merged medical history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicalHistoryFilter {
    pub animal_id: Option<Uuid>,
    pub veterinarian: Option<String>,
    pub from: Option<bson::DateTime>,
    pub to: Option<bson::DateTime>,
}

impl FilterSpec for MedicalHistoryFilter {
    const SEARCH_FIELDS: &'static [&'static str] = &[];

    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("animal_id", self.animal_id.as_ref())
            .eq("veterinarian", self.veterinarian.as_ref())
            .date_range(MERGED_DATE_FIELD, self.from, self.to)
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            animal_id: fields.parse("animal_id"),
            veterinarian: fields.text("veterinarian"),
            from: fields.datetime("from"),
            to: fields.datetime("to"),
        }
    }
}

/// One entry of the medical history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum MedicalRecord {
    Visit(VeterinaryVisit),
    Vaccination(Vaccination),
}

impl MedicalRecord {
    pub fn date(&self) -> bson::DateTime {
        match self {
            MedicalRecord::Visit(visit) => visit.visit_date,
            MedicalRecord::Vaccination(vaccination) => vaccination.date_administered,
        }
    }
}

impl TryFrom<MergedRecord> for MedicalRecord {
    type Error = StoreError;

    fn try_from(merged: MergedRecord) -> Result<Self, Self::Error> {
        match merged.kind.as_str() {
            VISIT_KIND => Ok(MedicalRecord::Visit(VeterinaryVisit::from_bson(merged.record)?)),
            VACCINATION_KIND => Ok(MedicalRecord::Vaccination(Vaccination::from_bson(merged.record)?)),
            other => Err(StoreError::InvalidDocument(format!("unknown medical record kind {other}"))),
        }
    }
}

/// Visits and vaccinations as one page, ordered by date of care.
pub async fn medical_history<B: StoreBackend>(
    store: &DocumentStore<B>,
    filter: &MedicalHistoryFilter,
    page: &PageRequest,
) -> StoreResult<PageResult<MedicalRecord>> {
    store
        .merge_list(&history_sources(), filter.compile(), page)
        .await?
        .try_map(MedicalRecord::try_from)
}

#[cfg(test)]
mod tests {
    use shelterdb_core::query::{Expr, Filter};

    use super::*;

    #[test]
    fn shared_vocabulary_translates_per_source() {
        let filter = MedicalHistoryFilter { veterinarian: Some("Dr. Nowak".into()), ..Default::default() };
        let compiled = filter.compile().unwrap();
        let [visits, vaccinations] = history_sources();

        assert_eq!(visits.translate(&compiled), Filter::eq("veterinarian_name", "Dr. Nowak"));
        assert_eq!(vaccinations.translate(&compiled), Filter::eq("administered_by", "Dr. Nowak"));
    }

    #[test]
    fn date_bounds_follow_each_source() {
        let from = bson::DateTime::from_millis(1_000);
        let compiled = MedicalHistoryFilter { from: Some(from), ..Default::default() }
            .compile()
            .unwrap();
        let [_, vaccinations] = history_sources();

        assert_eq!(vaccinations.translate(&compiled), Filter::gte("date_administered", from));
        assert!(!matches!(compiled, Expr::And(_)));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let merged = MergedRecord {
            kind: "surgery_note".into(),
            date: bson::DateTime::from_millis(0),
            id: Uuid::new(),
            record: bson::Bson::Null,
        };

        assert!(matches!(MedicalRecord::try_from(merged), Err(StoreError::InvalidDocument(_))));
    }
}
