use bson::{Bson, Uuid};
use serde::{Deserialize, Serialize};

use shelterdb_core::{
    document::Document,
    filter::{FilterFields, FilterSpec, Predicates},
    page::Listing,
    query::Filter,
    stats::{
        AggregationSpec, COUNT_TOTAL, RateSpec, ScalarRef, StatsPreset, SumSpec, TimeWindow, WindowSpec,
    },
    store::{IndexSpec, Indexed},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdoptionStatus {
    Pending,
    Completed,
    Returned,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Waived,
    Refunded,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FollowUp {
    pub scheduled_date: bson::DateTime,
    pub completed_date: Option<bson::DateTime>,
    /// phone, email or visit
    pub kind: String,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Adoption {
    pub id: Uuid,
    pub application_id: Option<Uuid>,
    pub animal_id: Uuid,
    pub adopter_id: Uuid,
    pub status: AdoptionStatus,
    pub adoption_date: bson::DateTime,
    pub trial_period: bool,
    pub adoption_fee: f64,
    pub payment_status: PaymentStatus,
    pub amount_paid: f64,
    pub follow_ups: Vec<FollowUp>,
    /// Earliest follow-up not yet completed.
    pub next_follow_up_date: Option<bson::DateTime>,
    pub return_date: Option<bson::DateTime>,
    pub return_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl Adoption {
    pub fn new(animal_id: Uuid, adopter_id: Uuid, adoption_fee: f64) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: Uuid::new(),
            application_id: None,
            animal_id,
            adopter_id,
            status: AdoptionStatus::Pending,
            adoption_date: now,
            trial_period: false,
            adoption_fee,
            payment_status: PaymentStatus::Pending,
            amount_paid: 0.0,
            follow_ups: Vec::new(),
            next_follow_up_date: None,
            return_date: None,
            return_reason: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Adoption {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "adoptions"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdoptionFilter {
    pub animal_id: Option<Uuid>,
    pub adopter_id: Option<Uuid>,
    pub status: Vec<AdoptionStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub trial_period: Option<bool>,
    pub from: Option<bson::DateTime>,
    pub to: Option<bson::DateTime>,
    pub search: Option<String>,
}

impl FilterSpec for AdoptionFilter {
    const SEARCH_FIELDS: &'static [&'static str] = &["notes", "return_reason"];

    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("animal_id", self.animal_id.as_ref())
            .eq("adopter_id", self.adopter_id.as_ref())
            .any_of("status", &self.status)
            .eq("payment_status", self.payment_status.as_ref())
            .flag("trial_period", self.trial_period)
            .date_range("adoption_date", self.from, self.to)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            animal_id: fields.parse("animal_id"),
            adopter_id: fields.parse("adopter_id"),
            status: fields.parse_list("status"),
            payment_status: fields.parse("payment_status"),
            trial_period: fields.flag("trial_period"),
            from: fields.datetime("from"),
            to: fields.datetime("to"),
            search: fields.text("search"),
        }
    }
}

impl Listing for Adoption {
    type Filter = AdoptionFilter;

    const DEFAULT_SORT_FIELD: &'static str = "adoption_date";
    const SORTABLE_FIELDS: &'static [&'static str] =
        &["adoption_date", "created_at", "status", "adoption_fee", "next_follow_up_date"];
}

impl StatsPreset for Adoption {
    const DATE_FIELD: &'static str = "adoption_date";
    const GROUPABLE_FIELDS: &'static [&'static str] = &["status", "payment_status", "trial_period"];

    fn aggregation() -> AggregationSpec {
        AggregationSpec::new()
            .group_by("status")
            .group_by("payment_status")
            .sum(SumSpec::new("adoption_fee").with_average())
            .count("completed_adoptions", Filter::eq("status", "completed"))
            .count("pending_adoptions", Filter::eq("status", "pending"))
            .count("returned_animals", Filter::eq("status", "returned"))
            .count("pending_follow_ups", Filter::ne("next_follow_up_date", Bson::Null))
            .window(WindowSpec::new("adoptions_this_month", TimeWindow::ThisMonth, "adoption_date"))
            .window(WindowSpec::new("adoptions_this_year", TimeWindow::ThisYear, "adoption_date"))
            .rate(RateSpec::percent(
                "return_rate",
                ScalarRef::total("returned_animals"),
                ScalarRef::total(COUNT_TOTAL),
            ))
    }
}

impl Indexed for Adoption {
    const INDEXES: &'static [IndexSpec] = &[
        IndexSpec::new("animal_id"),
        IndexSpec::new("adopter_id"),
        IndexSpec::new("status"),
        IndexSpec::new("adoption_date"),
    ];
}
