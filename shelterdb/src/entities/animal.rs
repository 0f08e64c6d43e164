use bson::Uuid;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use shelterdb_core::{
    document::{Document, bson_datetime},
    filter::{FilterFields, FilterSpec, Predicates},
    page::Listing,
    query::Filter,
    stats::{AggregationSpec, StatsPreset, TimeWindow, WindowSpec},
    store::{IndexSpec, Indexed},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnimalCategory {
    Mammal,
    Bird,
    Reptile,
    Amphibian,
    Fish,
    Invertebrate,
    FarmAnimal,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnimalStatus {
    Available,
    Reserved,
    Adopted,
    Fostered,
    UnderTreatment,
    Quarantine,
    Transferred,
    Deceased,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Size {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

/// Text kept in both languages the shelter publishes in.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedText {
    pub en: String,
    pub pl: String,
}

impl LocalizedText {
    pub fn new(en: impl Into<String>, pl: impl Into<String>) -> Self {
        Self { en: en.into(), pl: pl.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Behavior {
    pub good_with_kids: bool,
    pub good_with_dogs: bool,
    pub good_with_cats: bool,
    pub house_trained: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShelterInfo {
    pub intake_date: bson::DateTime,
    pub location: String,
    pub assigned_caretaker: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AdoptionInfo {
    pub adoption_fee: f64,
    pub adoption_date: Option<bson::DateTime>,
    pub adopter_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Animal {
    pub id: Uuid,
    pub name: LocalizedText,
    pub category: AnimalCategory,
    pub species: String,
    pub breed: Option<String>,
    pub sex: Sex,
    pub size: Option<Size>,
    pub status: AnimalStatus,
    pub date_of_birth: Option<bson::DateTime>,
    pub description: LocalizedText,
    pub behavior: Behavior,
    pub shelter: ShelterInfo,
    pub adoption: AdoptionInfo,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl Animal {
    /// A newly admitted animal, available for adoption.
    pub fn new(name: LocalizedText, category: AnimalCategory, species: impl Into<String>, sex: Sex) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: Uuid::new(),
            name,
            category,
            species: species.into(),
            breed: None,
            sex,
            size: None,
            status: AnimalStatus::Available,
            date_of_birth: None,
            description: LocalizedText::default(),
            behavior: Behavior::default(),
            shelter: ShelterInfo { intake_date: now, location: String::new(), assigned_caretaker: None },
            adoption: AdoptionInfo::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Animal {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "animals"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimalFilter {
    pub category: Option<AnimalCategory>,
    pub species: Option<String>,
    pub status: Option<AnimalStatus>,
    pub sex: Option<Sex>,
    pub size: Option<Size>,
    /// Overrides `status` with [`AnimalStatus::Available`].
    pub available_only: bool,
    pub good_with_kids: Option<bool>,
    pub good_with_dogs: Option<bool>,
    pub good_with_cats: Option<bool>,
    pub assigned_caretaker: Option<Uuid>,
    /// Age bounds in years, applied to `date_of_birth`.
    pub min_age: Option<f64>,
    pub max_age: Option<f64>,
    pub intake_from: Option<bson::DateTime>,
    pub intake_to: Option<bson::DateTime>,
    pub search: Option<String>,
}

/// The birth date of someone `years` old today.
fn born_years_ago(years: f64) -> bson::DateTime {
    let days = (years * 365.25).round() as i64;
    bson_datetime(Utc::now() - Duration::days(days))
}

impl FilterSpec for AnimalFilter {
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name.en", "name.pl", "description.en", "description.pl", "breed"];

    fn predicates(&self) -> Predicates {
        let status = if self.available_only { Some(AnimalStatus::Available) } else { self.status };

        // Older animals were born earlier, so the age bounds swap ends.
        let born_after = self.max_age.filter(|age| *age > 0.0).map(born_years_ago);
        let born_before = self.min_age.filter(|age| *age > 0.0).map(born_years_ago);

        Predicates::new()
            .eq("category", self.category.as_ref())
            .eq("species", self.species.as_ref())
            .eq("status", status.as_ref())
            .eq("sex", self.sex.as_ref())
            .eq("size", self.size.as_ref())
            .flag("behavior.good_with_kids", self.good_with_kids)
            .flag("behavior.good_with_dogs", self.good_with_dogs)
            .flag("behavior.good_with_cats", self.good_with_cats)
            .eq("shelter.assigned_caretaker", self.assigned_caretaker.as_ref())
            .date_range("date_of_birth", born_after, born_before)
            .date_range("shelter.intake_date", self.intake_from, self.intake_to)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            category: fields.parse("category"),
            species: fields.text("species"),
            status: fields.parse("status"),
            sex: fields.parse("sex"),
            size: fields.parse("size"),
            available_only: fields.flag("available_only").unwrap_or_default(),
            good_with_kids: fields.flag("good_with_kids"),
            good_with_dogs: fields.flag("good_with_dogs"),
            good_with_cats: fields.flag("good_with_cats"),
            assigned_caretaker: fields.parse("assigned_caretaker"),
            min_age: fields.number("min_age"),
            max_age: fields.number("max_age"),
            intake_from: fields.datetime("intake_from"),
            intake_to: fields.datetime("intake_to"),
            search: fields.text("search"),
        }
    }
}

impl Listing for Animal {
    type Filter = AnimalFilter;

    const DEFAULT_SORT_FIELD: &'static str = "created_at";
    const SORTABLE_FIELDS: &'static [&'static str] = &[
        "created_at",
        "updated_at",
        "name.en",
        "name.pl",
        "species",
        "status",
        "date_of_birth",
        "shelter.intake_date",
    ];
}

impl StatsPreset for Animal {
    const DATE_FIELD: &'static str = "created_at";
    const GROUPABLE_FIELDS: &'static [&'static str] = &["status", "category", "species", "sex", "size"];

    fn aggregation() -> AggregationSpec {
        AggregationSpec::new()
            .group_by("status")
            .group_by("category")
            .group_by("species")
            .count("available_for_adoption", Filter::eq("status", "available"))
            .window(WindowSpec::new("adopted_this_month", TimeWindow::ThisMonth, "adoption.adoption_date"))
            .window(WindowSpec::new("adopted_this_year", TimeWindow::ThisYear, "adoption.adoption_date"))
    }
}

impl Indexed for Animal {
    const INDEXES: &'static [IndexSpec] = &[
        IndexSpec::new("status"),
        IndexSpec::new("category"),
        IndexSpec::new("species"),
        IndexSpec::new("created_at"),
        IndexSpec::new("shelter.assigned_caretaker"),
    ];
}

#[cfg(test)]
mod tests {
    use shelterdb_core::query::Expr;

    use super::*;

    #[test]
    fn available_only_overrides_status() {
        let filter = AnimalFilter {
            status: Some(AnimalStatus::Adopted),
            available_only: true,
            ..Default::default()
        };

        assert_eq!(filter.compile(), Some(Filter::eq("status", "available")));
    }

    #[test]
    fn request_fields_compile_to_typed_predicates() {
        let fields = FilterFields::new()
            .with("category", "mammal")
            .with("good_with_cats", "false")
            .with("size", "enormous");

        let filter = AnimalFilter::from_fields(&fields);

        assert_eq!(filter.size, None);
        assert_eq!(
            filter.compile(),
            Some(Expr::And(vec![
                Filter::eq("category", "mammal"),
                Filter::eq("behavior.good_with_cats", false),
            ])),
        );
    }

    #[test]
    fn age_bounds_become_birth_date_bounds() {
        let filter = AnimalFilter { min_age: Some(2.0), ..Default::default() };

        match filter.compile() {
            Some(Expr::Field { field, .. }) => assert_eq!(field, "date_of_birth"),
            other => panic!("unexpected predicate {other:?}"),
        }
    }
}
