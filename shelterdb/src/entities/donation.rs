use bson::Uuid;
use serde::{Deserialize, Serialize};

use shelterdb_core::{
    document::Document,
    filter::{FilterFields, FilterSpec, Predicates},
    page::Listing,
    query::Filter,
    stats::{AggregationSpec, StatsPreset, SumSpec, TimeWindow, WindowSpec},
    store::{IndexSpec, Indexed},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DonationType {
    Monetary,
    InKind,
    Recurring,
    Memorial,
    Honor,
    Matching,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
    CreditCard,
    DebitCard,
    BankTransfer,
    Paypal,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Payment {
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    /// Copied from the donor when the donation is recorded.
    pub donor_name: String,
    pub donor_email: Option<String>,
    pub anonymous: bool,
    #[serde(rename = "type")]
    pub kind: DonationType,
    pub status: DonationStatus,
    pub amount: f64,
    pub currency: String,
    pub donation_date: bson::DateTime,
    pub campaign_id: Option<Uuid>,
    pub campaign_name: Option<String>,
    pub designation: Option<String>,
    pub payment: Payment,
    pub is_recurring: bool,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl Donation {
    /// A completed one-off monetary donation in PLN.
    pub fn new(donor_id: Uuid, donor_name: impl Into<String>, amount: f64, method: PaymentMethod) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: Uuid::new(),
            donor_id,
            donor_name: donor_name.into(),
            donor_email: None,
            anonymous: false,
            kind: DonationType::Monetary,
            status: DonationStatus::Completed,
            amount,
            currency: "PLN".to_string(),
            donation_date: now,
            campaign_id: None,
            campaign_name: None,
            designation: None,
            payment: Payment { method, transaction_id: None },
            is_recurring: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Donation {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "donations"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonationFilter {
    pub donor_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub kind: Option<DonationType>,
    pub status: Option<DonationStatus>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub from: Option<bson::DateTime>,
    pub to: Option<bson::DateTime>,
    pub payment_method: Option<PaymentMethod>,
    pub designation: Option<String>,
    pub is_recurring: Option<bool>,
    pub anonymous: Option<bool>,
    pub search: Option<String>,
}

impl FilterSpec for DonationFilter {
    const SEARCH_FIELDS: &'static [&'static str] = &["donor_name", "donor_email", "campaign_name"];

    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("donor_id", self.donor_id.as_ref())
            .eq("campaign_id", self.campaign_id.as_ref())
            .eq("type", self.kind.as_ref())
            .eq("status", self.status.as_ref())
            .range("amount", self.min_amount.as_ref(), self.max_amount.as_ref())
            .date_range("donation_date", self.from, self.to)
            .eq("payment.method", self.payment_method.as_ref())
            .eq("designation", self.designation.as_ref())
            .flag("is_recurring", self.is_recurring)
            .flag("anonymous", self.anonymous)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            donor_id: fields.parse("donor_id"),
            campaign_id: fields.parse("campaign_id"),
            kind: fields.parse("type"),
            status: fields.parse("status"),
            min_amount: fields.number("min_amount"),
            max_amount: fields.number("max_amount"),
            from: fields.datetime("from"),
            to: fields.datetime("to"),
            payment_method: fields.parse("payment_method"),
            designation: fields.text("designation"),
            is_recurring: fields.flag("is_recurring"),
            anonymous: fields.flag("anonymous"),
            search: fields.text("search"),
        }
    }
}

impl Listing for Donation {
    type Filter = DonationFilter;

    const DEFAULT_SORT_FIELD: &'static str = "donation_date";
    const SORTABLE_FIELDS: &'static [&'static str] = &["donation_date", "amount", "created_at", "donor_name"];
}

impl StatsPreset for Donation {
    const DATE_FIELD: &'static str = "donation_date";
    const GROUPABLE_FIELDS: &'static [&'static str] =
        &["type", "status", "payment.method", "currency", "designation", "is_recurring"];

    fn aggregation() -> AggregationSpec {
        let window = |name: &str, window: TimeWindow| {
            WindowSpec::new(name, window, "donation_date").with_sum("amount")
        };

        AggregationSpec::new()
            .group_by("type")
            .group_by("status")
            .group_by("payment.method")
            .sum(SumSpec::new("amount").with_average().with_extremes())
            .count("recurring_donations", Filter::eq("is_recurring", true))
            .window(window("donations_today", TimeWindow::Today))
            .window(window("donations_this_week", TimeWindow::ThisWeek))
            .window(window("donations_this_month", TimeWindow::ThisMonth))
            .window(window("donations_this_year", TimeWindow::ThisYear))
    }
}

impl Indexed for Donation {
    const INDEXES: &'static [IndexSpec] = &[
        IndexSpec::new("donor_id"),
        IndexSpec::new("campaign_id"),
        IndexSpec::new("donation_date"),
        IndexSpec::new("status"),
    ];
}

#[cfg(test)]
mod tests {
    use shelterdb_core::query::Expr;

    use super::*;

    #[test]
    fn amount_range_and_nested_method_compile() {
        let filter = DonationFilter {
            min_amount: Some(50.0),
            payment_method: Some(PaymentMethod::BankTransfer),
            ..Default::default()
        };

        assert_eq!(
            filter.compile(),
            Some(Expr::And(vec![
                Filter::gte("amount", 50.0),
                Filter::eq("payment.method", "bank_transfer"),
            ])),
        );
    }

    #[test]
    fn zero_amount_bound_is_unspecified() {
        let filter = DonationFilter { min_amount: Some(0.0), ..Default::default() };
        assert_eq!(filter.compile(), None);
    }
}
