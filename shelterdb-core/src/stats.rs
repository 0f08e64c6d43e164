//! Statistics over a collection: grouped counts, sums, named counts, time windows and rates.
//!
//! One [`AggregationSpec`] describes everything an entity's statistics endpoint reports. Each
//! group, sum, count and window is its own backend call, so a spec pays only for what it
//! asks for, and two windows in one result may observe slightly different instants under
//! concurrent writes. Rates are derived last from scalars already produced; a zero denominator
//! yields a rate of 0.

use std::collections::HashMap;

use bson::Bson;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    backend::StoreBackend,
    collection::{Collection, TypedCollection},
    document::{Document, bson_datetime},
    error::{StoreError, StoreResult},
    query::{Expr, Filter},
};

/// Group key reported for documents whose grouping field is missing or null.
pub const UNSPECIFIED_KEY: &str = "unspecified";

/// Name of the total that every aggregation reports.
pub const COUNT_TOTAL: &str = "count";

/// A date range evaluated against "now" when the aggregation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Start of the current UTC day until now.
    Today,
    /// Most recent week boundary until now.
    ThisWeek,
    /// First of the current month until now.
    ThisMonth,
    /// First of the current year until now.
    ThisYear,
    /// An explicit half-open range `[from, to)`.
    Range { from: DateTime<Utc>, to: DateTime<Utc> },
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

impl TimeWindow {
    /// Builds the predicate selecting this window on `field`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidRange`] for an explicit range that ends before it starts.
    pub fn predicate(&self, field: &str, now: DateTime<Utc>, week_start: Weekday) -> StoreResult<Expr> {
        let today = now.date_naive();

        let start = match *self {
            TimeWindow::Today => midnight(today),
            TimeWindow::ThisWeek => {
                let days_back = (7 + today.weekday().num_days_from_monday()
                    - week_start.num_days_from_monday())
                    % 7;
                midnight(today - chrono::Duration::days(days_back as i64))
            }
            TimeWindow::ThisMonth => midnight(today.with_day(1).unwrap_or(today)),
            TimeWindow::ThisYear => midnight(NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today)),
            TimeWindow::Range { from, to } => {
                validate_range(from, to)?;
                return Ok(Filter::gte(field, bson_datetime(from)).and(Filter::lt(field, bson_datetime(to))));
            }
        };

        Ok(Filter::gte(field, bson_datetime(start)).and(Filter::lte(field, bson_datetime(now))))
    }
}

/// Rejects ranges whose end lies before their start.
pub fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<()> {
    if end < start {
        return Err(StoreError::InvalidRange { start: start.to_rfc3339(), end: end.to_rfc3339() });
    }
    Ok(())
}

/// A numeric field to total, optionally with its average and extremes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumSpec {
    pub field: String,
    pub average: bool,
    pub extremes: bool,
}

impl SumSpec {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into(), average: false, extremes: false }
    }

    pub fn with_average(mut self) -> Self {
        self.average = true;
        self
    }

    pub fn with_extremes(mut self) -> Self {
        self.extremes = true;
        self
    }
}

/// A named count under an extra filter, e.g. `pending_follow_ups`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountSpec {
    pub name: String,
    pub filter: Expr,
}

/// A named time window yielding a count and, optionally, the sum of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub name: String,
    pub window: TimeWindow,
    pub date_field: String,
    pub sum: Option<String>,
}

impl WindowSpec {
    pub fn new(name: impl Into<String>, window: TimeWindow, date_field: impl Into<String>) -> Self {
        Self { name: name.into(), window, date_field: date_field.into(), sum: None }
    }

    /// Also sums `field` over the window, reported as `<name>_<field>`.
    pub fn with_sum(mut self, field: impl Into<String>) -> Self {
        self.sum = Some(field.into());
        self
    }
}

/// A scalar already produced by the aggregation, used as a rate operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarRef {
    Total(String),
    Window(String),
    Group { field: String, key: String },
}

impl ScalarRef {
    pub fn total(name: impl Into<String>) -> Self {
        ScalarRef::Total(name.into())
    }

    pub fn window(name: impl Into<String>) -> Self {
        ScalarRef::Window(name.into())
    }

    pub fn group(field: impl Into<String>, key: impl Into<String>) -> Self {
        ScalarRef::Group { field: field.into(), key: key.into() }
    }
}

/// `numerator / denominator * scale`, or 0 when the denominator is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSpec {
    pub name: String,
    pub numerator: ScalarRef,
    pub denominator: ScalarRef,
    pub scale: f64,
}

impl RateSpec {
    pub fn ratio(name: impl Into<String>, numerator: ScalarRef, denominator: ScalarRef) -> Self {
        Self { name: name.into(), numerator, denominator, scale: 1.0 }
    }

    pub fn percent(name: impl Into<String>, numerator: ScalarRef, denominator: ScalarRef) -> Self {
        Self { scale: 100.0, ..Self::ratio(name, numerator, denominator) }
    }
}

/// Everything one statistics call computes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationSpec {
    pub group_by: Vec<String>,
    pub sums: Vec<SumSpec>,
    pub counts: Vec<CountSpec>,
    pub windows: Vec<WindowSpec>,
    pub rates: Vec<RateSpec>,
}

impl AggregationSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.group_by.contains(&field) {
            self.group_by.push(field);
        }
        self
    }

    pub fn sum(mut self, sum: SumSpec) -> Self {
        self.sums.push(sum);
        self
    }

    pub fn count(mut self, name: impl Into<String>, filter: Expr) -> Self {
        self.counts.push(CountSpec { name: name.into(), filter });
        self
    }

    pub fn window(mut self, window: WindowSpec) -> Self {
        self.windows.push(window);
        self
    }

    pub fn rate(mut self, rate: RateSpec) -> Self {
        self.rates.push(rate);
        self
    }
}

/// Result of one aggregation.
///
/// `totals` always holds [`COUNT_TOTAL`]. Sums appear as `<field>_total`, `<field>_average`,
/// `<field>_min` and `<field>_max`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StatResult {
    pub by_group: HashMap<String, HashMap<String, u64>>,
    pub totals: HashMap<String, f64>,
    pub windows: HashMap<String, f64>,
    pub rates: HashMap<String, f64>,
}

impl StatResult {
    pub fn total(&self, name: &str) -> f64 {
        self.totals.get(name).copied().unwrap_or_default()
    }

    pub fn window(&self, name: &str) -> f64 {
        self.windows.get(name).copied().unwrap_or_default()
    }

    pub fn rate(&self, name: &str) -> f64 {
        self.rates.get(name).copied().unwrap_or_default()
    }

    pub fn group(&self, field: &str, key: &str) -> u64 {
        self.by_group
            .get(field)
            .and_then(|groups| groups.get(key))
            .copied()
            .unwrap_or_default()
    }

    fn resolve(&self, scalar: &ScalarRef) -> f64 {
        let value = match scalar {
            ScalarRef::Total(name) => self.totals.get(name).copied(),
            ScalarRef::Window(name) => self.windows.get(name).copied(),
            ScalarRef::Group { field, key } => match self.by_group.get(field) {
                Some(groups) => Some(groups.get(key).copied().unwrap_or_default() as f64),
                None => None,
            },
        };

        value.unwrap_or_else(|| {
            warn!(?scalar, "rate operand was not produced by this aggregation, using 0");
            0.0
        })
    }
}

/// Renders a grouping value as a map key.
fn group_key(value: &Bson) -> String {
    match value {
        Bson::Null | Bson::Undefined => UNSPECIFIED_KEY.to_string(),
        Bson::String(s) if s.trim().is_empty() => UNSPECIFIED_KEY.to_string(),
        Bson::String(s) => s.clone(),
        Bson::Boolean(b) => b.to_string(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Inbound statistics request as bound by the HTTP layer.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StatsRequest {
    pub range_start: Option<DateTime<Utc>>,
    pub range_end: Option<DateTime<Utc>>,
    pub group_by: Vec<String>,
}

impl StatsRequest {
    /// Restricts the aggregation to `[range_start, range_end)` on `date_field`.
    ///
    /// Either end may be absent. Returns `None` when neither is given.
    pub fn range_predicate(&self, date_field: &str) -> StoreResult<Option<Expr>> {
        if let (Some(start), Some(end)) = (self.range_start, self.range_end) {
            validate_range(start, end)?;
        }

        Ok(Filter::all(
            self.range_start
                .map(|start| Filter::gte(date_field, bson_datetime(start)))
                .into_iter()
                .chain(self.range_end.map(|end| Filter::lt(date_field, bson_datetime(end)))),
        ))
    }

    /// Adds the requested groupings that appear in `groupable` to `spec`.
    pub fn extend_groups(&self, mut spec: AggregationSpec, groupable: &[&str]) -> AggregationSpec {
        for field in &self.group_by {
            if groupable.contains(&field.as_str()) {
                spec = spec.group_by(field.as_str());
            } else {
                warn!(field = %field, "ignoring request to group by an ungroupable field");
            }
        }
        spec
    }
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    /// Runs `spec` over the documents matching `predicate`, with windows relative to now.
    pub async fn aggregate(&self, predicate: Option<Expr>, spec: &AggregationSpec) -> StoreResult<StatResult> {
        self.aggregate_at(predicate, spec, Utc::now()).await
    }

    /// Runs `spec` with relative windows evaluated against `now`.
    pub async fn aggregate_at(
        &self,
        predicate: Option<Expr>,
        spec: &AggregationSpec,
        now: DateTime<Utc>,
    ) -> StoreResult<StatResult> {
        let options = self.options();

        // Window predicates are built first so a bad explicit range fails before any store call.
        let windows = spec
            .windows
            .iter()
            .map(|window| {
                window
                    .window
                    .predicate(&window.date_field, now, options.week_start)
                    .map(|expr| (window, expr))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        options
            .bounded(async {
                debug!(
                    collection = self.name(),
                    groups = spec.group_by.len(),
                    sums = spec.sums.len(),
                    counts = spec.counts.len(),
                    windows = spec.windows.len(),
                    rates = spec.rates.len(),
                    "aggregating"
                );

                let mut result = StatResult::default();

                let count = self.count(predicate.clone()).await?;
                result.totals.insert(COUNT_TOTAL.to_string(), count as f64);

                for field in &spec.group_by {
                    let mut groups: HashMap<String, u64> = HashMap::new();
                    for (value, count) in self.group_count(predicate.clone(), field).await? {
                        *groups.entry(group_key(&value)).or_default() += count;
                    }
                    result.by_group.insert(field.clone(), groups);
                }

                for sum in &spec.sums {
                    let summary = self.summarize(predicate.clone(), &sum.field).await?;

                    result.totals.insert(format!("{}_total", sum.field), summary.sum);
                    if sum.average {
                        result.totals.insert(format!("{}_average", sum.field), summary.average());
                    }
                    if sum.extremes {
                        result.totals.insert(format!("{}_min", sum.field), summary.min.unwrap_or_default());
                        result.totals.insert(format!("{}_max", sum.field), summary.max.unwrap_or_default());
                    }
                }

                for named in &spec.counts {
                    let filter = Filter::both(predicate.clone(), Some(named.filter.clone()));
                    let count = self.count(filter).await?;
                    result.totals.insert(named.name.clone(), count as f64);
                }

                for (window, window_filter) in windows {
                    let filter = Filter::both(predicate.clone(), Some(window_filter));

                    let count = self.count(filter.clone()).await?;
                    result.windows.insert(window.name.clone(), count as f64);

                    if let Some(field) = &window.sum {
                        let summary = self.summarize(filter, field).await?;
                        result.windows.insert(format!("{}_{}", window.name, field), summary.sum);
                    }
                }

                for rate in &spec.rates {
                    let numerator = result.resolve(&rate.numerator);
                    let denominator = result.resolve(&rate.denominator);

                    let value = if denominator == 0.0 {
                        0.0
                    } else {
                        numerator / denominator * rate.scale
                    };
                    result.rates.insert(rate.name.clone(), value);
                }

                Ok(result)
            })
            .await
    }
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub async fn aggregate(&self, predicate: Option<Expr>, spec: &AggregationSpec) -> StoreResult<StatResult> {
        self.untyped().aggregate(predicate, spec).await
    }

    pub async fn aggregate_at(
        &self,
        predicate: Option<Expr>,
        spec: &AggregationSpec,
        now: DateTime<Utc>,
    ) -> StoreResult<StatResult> {
        self.untyped().aggregate_at(predicate, spec, now).await
    }
}

/// The statistics an entity reports when no explicit spec is given.
pub trait StatsPreset: Document {
    /// Field the request's `[range_start, range_end)` applies to.
    const DATE_FIELD: &'static str;

    /// Fields a request may add as extra groupings.
    const GROUPABLE_FIELDS: &'static [&'static str];

    fn aggregation() -> AggregationSpec;
}

impl<'a, B: StoreBackend, D: StatsPreset> TypedCollection<'a, B, D> {
    /// Runs the entity's preset aggregation, narrowed and extended by `request`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidRange`] when `range_end` precedes `range_start`.
    pub async fn statistics(&self, request: &StatsRequest) -> StoreResult<StatResult> {
        self.statistics_at(request, Utc::now()).await
    }

    pub async fn statistics_at(&self, request: &StatsRequest, now: DateTime<Utc>) -> StoreResult<StatResult> {
        let predicate = request.range_predicate(D::DATE_FIELD)?;
        let spec = request.extend_groups(D::aggregation(), D::GROUPABLE_FIELDS);

        self.aggregate_at(predicate, &spec, now).await
    }
}
