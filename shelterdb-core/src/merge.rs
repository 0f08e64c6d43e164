//! One time-ordered, paginated feed over several differently shaped collections.
//!
//! The merge runs in two phases so that a page spanning a source boundary is cut correctly
//! without reading any source in full:
//!
//! 1. Per source, in parallel: count the translated predicate, and fetch a date-only projection
//!    sorted by date and capped at `offset + limit` rows, the most that source can contribute
//!    to the requested window.
//! 2. K-way merge the projections on date (ties broken by source order, then id), cut the
//!    window, and rehydrate just those rows from their source collections.
//!
//! Callers write the shared predicate in the merged vocabulary (`date` plus whatever common
//! fields the sources are mapped to); each [`MergeSource`] renames fields to its own schema.
//! Any source error fails the whole call.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Uuid};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    backend::StoreBackend,
    error::StoreResult,
    page::{PageRequest, PageResult, SortOrder},
    query::{Expr, Filter, ID_FIELD, Query, SortDirection},
    store::DocumentStore,
};

/// Name of the ordering field in the merged vocabulary.
pub const MERGED_DATE_FIELD: &str = "date";

/// One collection taking part in a merged feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSource {
    pub collection: String,
    /// Tag attached to every record from this source.
    pub kind: String,
    /// The source's own name for the merged `date` field.
    pub date_field: String,
    /// Merged field name to source field name.
    fields: HashMap<String, String>,
}

impl MergeSource {
    pub fn new(collection: impl Into<String>, kind: impl Into<String>, date_field: impl Into<String>) -> Self {
        let date_field = date_field.into();

        Self {
            collection: collection.into(),
            kind: kind.into(),
            fields: HashMap::from([(MERGED_DATE_FIELD.to_string(), date_field.clone())]),
            date_field,
        }
    }

    /// Maps a merged-vocabulary field onto this source's field of another name.
    pub fn map_field(mut self, merged: impl Into<String>, source: impl Into<String>) -> Self {
        self.fields.insert(merged.into(), source.into());
        self
    }

    /// Rewrites a merged-vocabulary predicate into this source's field names.
    pub fn translate(&self, filter: &Expr) -> Expr {
        filter.rename_fields(&self.fields)
    }
}

/// A record in a merged feed, tagged with the kind of its source.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub kind: String,
    pub date: bson::DateTime,
    pub id: Uuid,
    /// The full underlying record.
    pub record: Bson,
}

/// A phase-one row: just enough to order and locate a record.
#[derive(Debug, Clone, Copy)]
struct Head {
    source: usize,
    id: Uuid,
    date: bson::DateTime,
}

fn compare_heads(left: &Head, right: &Head, order: SortOrder) -> Ordering {
    let by_date = match order {
        SortOrder::Asc => left.date.cmp(&right.date),
        SortOrder::Desc => right.date.cmp(&left.date),
    };

    by_date
        .then_with(|| left.source.cmp(&right.source))
        .then_with(|| left.id.bytes().cmp(&right.id.bytes()))
}

/// Reads a possibly dotted path out of a document.
fn lookup<'d>(document: &'d Bson, path: &str) -> Option<&'d Bson> {
    path.split('.')
        .try_fold(document, |current, key| current.as_document()?.get(key))
}

/// Merges already sorted per-source runs and returns the first `take` rows after `skip`.
fn merge_window(runs: Vec<Vec<Head>>, order: SortOrder, skip: usize, take: usize) -> Vec<Head> {
    let mut cursors = vec![0usize; runs.len()];
    let mut window = Vec::with_capacity(take);
    let mut position = 0usize;

    while window.len() < take {
        let next = runs
            .iter()
            .enumerate()
            .filter_map(|(source, run)| run.get(cursors[source]))
            .min_by(|left, right| compare_heads(left, right, order))
            .copied();

        let Some(head) = next else {
            break;
        };

        cursors[head.source] += 1;
        if position >= skip {
            window.push(head);
        }
        position += 1;
    }

    window
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Lists the records of several collections as one feed ordered by their date fields.
    ///
    /// `filter` is written in the merged vocabulary and translated per source. `total` is the
    /// sum of the per-source counts.
    pub async fn merge_list(
        &self,
        sources: &[MergeSource],
        filter: Option<Expr>,
        page: &PageRequest,
    ) -> StoreResult<PageResult<MergedRecord>> {
        self.options()
            .bounded(self.merge_list_unbounded(sources, filter, page))
            .await
    }

    async fn merge_list_unbounded(
        &self,
        sources: &[MergeSource],
        filter: Option<Expr>,
        page: &PageRequest,
    ) -> StoreResult<PageResult<MergedRecord>> {
        let limit = self.options().paging.effective_limit(page.limit);
        let window = page.offset.saturating_add(limit);
        let direction = SortDirection::from(page.sort_order);

        debug!(
            sources = sources.len(),
            limit,
            offset = page.offset,
            sort_order = ?page.sort_order,
            "merging collections"
        );

        let phase_one = try_join_all(sources.iter().enumerate().map(|(index, source)| {
            let translated = filter.as_ref().map(|f| source.translate(f));
            let collection = self.collection(&source.collection);

            async move {
                let count = collection.count(translated.clone()).await?;

                let heads = collection
                    .query(
                        Query::builder()
                            .maybe_filter(translated)
                            .sort(source.date_field.as_str(), direction)
                            .sort(ID_FIELD, SortDirection::Asc)
                            .projection([source.date_field.as_str()])
                            .limit(window)
                            .build(),
                    )
                    .await?
                    .into_iter()
                    .map(|(id, projected)| Head {
                        source: index,
                        id,
                        date: match lookup(&projected, &source.date_field) {
                            Some(Bson::DateTime(date)) => *date,
                            _ => bson::DateTime::MIN,
                        },
                    })
                    .collect::<Vec<_>>();

                StoreResult::Ok((count, heads))
            }
        }))
        .await?;

        let total = phase_one.iter().map(|(count, _)| *count).sum::<u64>();
        let runs = phase_one.into_iter().map(|(_, heads)| heads).collect::<Vec<_>>();
        let selected = merge_window(runs, page.sort_order, page.offset, limit);

        let mut wanted: HashMap<usize, Vec<Uuid>> = HashMap::new();
        for head in &selected {
            wanted.entry(head.source).or_default().push(head.id);
        }

        let mut hydrated = try_join_all(wanted.into_iter().map(|(index, ids)| {
            let collection = self.collection(&sources[index].collection);

            async move {
                let rows = collection
                    .query(Query::builder().filter(Filter::any_of(ID_FIELD, ids)).build())
                    .await?;

                StoreResult::Ok(rows.into_iter().map(move |(id, record)| ((index, id), record)))
            }
        }))
        .await?
        .into_iter()
        .flatten()
        .collect::<HashMap<_, _>>();

        let mut data = Vec::with_capacity(selected.len());

        for head in selected {
            match hydrated.remove(&(head.source, head.id)) {
                Some(record) => data.push(MergedRecord {
                    kind: sources[head.source].kind.clone(),
                    date: head.date,
                    id: head.id,
                    record,
                }),
                None => warn!(
                    collection = %sources[head.source].collection,
                    id = %head.id,
                    "merged record vanished before rehydration"
                ),
            }
        }

        Ok(PageResult::builder(data)
            .with_total(total)
            .with_limit(limit)
            .with_offset(page.offset)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(source: usize, id: u8, millis: i64) -> Head {
        Head {
            source,
            id: Uuid::from_bytes([id; 16]),
            date: bson::DateTime::from_millis(millis),
        }
    }

    fn dates(window: &[Head]) -> Vec<i64> {
        window.iter().map(|h| h.date.timestamp_millis()).collect()
    }

    #[test]
    fn merge_interleaves_runs_by_date() {
        let runs = vec![vec![head(0, 1, 10), head(0, 2, 30)], vec![head(1, 3, 20), head(1, 4, 40)]];

        assert_eq!(dates(&merge_window(runs.clone(), SortOrder::Asc, 0, 2)), vec![10, 20]);
        assert_eq!(dates(&merge_window(runs, SortOrder::Asc, 2, 2)), vec![30, 40]);
    }

    #[test]
    fn equal_dates_break_ties_by_source_then_id() {
        let runs = vec![vec![head(0, 9, 10)], vec![head(1, 1, 10), head(1, 2, 10)]];
        let window = merge_window(runs, SortOrder::Desc, 0, 3);

        assert_eq!(window.iter().map(|h| (h.source, h.id.bytes()[0])).collect::<Vec<_>>(), vec![(0, 9), (1, 1), (1, 2)]);
    }

    #[test]
    fn window_past_the_end_is_empty() {
        let runs = vec![vec![head(0, 1, 10)], vec![]];
        assert!(merge_window(runs, SortOrder::Desc, 5, 10).is_empty());
    }

    #[test]
    fn translation_renames_date_and_mapped_fields() {
        let source = MergeSource::new("vaccinations", "vaccination", "date_administered")
            .map_field("subject_id", "animal_id");

        let filter = Filter::gte(MERGED_DATE_FIELD, 5).and(Filter::eq("subject_id", "a"));

        assert_eq!(
            source.translate(&filter),
            Filter::gte("date_administered", 5).and(Filter::eq("animal_id", "a")),
        );
    }
}
