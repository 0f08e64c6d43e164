//! Merged medical history: one date-ordered feed over visits and vaccinations.

mod common;

use common::{at, create_store, create_vaccination, create_visit};
use shelterdb::{
    bson::Uuid,
    entities::veterinary::{self, MedicalHistoryFilter, MedicalRecord, Vaccination, VeterinaryVisit},
    error::StoreError,
    memory::InMemoryStore,
    page::{PageRequest, SortOrder},
    query::Filter,
    store::DocumentStore,
};

/// Visits on Jan 1 and 3, vaccinations on Jan 2 and 4, plus one vaccination of another animal.
async fn seed_history(store: &DocumentStore<InMemoryStore>) -> Uuid {
    let animal_id = Uuid::new();

    store
        .typed_collection::<VeterinaryVisit>()
        .insert(vec![
            create_visit(animal_id, at(2026, 1, 1, 9), "Dr. Nowak"),
            create_visit(animal_id, at(2026, 1, 3, 9), "Dr. Wiśniewska"),
        ])
        .await
        .unwrap();

    store
        .typed_collection::<Vaccination>()
        .insert(vec![
            create_vaccination(animal_id, at(2026, 1, 2, 9), "Dr. Nowak"),
            create_vaccination(animal_id, at(2026, 1, 4, 9), "Dr. Nowak"),
            create_vaccination(Uuid::new(), at(2026, 1, 5, 9), "Dr. Nowak"),
        ])
        .await
        .unwrap();

    animal_id
}

fn kinds_and_days(records: &[MedicalRecord]) -> Vec<(&'static str, i64)> {
    records
        .iter()
        .map(|record| {
            let kind = match record {
                MedicalRecord::Visit(_) => "visit",
                MedicalRecord::Vaccination(_) => "vaccination",
            };
            (kind, record.date().timestamp_millis() / 86_400_000)
        })
        .collect()
}

// ============================================================================
// Ordering and paging
// ============================================================================

#[tokio::test]
async fn test_history_pages_interleave_sources_by_date() {
    let store = create_store();
    let animal_id = seed_history(&store).await;
    let filter = MedicalHistoryFilter { animal_id: Some(animal_id), ..Default::default() };
    let day = |d: u32| at(2026, 1, d, 9).timestamp_millis() / 86_400_000;

    let first = veterinary::medical_history(
        &store,
        &filter,
        &PageRequest::builder().limit(2).sort_order(SortOrder::Asc).build(),
    )
    .await
    .unwrap();

    assert_eq!(first.total, 4);
    assert_eq!(kinds_and_days(&first.data), vec![("visit", day(1)), ("vaccination", day(2))]);

    let second = veterinary::medical_history(
        &store,
        &filter,
        &PageRequest::builder().limit(2).offset(2).sort_order(SortOrder::Asc).build(),
    )
    .await
    .unwrap();

    assert_eq!(second.total, 4);
    assert_eq!(kinds_and_days(&second.data), vec![("visit", day(3)), ("vaccination", day(4))]);
}

#[tokio::test]
async fn test_history_defaults_to_newest_first() {
    let store = create_store();
    let animal_id = seed_history(&store).await;
    let filter = MedicalHistoryFilter { animal_id: Some(animal_id), ..Default::default() };

    let page = veterinary::medical_history(&store, &filter, &PageRequest::builder().limit(10).build())
        .await
        .unwrap();

    let dates = page.data.iter().map(MedicalRecord::date).collect::<Vec<_>>();
    let mut sorted = dates.clone();
    sorted.sort_by(|a, b| b.cmp(a));

    assert_eq!(page.data.len(), 4);
    assert_eq!(dates, sorted);
}

// ============================================================================
// Filtering
// ============================================================================

#[tokio::test]
async fn test_shared_filter_applies_to_every_source() {
    let store = create_store();
    let animal_id = seed_history(&store).await;

    let filter = MedicalHistoryFilter {
        animal_id: Some(animal_id),
        veterinarian: Some("Dr. Nowak".into()),
        ..Default::default()
    };
    let page = veterinary::medical_history(&store, &filter, &PageRequest::builder().limit(10).build())
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert!(page.data.iter().all(|record| match record {
        MedicalRecord::Visit(visit) => visit.veterinarian_name == "Dr. Nowak",
        MedicalRecord::Vaccination(vaccination) => vaccination.administered_by == "Dr. Nowak",
    }));
}

#[tokio::test]
async fn test_date_range_uses_each_source_date_field() {
    let store = create_store();
    seed_history(&store).await;

    let filter = MedicalHistoryFilter {
        from: Some(at(2026, 1, 2, 0)),
        to: Some(at(2026, 1, 4, 0)),
        ..Default::default()
    };
    let page = veterinary::medical_history(
        &store,
        &filter,
        &PageRequest::builder().limit(10).sort_order(SortOrder::Asc).build(),
    )
    .await
    .unwrap();

    assert_eq!(page.total, 2);
    assert!(matches!(page.data[0], MedicalRecord::Vaccination(_)));
    assert!(matches!(page.data[1], MedicalRecord::Visit(_)));
}

#[tokio::test]
async fn test_offset_past_merged_total_is_empty() {
    let store = create_store();
    seed_history(&store).await;

    let page = veterinary::medical_history(
        &store,
        &MedicalHistoryFilter::default(),
        &PageRequest::builder().limit(10).offset(50).build(),
    )
    .await
    .unwrap();

    assert!(page.data.is_empty());
    assert_eq!(page.total, 5);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failing_source_fails_the_whole_feed() {
    let store = create_store();
    seed_history(&store).await;

    // Visits all match on the first branch; vaccinations reach a contains with a numeric needle.
    let filter = Filter::or([Filter::exists("visit_type"), Filter::contains("veterinarian", 5)]);
    let result = store
        .merge_list(&veterinary::history_sources(), Some(filter), &PageRequest::builder().limit(10).build())
        .await;

    assert!(matches!(result, Err(StoreError::InvalidDocument(_))));

    let page = veterinary::medical_history(
        &store,
        &MedicalHistoryFilter::default(),
        &PageRequest::builder().limit(10).build(),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 5);
}
