//! Listing tests: paging, filter omission and free-text search over the in-memory backend.

mod common;

use std::collections::HashSet;

use common::{create_animal, create_store};
use shelterdb::{
    entities::animal::{Animal, AnimalFilter},
    filter::{FilterFields, ListRequest},
    memory::InMemoryStore,
    page::{PageRequest, SortOrder},
    store::DocumentStore,
};

/// 25 animals named `Rex 0..=24`; even indices are dogs, every fifth gets along with cats.
async fn seed_animals(store: &DocumentStore<InMemoryStore>) -> Vec<Animal> {
    let animals = (0..25)
        .map(|i| {
            let mut animal = create_animal(&format!("Rex {i}"), if i % 2 == 0 { "dog" } else { "cat" });
            animal.behavior.good_with_cats = i % 5 == 0;
            animal
        })
        .collect::<Vec<_>>();

    store.typed_collection::<Animal>().insert(animals.clone()).await.unwrap();
    animals
}

// ============================================================================
// Paging
// ============================================================================

#[tokio::test]
async fn test_pages_partition_the_matching_set() {
    let store = create_store();
    let animals = seed_animals(&store).await;
    let collection = store.typed_collection::<Animal>();

    let mut seen = HashSet::new();
    let mut sizes = Vec::new();

    for offset in [0, 10, 20] {
        let page = collection
            .list(&AnimalFilter::default(), &PageRequest::builder().limit(10).offset(offset).build())
            .await
            .unwrap();

        assert_eq!(page.total, 25);
        assert_eq!(page.limit, 10);
        assert_eq!(page.offset, offset);
        sizes.push(page.data.len());

        for animal in page.data {
            assert!(seen.insert(animal.id), "animal {} appeared on two pages", animal.id);
        }
    }

    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(seen, animals.iter().map(|a| a.id).collect::<HashSet<_>>());
}

#[tokio::test]
async fn test_offset_past_end_returns_empty_page_with_total() {
    let store = create_store();
    seed_animals(&store).await;

    let page = store
        .typed_collection::<Animal>()
        .list(&AnimalFilter::default(), &PageRequest::builder().limit(10).offset(30).build())
        .await
        .unwrap();

    assert!(page.data.is_empty());
    assert_eq!(page.total, 25);
    assert!(!page.has_more());
}

#[tokio::test]
async fn test_oversized_limit_is_capped() {
    let store = create_store();
    seed_animals(&store).await;

    let page = store
        .typed_collection::<Animal>()
        .list(&AnimalFilter::default(), &PageRequest::builder().limit(1_000).build())
        .await
        .unwrap();

    assert_eq!(page.limit, 100);
    assert_eq!(page.data.len(), 25);
}

#[tokio::test]
async fn test_sort_by_allowed_field_ascending() {
    let store = create_store();
    seed_animals(&store).await;

    let page = store
        .typed_collection::<Animal>()
        .list(
            &AnimalFilter::default(),
            &PageRequest::builder()
                .limit(3)
                .sort_by("name.en")
                .sort_order(SortOrder::Asc)
                .build(),
        )
        .await
        .unwrap();

    let names = page.data.iter().map(|a| a.name.en.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Rex 0", "Rex 1", "Rex 10"]);
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_blank_filter_values_are_omitted() {
    let store = create_store();
    seed_animals(&store).await;
    let collection = store.typed_collection::<Animal>();
    let page = PageRequest::builder().limit(100).build();

    let everything = collection.list(&AnimalFilter::default(), &page).await.unwrap();
    assert_eq!(everything.total, 25);

    let blank_species = AnimalFilter { species: Some(String::new()), ..Default::default() };
    assert_eq!(collection.list(&blank_species, &page).await.unwrap().total, 25);

    let dogs = AnimalFilter { species: Some("dog".into()), ..Default::default() };
    assert_eq!(collection.list(&dogs, &page).await.unwrap().total, 13);
}

#[tokio::test]
async fn test_false_flag_still_constrains() {
    let store = create_store();
    seed_animals(&store).await;
    let collection = store.typed_collection::<Animal>();
    let page = PageRequest::builder().limit(100).build();

    let not_with_cats = AnimalFilter { good_with_cats: Some(false), ..Default::default() };
    let with_cats = AnimalFilter { good_with_cats: Some(true), ..Default::default() };

    assert_eq!(collection.list(&not_with_cats, &page).await.unwrap().total, 20);
    assert_eq!(collection.list(&with_cats, &page).await.unwrap().total, 5);
}

#[tokio::test]
async fn test_search_matches_any_search_field_ignoring_case() {
    let store = create_store();
    seed_animals(&store).await;

    let filter = AnimalFilter { search: Some("REX 1".into()), ..Default::default() };
    let page = store
        .typed_collection::<Animal>()
        .list(&filter, &PageRequest::builder().limit(100).build())
        .await
        .unwrap();

    // "Rex 1" and "Rex 10" through "Rex 19"
    assert_eq!(page.total, 11);
}

#[tokio::test]
async fn test_list_request_binds_fields_and_drops_unknown_values() {
    let store = create_store();
    seed_animals(&store).await;

    let request = ListRequest {
        filter_fields: FilterFields::new().with("species", "cat").with("status", "sleeping"),
        sort_order: Some("sideways".into()),
        ..Default::default()
    };
    let (filter, page) = request.into_parts::<AnimalFilter>();

    assert_eq!(filter.status, None);
    assert_eq!(page.sort_order, SortOrder::Desc);

    let result = store.typed_collection::<Animal>().list(&filter, &page).await.unwrap();
    assert_eq!(result.total, 12);
    assert_eq!(result.limit, 20);
}
