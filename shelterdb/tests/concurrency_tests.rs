//! Shared-write tests: version-checked settings updates and atomic running totals.

mod common;

use futures::future::join_all;

use common::{create_donation, create_store, utc};
use shelterdb::{
    bson::Uuid,
    entities::{
        self,
        donation::DonationStatus,
        donor::{self, Donor},
        inventory::{self, InventoryItem, ItemCategory, ItemUnit},
        settings::{self, EmailSettings, FeatureFlags},
        volunteer::{self, Volunteer},
    },
    error::StoreError,
    memory::InMemoryStore,
    store::DocumentStore,
};

// ============================================================================
// Versioned settings
// ============================================================================

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let store = create_store();

    let first = settings::bootstrap(&store, "Happy Paws", "admin").await.unwrap();
    let second = settings::bootstrap(&store, "Someone Else", "admin").await.unwrap();

    assert_eq!(first.version, 1);
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_get_before_bootstrap_is_not_found() {
    let store = create_store();

    let error = settings::get(&store).await.unwrap_err();
    assert!(error.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_from_one_version_admit_exactly_one() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::new(backend.clone());
    let current = settings::bootstrap(&store, "Happy Paws", "admin").await.unwrap();

    let handles = (0..8)
        .map(|i| {
            let store = DocumentStore::new(backend.clone());
            let current = current.clone();

            tokio::spawn(async move {
                let editor = format!("staff-{i}");
                settings::update(&store, &current, &editor, move |mut settings| {
                    settings.mission = format!("mission {i}");
                    settings
                })
                .await
            })
        })
        .collect::<Vec<_>>();

    let results = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect::<Vec<_>>();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .all(StoreError::is_conflict)
    );

    let winner = results.into_iter().find_map(Result::ok).unwrap();
    let stored = settings::get(&store).await.unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.mission, winner.mission);
    assert_eq!(stored.updated_by, winner.updated_by);
}

#[tokio::test]
async fn test_stale_version_is_rejected_with_both_versions() {
    let store = create_store();
    let v1 = settings::bootstrap(&store, "Happy Paws", "admin").await.unwrap();

    let v2 = settings::update(&store, &v1, "alice", |mut settings| {
        settings.legal_name = "Fundacja Happy Paws".into();
        settings
    })
    .await
    .unwrap();
    assert_eq!(v2.version, 2);

    let error = settings::update(&store, &v1, "bob", |settings| settings).await.unwrap_err();
    let conflict = error.as_conflict().unwrap();
    assert_eq!(conflict.expected_version, 1);
    assert_eq!(conflict.actual_version, 2);

    let error = settings::update_features(&store, 1, &FeatureFlags::default(), "bob")
        .await
        .unwrap_err();
    assert!(error.is_conflict());

    assert_eq!(settings::get(&store).await.unwrap(), v2);
}

#[tokio::test]
async fn test_section_update_keeps_other_fields() {
    let store = create_store();
    let v1 = settings::bootstrap(&store, "Happy Paws", "admin").await.unwrap();
    let v2 = settings::update(&store, &v1, "alice", |mut settings| {
        settings.mission = "Every animal a home".into();
        settings
    })
    .await
    .unwrap();

    let email = EmailSettings {
        smtp_host: "smtp.happypaws.org".into(),
        smtp_port: 587,
        from_email: "hello@happypaws.org".into(),
        enable_tls: true,
        ..Default::default()
    };
    let v3 = settings::update_email_settings(&store, v2.version, &email, "carol").await.unwrap();

    assert_eq!(v3.version, 3);
    assert_eq!(v3.email_settings, email);
    assert_eq!(v3.updated_by, "carol");
    assert_eq!(v3.mission, "Every animal a home");
    assert_eq!(v3.features, v2.features);
    assert_eq!(v3.created_at, v1.created_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_section_updates_each_return_their_own_write() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::new(backend.clone());
    settings::bootstrap(&store, "Happy Paws", "admin").await.unwrap();

    let handles = (0..8)
        .map(|i| {
            let store = DocumentStore::new(backend.clone());

            tokio::spawn(async move {
                let editor = format!("staff-{i}");
                let email = EmailSettings { from_name: editor.clone(), ..Default::default() };

                loop {
                    let current = settings::get(&store).await.unwrap();
                    match settings::update_email_settings(&store, current.version, &email, &editor).await {
                        Err(error) if error.is_conflict() => tokio::task::yield_now().await,
                        written => return written,
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    let mut written = Vec::new();
    for joined in join_all(handles).await {
        written.push(joined.unwrap().unwrap());
    }

    for settings in &written {
        assert_eq!(settings.email_settings.from_name, settings.updated_by);
    }

    let mut versions = written.iter().map(|settings| settings.version).collect::<Vec<_>>();
    versions.sort_unstable();
    assert_eq!(versions, (2..=9).collect::<Vec<_>>());

    let last = written.into_iter().max_by_key(|settings| settings.version).unwrap();
    assert_eq!(settings::get(&store).await.unwrap(), last);
}

#[tokio::test]
async fn test_section_update_on_missing_settings_is_not_found() {
    let store = create_store();

    let error = settings::update_features(&store, 1, &FeatureFlags::default(), "bob")
        .await
        .unwrap_err();
    assert!(error.is_not_found());
}

// ============================================================================
// Running totals
// ============================================================================

#[tokio::test]
async fn test_concurrent_donations_sum_into_donor_totals() {
    let store = create_store();
    let donor = Donor::individual("Jan", "Kowalski");
    store.typed_collection::<Donor>().insert(vec![donor.clone()]).await.unwrap();

    let amounts = [10.0, 25.5, 4.5, 60.0, 100.0];
    let results = join_all(
        amounts
            .iter()
            .map(|amount| donor::record_donation(&store, create_donation(donor.id, *amount, utc(2026, 10, 1, 12)))),
    )
    .await;
    assert!(results.iter().all(Result::is_ok));

    let stored = store.typed_collection::<Donor>().get_one(donor.id).await.unwrap().unwrap();
    assert_eq!(stored.total_donated, 200.0);
    assert_eq!(stored.donation_count, 5);
    assert!(stored.last_donation_date.is_some());
}

#[tokio::test]
async fn test_pending_donation_leaves_donor_totals_alone() {
    let store = create_store();
    let donor = Donor::individual("Anna", "Nowak");
    store.typed_collection::<Donor>().insert(vec![donor.clone()]).await.unwrap();

    let mut pending = create_donation(donor.id, 80.0, utc(2026, 10, 1, 12));
    pending.status = DonationStatus::Pending;
    donor::record_donation(&store, pending).await.unwrap();

    let stored = store.typed_collection::<Donor>().get_one(donor.id).await.unwrap().unwrap();
    assert_eq!(stored.total_donated, 0.0);
    assert_eq!(stored.donation_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_volunteer_hours_from_many_tasks_all_land() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::new(backend.clone());
    let volunteer = Volunteer::new("Ola", "Zielińska", "ola@example.org");
    store.typed_collection::<Volunteer>().insert(vec![volunteer.clone()]).await.unwrap();

    let handles = (0..20)
        .map(|i| {
            let store = DocumentStore::new(backend.clone());
            let id = volunteer.id;
            tokio::spawn(async move { volunteer::log_hours(&store, id, 1.5, utc(2026, 10, 1, i % 24)).await })
        })
        .collect::<Vec<_>>();

    for joined in join_all(handles).await {
        joined.unwrap().unwrap();
    }

    let stored = store.typed_collection::<Volunteer>().get_one(volunteer.id).await.unwrap().unwrap();
    assert_eq!(stored.total_hours, 30.0);
    assert!(stored.last_activity_date.is_some());
}

#[tokio::test]
async fn test_stock_adjustments_commute() {
    let store = create_store();
    let item = InventoryItem::new("Dry food", ItemCategory::Food, ItemUnit::Kg);
    store.typed_collection::<InventoryItem>().insert(vec![item.clone()]).await.unwrap();

    let deltas = [20.0, -5.0, 12.5, -2.5, 5.0];
    let results = join_all(deltas.iter().map(|delta| inventory::adjust_stock(&store, item.id, *delta))).await;
    assert!(results.iter().all(Result::is_ok));

    let stored = store.typed_collection::<InventoryItem>().get_one(item.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 30.0);
    assert!(stored.last_restocked.is_some());
}

#[tokio::test]
async fn test_counter_on_missing_document_is_not_found() {
    let store = create_store();

    let error = volunteer::log_hours(&store, Uuid::new(), 2.0, utc(2026, 10, 1, 9)).await.unwrap_err();
    assert!(error.is_not_found());

    let error = inventory::adjust_stock(&store, Uuid::new(), -1.0).await.unwrap_err();
    assert!(error.is_not_found());
}

// ============================================================================
// Indexes
// ============================================================================

#[tokio::test]
async fn test_ensure_indexes_can_run_twice() {
    let store = create_store();

    entities::ensure_indexes(&store).await.unwrap();
    entities::ensure_indexes(&store).await.unwrap();
}
