//! Shelter records.
//!
//! Each record type implements [`Document`](shelterdb_core::document::Document) plus the
//! traits that plug it into the core: [`Listing`](shelterdb_core::page::Listing) with a typed
//! filter, [`StatsPreset`](shelterdb_core::stats::StatsPreset) for its statistics and
//! [`Indexed`](shelterdb_core::store::Indexed) for the indexes it expects. Running totals
//! (donor giving, volunteer hours, stock) change only through counters; foundation settings
//! change only through versioned writes.

pub mod adoption;
pub mod animal;
pub mod donation;
pub mod donor;
pub mod inventory;
pub mod settings;
pub mod veterinary;
pub mod volunteer;

use shelterdb_core::{backend::StoreBackend, error::StoreResult, store::DocumentStore};

pub use adoption::{Adoption, AdoptionFilter};
pub use animal::{Animal, AnimalFilter};
pub use donation::{Donation, DonationFilter};
pub use donor::{Donor, DonorFilter};
pub use inventory::{InventoryFilter, InventoryItem};
pub use settings::FoundationSettings;
pub use veterinary::{MedicalHistoryFilter, MedicalRecord, Vaccination, VaccinationFilter, VeterinaryVisit, VisitFilter};
pub use volunteer::{Volunteer, VolunteerFilter};

/// Creates every shelter collection with its indexes.
pub async fn ensure_indexes<B: StoreBackend>(store: &DocumentStore<B>) -> StoreResult<()> {
    store.ensure_indexes::<Animal>().await?;
    store.ensure_indexes::<Adoption>().await?;
    store.ensure_indexes::<Donation>().await?;
    store.ensure_indexes::<Donor>().await?;
    store.ensure_indexes::<Volunteer>().await?;
    store.ensure_indexes::<InventoryItem>().await?;
    store.ensure_indexes::<VeterinaryVisit>().await?;
    store.ensure_indexes::<Vaccination>().await?;

    Ok(())
}
