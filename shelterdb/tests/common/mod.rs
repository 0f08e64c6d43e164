//! Shared fixtures for the shelterdb integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

use shelterdb::{
    bson::Uuid,
    document::bson_datetime,
    entities::{
        animal::{Animal, AnimalCategory, LocalizedText, Sex},
        donation::{Donation, PaymentMethod},
        veterinary::{Vaccination, VaccineType, VeterinaryVisit, VisitType},
    },
    memory::InMemoryStore,
    store::DocumentStore,
};

pub fn create_store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(InMemoryStore::new())
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> shelterdb::bson::DateTime {
    bson_datetime(utc(year, month, day, hour))
}

pub fn create_animal(name: &str, species: &str) -> Animal {
    Animal::new(LocalizedText::new(name, name), AnimalCategory::Mammal, species, Sex::Unknown)
}

pub fn create_donation(donor_id: Uuid, amount: f64, donated_at: DateTime<Utc>) -> Donation {
    let mut donation = Donation::new(donor_id, "Jan Kowalski", amount, PaymentMethod::BankTransfer);
    donation.donation_date = bson_datetime(donated_at);
    donation
}

pub fn create_visit(animal_id: Uuid, visit_date: shelterdb::bson::DateTime, vet: &str) -> VeterinaryVisit {
    VeterinaryVisit::new(animal_id, VisitType::Checkup, visit_date, vet)
}

pub fn create_vaccination(animal_id: Uuid, administered: shelterdb::bson::DateTime, vet: &str) -> Vaccination {
    Vaccination::new(animal_id, VaccineType::Rabies, "Rabisin", administered, vet)
}
