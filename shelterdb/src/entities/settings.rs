//! Foundation-wide settings: one versioned document under a well-known id.
//!
//! Every write is a compare-and-swap on the version the caller last read. A stale write fails
//! with [`StoreError::Conflict`]; re-read with [`get`] and try again.

use std::collections::BTreeMap;

use bson::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use shelterdb_core::{
    backend::StoreBackend,
    document::{Document, bson_datetime},
    error::{StoreError, StoreResult},
    store::DocumentStore,
    versioned::Versioned,
};

const SETTINGS_UUID: uuid::Uuid = uuid::uuid!("6f1c2a3e-5b7d-4e8f-9a0b-1c2d3e4f5a6b");

/// Id of the single settings document.
pub fn settings_id() -> Uuid {
    Uuid::from(SETTINGS_UUID)
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ContactDetails {
    pub email: String,
    pub phone: String,
    pub website: String,
    pub emergency_phone: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    pub reply_to_email: String,
    pub enable_tls: bool,
    pub signature: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationSettings {
    pub enable_email: bool,
    pub enable_sms: bool,
    pub enable_push: bool,
    pub on_new_adoption: bool,
    pub on_new_donation: bool,
    pub on_new_volunteer: bool,
    pub on_animal_intake: bool,
    pub on_veterinary_visit: bool,
    pub on_low_inventory: bool,
    /// daily, weekly or never
    pub digest_frequency: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enable_email: true,
            enable_sms: false,
            enable_push: false,
            on_new_adoption: true,
            on_new_donation: true,
            on_new_volunteer: true,
            on_animal_intake: false,
            on_veterinary_visit: false,
            on_low_inventory: true,
            digest_frequency: "daily".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    pub adoptions: bool,
    pub donations: bool,
    pub volunteers: bool,
    pub events: bool,
    pub campaigns: bool,
    pub reports: bool,
    pub public_api: bool,
    pub online_adoption: bool,
    pub online_donation: bool,
    pub maintenance_mode: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            adoptions: true,
            donations: true,
            volunteers: true,
            events: true,
            campaigns: true,
            reports: true,
            public_api: false,
            online_adoption: false,
            online_donation: false,
            maintenance_mode: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Branding {
    pub logo_url: String,
    pub favicon_url: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub custom_footer: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FoundationSettings {
    pub id: Uuid,
    pub name: String,
    pub legal_name: String,
    pub mission: String,
    pub contact_info: ContactDetails,
    pub social_media: BTreeMap<String, String>,
    /// Adoption fee per animal category.
    pub default_adoption_fees: BTreeMap<String, f64>,
    pub email_settings: EmailSettings,
    pub notification_settings: NotificationSettings,
    pub features: FeatureFlags,
    pub branding: Branding,
    pub version: i64,
    pub updated_by: String,
    pub updated_at: bson::DateTime,
    pub created_at: bson::DateTime,
}

impl FoundationSettings {
    pub fn new(name: impl Into<String>) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: settings_id(),
            name: name.into(),
            legal_name: String::new(),
            mission: String::new(),
            contact_info: ContactDetails::default(),
            social_media: BTreeMap::new(),
            default_adoption_fees: BTreeMap::new(),
            email_settings: EmailSettings::default(),
            notification_settings: NotificationSettings::default(),
            features: FeatureFlags::default(),
            branding: Branding::default(),
            version: 1,
            updated_by: String::new(),
            updated_at: now,
            created_at: now,
        }
    }
}

impl Document for FoundationSettings {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "settings"
    }
}

impl Versioned for FoundationSettings {
    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn touch(&mut self, updated_by: &str, updated_at: DateTime<Utc>) {
        self.updated_by = updated_by.to_string();
        self.updated_at = bson_datetime(updated_at);
    }
}

/// Creates the settings document at version 1, or returns the existing one.
pub async fn bootstrap<B: StoreBackend>(
    store: &DocumentStore<B>,
    name: &str,
    created_by: &str,
) -> StoreResult<FoundationSettings> {
    let settings = store.typed_collection::<FoundationSettings>();

    if let Some(existing) = settings.get_one(settings_id()).await? {
        return Ok(existing);
    }

    match settings.create_versioned(FoundationSettings::new(name), created_by).await {
        Ok(created) => {
            info!(name, "foundation settings created");
            Ok(created)
        }
        // Another process bootstrapped first.
        Err(StoreError::AlreadyExists { .. }) => get(store).await,
        Err(error) => Err(error),
    }
}

/// # Errors
///
/// [`StoreError::NotFound`] before [`bootstrap`] has run.
pub async fn get<B: StoreBackend>(store: &DocumentStore<B>) -> StoreResult<FoundationSettings> {
    store
        .typed_collection::<FoundationSettings>()
        .get_one(settings_id())
        .await?
        .ok_or_else(|| StoreError::not_found(settings_id(), FoundationSettings::collection_name()))
}

/// Replaces the whole document with `mutate(current)`.
pub async fn update<B, F>(
    store: &DocumentStore<B>,
    current: &FoundationSettings,
    updated_by: &str,
    mutate: F,
) -> StoreResult<FoundationSettings>
where
    B: StoreBackend,
    F: FnOnce(FoundationSettings) -> FoundationSettings + Send,
{
    store
        .typed_collection::<FoundationSettings>()
        .update_versioned(current, updated_by, mutate)
        .await
}

async fn update_section<B: StoreBackend, S: Serialize>(
    store: &DocumentStore<B>,
    field: &str,
    section: &S,
    expected_version: i64,
    updated_by: &str,
) -> StoreResult<FoundationSettings> {
    let value = bson::serialize_to_bson(section)?;

    store
        .typed_collection::<FoundationSettings>()
        .update_versioned_field(settings_id(), expected_version, field, value, updated_by)
        .await
}

pub async fn update_email_settings<B: StoreBackend>(
    store: &DocumentStore<B>,
    expected_version: i64,
    email_settings: &EmailSettings,
    updated_by: &str,
) -> StoreResult<FoundationSettings> {
    update_section(store, "email_settings", email_settings, expected_version, updated_by).await
}

pub async fn update_notification_settings<B: StoreBackend>(
    store: &DocumentStore<B>,
    expected_version: i64,
    notification_settings: &NotificationSettings,
    updated_by: &str,
) -> StoreResult<FoundationSettings> {
    update_section(store, "notification_settings", notification_settings, expected_version, updated_by).await
}

pub async fn update_features<B: StoreBackend>(
    store: &DocumentStore<B>,
    expected_version: i64,
    features: &FeatureFlags,
    updated_by: &str,
) -> StoreResult<FoundationSettings> {
    update_section(store, "features", features, expected_version, updated_by).await
}

pub async fn update_branding<B: StoreBackend>(
    store: &DocumentStore<B>,
    expected_version: i64,
    branding: &Branding,
    updated_by: &str,
) -> StoreResult<FoundationSettings> {
    update_section(store, "branding", branding, expected_version, updated_by).await
}
