use bson::Uuid;
use serde::{Deserialize, Serialize};

use shelterdb_core::{
    backend::StoreBackend,
    document::Document,
    error::StoreResult,
    filter::{FilterFields, FilterSpec, Predicates},
    page::Listing,
    query::Filter,
    stats::{AggregationSpec, StatsPreset, SumSpec},
    store::{DocumentStore, IndexSpec, Indexed},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Food,
    Medicine,
    Supplies,
    Equipment,
    Cleaning,
    Toys,
    Bedding,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemUnit {
    Piece,
    Kg,
    Liter,
    Box,
    Bag,
    Bottle,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub category: ItemCategory,
    pub unit: ItemUnit,
    /// Stock on hand, changed only by [`adjust_stock`].
    pub quantity: f64,
    pub reorder_point: f64,
    pub unit_cost: f64,
    pub location: Option<String>,
    pub expiration_date: Option<bson::DateTime>,
    pub is_active: bool,
    pub tags: Vec<String>,
    pub last_restocked: Option<bson::DateTime>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, category: ItemCategory, unit: ItemUnit) -> Self {
        let now = bson::DateTime::now();

        Self {
            id: Uuid::new(),
            name: name.into(),
            description: None,
            sku: None,
            category,
            unit,
            quantity: 0.0,
            reorder_point: 0.0,
            unit_cost: 0.0,
            location: None,
            expiration_date: None,
            is_active: true,
            tags: Vec::new(),
            last_restocked: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn needs_reorder(&self) -> bool {
        self.quantity <= self.reorder_point
    }
}

impl Document for InventoryItem {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "inventory_items"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryFilter {
    pub category: Option<ItemCategory>,
    pub location: Option<String>,
    pub is_active: Option<bool>,
    pub tags: Vec<String>,
    pub min_quantity: Option<f64>,
    pub max_quantity: Option<f64>,
    pub expires_from: Option<bson::DateTime>,
    pub expires_to: Option<bson::DateTime>,
    pub search: Option<String>,
}

impl FilterSpec for InventoryFilter {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description", "sku"];

    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("category", self.category.as_ref())
            .eq("location", self.location.as_ref())
            .flag("is_active", self.is_active)
            .any_of("tags", &self.tags)
            .range("quantity", self.min_quantity.as_ref(), self.max_quantity.as_ref())
            .date_range("expiration_date", self.expires_from, self.expires_to)
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn from_fields(fields: &FilterFields) -> Self {
        Self {
            category: fields.parse("category"),
            location: fields.text("location"),
            is_active: fields.flag("is_active"),
            tags: fields.list("tags"),
            min_quantity: fields.number("min_quantity"),
            max_quantity: fields.number("max_quantity"),
            expires_from: fields.datetime("expires_from"),
            expires_to: fields.datetime("expires_to"),
            search: fields.text("search"),
        }
    }
}

impl Listing for InventoryItem {
    type Filter = InventoryFilter;

    const DEFAULT_SORT_FIELD: &'static str = "name";
    const SORTABLE_FIELDS: &'static [&'static str] =
        &["name", "category", "quantity", "expiration_date", "created_at", "updated_at"];
}

impl StatsPreset for InventoryItem {
    const DATE_FIELD: &'static str = "created_at";
    const GROUPABLE_FIELDS: &'static [&'static str] = &["category", "location", "unit", "is_active"];

    fn aggregation() -> AggregationSpec {
        AggregationSpec::new()
            .group_by("category")
            .sum(SumSpec::new("quantity"))
            .count("active_items", Filter::eq("is_active", true))
            .count("out_of_stock", Filter::lte("quantity", 0.0))
    }
}

impl Indexed for InventoryItem {
    const INDEXES: &'static [IndexSpec] = &[
        IndexSpec::new("category"),
        IndexSpec::new("name"),
        IndexSpec::new("expiration_date"),
    ];
}

/// Applies a stock movement: positive for deliveries, negative for usage.
///
/// Concurrent movements on one item all land; the final quantity is their sum.
pub async fn adjust_stock<B: StoreBackend>(store: &DocumentStore<B>, item_id: Uuid, delta: f64) -> StoreResult<()> {
    let items = store.typed_collection::<InventoryItem>();

    if delta > 0.0 {
        items
            .counter(item_id)
            .add("quantity", delta)
            .touch("last_restocked", chrono::Utc::now())
            .apply()
            .await
    } else {
        items.increment(item_id, "quantity", delta).await
    }
}
