use serde::{Deserialize, Serialize};

use crate::config::{Store, StoreSet};

/// Where an item's discount percentage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// Computed from `price` and `original_price`.
    Derived(u8),
    /// Taken verbatim from the listing because no pre-discount price was known.
    SourceProvided(u8),
    Unknown,
}

impl Discount {
    /// Derivation wins over a source-provided figure; a source figure outside
    /// `0..=100` is ignored.
    pub fn resolve(price: f64, original_price: Option<f64>, source_percent: Option<f64>) -> Self {
        if let Some(original) = original_price.filter(|o| *o > 0.0) {
            return Self::Derived(percent_off(price, original));
        }
        match source_percent {
            Some(pct) if (0.0..=100.0).contains(&pct) => Self::SourceProvided(pct.round() as u8),
            _ => Self::Unknown,
        }
    }

    pub fn percent(self) -> Option<u8> {
        match self {
            Self::Derived(p) | Self::SourceProvided(p) => Some(p),
            Self::Unknown => None,
        }
    }

    fn basis(self) -> Option<DiscountBasis> {
        match self {
            Self::Derived(_) => Some(DiscountBasis::Derived),
            Self::SourceProvided(_) => Some(DiscountBasis::Source),
            Self::Unknown => None,
        }
    }
}

/// `round(100 * (1 - price / original))`, clamped to `0..=100`.
pub fn percent_off(price: f64, original: f64) -> u8 {
    let pct = ((1.0 - price / original) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DiscountBasis {
    Derived,
    Source,
}

/// One liquidation listing for one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ItemRecord", try_from = "ItemRecord")]
pub struct Item {
    pub sku: Option<String>,
    pub title: String,
    /// Current price in dollars.
    pub price: f64,
    pub original_price: Option<f64>,
    pub discount: Discount,
    /// Configured store name.
    pub store: String,
    pub city: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub availability: Option<String>,
}

impl Item {
    pub fn discount_percent(&self) -> Option<u8> {
        self.discount.percent()
    }

    pub fn belongs_to(&self, store: &Store) -> bool {
        self.store == store.name && self.city == store.city
    }
}

/// Wire shape of [`Item`]; the viewer reads these keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemRecord {
    sku: Option<String>,
    title: String,
    price: f64,
    original_price: Option<f64>,
    discount_percent: Option<u8>,
    discount_basis: Option<DiscountBasis>,
    store: String,
    city: String,
    url: Option<String>,
    image_url: Option<String>,
    availability: Option<String>,
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        Self {
            sku: item.sku,
            title: item.title,
            price: item.price,
            original_price: item.original_price,
            discount_percent: item.discount.percent(),
            discount_basis: item.discount.basis(),
            store: item.store,
            city: item.city,
            url: item.url,
            image_url: item.image_url,
            availability: item.availability,
        }
    }
}

impl TryFrom<ItemRecord> for Item {
    type Error = String;

    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        let discount = match (record.discount_basis, record.discount_percent) {
            (_, Some(p)) if p > 100 => return Err(format!("discount_percent {p} out of range")),
            (Some(DiscountBasis::Derived), Some(p)) => Discount::Derived(p),
            (Some(DiscountBasis::Source) | None, Some(p)) => Discount::SourceProvided(p),
            (Some(basis), None) => {
                return Err(format!("discount_basis {basis:?} without discount_percent"));
            }
            (None, None) => Discount::Unknown,
        };
        Ok(Self {
            sku: record.sku,
            title: record.title,
            price: record.price,
            original_price: record.original_price,
            discount,
            store: record.store,
            city: record.city,
            url: record.url,
            image_url: record.image_url,
            availability: record.availability,
        })
    }
}

/// The JSON file consumed by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub generated_at: String,
    pub source: String,
    pub query: String,
    pub stores: Vec<Store>,
    pub items: Vec<Item>,
}

impl OutputDocument {
    /// Stamps the document with the current time. Items whose store/city pair
    /// is not in `stores` are dropped.
    pub fn new(source: &str, query: &str, stores: &StoreSet, items: Vec<Item>) -> Self {
        let (items, orphans): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| stores.contains(&item.store, &item.city));
        for orphan in &orphans {
            tracing::warn!(
                title = %orphan.title,
                store = %orphan.store,
                city = %orphan.city,
                "dropping item for unconfigured store"
            );
        }
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            source: source.to_owned(),
            query: query.to_owned(),
            stores: stores.stores.clone(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item(price: f64, original_price: Option<f64>, discount: Discount) -> Item {
        Item {
            sku: Some("6000191234567".into()),
            title: "Téléviseur TCL 55'' 4K".into(),
            price,
            original_price,
            discount,
            store: "Walmart Saint-Jérôme Supercentre".into(),
            city: "Saint-Jérôme".into(),
            url: None,
            image_url: None,
            availability: None,
        }
    }

    #[test]
    fn derives_discount_from_prices() {
        assert_eq!(
            Discount::resolve(398.0, Some(598.0), None),
            Discount::Derived(33)
        );
        assert_eq!(Discount::resolve(89.0, Some(149.0), Some(10.0)), Discount::Derived(40));
        assert_eq!(Discount::resolve(0.0, Some(20.0), None), Discount::Derived(100));
        assert_eq!(Discount::resolve(20.0, Some(20.0), None), Discount::Derived(0));
    }

    #[test]
    fn falls_back_to_source_percent() {
        assert_eq!(Discount::resolve(10.0, None, Some(25.4)), Discount::SourceProvided(25));
        assert_eq!(
            Discount::resolve(10.0, Some(0.0), Some(50.0)),
            Discount::SourceProvided(50)
        );
        assert_eq!(Discount::resolve(10.0, None, Some(140.0)), Discount::Unknown);
        assert_eq!(Discount::resolve(10.0, None, None), Discount::Unknown);
    }

    #[test]
    fn percent_off_is_clamped() {
        assert_eq!(percent_off(30.0, 20.0), 0);
        assert_eq!(percent_off(-5.0, 20.0), 100);
    }

    #[test]
    fn serializes_viewer_keys() {
        let value = serde_json::to_value(item(398.0, Some(598.0), Discount::Derived(33))).unwrap();
        assert_eq!(
            value,
            json!({
                "sku": "6000191234567",
                "title": "Téléviseur TCL 55'' 4K",
                "price": 398.0,
                "original_price": 598.0,
                "discount_percent": 33,
                "discount_basis": "derived",
                "store": "Walmart Saint-Jérôme Supercentre",
                "city": "Saint-Jérôme",
                "url": null,
                "image_url": null,
                "availability": null,
            })
        );
    }

    #[test]
    fn unknown_discount_is_null() {
        let value = serde_json::to_value(item(12.0, None, Discount::Unknown)).unwrap();
        assert_eq!(value["discount_percent"], serde_json::Value::Null);
        assert_eq!(value["discount_basis"], serde_json::Value::Null);
    }

    #[test]
    fn reads_back_discount_basis() {
        let original = item(10.0, None, Discount::SourceProvided(15));
        let text = serde_json::to_string(&original).unwrap();
        let parsed: Item = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn rejects_out_of_range_percent() {
        let mut value = serde_json::to_value(item(10.0, None, Discount::Unknown)).unwrap();
        value["discount_percent"] = json!(150);
        assert!(serde_json::from_value::<Item>(value).is_err());
    }

    #[test]
    fn document_drops_items_for_unknown_stores() {
        let stores = StoreSet::default();
        let mut stray = item(5.0, None, Discount::Unknown);
        stray.store = "Walmart Laval".into();
        stray.city = "Laval".into();
        let kept = item(5.0, None, Discount::Unknown);

        let doc = OutputDocument::new("demo", "clearance", &stores, vec![stray, kept.clone()]);
        assert_eq!(doc.items, vec![kept]);
        assert_eq!(doc.stores.len(), 2);
        assert!(chrono::DateTime::parse_from_rfc3339(&doc.generated_at).is_ok());
    }
}
