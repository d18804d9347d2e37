//! Offline listings used with `--demo`.
//!
//! The catalogue is fixed so two demo runs differ only in `generated_at`.

use crate::config::StoreSet;
use crate::models::{Discount, Item, OutputDocument};

struct DemoListing {
    sku: &'static str,
    title: &'static str,
    price: f64,
    was: Option<f64>,
    availability: &'static str,
    image: &'static str,
}

const CATALOGUE: &[DemoListing] = &[
    DemoListing {
        sku: "6000191234567",
        title: "Téléviseur TCL 55'' 4K",
        price: 398.0,
        was: Some(598.0),
        availability: "IN_STOCK",
        image: "123/456/6000191234567.jpg",
    },
    DemoListing {
        sku: "6000209876543",
        title: "Compresseur Mastercraft 20V",
        price: 89.0,
        was: Some(149.0),
        availability: "LOW_STOCK",
        image: "987/654/6000209876543.jpg",
    },
    DemoListing {
        sku: "6000204455667",
        title: "Ensemble de patio Mainstays 4 pièces",
        price: 249.0,
        was: Some(449.0),
        availability: "IN_STOCK",
        image: "445/566/6000204455667.jpg",
    },
    DemoListing {
        sku: "6000198877665",
        title: "Aspirateur-balai Hart 20V",
        price: 67.0,
        was: Some(129.97),
        availability: "IN_STOCK",
        image: "887/766/6000198877665.jpg",
    },
    DemoListing {
        sku: "6000207766554",
        title: "Ventilateur sur pied Hometrends",
        price: 19.0,
        was: Some(39.97),
        availability: "LOW_STOCK",
        image: "776/655/6000207766554.jpg",
    },
    DemoListing {
        sku: "6000201122334",
        title: "Jouet LEGO City",
        price: 24.0,
        was: None,
        availability: "IN_STOCK",
        image: "112/233/6000201122334.jpg",
    },
];

/// Deals the catalogue round-robin across the configured stores, so every
/// store gets at least one listing when there are no more stores than entries.
pub fn demo_items(stores: &StoreSet) -> Vec<Item> {
    if stores.is_empty() {
        return Vec::new();
    }
    let per_store = CATALOGUE.len().div_ceil(stores.len()).max(1);
    stores
        .iter()
        .enumerate()
        .flat_map(move |(idx, store)| {
            (0..per_store).map(move |n| {
                let listing = &CATALOGUE[(idx + n * stores.len()) % CATALOGUE.len()];
                Item {
                    sku: Some(listing.sku.to_owned()),
                    title: listing.title.to_owned(),
                    price: listing.price,
                    original_price: listing.was,
                    discount: Discount::resolve(listing.price, listing.was, None),
                    store: store.name.clone(),
                    city: store.city.clone(),
                    url: Some(format!("https://www.walmart.ca/ip/{}", listing.sku)),
                    image_url: Some(format!(
                        "https://i5.walmartimages.ca/images/Enlarge/{}",
                        listing.image
                    )),
                    availability: Some(listing.availability.to_owned()),
                }
            })
        })
        .collect()
}

pub fn document(stores: &StoreSet, query: &str) -> OutputDocument {
    OutputDocument::new("demo", query, stores, demo_items(stores))
}
