//! Read-only pharmacy catalog loaded from a flat JSON file at startup.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 50;

static TRAILING_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)$").expect("valid regex"));
static ANY_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)").expect("valid regex"));
static STRIP_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]+\)").expect("valid regex"));

/// One record of the catalog file. Unknown fields are ignored.
///
/// Scraped catalogs are loosely typed: numbers may arrive as strings and
/// any field may be `null`. Such values fall back per field instead of
/// rejecting the record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "loose::string")]
    pub product_name: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub brand: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub category: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub sub_category: String,
    #[serde(default, deserialize_with = "loose::number")]
    pub sale_price: f64,
    #[serde(default, deserialize_with = "loose::number")]
    pub market_price: f64,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub image_url: Option<String>,
    #[serde(default, alias = "rating", deserialize_with = "loose::opt_number")]
    pub ratings: Option<f64>,
    #[serde(default, deserialize_with = "loose::opt_integer")]
    pub stock: Option<i64>,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub expiry_date: Option<String>,
}

mod loose {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_string(d)?.unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(opt_number(d)?.unwrap_or_default())
    }

    pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(as_f64(&Value::deserialize(d)?).filter(|n| n.is_finite()))
    }

    pub fn opt_integer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(opt_number(d)?.map(|n| n as i64))
    }
}

/// Catalog item as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineView {
    pub id: usize,
    pub name: String,
    pub base_name: String,
    pub pack_size: String,
    pub brand: String,
    pub category: String,
    pub sub_category: String,
    pub price: f64,
    pub original_price: f64,
    pub image: String,
    pub rating: f64,
    pub stock: i64,
    pub expiry_date: String,
    pub discount: i64,
    pub selected_weight: String,
    pub unit_type: String,
    pub per_unit_selling_price: f64,
    pub per_unit_original_price: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MedicineCatalog {
    entries: Vec<CatalogEntry>,
}

impl MedicineCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Loads the catalog file. A missing or malformed file yields an empty
    /// catalog and a warning.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Medicine catalog not loaded");
                return Self::default();
            }
        };
        match Self::from_json(&raw) {
            Ok(catalog) => {
                tracing::info!(path = %path.display(), count = catalog.len(), "Medicine catalog loaded");
                catalog
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Medicine catalog is not a JSON array");
                Self::default()
            }
        }
    }

    /// Parses a JSON array of entries. Records that are not objects are
    /// skipped with a warning; the rest of the file still loads.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let rows: Vec<serde_json::Value> = serde_json::from_str(raw)?;
        let entries = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value::<CatalogEntry>(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping malformed catalog record");
                    None
                }
            })
            .collect();
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filters by category and sub-category (case-insensitive, exact), then
    /// requires every search term to appear in name, brand, category or
    /// sub-category.
    pub fn search(&self, query: &MedicineQuery) -> Vec<MedicineView> {
        let terms: Vec<String> = query
            .search
            .as_deref()
            .map(|s| s.to_lowercase().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);

        self.entries
            .iter()
            .enumerate()
            .filter(|(_, m)| eq_ignore_case(query.category.as_deref(), &m.category))
            .filter(|(_, m)| eq_ignore_case(query.sub_category.as_deref(), &m.sub_category))
            .filter(|(_, m)| {
                let fields = [&m.product_name, &m.brand, &m.category, &m.sub_category]
                    .map(|f| f.to_lowercase());
                terms
                    .iter()
                    .all(|term| fields.iter().any(|f| f.contains(term.as_str())))
            })
            .take(limit)
            .map(|(i, m)| to_view(i + 1, m))
            .collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|m| !m.category.is_empty())
            .map(|m| m.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn subcategories(&self, category: Option<&str>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|m| eq_ignore_case(category, &m.category))
            .filter(|m| !m.sub_category.is_empty())
            .map(|m| m.sub_category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn eq_ignore_case(wanted: Option<&str>, actual: &str) -> bool {
    wanted
        .filter(|w| !w.is_empty())
        .is_none_or(|w| w.eq_ignore_ascii_case(actual))
}

/// Splits `"Vicks VapoRub (Pack of 1)"` into `("Vicks VapoRub", "Pack of 1")`.
pub fn extract_pack_size(product_name: &str) -> (String, String) {
    let trimmed = product_name.trim();
    if let Some(caps) = TRAILING_PARENS.captures(trimmed)
        && let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1))
    {
        return (
            trimmed[..whole.start()].trim().to_string(),
            inner.as_str().to_string(),
        );
    }
    if let Some(inner) = ANY_PARENS.captures(product_name).and_then(|c| c.get(1)) {
        let base = STRIP_PARENS.replace_all(product_name, "").trim().to_string();
        return (base, inner.as_str().to_string());
    }
    (product_name.to_string(), String::new())
}

fn to_view(id: usize, m: &CatalogEntry) -> MedicineView {
    let discount = if m.market_price > m.sale_price && m.market_price > 0.0 {
        (((m.market_price - m.sale_price) / m.market_price) * 100.0).round() as i64
    } else {
        0
    };
    let (base_name, pack_size) = extract_pack_size(&m.product_name);
    let image = m
        .image_url
        .clone()
        .unwrap_or_else(|| format!("https://placehold.co/400?text={}", base_name.replace(' ', "+")));
    let selected_weight = if pack_size.is_empty() {
        "Std".to_string()
    } else {
        pack_size.clone()
    };

    MedicineView {
        id,
        name: m.product_name.clone(),
        base_name,
        pack_size,
        brand: m.brand.clone(),
        category: m.category.clone(),
        sub_category: m.sub_category.clone(),
        price: m.sale_price,
        original_price: m.market_price,
        image,
        rating: m.ratings.unwrap_or(4.0),
        stock: m.stock.unwrap_or(25),
        expiry_date: m.expiry_date.clone().unwrap_or_else(|| "12/2026".into()),
        discount,
        selected_weight,
        unit_type: "unit".into(),
        per_unit_selling_price: m.sale_price,
        per_unit_original_price: m.market_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, brand: &str, category: &str, sub: &str) -> CatalogEntry {
        CatalogEntry {
            product_name: name.into(),
            brand: brand.into(),
            category: category.into(),
            sub_category: sub.into(),
            sale_price: 80.0,
            market_price: 100.0,
            ..Default::default()
        }
    }

    fn catalog() -> MedicineCatalog {
        MedicineCatalog::new(vec![
            entry("Vicks VapoRub (Pack of 1)", "Vicks", "Cold Care", "Balms"),
            entry("Dolo 650 Tablet", "Micro Labs", "Pain Relief", "Tablets"),
            entry("Crocin (15 tablets) Advance", "GSK", "Pain Relief", "Tablets"),
        ])
    }

    #[test]
    fn loose_records_do_not_drop_the_catalog() {
        let raw = r#"[
            {"product_name": "Dolo 650 Tablet", "sale_price": 30.0, "market_price": 30.0, "ratings": 4.5},
            {"product_name": "Volini Spray", "sale_price": "150", "market_price": null,
             "ratings": "4.1", "stock": "12", "brand": null},
            {"product_name": "Zincovit", "rating": 3.9, "stock": 7.0, "expiry_date": ""},
            "not a record",
            {"product_name": "Limcee", "ratings": "n/a"}
        ]"#;
        let catalog = MedicineCatalog::from_json(raw).unwrap();
        assert_eq!(catalog.len(), 4);

        let items = catalog.search(&MedicineQuery::default());
        assert_eq!(items[0].rating, 4.5);
        let volini = &items[1];
        assert_eq!(volini.name, "Volini Spray");
        assert_eq!(volini.price, 150.0);
        assert_eq!(volini.original_price, 0.0);
        assert_eq!(volini.rating, 4.1);
        assert_eq!(volini.stock, 12);
        assert_eq!(volini.brand, "");
        assert_eq!(items[2].rating, 3.9);
        assert_eq!(items[2].stock, 7);
        assert_eq!(items[2].expiry_date, "12/2026");
        assert_eq!(items[3].rating, 4.0);
    }

    #[test]
    fn non_array_file_is_an_error() {
        assert!(MedicineCatalog::from_json(r#"{"product_name": "x"}"#).is_err());
    }

    #[test]
    fn pack_size_extraction() {
        assert_eq!(
            extract_pack_size("Vicks VapoRub (Pack of 1)"),
            ("Vicks VapoRub".into(), "Pack of 1".into())
        );
        assert_eq!(
            extract_pack_size("Crocin (15 tablets) Advance"),
            ("Crocin Advance".into(), "15 tablets".into())
        );
        assert_eq!(extract_pack_size("Plain"), ("Plain".into(), String::new()));
    }

    #[test]
    fn view_fallbacks_and_discount() {
        let items = catalog().search(&MedicineQuery::default());
        assert_eq!(items.len(), 3);
        let vicks = &items[0];
        assert_eq!(vicks.id, 1);
        assert_eq!(vicks.discount, 20);
        assert_eq!(vicks.stock, 25);
        assert_eq!(vicks.expiry_date, "12/2026");
        assert_eq!(vicks.selected_weight, "Pack of 1");
        assert_eq!(items[1].selected_weight, "Std");
    }

    #[test]
    fn filters_and_multi_term_search() {
        let c = catalog();
        let q = MedicineQuery {
            category: Some("pain relief".into()),
            ..Default::default()
        };
        assert_eq!(c.search(&q).len(), 2);

        let q = MedicineQuery {
            search: Some("gsk tablets".into()),
            ..Default::default()
        };
        let hits = c.search(&q);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 3);

        let q = MedicineQuery {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(c.search(&q).len(), 1);
    }

    #[test]
    fn categories_are_sorted_and_unique() {
        let c = catalog();
        assert_eq!(c.categories(), vec!["Cold Care", "Pain Relief"]);
        assert_eq!(c.subcategories(Some("PAIN RELIEF")), vec!["Tablets"]);
        assert_eq!(c.subcategories(None), vec!["Balms", "Tablets"]);
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        assert!(MedicineCatalog::load("/nonexistent/catalog.json").is_empty());
    }
}
