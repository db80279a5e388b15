use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub Uuid);

impl ProductId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ProductId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaleId(pub i64);

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Cases,
    Chargers,
    Headphones,
    Cables,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Cases,
        Category::Chargers,
        Category::Headphones,
        Category::Cables,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Cases => "cases",
            Category::Chargers => "chargers",
            Category::Headphones => "headphones",
            Category::Cables => "cables",
            Category::Other => "other",
        }
    }

    /// Lenient mapping for values read back from storage.
    pub fn from_stored(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cases" | "case" => Ok(Category::Cases),
            "chargers" | "charger" => Ok(Category::Chargers),
            "headphones" => Ok(Category::Headphones),
            "cables" | "cable" => Ok(Category::Cables),
            "other" | "" => Ok(Category::Other),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub category: Category,
    pub price: f64,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub total: f64,
    pub date: DateTime<Utc>,
}

/// A sale row that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSale {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub total: f64,
    pub date: DateTime<Utc>,
}

/// Raw product form input. `price` and `stock` are kept as entered and
/// coerced when the draft is turned into a [`Product`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub stock: Option<String>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: impl ToString, stock: impl ToString) -> Self {
        Self {
            name: name.into(),
            price: Some(price.to_string()),
            stock: Some(stock.to_string()),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }
}

/// Partial update for an existing product. `None` leaves a field untouched;
/// an empty `code` or `model` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub stock: Option<String>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stored_category_falls_back_to_other() {
        assert_eq!(Category::from_stored("gadgets"), Category::Other);
        assert_eq!(Category::from_stored("cables"), Category::Cables);
    }

    #[test]
    fn category_round_trips_through_its_stored_name() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn product_serializes_category_in_snake_case() {
        let product = Product {
            id: ProductId::generate(),
            code: None,
            name: "Funda Silicona".into(),
            model: Some("iPhone 13".into()),
            category: Category::Cases,
            price: 10.0,
            stock: 5,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&product).expect("json");
        assert_eq!(json["category"], "cases");
        assert!(json.get("code").is_none());
    }

    #[test]
    fn product_id_parses_with_surrounding_whitespace() {
        let id = ProductId::generate();
        let parsed: ProductId = format!(" {id} ").parse().expect("parse");
        assert_eq!(parsed, id);
    }
}
