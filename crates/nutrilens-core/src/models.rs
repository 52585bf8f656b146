//! Core data models used throughout nutrilens.
//!
//! These types describe the structured output requested from the language
//! model for each label type, and the merged record that is persisted per
//! product.
//!
//! Numeric leaves are deserialized leniently: the model is asked for numbers
//! but routinely answers with strings such as `"12g"` or `"15%"`, so any
//! string containing a number is accepted and `null`/blank values become
//! `None`. Structural fields (`basicInfo`, `nutrition`, `summary`, ...) are
//! required; a missing one fails deserialization and is reported as a
//! schema error by [`crate::schema`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Product name used when the ingredient label yields no name.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

/// Error message carried by the sentinel analysis substituted for an
/// unparseable model response.
pub const INVALID_JSON_SENTINEL: &str = "Invalid JSON response from GPT";

/// Identity of a stored analysis record.
pub type RecordId = String;

/// The two label photographs a pipeline run works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Ingredient list (원재료명) label.
    Ingredient,
    /// Nutrition facts (영양정보) label.
    Nutrition,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Ingredient => write!(f, "ingredient"),
            DocumentKind::Nutrition => write!(f, "nutrition"),
        }
    }
}

/// Image references for one submission. URLs are opaque to nutrilens;
/// the images are hosted elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelImages {
    pub ingredient_image_url: String,
    pub nutrition_image_url: String,
}

impl LabelImages {
    pub fn new(ingredient: impl Into<String>, nutrition: impl Into<String>) -> Self {
        Self {
            ingredient_image_url: ingredient.into(),
            nutrition_image_url: nutrition.into(),
        }
    }

    pub fn url(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Ingredient => &self.ingredient_image_url,
            DocumentKind::Nutrition => &self.nutrition_image_url,
        }
    }
}

// ============ Analysis outcome ============

/// Outcome of one structured-analysis call.
///
/// Serializes untagged: a parsed record serializes as itself, the sentinel
/// as `{"error": "..."}`. This is the shape returned to callers and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Analysis<T> {
    Parsed(T),
    Invalid { error: String },
}

impl<T> Analysis<T> {
    /// The sentinel substituted for a response that failed validation.
    pub fn invalid() -> Self {
        Analysis::Invalid {
            error: INVALID_JSON_SENTINEL.to_string(),
        }
    }

    pub fn parsed(&self) -> Option<&T> {
        match self {
            Analysis::Parsed(value) => Some(value),
            Analysis::Invalid { .. } => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Analysis::Invalid { .. })
    }
}

// ============ Ingredient label ============

/// Structured reading of an ingredient label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientAnalysis {
    pub basic_info: BasicInfo,
    #[serde(deserialize_with = "de::null_as_default")]
    pub ingredient_tree: Vec<IngredientNode>,
    /// Category name → ingredient names, without duplicates.
    #[serde(deserialize_with = "de::null_as_default")]
    pub categorized_ingredients: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gi_index: Option<GiIndex>,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfo {
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub total_weight_gram: Option<f64>,
    #[serde(
        default,
        alias = "pakageGram",
        deserialize_with = "de::lenient_number"
    )]
    pub package_gram: Option<f64>,
    #[serde(default, alias = "pakages", deserialize_with = "de::lenient_number")]
    pub packages: Option<f64>,
}

/// One ingredient, possibly with nested sub-ingredients from parentheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientNode {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "de::lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub ratio: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub order: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<IngredientNode>,
}

impl IngredientNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ratio: None,
            order: None,
            children: Vec::new(),
        }
    }
}

/// Estimated glycemic index of the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiIndex {
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub grade: Option<String>,
}

// ============ Nutrition label ============

/// Structured reading of a nutrition facts label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionAnalysis {
    pub nutrition: NutritionFacts,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    #[serde(
        rename = "Kcal",
        alias = "kcal",
        default,
        deserialize_with = "de::lenient_number"
    )]
    pub kcal: Option<f64>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub carbohydrate: Carbohydrate,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub protein: GramAmount,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub fat: Fat,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub sodium: MilligramAmount,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub cholesterol: MilligramAmount,
}

impl NutritionFacts {
    /// Every numeric leaf with its JSON path, for range checks.
    pub fn numeric_leaves(&self) -> Vec<(&'static str, Option<f64>)> {
        let c = &self.carbohydrate;
        let f = &self.fat;
        vec![
            ("nutrition.Kcal", self.kcal),
            ("nutrition.carbohydrate.gram", c.gram),
            ("nutrition.carbohydrate.ratio", c.ratio),
            ("nutrition.carbohydrate.sub.sugar.gram", c.sub.sugar.gram),
            ("nutrition.carbohydrate.sub.sugar.ratio", c.sub.sugar.ratio),
            ("nutrition.carbohydrate.sub.fiber.gram", c.sub.fiber.gram),
            ("nutrition.carbohydrate.sub.fiber.ratio", c.sub.fiber.ratio),
            ("nutrition.protein.gram", self.protein.gram),
            ("nutrition.protein.ratio", self.protein.ratio),
            ("nutrition.fat.gram", f.gram),
            ("nutrition.fat.ratio", f.ratio),
            ("nutrition.fat.sub.saturatedFat.gram", f.sub.saturated_fat.gram),
            ("nutrition.fat.sub.saturatedFat.ratio", f.sub.saturated_fat.ratio),
            ("nutrition.fat.sub.transFat.gram", f.sub.trans_fat.gram),
            ("nutrition.fat.sub.transFat.ratio", f.sub.trans_fat.ratio),
            ("nutrition.fat.sub.unsaturatedFat.gram", f.sub.unsaturated_fat.gram),
            ("nutrition.fat.sub.unsaturatedFat.ratio", f.sub.unsaturated_fat.ratio),
            ("nutrition.sodium.mg", self.sodium.mg),
            ("nutrition.sodium.ratio", self.sodium.ratio),
            ("nutrition.cholesterol.mg", self.cholesterol.mg),
            ("nutrition.cholesterol.ratio", self.cholesterol.ratio),
        ]
    }
}

/// Amount in grams plus percentage of the daily reference value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GramAmount {
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub gram: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub ratio: Option<f64>,
}

/// Amount in milligrams plus percentage of the daily reference value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilligramAmount {
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub mg: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Carbohydrate {
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub gram: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub ratio: Option<f64>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub sub: CarbohydrateBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarbohydrateBreakdown {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub sugar: GramAmount,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub fiber: GramAmount,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fat {
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub gram: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub ratio: Option<f64>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub sub: FatBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FatBreakdown {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub saturated_fat: GramAmount,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub trans_fat: GramAmount,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub unsaturated_fat: GramAmount,
}

// ============ Persisted record ============

/// Merged result of both streams, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub product_name: String,
    pub ingredient_image_url: String,
    pub nutrition_image_url: String,
    pub ingredient_analysis: Analysis<IngredientAnalysis>,
    pub nutrition_analysis: Analysis<NutritionAnalysis>,
}

/// An [`AnalysisRecord`] as read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: AnalysisRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

mod de {
    use once_cell::sync::Lazy;
    use regex::Regex;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    static NUMBER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number pattern"));

    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64()),
            Value::String(s) => {
                let s = s.replace(',', "");
                Ok(NUMBER.find(&s).and_then(|m| m.as_str().parse::<f64>().ok()))
            }
            other => Err(D::Error::custom(format!(
                "expected a number, got {}",
                other
            ))),
        }
    }

    pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(D::Error::custom(format!(
                "expected a string, got {}",
                other
            ))),
        }
    }
}
