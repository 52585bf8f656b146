//! Parse-then-validate for language-model responses.
//!
//! The model is instructed to answer with bare JSON, but responses drift:
//! code fences, a sentence of preamble, missing keys, strings where numbers
//! belong. Each response goes through the same steps:
//!
//! 1. **Repair**: cut the content down to its outermost `{ ... }` object.
//! 2. **Parse**: the slice must be valid JSON.
//! 3. **Required keys**: every top-level key of the schema must be present.
//! 4. **Typed decode**: the object must deserialize into the schema type.
//! 5. **Range check**: numeric leaves must be non-negative.
//! 6. **Normalize** (ingredient labels only): purpose annotations are moved
//!    out of the ingredient tree into `categorizedIngredients`.
//!
//! Any failure is a [`SchemaError`]. Callers convert it into the sentinel
//! [`Analysis::Invalid`](crate::models::Analysis) rather than failing the
//! request.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::models::{DocumentKind, IngredientAnalysis, IngredientNode, NutritionAnalysis};

/// Top-level keys an ingredient response must carry.
pub const INGREDIENT_REQUIRED_KEYS: &[&str] = &[
    "basicInfo",
    "ingredientTree",
    "categorizedIngredients",
    "summary",
];

/// Top-level keys a nutrition response must carry.
pub const NUTRITION_REQUIRED_KEYS: &[&str] = &["nutrition", "summary"];

/// Ingredient categories used when none are configured.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "감미료",
    "산도조절제",
    "유화제",
    "점질제",
    "착향료",
    "착색료",
    "보존제",
    "산화방지제",
    "팽창제",
    "염류",
    "보충제",
    "기타",
];

/// A model response that does not satisfy the expected schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("{kind} response is missing required key '{key}'")]
    MissingKey {
        kind: DocumentKind,
        key: &'static str,
    },

    #[error("{kind} response does not match the schema: {source}")]
    Mismatch {
        kind: DocumentKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("negative value {value} at {path}")]
    NegativeValue { path: String, value: f64 },
}

// ============ Category vocabulary ============

/// The closed set of purpose categories ingredients are sorted into.
///
/// The last entry is the catch-all: categories returned by the model that
/// are not in the vocabulary are folded into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryVocabulary {
    categories: Vec<String>,
}

impl CategoryVocabulary {
    /// Build a vocabulary, dropping blank and duplicate entries.
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for c in categories {
            let c = c.into().trim().to_string();
            if !c.is_empty() && !unique.contains(&c) {
                unique.push(c);
            }
        }
        Self { categories: unique }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c == name.trim())
    }

    /// Category that unknown categories are folded into.
    pub fn catch_all(&self) -> Option<&str> {
        self.categories.last().map(String::as_str)
    }

    /// Classify the text of a parenthetical entry.
    fn classify(&self, text: &str) -> Annotation {
        let text = text.trim();
        if self.contains(text) {
            return Annotation::Purpose(text.to_string());
        }

        let mut parts: Vec<&str> = text
            .split(['/', ':', '：'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() == 1 {
            if let Some((head, rest)) = text.split_once(char::is_whitespace) {
                if self.contains(head) {
                    parts = vec![head, rest.trim()];
                }
            }
        }

        let category = parts.iter().find(|p| self.contains(p));
        let ingredients: Vec<String> = parts
            .iter()
            .filter(|p| !self.contains(p))
            .map(|p| p.to_string())
            .collect();
        match category {
            Some(category) if !ingredients.is_empty() => Annotation::Qualified {
                category: category.to_string(),
                ingredients,
            },
            _ => Annotation::Plain,
        }
    }
}

impl Default for CategoryVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORIES.iter().copied())
    }
}

enum Annotation {
    /// Only a purpose, e.g. `감미료`.
    Purpose(String),
    /// A purpose naming concrete ingredients, e.g. `감미료/스테비아`.
    Qualified {
        category: String,
        ingredients: Vec<String>,
    },
    /// An ordinary ingredient name.
    Plain,
}

// ============ Parsing ============

/// Cut a response down to its outermost JSON object.
///
/// Handles markdown code fences and prose around the object. Returns `None`
/// when there is no `{ ... }` span at all.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

fn parse_checked<T: DeserializeOwned>(
    content: &str,
    kind: DocumentKind,
    required: &'static [&'static str],
) -> Result<T, SchemaError> {
    let slice = extract_json_object(content).ok_or(SchemaError::NoJsonObject)?;
    let value: Value = serde_json::from_str(slice).map_err(SchemaError::InvalidJson)?;

    let object = value.as_object().ok_or(SchemaError::NoJsonObject)?;
    if let Some(&key) = required.iter().find(|k| !object.contains_key(**k)) {
        return Err(SchemaError::MissingKey { kind, key });
    }

    serde_json::from_value(value).map_err(|source| SchemaError::Mismatch { kind, source })
}

fn check_non_negative(
    leaves: impl IntoIterator<Item = (String, Option<f64>)>,
) -> Result<(), SchemaError> {
    for (path, value) in leaves {
        if let Some(v) = value {
            if v < 0.0 {
                return Err(SchemaError::NegativeValue { path, value: v });
            }
        }
    }
    Ok(())
}

/// Parse and validate an ingredient-label response.
pub fn parse_ingredient(
    content: &str,
    vocabulary: &CategoryVocabulary,
) -> Result<IngredientAnalysis, SchemaError> {
    let mut analysis: IngredientAnalysis =
        parse_checked(content, DocumentKind::Ingredient, INGREDIENT_REQUIRED_KEYS)?;

    let info = &analysis.basic_info;
    let mut leaves = vec![
        ("basicInfo.totalWeightGram".to_string(), info.total_weight_gram),
        ("basicInfo.packageGram".to_string(), info.package_gram),
        ("basicInfo.packages".to_string(), info.packages),
    ];
    if let Some(gi) = &analysis.gi_index {
        leaves.push(("giIndex.value".to_string(), gi.value));
    }
    collect_tree_leaves(&analysis.ingredient_tree, "ingredientTree", &mut leaves);
    check_non_negative(leaves)?;

    normalize_ingredient(&mut analysis, vocabulary);
    Ok(analysis)
}

/// Parse and validate a nutrition-label response.
pub fn parse_nutrition(content: &str) -> Result<NutritionAnalysis, SchemaError> {
    let analysis: NutritionAnalysis =
        parse_checked(content, DocumentKind::Nutrition, NUTRITION_REQUIRED_KEYS)?;
    check_non_negative(
        analysis
            .nutrition
            .numeric_leaves()
            .into_iter()
            .map(|(path, v)| (path.to_string(), v)),
    )?;
    Ok(analysis)
}

fn collect_tree_leaves(
    nodes: &[IngredientNode],
    prefix: &str,
    out: &mut Vec<(String, Option<f64>)>,
) {
    for (i, node) in nodes.iter().enumerate() {
        let path = format!("{}[{}]", prefix, i);
        out.push((format!("{}.ratio", path), node.ratio));
        out.push((format!("{}.order", path), node.order));
        collect_tree_leaves(&node.children, &format!("{}.children", path), out);
    }
}

// ============ Normalization ============

/// Enforce the parenthetical rules on a parsed ingredient analysis.
///
/// - A node whose name is only a category (`설탕(감미료)` → child `감미료`)
///   is removed; its parent is recorded under that category.
/// - A node naming a category and ingredients (`감미료/스테비아`) is replaced
///   by the ingredients, which are also recorded under the category.
/// - Categories outside the vocabulary are folded into the catch-all, and
///   duplicate or blank names are dropped from every category.
pub fn normalize_ingredient(analysis: &mut IngredientAnalysis, vocabulary: &CategoryVocabulary) {
    let mut categorized: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (category, names) in std::mem::take(&mut analysis.categorized_ingredients) {
        let target = if vocabulary.contains(&category) {
            category.trim().to_string()
        } else {
            match vocabulary.catch_all() {
                Some(c) => c.to_string(),
                None => category.trim().to_string(),
            }
        };
        for name in names {
            if !vocabulary.contains(&name) {
                record(&mut categorized, &target, &name);
            }
        }
    }

    let tree = std::mem::take(&mut analysis.ingredient_tree);
    analysis.ingredient_tree = normalize_nodes(None, tree, vocabulary, &mut categorized);
    categorized.retain(|_, names| !names.is_empty());
    analysis.categorized_ingredients = categorized;
}

fn record(categorized: &mut BTreeMap<String, Vec<String>>, category: &str, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    let names = categorized.entry(category.to_string()).or_default();
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// Normalize `nodes`, the children of `parent` (`None` at the top level).
fn normalize_nodes(
    parent: Option<&str>,
    nodes: Vec<IngredientNode>,
    vocabulary: &CategoryVocabulary,
    categorized: &mut BTreeMap<String, Vec<String>>,
) -> Vec<IngredientNode> {
    let mut kept = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        match vocabulary.classify(&node.name) {
            Annotation::Purpose(category) => {
                if node.children.is_empty() {
                    // a leaf category annotates the ingredient it hangs under
                    if let Some(parent) = parent {
                        record(categorized, &category, parent);
                    }
                    continue;
                }
                // a category with children groups them
                let children = normalize_nodes(parent, node.children, vocabulary, categorized);
                for child in &children {
                    record(categorized, &category, &child.name);
                }
                kept.extend(children);
            }
            Annotation::Qualified {
                category,
                ingredients,
            } => {
                let single = ingredients.len() == 1;
                for name in ingredients {
                    record(categorized, &category, &name);
                    kept.push(IngredientNode {
                        name,
                        ratio: if single { node.ratio } else { None },
                        order: if single { node.order } else { None },
                        children: Vec::new(),
                    });
                }
                kept.extend(normalize_nodes(parent, node.children, vocabulary, categorized));
            }
            Annotation::Plain => {
                let children = std::mem::take(&mut node.children);
                node.name = node.name.trim().to_string();
                node.children =
                    normalize_nodes(Some(&node.name), children, vocabulary, categorized);
                kept.push(node);
            }
        }
    }
    kept
}
