//! Combining the two stream results into one persisted record.

use crate::models::{
    Analysis, AnalysisRecord, IngredientAnalysis, LabelImages, NutritionAnalysis,
    UNKNOWN_PRODUCT,
};

/// Merge both analyses into the record stored for the product.
///
/// The product name comes from `basicInfo.name` of the ingredient analysis;
/// when that is missing, blank, or the ingredient stream degraded to the
/// sentinel, [`UNKNOWN_PRODUCT`] is used. The name is otherwise kept
/// exactly as the model returned it.
pub fn merge(
    images: &LabelImages,
    ingredient: Analysis<IngredientAnalysis>,
    nutrition: Analysis<NutritionAnalysis>,
) -> AnalysisRecord {
    AnalysisRecord {
        product_name: product_name(&ingredient),
        ingredient_image_url: images.ingredient_image_url.clone(),
        nutrition_image_url: images.nutrition_image_url.clone(),
        ingredient_analysis: ingredient,
        nutrition_analysis: nutrition,
    }
}

fn product_name(ingredient: &Analysis<IngredientAnalysis>) -> String {
    ingredient
        .parsed()
        .and_then(|a| a.basic_info.name.as_deref())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(UNKNOWN_PRODUCT)
        .to_string()
}
