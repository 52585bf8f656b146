//! Rule-based cleanup of raw OCR text before it is sent to the model.
//!
//! OCR output from an ingredient label is mostly legal boilerplate around a
//! short ingredient list; output from a nutrition label is a whole table with
//! headers and footnotes. Both cleaners shrink the text down to the part the
//! model needs.
//!
//! Both functions are total and idempotent: cleaning already-cleaned text
//! returns it unchanged.
//!
//! # Example
//!
//! ```rust
//! use nutrilens_core::clean::clean_nutrition_text;
//!
//! let cleaned = clean_nutrition_text("열량 250kcal\n지방 10 g\n비고");
//! assert_eq!(cleaned, "열량 250kcal 지방 10g");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// Boilerplate found on Korean ingredient labels. Each pattern is removed
/// case-insensitively wherever it matches.
const INGREDIENT_BOILERPLATE: &[&str] = &[
    // packaging material and recycling marks
    r"포장\s*재질\s*[:：]?\s*[^\s,]+(?:\s*\([^)]*\))?",
    r"(?:내면|외면|뚜껑)\s*[:：]\s*[^\s,]+",
    r"분리\s*배출\s*[:：]?\s*[^\s,]*",
    // manufacturer / seller names and addresses
    r"(?:유통\s*전문\s*)?(?:제조원|판매원|제조사|판매사|제조업소|수입원|수입사|소재지|주소)\s*[:：]\s*\S+(?:\s+[^\s:：]+(?:시|도|구|군|읍|면|동|로|길|번지|층|호|\d+(?:-\d+)?))*",
    // regulatory hotline and "report to authority" notices
    r"부정\s*[·ㆍ.]?\s*불량\s*식품\s*신고는?\s*(?:국번\s*없이\s*)?(?:☎\s*)?(?:1399)?",
    r"(?:국번\s*없이\s*)?(?:☎\s*)?1399",
    // consumer dispute notice
    r"본\s*제품은\s*[^.]*?(?:교환|보상)\s*(?:받으실|받을)\s*수\s*있습니다\.?",
    r"소비자\s*(?:상담실|상담\s*센터|센터)\s*[:：]?",
    // urls and e-mail addresses
    r"(?:https?://|www\.)\S+",
    r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+",
    // phone and fax numbers
    r"(?:tel|fax|전화|팩스)\s*[:.]?\s*(?:\d{2,4}[-.)\s]\s*)?\d{3,4}[-.\s]\d{4}",
    r"\(?0\d{1,2}\)?[-.\s]?\d{3,4}[-.\s]\d{4}",
    r"1[5-9]\d{2}-\d{4}",
];

static INGREDIENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    INGREDIENT_BOILERPLATE
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("valid boilerplate pattern"))
        .collect()
});

/// Nutrient keywords that mark a nutrition-table row worth keeping.
/// Matched against lowercased text.
pub const NUTRIENT_KEYWORDS: &[&str] = &[
    "열량",
    "에너지",
    "나트륨",
    "탄수화물",
    "당류",
    "지방",
    "포화지방",
    "식이섬유",
    "트랜스지방",
    "콜레스테롤",
    "단백질",
    "energy",
    "calories",
    "sodium",
    "carbohydrate",
    "sugar",
    "fat",
    "saturated fat",
    "fiber",
    "fibre",
    "trans fat",
    "cholesterol",
    "protein",
];

/// Words that may precede a nutrient keyword as part of its name.
const NUTRIENT_MODIFIERS: &[&str] = &["total", "saturated", "trans", "dietary", "총"];

/// Unit tokens that may follow a nutrient amount on their own.
const NUTRIENT_UNITS: &[&str] = &[
    "g", "mg", "mcg", "μg", "kcal", "kj", "%", "gram", "grams", "milligram", "milligrams",
];

static INLINE_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\S\n]+").expect("inline whitespace pattern"));

static NUMBER_UNIT_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s+(mg|g|%)([^A-Za-z]|$)").expect("number unit pattern"));

/// Strip administrative boilerplate from ingredient-label OCR text.
///
/// Removes packaging notices, business names and addresses, hotline and
/// reporting notices, URLs, e-mail addresses and phone numbers, then
/// collapses the gaps left behind and trims. Removal repeats until nothing
/// more matches.
pub fn clean_ingredient_text(raw: &str) -> String {
    let mut text = strip_boilerplate(raw);
    loop {
        let next = strip_boilerplate(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}

fn strip_boilerplate(raw: &str) -> String {
    let mut text = raw.to_string();
    for pattern in INGREDIENT_PATTERNS.iter() {
        text = pattern.replace_all(&text, " ").into_owned();
    }
    let lines: Vec<String> = text
        .lines()
        .map(|line| INLINE_WHITESPACE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n")
}

/// Reduce nutrition-label OCR text to the rows naming a nutrient.
///
/// The text is lowercased and split into lines; lines without a nutrient
/// keyword are dropped. Within a surviving line only nutrient rows are
/// kept: a keyword token (with an optional modifier such as `total` in
/// front) followed by its amounts and units. Everything up to the next
/// keyword is dropped, so a table flattened onto one line loses its notes
/// as well. Rows are joined with single spaces. Finally, a number followed
/// by `%`, `g` or `mg` loses the space in between (`10 g` becomes `10g`).
pub fn clean_nutrition_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let kept: Vec<String> = lowered
        .lines()
        .filter(|line| has_keyword(line))
        .map(nutrient_rows)
        .filter(|rows| !rows.is_empty())
        .collect();
    let joined = kept.join(" ");
    NUMBER_UNIT_GAP.replace_all(&joined, "$1$2$3").into_owned()
}

fn has_keyword(text: &str) -> bool {
    NUTRIENT_KEYWORDS.iter().any(|k| text.contains(k))
}

/// A number, a unit, or a number with its unit attached (`250kcal`).
fn is_amount(token: &str) -> bool {
    let unit = token.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ',');
    unit.is_empty() || NUTRIENT_UNITS.contains(&unit)
}

fn nutrient_rows(line: &str) -> String {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut kept = Vec::with_capacity(tokens.len());
    let mut in_row = false;
    for (i, token) in tokens.iter().enumerate() {
        let keep = if has_keyword(token) {
            true
        } else if NUTRIENT_MODIFIERS.contains(token) {
            tokens.get(i + 1).is_some_and(|next| has_keyword(next))
        } else {
            in_row && is_amount(token)
        };
        in_row = keep;
        if keep {
            kept.push(*token);
        }
    }
    kept.join(" ")
}
