//! System instructions sent to the language model.
//!
//! One instruction per label type. The ingredient instruction embeds the
//! configured [`CategoryVocabulary`] so the model sorts ingredients into the
//! same closed set that [`crate::schema`] later enforces.

use crate::models::DocumentKind;
use crate::schema::CategoryVocabulary;

const INGREDIENT_INSTRUCTION: &str = r#"당신은 식품 원재료 표시를 구조화하는 분석가입니다.
사용자가 보낸 원재료 텍스트를 읽고 아래 JSON 객체 하나만 출력하십시오. 설명, 마크다운, 코드 블록은 출력하지 않습니다.

규칙
1. basicInfo: name(제품명, 없으면 null), totalWeightGram(총 중량 g), packageGram(개별 포장 중량 g), packages(포장 개수). 알 수 없는 값은 null.
2. ingredientTree: 표시 순서대로 원재료를 나열합니다.
   - 괄호 안의 하위 원재료는 children 배열로 중첩합니다.
   - 함량 % 표시는 ratio(숫자)로 옮기고, 최상위 항목에만 order(1부터)를 붙입니다.
   - 괄호 안이 용도만 나타내면(예: 설탕(감미료)) children에 넣지 않습니다. 그 원재료는 categorizedIngredients의 해당 용도에 기록합니다.
   - 괄호 안에 용도와 실제 원재료가 함께 있으면(예: 에리스리톨(감미료/스테비아)) 용도는 버리고 원재료만 children에 넣습니다.
   - 용도 이름 자체는 어떤 경우에도 트리의 항목이 될 수 없습니다.
3. categorizedIngredients: 용도별 원재료 이름 배열. 사용할 수 있는 용도는 다음뿐입니다: {categories}. 어디에도 맞지 않으면 "{catch_all}"에 넣습니다.
4. giIndex: 원재료 순서와 함량으로 추정한 혈당지수. value(숫자)와 grade("안심", "주의", "위험" 중 하나).
5. summary: 원재료 구성의 영양학적 특징을 한 문장으로 요약합니다.

출력 형식
{
  "basicInfo": {"name": null, "totalWeightGram": null, "packageGram": null, "packages": null},
  "ingredientTree": [{"name": "", "ratio": null, "order": 1, "children": []}],
  "categorizedIngredients": {"<용도>": ["<원재료>"]},
  "giIndex": {"value": null, "grade": null},
  "summary": ""
}"#;

const NUTRITION_INSTRUCTION: &str = r#"당신은 식품 영양정보 표를 구조화하는 분석가입니다.
사용자가 보낸 영양정보 텍스트를 읽고 아래 JSON 객체 하나만 출력하십시오. 설명, 마크다운, 코드 블록은 출력하지 않습니다.

규칙
1. 모든 수치는 단위 없는 0 이상의 숫자로 적고, 표에 없으면 null로 둡니다.
2. gram과 mg은 함량, ratio는 1일 영양성분 기준치에 대한 비율(%)입니다.
3. summary: 제품의 영양학적 특징을 한 문장으로 요약합니다.

출력 형식
{
  "nutrition": {
    "Kcal": null,
    "carbohydrate": {"gram": null, "ratio": null, "sub": {"sugar": {"gram": null, "ratio": null}, "fiber": {"gram": null, "ratio": null}}},
    "protein": {"gram": null, "ratio": null},
    "fat": {"gram": null, "ratio": null, "sub": {"saturatedFat": {"gram": null, "ratio": null}, "transFat": {"gram": null, "ratio": null}, "unsaturatedFat": {"gram": null, "ratio": null}}},
    "sodium": {"mg": null, "ratio": null},
    "cholesterol": {"mg": null, "ratio": null}
  },
  "summary": ""
}"#;

/// Build the system instruction for a label type.
pub fn system_instruction(kind: DocumentKind, vocabulary: &CategoryVocabulary) -> String {
    match kind {
        DocumentKind::Ingredient => {
            let categories = vocabulary
                .categories()
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", ");
            INGREDIENT_INSTRUCTION
                .replace("{categories}", &categories)
                .replace("{catch_all}", vocabulary.catch_all().unwrap_or("기타"))
        }
        DocumentKind::Nutrition => NUTRITION_INSTRUCTION.to_string(),
    }
}

/// Wrap cleaned label text as the user message.
pub fn user_message(kind: DocumentKind, cleaned_text: &str) -> String {
    match kind {
        DocumentKind::Ingredient => format!("분석 대상 텍스트:\n{}", cleaned_text),
        DocumentKind::Nutrition => format!("영양정보 텍스트:\n{}", cleaned_text),
    }
}
