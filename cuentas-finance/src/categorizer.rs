//! Batch categorization: keyword rules first, one model call for the rest.
//!
//! `classify_batch` never fails. Anything the rules and the model cannot
//! place, including every text of a failed model call, comes back as
//! [`UNCATEGORIZED`].

use cuentas_core::UNCATEGORIZED;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::category_rules::CategoryRuleset;
use crate::response::parse_assignments;

/// Descriptions that carry no merchant information (compared trimmed,
/// case-insensitively).
pub const NO_INFO_PHRASES: &[&str] = &[
    "sin descripcion",
    "sin descripción",
    "no description",
    "n/a",
    "na",
    "none",
    "-",
];

const TOKENS_PER_TEXT: u32 = 64;
const BASE_OUTPUT_TOKENS: u32 = 256;
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Source text → category name
pub type CategoryAssignments = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    /// Deterministic sampling with room for `n` JSON entries.
    pub fn for_batch(n: usize) -> Self {
        let n = u32::try_from(n).unwrap_or(u32::MAX);
        let budget = n
            .saturating_mul(TOKENS_PER_TEXT)
            .saturating_add(BASE_OUTPUT_TOKENS)
            .min(MAX_OUTPUT_TOKENS);
        Self {
            temperature: 0.0,
            max_output_tokens: budget,
        }
    }
}

/// Model answer. `text` is `None` when the provider blocked the prompt or
/// returned no candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
}

impl ModelResponse {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn blocked() -> Self {
        Self { text: None }
    }

    /// Non-blank answer text, if any
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Text-generation backend used for texts no keyword rule covers.
pub trait ModelClient {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> anyhow::Result<ModelResponse>;
}

impl<T: ModelClient + ?Sized> ModelClient for &T {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> anyhow::Result<ModelResponse> {
        (**self).generate(prompt, config)
    }
}

impl<T: ModelClient + ?Sized> ModelClient for Box<T> {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> anyhow::Result<ModelResponse> {
        (**self).generate(prompt, config)
    }
}

pub fn is_no_info(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    t.is_empty() || NO_INFO_PHRASES.contains(&t.as_str())
}

/// Prompt asking for a JSON object mapping each description to one
/// category of the vocabulary.
pub fn build_batch_prompt(texts: &[String], categories: &[String]) -> String {
    let vocabulary = categories
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    let descriptions = texts
        .iter()
        .map(|t| format!("- {}", serde_json::Value::String(t.clone())))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You categorize household bank transactions from Costa Rica.\n\
         Assign each description below to exactly ONE category from this list:\n\
         {vocabulary}\n\n\
         If you are less than 80% confident about a description, answer \"{UNCATEGORIZED}\" for it.\n\n\
         Descriptions:\n\
         {descriptions}\n\n\
         Reply with ONLY a JSON object whose keys are the descriptions exactly as written \
         and whose values are category names. No explanations."
    )
}

pub struct Categorizer<C> {
    ruleset: CategoryRuleset,
    client: C,
}

impl<C: ModelClient> Categorizer<C> {
    pub fn new(ruleset: CategoryRuleset, client: C) -> Self {
        Self { ruleset, client }
    }

    pub fn ruleset(&self) -> &CategoryRuleset {
        &self.ruleset
    }

    /// One assignment per distinct input text. At most one model call.
    pub fn classify_batch<S: AsRef<str>>(&self, texts: &[S]) -> CategoryAssignments {
        let mut assignments = CategoryAssignments::new();
        let mut pending: Vec<String> = Vec::new();

        for text in texts {
            let text = text.as_ref();
            if assignments.contains_key(text) || pending.iter().any(|p| p == text) {
                continue;
            }
            if is_no_info(text) {
                assignments.insert(text.to_string(), UNCATEGORIZED.to_string());
            } else if let Some(category) = self.ruleset.match_keyword(text) {
                debug!(text = %text, category = %category, "keyword match");
                assignments.insert(text.to_string(), category.to_string());
            } else {
                pending.push(text.to_string());
            }
        }

        info!(
            count = assignments.len() + pending.len(),
            by_rules = assignments.len(),
            for_model = pending.len(),
            "categorizing batch"
        );

        if !pending.is_empty() {
            assignments.extend(self.ask_model(&pending));
        }
        assignments
    }

    fn ask_model(&self, pending: &[String]) -> CategoryAssignments {
        let uncategorized = || {
            pending
                .iter()
                .map(|t| (t.clone(), UNCATEGORIZED.to_string()))
                .collect::<CategoryAssignments>()
        };

        let prompt = build_batch_prompt(pending, self.ruleset.categories());
        let config = GenerationConfig::for_batch(pending.len());

        let response = match self.client.generate(&prompt, &config) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, count = pending.len(), "model call failed, leaving batch uncategorized");
                return uncategorized();
            }
        };
        let Some(answer) = response.content() else {
            warn!(count = pending.len(), "model returned no text, leaving batch uncategorized");
            return uncategorized();
        };

        let raw = parse_assignments(answer);
        pending
            .iter()
            .map(|text| {
                let category = match lookup(&raw, text) {
                    Some(value) => self.resolve(text, value),
                    None => {
                        warn!(text = %text, "model answer has no entry for description");
                        UNCATEGORIZED.to_string()
                    }
                };
                (text.clone(), category)
            })
            .collect()
    }

    fn resolve(&self, text: &str, value: &str) -> String {
        if value.trim().eq_ignore_ascii_case(UNCATEGORIZED) {
            return UNCATEGORIZED.to_string();
        }
        match self.ruleset.reconcile(value) {
            Some(category) => {
                if category != value.trim() {
                    debug!(text = %text, raw = %value, category = %category, "reconciled model category");
                }
                category.to_string()
            }
            None => {
                warn!(text = %text, raw = %value, "model category not in vocabulary");
                UNCATEGORIZED.to_string()
            }
        }
    }
}

/// Exact key first, then a key equal up to surrounding whitespace and case.
fn lookup<'a>(raw: &'a BTreeMap<String, String>, text: &str) -> Option<&'a str> {
    if let Some(v) = raw.get(text) {
        return Some(v);
    }
    let wanted = text.trim().to_lowercase();
    raw.iter()
        .find(|(k, _)| k.trim().to_lowercase() == wanted)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;

    struct FakeModel {
        answer: String,
        prompts: RefCell<Vec<(String, GenerationConfig)>>,
    }

    impl FakeModel {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.borrow().len()
        }
    }

    impl ModelClient for FakeModel {
        fn generate(&self, prompt: &str, config: &GenerationConfig) -> anyhow::Result<ModelResponse> {
            self.prompts.borrow_mut().push((prompt.to_string(), *config));
            Ok(ModelResponse::with_text(self.answer.clone()))
        }
    }

    struct FailingModel;

    impl ModelClient for FailingModel {
        fn generate(&self, _: &str, _: &GenerationConfig) -> anyhow::Result<ModelResponse> {
            Err(anyhow!("API Error"))
        }
    }

    struct BlockedModel;

    impl ModelClient for BlockedModel {
        fn generate(&self, _: &str, _: &GenerationConfig) -> anyhow::Result<ModelResponse> {
            Ok(ModelResponse::blocked())
        }
    }

    fn categorizer<C: ModelClient>(client: C) -> Categorizer<C> {
        Categorizer::new(CategoryRuleset::bundled().unwrap(), client)
    }

    #[test]
    fn test_mixed_batch_single_call() {
        let model = FakeModel::new(r#"{"Unknown Store": "Domicilios/restaurantes"}"#);
        let c = categorizer(&model);
        let out = c.classify_batch(&["UBER", "Unknown Store", ""]);

        assert_eq!(out.len(), 3);
        assert_eq!(out["UBER"], "Transporte UBER");
        assert_eq!(out["Unknown Store"], "Domicilios/restaurantes");
        assert_eq!(out[""], UNCATEGORIZED);
        assert_eq!(model.calls(), 1);

        let prompts = model.prompts.borrow();
        let (prompt, config) = &prompts[0];
        assert!(prompt.contains("\"Unknown Store\""));
        assert!(!prompt.contains("\"UBER\""));
        assert!(prompt.contains("80%"));
        assert!(prompt.contains("- Plan funerario"));
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_output_tokens, 64 + 256);
    }

    #[test]
    fn test_only_unmatched_text_reaches_prompt() {
        let model = FakeModel::new(r#"{"Unknown Merchant": "Uncategorized"}"#);
        let out = categorizer(&model).classify_batch(&["UBER", "Unknown Merchant"]);
        assert_eq!(out["UBER"], "Transporte UBER");
        assert_eq!(out["Unknown Merchant"], UNCATEGORIZED);
        assert_eq!(model.calls(), 1);
        let prompts = model.prompts.borrow();
        let descriptions = prompts[0].0.split("Descriptions:").nth(1).unwrap();
        assert!(descriptions.contains("\"Unknown Merchant\""));
        assert!(!descriptions.contains("UBER"));
    }

    #[test]
    fn test_model_error_leaves_batch_uncategorized() {
        let c = categorizer(FailingModel);
        let out = c.classify_batch(&["Store A", "Store B"]);
        assert_eq!(out.len(), 2);
        assert!(out.values().all(|v| v == UNCATEGORIZED));
    }

    #[test]
    fn test_blocked_response_leaves_batch_uncategorized() {
        let c = categorizer(BlockedModel);
        let out = c.classify_batch(&["Test Store"]);
        assert_eq!(out["Test Store"], UNCATEGORIZED);

        let empty = FakeModel::new("   ");
        let out = categorizer(&empty).classify_batch(&["Test Store"]);
        assert_eq!(out["Test Store"], UNCATEGORIZED);
    }

    #[test]
    fn test_fuzzy_category_is_reconciled() {
        let model = FakeModel::new(r#"{"Some Store": "mercado"}"#);
        let out = categorizer(&model).classify_batch(&["Some Store"]);
        assert_eq!(out["Some Store"], "Mercado (alimentos, aseo hogar)");
    }

    #[test]
    fn test_unknown_category_becomes_uncategorized() {
        let model = FakeModel::new(r#"{"Store": "NonExistentCategory123"}"#);
        let out = categorizer(&model).classify_batch(&["Store"]);
        assert_eq!(out["Store"], UNCATEGORIZED);
    }

    #[test]
    fn test_literal_uncategorized_is_kept() {
        let model = FakeModel::new(r#"{"Store": "uncategorized"}"#);
        let out = categorizer(&model).classify_batch(&["Store"]);
        assert_eq!(out["Store"], UNCATEGORIZED);
    }

    #[test]
    fn test_truncated_answer_recovers_complete_pairs() {
        let model = FakeModel::new(
            r#"```json
{"Complete Store": "Mercado (alimentos, aseo hogar)", "Incomplete": "Dom"#,
        );
        let out = categorizer(&model).classify_batch(&["Complete Store", "Incomplete"]);
        assert_eq!(out["Complete Store"], "Mercado (alimentos, aseo hogar)");
        assert_eq!(out["Incomplete"], UNCATEGORIZED);
    }

    #[test]
    fn test_fenced_answer() {
        let model = FakeModel::new("```json\n{\"Restaurant B\": \"Diversión\"}\n```");
        // keyword rule wins before the model is consulted
        let out = categorizer(&model).classify_batch(&["Restaurant B", "Cine Magaly"]);
        assert_eq!(out["Restaurant B"], "Domicilios/restaurantes");
        assert_eq!(out["Cine Magaly"], UNCATEGORIZED);

        let model = FakeModel::new("```json\n{\"Cine Magaly\": \"Diversión\"}\n```");
        let out = categorizer(&model).classify_batch(&["Cine Magaly"]);
        assert_eq!(out["Cine Magaly"], "Diversión");
    }

    #[test]
    fn test_keys_matched_ignoring_case_and_whitespace() {
        let model = FakeModel::new(r#"{" cine magaly ": "Diversión"}"#);
        let out = categorizer(&model).classify_batch(&["Cine Magaly"]);
        assert_eq!(out["Cine Magaly"], "Diversión");
    }

    #[test]
    fn test_rules_and_no_info_make_zero_calls() {
        let model = FakeModel::new("{}");
        let out = categorizer(&model).classify_batch(&["MXM Curridabat", "N/A", "  ", "Sin descripción"]);
        assert_eq!(out.len(), 4);
        assert_eq!(out["MXM Curridabat"], "Mercado (alimentos, aseo hogar)");
        assert_eq!(out["N/A"], UNCATEGORIZED);
        assert_eq!(model.calls(), 0);

        let empty: [&str; 0] = [];
        assert!(categorizer(&model).classify_batch(&empty).is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_duplicates_share_one_assignment() {
        let model = FakeModel::new(r#"{"Cine Magaly": "Diversión"}"#);
        let c = categorizer(&model);
        let single = c.classify_batch(&["Cine Magaly"]);
        let double = c.classify_batch(&["Cine Magaly", "Cine Magaly"]);
        assert_eq!(double.len(), 1);
        assert_eq!(single["Cine Magaly"], double["Cine Magaly"]);

        // one description per prompt even when duplicated
        let prompts = model.prompts.borrow();
        assert_eq!(prompts[1].0.matches("\"Cine Magaly\"").count(), 1);
    }

    #[test]
    fn test_generation_budget_is_capped() {
        assert_eq!(GenerationConfig::for_batch(0).max_output_tokens, 256);
        assert_eq!(GenerationConfig::for_batch(10).max_output_tokens, 896);
        assert_eq!(GenerationConfig::for_batch(1000).max_output_tokens, 8192);
    }

    #[test]
    fn test_no_info_phrases() {
        assert!(is_no_info(""));
        assert!(is_no_info(" NONE "));
        assert!(is_no_info("-"));
        assert!(!is_no_info("Nana's"));
    }
}
