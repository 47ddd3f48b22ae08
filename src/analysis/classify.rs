//! Keyword-based project categorization.

use crate::models::ProjectDescriptor;
use std::collections::BTreeMap;

pub const OTHER_CATEGORY: &str = "Other";

/// Built-in rules, checked in order; the first match wins.
const BUILTIN_RULES: &[(&str, &[&str])] = &[
    (
        "Agent",
        &["agent", "agents", "multi-agent", "autonomous", "autogpt", "autogen", "crewai"],
    ),
    (
        "RAG & Vector DB",
        &[
            "rag",
            "retrieval",
            "retrieval-augmented-generation",
            "vector database",
            "vector db",
            "vector search",
            "embedding",
            "embeddings",
        ],
    ),
    (
        "Inference & Serving",
        &["inference", "serving", "quantization", "gguf", "vllm", "tensorrt", "onnx"],
    ),
    (
        "Fine-tuning & Training",
        &["fine-tuning", "finetuning", "fine tuning", "lora", "peft", "rlhf", "training"],
    ),
    (
        "LLM Framework",
        &["langchain", "llamaindex", "framework", "sdk", "orchestration", "prompt-engineering"],
    ),
    (
        "Developer Tooling",
        &["copilot", "code-generation", "devtools", "cli", "ide", "vscode"],
    ),
    (
        "Model",
        &["model", "models", "pretrained", "foundation-model", "transformer", "transformers", "weights"],
    ),
];

/// Ordered keyword rules mapping a project to a category.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<(String, Vec<Vec<String>>)>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::with_extra(&BTreeMap::new())
    }
}

impl CategoryRules {
    /// Built-in rules, preceded by `extra` rules (which therefore win).
    pub fn with_extra(extra: &BTreeMap<String, Vec<String>>) -> Self {
        let extra_rules = extra
            .iter()
            .map(|(category, keywords)| {
                (
                    category.clone(),
                    keywords.iter().map(|k| tokenize(k)).collect::<Vec<_>>(),
                )
            });

        let builtin = BUILTIN_RULES.iter().map(|(category, keywords)| {
            (
                category.to_string(),
                keywords.iter().map(|k| tokenize(k)).collect::<Vec<_>>(),
            )
        });

        let rules = extra_rules
            .chain(builtin)
            .map(|(category, phrases): (String, Vec<Vec<String>>)| {
                (category, phrases.into_iter().filter(|p| !p.is_empty()).collect())
            })
            .collect();

        Self { rules }
    }

    /// Categorize from topics, then description and repository name.
    ///
    /// Topics are matched first so an explicit `rag` topic beats a
    /// description that merely mentions agents.
    pub fn classify(&self, project: &ProjectDescriptor) -> String {
        let topic_tokens: Vec<String> = project.topics.iter().flat_map(|t| tokenize(t)).collect();
        if let Some(category) = self.first_match(&topic_tokens) {
            return category;
        }

        let mut text = project.description.clone().unwrap_or_default();
        text.push(' ');
        text.push_str(&project.repo_name);
        self.first_match(&tokenize(&text))
            .unwrap_or_else(|| OTHER_CATEGORY.to_string())
    }

    fn first_match(&self, tokens: &[String]) -> Option<String> {
        if tokens.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|phrase| contains_phrase(tokens, phrase)))
            .map(|(category, _)| category.clone())
    }
}

/// Lowercase alphanumeric tokens; `-`, `_`, `.` and whitespace separate.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return false;
    }
    tokens.windows(phrase.len()).any(|w| w == phrase)
}
