use super::{BackendHealth, GenerationBackend};
use crate::generation::{GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use foreman_core::{ForemanResult, TaskCategory};

const MODEL: &str = "local-rule-based";

/// Rule-based responder that needs no network.
///
/// It recognizes a handful of task categories by keyword and answers with a
/// fixed template per category. Output is deterministic, which makes this the
/// backend of choice for tests and the last link of a failover chain.
#[derive(Debug, Default, Clone)]
pub struct LocalBackend;

impl LocalBackend {
    /// Create the responder.
    pub fn new() -> Self {
        Self
    }

    /// Guess a category from the prompt text.
    pub fn detect_category(prompt: &str) -> TaskCategory {
        let lower = prompt.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has(&["код", "функция", "программа", "алгоритм", "code", "function", "program"]) {
            TaskCategory::CodeGeneration
        } else if has(&["стих", "поэзия", "творческий", "креативный", "poem", "story"]) {
            TaskCategory::Creative
        } else if has(&["переведи", "перевод", "translate"]) {
            TaskCategory::Translation
        } else if has(&["краткий", "резюме", "суть", "сократи", "summar"]) {
            TaskCategory::Summarization
        } else if has(&["текст", "анализ", "обработай", "text"]) {
            TaskCategory::TextProcessing
        } else {
            TaskCategory::General
        }
    }

    fn respond(prompt: &str, category: TaskCategory) -> String {
        match category {
            TaskCategory::CodeGeneration => {
                format!("def solution():\n    # Solution for: {prompt}\n    pass")
            }
            TaskCategory::Creative => format!("Creative response on the theme: {prompt}"),
            TaskCategory::Translation => format!("Translation: {prompt}"),
            TaskCategory::Summarization => format!("Summary: {prompt}"),
            TaskCategory::TextProcessing => format!("Processed text: {prompt}"),
            _ => format!("Answer: {prompt}"),
        }
    }
}

#[async_trait]
impl GenerationBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(&self, request: &GenerationRequest) -> ForemanResult<GenerationResponse> {
        let category = Self::detect_category(&request.prompt);
        Ok(GenerationResponse::ok(Self::respond(&request.prompt, category)).with_source("local", MODEL))
    }

    async fn health(&self) -> Vec<BackendHealth> {
        vec![BackendHealth::available("local", MODEL)]
    }
}
