use crate::types::{Capability, GenerationParams, TaskAnalysis, WorkerSpec};
use foreman_core::{Archetype, ForemanError, ForemanResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Display name of the worker synthesized when a regular one cannot be built.
pub const FALLBACK_WORKER_NAME: &str = "Fallback Worker";

/// Partial generation parameters that replace an archetype's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverride {
    /// Model to request.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Token limit.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling cutoff.
    pub top_p: Option<f32>,
}

/// Builds worker specifications from a fixed per-archetype table.
///
/// The capability set and generation profile depend only on the archetype
/// (and on configured overrides), never on the analysis.
#[derive(Debug, Clone, Default)]
pub struct WorkerProfileFactory {
    overrides: HashMap<Archetype, ProfileOverride>,
}

impl WorkerProfileFactory {
    /// Factory with the built-in profiles only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose generation profiles are patched by `overrides`.
    pub fn with_overrides(overrides: HashMap<Archetype, ProfileOverride>) -> Self {
        Self { overrides }
    }

    /// Build the spec for `archetype`. The analysis only contributes a
    /// closing instruction naming its success criteria.
    pub fn build(&self, archetype: Archetype, analysis: &TaskAnalysis) -> WorkerSpec {
        let mut instructions: Vec<String> = operating_principles(archetype)
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        if !analysis.success_criteria.is_empty() {
            instructions.push(format!(
                "Judge your answer by: {}",
                analysis.success_criteria.join(", ")
            ));
        }

        WorkerSpec {
            name: archetype.display_name().to_string(),
            archetype,
            capabilities: capabilities(archetype),
            instructions,
            generation: self.generation_params(archetype),
        }
    }

    /// Like [`Self::build`] for an archetype given by name; unknown names
    /// build a `general` worker.
    pub fn build_named(&self, archetype: &str, analysis: &TaskAnalysis) -> WorkerSpec {
        let parsed = archetype.parse().unwrap_or_else(|_| {
            debug!(archetype, "Unknown archetype, using general");
            Archetype::General
        });
        self.build(parsed, analysis)
    }

    /// [`Self::build`] followed by [`validate_spec`].
    pub fn build_validated(
        &self,
        archetype: Archetype,
        analysis: &TaskAnalysis,
    ) -> ForemanResult<WorkerSpec> {
        let spec = self.build(archetype, analysis);
        validate_spec(&spec)?;
        Ok(spec)
    }

    /// Default generation parameters for `archetype` with overrides applied.
    pub fn generation_params(&self, archetype: Archetype) -> GenerationParams {
        let mut params = base_generation_params(archetype);
        if let Some(o) = self.overrides.get(&archetype) {
            if o.model.is_some() {
                params.model.clone_from(&o.model);
            }
            if let Some(t) = o.temperature {
                params.temperature = t;
            }
            if let Some(m) = o.max_tokens {
                params.max_tokens = m;
            }
            if let Some(p) = o.top_p {
                params.top_p = p;
            }
        }
        params
    }

    /// Minimal general worker with reduced capability levels.
    pub fn fallback_spec() -> WorkerSpec {
        WorkerSpec {
            name: FALLBACK_WORKER_NAME.to_string(),
            archetype: Archetype::General,
            capabilities: vec![
                Capability::new("general_reasoning", 0.7, "General reasoning"),
                Capability::new("text_processing", 0.6, "Basic text handling"),
            ],
            instructions: vec!["Answer the task as directly as possible.".to_string()],
            generation: GenerationParams {
                model: None,
                temperature: 0.7,
                max_tokens: 1000,
                top_p: 0.9,
            },
        }
    }
}

/// Reject specs the generation backend could not honour.
pub fn validate_spec(spec: &WorkerSpec) -> ForemanResult<()> {
    let g = &spec.generation;
    if !(0.0..=2.0).contains(&g.temperature) {
        return Err(ForemanError::Worker(format!(
            "{}: temperature {} outside [0, 2]",
            spec.archetype, g.temperature
        )));
    }
    if !(g.top_p > 0.0 && g.top_p <= 1.0) {
        return Err(ForemanError::Worker(format!(
            "{}: top_p {} outside (0, 1]",
            spec.archetype, g.top_p
        )));
    }
    if g.max_tokens == 0 {
        return Err(ForemanError::Worker(format!(
            "{}: max_tokens must be positive",
            spec.archetype
        )));
    }
    if let Some(c) = spec
        .capabilities
        .iter()
        .find(|c| !(0.0..=1.0).contains(&c.level))
    {
        return Err(ForemanError::Worker(format!(
            "{}: capability {} level {} outside [0, 1]",
            spec.archetype, c.name, c.level
        )));
    }
    Ok(())
}

fn base_generation_params(archetype: Archetype) -> GenerationParams {
    let (temperature, max_tokens, top_p) = match archetype {
        Archetype::General => (0.7, 1500, 0.9),
        Archetype::TextProcessor => (0.5, 2000, 0.8),
        Archetype::CodeGenerator => (0.3, 2000, 0.7),
        Archetype::DataAnalyst => (0.4, 2000, 0.8),
        Archetype::CreativeWriter => (0.9, 2000, 0.95),
        Archetype::Researcher => (0.4, 2500, 0.8),
        Archetype::Translator => (0.3, 2000, 0.8),
        Archetype::Summarizer => (0.4, 1500, 0.8),
    };
    GenerationParams {
        model: None,
        temperature,
        max_tokens,
        top_p,
    }
}

/// Base capabilities plus the archetype's own.
pub fn capabilities(archetype: Archetype) -> Vec<Capability> {
    let mut caps = vec![
        Capability::new("general_reasoning", 0.8, "General reasoning"),
        Capability::new("text_understanding", 0.9, "Understanding text"),
        Capability::new("problem_solving", 0.7, "Problem solving"),
    ];

    let extra: &[(&str, f64, &str)] = match archetype {
        Archetype::General => &[],
        Archetype::TextProcessor => &[
            ("text_analysis", 0.9, "Text analysis"),
            ("language_processing", 0.8, "Language processing"),
            ("writing", 0.8, "Writing"),
            ("editing", 0.7, "Editing"),
        ],
        Archetype::CodeGenerator => &[
            ("programming", 0.9, "Programming"),
            ("logic", 0.8, "Logical thinking"),
            ("algorithm_design", 0.8, "Algorithm design"),
            ("debugging", 0.7, "Debugging"),
        ],
        Archetype::DataAnalyst => &[
            ("data_processing", 0.9, "Data processing"),
            ("statistics", 0.8, "Statistical analysis"),
            ("visualization", 0.7, "Data visualization"),
            ("pattern_recognition", 0.8, "Pattern recognition"),
        ],
        Archetype::CreativeWriter => &[
            ("creativity", 0.9, "Creative thinking"),
            ("storytelling", 0.8, "Storytelling"),
            ("imagination", 0.9, "Imagination"),
            ("emotional_intelligence", 0.7, "Emotional intelligence"),
        ],
        Archetype::Researcher => &[
            ("information_retrieval", 0.9, "Information retrieval"),
            ("analysis", 0.8, "Analysis"),
            ("synthesis", 0.8, "Synthesis"),
            ("critical_thinking", 0.8, "Critical thinking"),
        ],
        Archetype::Translator => &[
            ("language_translation", 0.9, "Translation"),
            ("cultural_understanding", 0.8, "Cultural understanding"),
            ("context_analysis", 0.8, "Context analysis"),
            ("linguistics", 0.7, "Linguistics"),
        ],
        Archetype::Summarizer => &[
            ("text_compression", 0.9, "Text compression"),
            ("key_point_extraction", 0.8, "Key point extraction"),
            ("information_synthesis", 0.8, "Information synthesis"),
            ("clarity", 0.8, "Clear writing"),
        ],
    };

    caps.extend(
        extra
            .iter()
            .map(|(name, level, description)| Capability::new(*name, *level, *description)),
    );
    caps
}

fn operating_principles(archetype: Archetype) -> &'static [&'static str] {
    match archetype {
        Archetype::General => GENERAL_PRINCIPLES,
        Archetype::TextProcessor => TEXT_PRINCIPLES,
        Archetype::CodeGenerator => CODE_PRINCIPLES,
        Archetype::DataAnalyst => DATA_PRINCIPLES,
        Archetype::CreativeWriter => CREATIVE_PRINCIPLES,
        Archetype::Researcher => RESEARCH_PRINCIPLES,
        Archetype::Translator => TRANSLATION_PRINCIPLES,
        Archetype::Summarizer => SUMMARY_PRINCIPLES,
    }
}

const GENERAL_PRINCIPLES: &[&str] = &[
    "Analyze the task before answering.",
    "Give structured, useful answers.",
    "Break hard tasks into stages.",
    "Explain your approach.",
];

const TEXT_PRINCIPLES: &[&str] = &[
    "Preserve the meaning of the source text.",
    "Keep the style consistent and readable.",
    "Fix grammar and spelling.",
    "Match the tone to the audience.",
];

const CODE_PRINCIPLES: &[&str] = &[
    "Write correct, readable code.",
    "Handle errors and edge cases.",
    "Prefer simple algorithms unless performance demands otherwise.",
    "Comment only what is not obvious.",
];

const DATA_PRINCIPLES: &[&str] = &[
    "Check the data before drawing conclusions.",
    "State the method used.",
    "Quantify uncertainty.",
    "Suggest a visualization where it helps.",
];

const CREATIVE_PRINCIPLES: &[&str] = &[
    "Be original.",
    "Use vivid, concrete language.",
    "Keep the requested form and length.",
    "Give the piece a clear emotional arc.",
];

const RESEARCH_PRINCIPLES: &[&str] = &[
    "Gather information from several angles.",
    "Separate facts from opinions.",
    "Note gaps and contradictions.",
    "Finish with a synthesis.",
];

const TRANSLATION_PRINCIPLES: &[&str] = &[
    "Translate meaning, not words.",
    "Respect cultural context and idiom.",
    "Keep terminology consistent.",
    "Preserve formatting.",
];

const SUMMARY_PRINCIPLES: &[&str] = &[
    "Keep only the key points.",
    "Do not add information that is not in the source.",
    "Be brief and clear.",
    "Order points by importance.",
];
