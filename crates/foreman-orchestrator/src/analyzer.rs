use crate::fallback::with_fallback;
use crate::types::{Task, TaskAnalysis, BASE_CRITERION, BASE_SKILLS};
use async_trait::async_trait;
use foreman_agent::{GenerationBackend, GenerationRequest};
use foreman_core::{Archetype, Complexity, ForemanError, ForemanResult, Priority, TaskCategory};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Category keyword table. Order matters: the first category with a matching
/// pattern wins, so an ambiguous word like "отчет" lands in text processing.
const CATEGORY_PATTERNS: &[(TaskCategory, &[&str])] = &[
    (
        TaskCategory::TextProcessing,
        &[
            r"\b(напиши|создай текст|обработай текст|анализ текста|редактирование)\b",
            r"\b(статья|документ|сообщение|письмо|отчет)\b",
            r"\b(edit|proofread|rewrite|article|essay|letter|email|document)\b",
        ],
    ),
    (
        TaskCategory::CodeGeneration,
        &[
            r"\b(код|программа|функция|алгоритм|скрипт|класс)\b",
            r"\b(python|javascript|java|sql|html|css|rust|typescript)\b",
            r"\b(разработай|создай код|напиши программу)\b",
            r"\b(code|program|function|algorithm|script|class)\b",
        ],
    ),
    (
        TaskCategory::DataAnalysis,
        &[
            r"\b(анализ данных|статистика|график|диаграмма|отчет)\b",
            r"\b(excel|csv|json|база данных|таблица)\b",
            r"\b(data analysis|statistics|chart|graph|dataset|spreadsheet|database)\b",
        ],
    ),
    (
        TaskCategory::Creative,
        &[
            r"\b(творческий|креативный|история|стихотворение|рассказ)\b",
            r"\b(придумай|сочини|воображение)\b",
            r"\b(creative|poem|story|fiction|imagine|invent)\b",
        ],
    ),
    (
        TaskCategory::Research,
        &[
            r"\b(исследование|поиск информации|изучение|анализ)\b",
            r"\b(найди|узнай|выясни|изучи)\b",
            r"\b(research|investigate|find out|look up|study)\b",
        ],
    ),
    (
        TaskCategory::Translation,
        &[
            r"\b(переведи|перевод|язык|английский|русский)\b",
            r"\b(translate|translation)\b",
        ],
    ),
    (
        TaskCategory::Summarization,
        &[
            r"\b(краткое|резюме|суть|сократи|извлеки главное)\b",
            r"\b(summarize|summarise|summary|key points)\b",
        ],
    ),
];

const SIMPLE_KEYWORDS: &str =
    r"\b(простой|легкий|быстро|короткий|simple|easy|quick|quickly|short|brief)\b";

const COMPLEX_KEYWORDS: &str = r"\b(сложный|трудный|детальный|многоступенчатый|complex|complicated|difficult|detailed|multi-step)\b";

const CONJUNCTIONS: &str = r"\b(и|and)\b";

/// Substring checks mapping mentions to resource tags.
const RESOURCE_KEYWORDS: &[(&str, &[&str])] = &[
    ("file_access", &["файл", "документ", "file", "document"]),
    ("web_access", &["интернет", "поиск", "internet", "web", "search"]),
    ("database_access", &["база данных", "данные", "database", "data"]),
];

const SHORT_TEXT_CHARS: usize = 50;
const LONG_TEXT_CHARS: usize = 200;
const MANY_COMMAS: usize = 3;
const MANY_CONJUNCTIONS: usize = 2;

/// Best-effort source of subtask lists.
#[async_trait]
pub trait TaskDecomposer: Send + Sync {
    /// Split `description` into ordered subtasks.
    async fn decompose(&self, description: &str) -> ForemanResult<Vec<String>>;
}

/// Asks a generation backend to split a task into subtasks, one per line.
pub struct GenerationDecomposer {
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationDecomposer {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TaskDecomposer for GenerationDecomposer {
    async fn decompose(&self, description: &str) -> ForemanResult<Vec<String>> {
        let mut request = GenerationRequest::new(format!(
            "Break the task into subtasks. Return only the list of subtasks, one per line.\n\nTask: {description}"
        ));
        request.max_output_tokens = 200;
        request.temperature = 0.3;

        let text = self.backend.generate(&request).await?.into_text()?;
        let subtasks = parse_subtask_lines(&text);
        if subtasks.is_empty() {
            return Err(ForemanError::Analysis(
                "decomposition returned no subtasks".to_string(),
            ));
        }
        Ok(subtasks)
    }
}

/// One subtask per non-empty line, with list markers (`-`, `*`, `1.`, `2)`)
/// removed. Digits not followed by `.` or `)` are kept as text.
pub fn parse_subtask_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = line.trim_start_matches(['-', '*', '•']);
            let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
            let line = match rest.strip_prefix(['.', ')']) {
                Some(stripped) if rest.len() < line.len() => stripped,
                _ => line,
            };
            line.trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// `[analyzer]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Upper bound on one backend decomposition call.
    pub decomposition_timeout_secs: u64,
    /// Ask the generation backend for subtasks instead of splitting locally.
    pub use_backend_decomposition: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            decomposition_timeout_secs: 10,
            use_backend_decomposition: false,
        }
    }
}

impl AnalyzerConfig {
    /// `decomposition_timeout_secs` as a [`Duration`].
    pub fn decomposition_timeout(&self) -> Duration {
        Duration::from_secs(self.decomposition_timeout_secs)
    }
}

/// Turns a raw task description into a [`TaskAnalysis`].
///
/// Everything except subtask decomposition is a pure table lookup, so the
/// same text always yields the same category and complexity. Decomposition
/// may consult a [`TaskDecomposer`], bounded by a timeout and backed by a
/// local conjunction split.
pub struct TaskAnalyzer {
    categories: Vec<(TaskCategory, Vec<Regex>)>,
    simple_keywords: Regex,
    complex_keywords: Regex,
    conjunctions: Regex,
    decomposer: Option<Arc<dyn TaskDecomposer>>,
    decomposition_timeout: Duration,
}

fn compile(pattern: &str) -> ForemanResult<Regex> {
    Regex::new(&format!("(?i){pattern}"))
        .map_err(|e| ForemanError::Analysis(format!("invalid pattern {pattern}: {e}")))
}

impl TaskAnalyzer {
    /// Compile the keyword tables. Decomposition stays local until
    /// [`Self::with_decomposer`] is called.
    pub fn new() -> ForemanResult<Self> {
        let categories = CATEGORY_PATTERNS
            .iter()
            .map(|(category, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| compile(p))
                    .collect::<ForemanResult<Vec<_>>>()?;
                Ok((*category, compiled))
            })
            .collect::<ForemanResult<Vec<_>>>()?;

        Ok(Self {
            categories,
            simple_keywords: compile(SIMPLE_KEYWORDS)?,
            complex_keywords: compile(COMPLEX_KEYWORDS)?,
            conjunctions: compile(CONJUNCTIONS)?,
            decomposer: None,
            decomposition_timeout: Duration::from_secs(10),
        })
    }

    /// Consult `decomposer` for non-simple tasks, giving up after `timeout`.
    pub fn with_decomposer(mut self, decomposer: Arc<dyn TaskDecomposer>, timeout: Duration) -> Self {
        self.decomposer = Some(decomposer);
        self.decomposition_timeout = timeout;
        self
    }

    /// Analyze a task. Never fails: an analysis error yields
    /// [`TaskAnalysis::conservative`].
    pub async fn analyze_task(&self, task: &Task) -> TaskAnalysis {
        self.analyze(&task.description, task.priority).await
    }

    /// Analyze a bare description at a requested priority.
    pub async fn analyze(&self, description: &str, priority: Priority) -> TaskAnalysis {
        match self.try_analyze(description, priority).await {
            Ok(analysis) => {
                info!(
                    category = %analysis.category,
                    complexity = %analysis.complexity,
                    archetype = %analysis.suggested_archetype,
                    subtasks = analysis.subtasks.len(),
                    "Task analyzed"
                );
                analysis
            }
            Err(e) => {
                warn!(error = %e, "Task analysis failed, using conservative analysis");
                TaskAnalysis::conservative(description, priority)
            }
        }
    }

    async fn try_analyze(&self, description: &str, priority: Priority) -> ForemanResult<TaskAnalysis> {
        if description.trim().is_empty() {
            return Err(ForemanError::Analysis("empty task description".to_string()));
        }

        let category = self.detect_category(description);
        let complexity = self.assess_complexity(description);

        Ok(TaskAnalysis {
            category,
            complexity,
            required_skills: required_skills(category),
            estimated_minutes: estimate_minutes(complexity, category),
            suggested_archetype: suggest_archetype(category),
            subtasks: self.decompose(description, complexity).await,
            resource_requirements: resource_requirements(description),
            success_criteria: success_criteria(category),
            suggested_priority: adjust_priority(priority, complexity),
        })
    }

    /// First category (in table order) with a matching pattern; `General` otherwise.
    pub fn detect_category(&self, description: &str) -> TaskCategory {
        let lower = description.to_lowercase();
        self.categories
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(&lower)))
            .map(|(category, _)| *category)
            .unwrap_or(TaskCategory::General)
    }

    /// Indicators are checked in declaration order and the first hit wins:
    /// simple keywords, short text, then complex keywords, long text, many
    /// commas, many conjunctions. This is a tie-break, not a ranking; a long
    /// text that says "simple" is classified simple.
    pub fn assess_complexity(&self, description: &str) -> Complexity {
        let lower = description.to_lowercase();
        let length = description.chars().count();

        let simple = [
            self.simple_keywords.is_match(&lower),
            length < SHORT_TEXT_CHARS,
        ];
        if simple.iter().any(|hit| *hit) {
            return Complexity::Simple;
        }

        let complex = [
            self.complex_keywords.is_match(&lower),
            length > LONG_TEXT_CHARS,
            description.matches(',').count() > MANY_COMMAS,
            self.conjunctions.find_iter(&lower).count() > MANY_CONJUNCTIONS,
        ];
        if complex.iter().any(|hit| *hit) {
            return Complexity::Complex;
        }

        Complexity::Medium
    }

    /// Simple tasks stay whole. Others go to the decomposer if one is set,
    /// falling back to [`Self::split_on_conjunctions`].
    pub async fn decompose(&self, description: &str, complexity: Complexity) -> Vec<String> {
        if complexity == Complexity::Simple {
            return vec![description.to_string()];
        }

        let Some(decomposer) = &self.decomposer else {
            return self.split_on_conjunctions(description);
        };

        let call = async {
            let subtasks = decomposer.decompose(description).await?;
            if subtasks.is_empty() {
                return Err(ForemanError::Analysis(
                    "decomposer returned no subtasks".to_string(),
                ));
            }
            debug!(count = subtasks.len(), "Decomposer produced subtasks");
            Ok(subtasks)
        };
        with_fallback(self.decomposition_timeout, call, || {
            self.split_on_conjunctions(description)
        })
        .await
    }

    /// Split on whole-word conjunctions; the description itself if that
    /// leaves nothing.
    pub fn split_on_conjunctions(&self, description: &str) -> Vec<String> {
        let parts: Vec<String> = self
            .conjunctions
            .split(description)
            .map(|part| part.trim_matches(|c: char| c.is_whitespace() || c == ','))
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();

        if parts.is_empty() {
            vec![description.to_string()]
        } else {
            parts
        }
    }
}

/// Base skills plus the category's own.
pub fn required_skills(category: TaskCategory) -> Vec<String> {
    let extra: &[&str] = match category {
        TaskCategory::TextProcessing => &["text_analysis", "language_processing", "writing"],
        TaskCategory::CodeGeneration => &["programming", "logic", "problem_solving"],
        TaskCategory::DataAnalysis => &["data_processing", "statistics", "visualization"],
        TaskCategory::Creative => &["creativity", "storytelling", "imagination"],
        TaskCategory::Research => &["information_retrieval", "analysis", "synthesis"],
        TaskCategory::Translation => &["language_translation", "cultural_understanding"],
        TaskCategory::Summarization => &["text_compression", "key_point_extraction"],
        TaskCategory::General => &[],
    };
    BASE_SKILLS
        .iter()
        .chain(extra)
        .map(|s| (*s).to_string())
        .collect()
}

/// Minutes: 1 / 3 / 8 by complexity, scaled for the heavier categories.
pub fn estimate_minutes(complexity: Complexity, category: TaskCategory) -> f64 {
    let base = match complexity {
        Complexity::Simple => 1.0,
        Complexity::Medium => 3.0,
        Complexity::Complex => 8.0,
    };
    let multiplier = match category {
        TaskCategory::CodeGeneration => 1.5,
        TaskCategory::Research => 1.4,
        TaskCategory::DataAnalysis => 1.3,
        TaskCategory::Creative => 1.2,
        _ => 1.0,
    };
    base * multiplier
}

/// Archetype matching the category one to one.
pub fn suggest_archetype(category: TaskCategory) -> Archetype {
    match category {
        TaskCategory::General => Archetype::General,
        TaskCategory::TextProcessing => Archetype::TextProcessor,
        TaskCategory::CodeGeneration => Archetype::CodeGenerator,
        TaskCategory::DataAnalysis => Archetype::DataAnalyst,
        TaskCategory::Creative => Archetype::CreativeWriter,
        TaskCategory::Research => Archetype::Researcher,
        TaskCategory::Translation => Archetype::Translator,
        TaskCategory::Summarization => Archetype::Summarizer,
    }
}

/// Resource tags whose keywords occur in the description.
pub fn resource_requirements(description: &str) -> Vec<String> {
    let lower = description.to_lowercase();
    RESOURCE_KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(tag, _)| (*tag).to_string())
        .collect()
}

/// Base criterion plus the category's own.
pub fn success_criteria(category: TaskCategory) -> Vec<String> {
    let extra: &[&str] = match category {
        TaskCategory::TextProcessing => &["text_quality", "readability"],
        TaskCategory::CodeGeneration => &["code_quality", "functionality"],
        TaskCategory::DataAnalysis => &["accuracy", "insights"],
        TaskCategory::Creative => &["creativity", "engagement"],
        TaskCategory::Research => &["accuracy", "completeness"],
        TaskCategory::Translation => &["accuracy", "fluency"],
        TaskCategory::Summarization => &["completeness", "clarity"],
        TaskCategory::General => &[],
    };
    std::iter::once(BASE_CRITERION)
        .chain(extra.iter().copied())
        .map(str::to_string)
        .collect()
}

/// Complex low-priority work is raised to medium; simple high-priority work
/// is lowered to medium.
pub fn adjust_priority(priority: Priority, complexity: Complexity) -> Priority {
    match (complexity, priority) {
        (Complexity::Complex, Priority::Low) | (Complexity::Simple, Priority::High) => {
            Priority::Medium
        }
        _ => priority,
    }
}
