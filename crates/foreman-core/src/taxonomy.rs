use crate::ForemanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-assigned urgency of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// The default.
    #[default]
    Medium,
    /// Should be picked up first.
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = ForemanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(ForemanError::Config(format!("unknown priority: {other}"))),
        }
    }
}

/// Kind of work a task describes, detected from its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// Nothing more specific matched.
    #[default]
    General,
    /// Writing, editing and analysing prose.
    TextProcessing,
    /// Programs, functions, scripts.
    CodeGeneration,
    /// Statistics, tables, charts.
    DataAnalysis,
    /// Stories, poems, invented content.
    Creative,
    /// Finding and synthesising information.
    Research,
    /// Moving text between languages.
    Translation,
    /// Condensing text to its key points.
    Summarization,
}

impl TaskCategory {
    /// Every category, in declaration order.
    pub const ALL: [TaskCategory; 8] = [
        TaskCategory::General,
        TaskCategory::TextProcessing,
        TaskCategory::CodeGeneration,
        TaskCategory::DataAnalysis,
        TaskCategory::Creative,
        TaskCategory::Research,
        TaskCategory::Translation,
        TaskCategory::Summarization,
    ];

    /// Stable snake_case name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::General => "general",
            TaskCategory::TextProcessing => "text_processing",
            TaskCategory::CodeGeneration => "code_generation",
            TaskCategory::DataAnalysis => "data_analysis",
            TaskCategory::Creative => "creative",
            TaskCategory::Research => "research",
            TaskCategory::Translation => "translation",
            TaskCategory::Summarization => "summarization",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = ForemanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        TaskCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ForemanError::Config(format!("unknown task category: {s}")))
    }
}

/// Rough size of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// One short step.
    Simple,
    /// The default when no indicator fires.
    #[default]
    Medium,
    /// Long or multi-part.
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

/// Fixed worker specialization. Each archetype maps to one capability set
/// and one generation-parameter profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Handles anything; the fallback archetype.
    #[default]
    General,
    /// Editing and analysing text.
    TextProcessor,
    /// Writing code.
    CodeGenerator,
    /// Working with data.
    DataAnalyst,
    /// Fiction, poetry, marketing copy.
    CreativeWriter,
    /// Gathering and weighing information.
    Researcher,
    /// Translating between languages.
    Translator,
    /// Producing summaries.
    Summarizer,
}

impl Archetype {
    /// Every archetype, in declaration order.
    pub const ALL: [Archetype; 8] = [
        Archetype::General,
        Archetype::TextProcessor,
        Archetype::CodeGenerator,
        Archetype::DataAnalyst,
        Archetype::CreativeWriter,
        Archetype::Researcher,
        Archetype::Translator,
        Archetype::Summarizer,
    ];

    /// Stable snake_case name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::General => "general",
            Archetype::TextProcessor => "text_processor",
            Archetype::CodeGenerator => "code_generator",
            Archetype::DataAnalyst => "data_analyst",
            Archetype::CreativeWriter => "creative_writer",
            Archetype::Researcher => "researcher",
            Archetype::Translator => "translator",
            Archetype::Summarizer => "summarizer",
        }
    }

    /// Human-facing name used as the prefix of worker display names.
    pub fn display_name(&self) -> &'static str {
        match self {
            Archetype::General => "Universal Worker",
            Archetype::TextProcessor => "Text Processor",
            Archetype::CodeGenerator => "Code Generator",
            Archetype::DataAnalyst => "Data Analyst",
            Archetype::CreativeWriter => "Creative Writer",
            Archetype::Researcher => "Researcher",
            Archetype::Translator => "Translator",
            Archetype::Summarizer => "Summarizer",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = ForemanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Archetype::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| ForemanError::Config(format!("unknown archetype: {s}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_archetype_serde_matches_as_str() {
        for archetype in Archetype::ALL {
            let json = serde_json::to_string(&archetype).unwrap();
            assert_eq!(json, format!("\"{}\"", archetype.as_str()));
        }
    }

    #[test]
    fn test_category_serde_matches_as_str() {
        for category in TaskCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{category}\""));
        }
    }

    #[test]
    fn test_archetype_from_str_accepts_kebab_case() {
        assert_eq!(
            "code-generator".parse::<Archetype>().unwrap(),
            Archetype::CodeGenerator
        );
        assert_eq!(" Summarizer ".parse::<Archetype>().unwrap(), Archetype::Summarizer);
        assert!("wizard".parse::<Archetype>().is_err());
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Complexity::default(), Complexity::Medium);
        assert_eq!(TaskCategory::default(), TaskCategory::General);
        assert_eq!(Archetype::default(), Archetype::General);
    }
}
