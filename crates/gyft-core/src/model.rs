//! Domain types produced by the generation pipeline.
//!
//! Every value here is created per request and handed to the caller; nothing
//! in this crate stores them.

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};

// ============================================================================
// Requests
// ============================================================================

/// What the model is being asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// A full course outline.
    Course,
    /// Three multiple-choice quiz questions.
    Questions,
    /// A short answer to a coding question.
    Qa,
}

impl GenerationKind {
    /// Parses a kind name, case-insensitively.
    ///
    /// Accepts the serialized names plus a few obvious synonyms.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "course" | "course_gen" | "coursegen" => Some(Self::Course),
            "questions" | "question_gen" | "questiongen" | "quiz" => Some(Self::Questions),
            "qa" | "answer" | "question" => Some(Self::Qa),
            _ => None,
        }
    }
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Course => write!(f, "course"),
            Self::Questions => write!(f, "questions"),
            Self::Qa => write!(f, "qa"),
        }
    }
}

/// A validated request for the pipeline.
///
/// The user text is trimmed on construction and is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    kind: GenerationKind,
    user_text: String,
}

impl GenerationRequest {
    /// Creates a request, rejecting text that is empty after trimming.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Input` when `user_text` is blank.
    pub fn new(kind: GenerationKind, user_text: impl AsRef<str>) -> Result<Self> {
        let trimmed = user_text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(GenerationError::input("No prompt provided"));
        }
        Ok(Self {
            kind,
            user_text: trimmed.to_string(),
        })
    }

    /// The kind of output requested.
    #[must_use]
    pub const fn kind(&self) -> GenerationKind {
        self.kind
    }

    /// The trimmed user text.
    #[must_use]
    pub fn user_text(&self) -> &str {
        &self.user_text
    }
}

/// Unprocessed text returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawModelResponse {
    /// The model's reply, verbatim.
    pub text: String,
}

impl RawModelResponse {
    /// Wraps raw model text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

// ============================================================================
// Course outline
// ============================================================================

/// A generated course: metadata plus chapters of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOutline {
    /// Course title.
    pub title: String,
    /// Short description of the course.
    pub description: String,
    /// Primary programming language, used as the course category.
    pub language: String,
    /// Ordered chapters.
    pub chapters: Vec<Chapter>,
}

impl CourseOutline {
    /// Total number of sections across all chapters.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.chapters.iter().map(|c| c.sections.len()).sum()
    }

    /// Looks up a section by chapter and section index.
    #[must_use]
    pub fn section(&self, chapter: usize, section: usize) -> Option<&Section> {
        self.chapters.get(chapter)?.sections.get(section)
    }
}

/// One part of a course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Chapter heading.
    pub name: String,
    /// What the chapter covers.
    pub description: String,
    /// Ordered sections.
    pub sections: Vec<Section>,
}

/// A titled unit of course content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Section heading.
    pub title: String,
    /// Body blocks in reading order.
    pub content: Vec<ContentBlock>,
}

impl Section {
    /// Renders this section as the source text for quiz generation.
    ///
    /// Paragraphs are emitted as-is and code blocks are re-fenced with their
    /// language tag, one block per line, under a `Section:` heading.
    #[must_use]
    pub fn quiz_source(&self) -> String {
        let body = self
            .content
            .iter()
            .map(|block| match block {
                ContentBlock::Paragraph { text } => text.clone(),
                ContentBlock::Code { lang, code } => format!("```{lang}\n{code}\n```"),
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("Section: {}\n{body}", self.title)
    }
}

/// A paragraph or code snippet within a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Prose.
    #[serde(rename = "p")]
    Paragraph {
        /// Paragraph text (may contain markdown).
        text: String,
    },
    /// A code listing.
    #[serde(rename = "code")]
    Code {
        /// Language tag, possibly empty.
        lang: String,
        /// Source code.
        code: String,
    },
}

// ============================================================================
// Quiz and Q&A
// ============================================================================

/// Number of options every quiz question carries.
pub const OPTION_COUNT: usize = 4;

/// A multiple-choice question with exactly four options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    /// The question text.
    pub question: String,
    /// The four answer options.
    pub options: [String; OPTION_COUNT],
    /// Index into `options` of the correct answer (0..=3).
    pub correct_option_index: usize,
    /// Position of this question in the generated set.
    pub part_index: usize,
}

impl QuizQuestion {
    /// The text of the correct option.
    #[must_use]
    pub fn correct_option(&self) -> &str {
        self.options
            .get(self.correct_option_index)
            .map_or("", String::as_str)
    }

    /// Whether `choice` is the correct option index.
    #[must_use]
    pub const fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_option_index
    }
}

/// An answer to a free-form coding question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaAnswer {
    /// The answer text, or a polite decline for off-topic questions.
    pub answer: String,
    /// Language the answer focuses on, `general` when none.
    pub language: String,
}

/// A normalized pipeline result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Generated {
    /// Output of a course request.
    Course(CourseOutline),
    /// Output of a question request.
    Questions(Vec<QuizQuestion>),
    /// Output of a Q&A request.
    Answer(QaAnswer),
}

impl Generated {
    /// The request kind this result answers.
    #[must_use]
    pub const fn kind(&self) -> GenerationKind {
        match self {
            Self::Course(_) => GenerationKind::Course,
            Self::Questions(_) => GenerationKind::Questions,
            Self::Answer(_) => GenerationKind::Qa,
        }
    }
}
