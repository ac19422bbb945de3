//! Coercing extracted JSON into domain types.
//!
//! Models drift from the requested key names (`q` vs `question`, `t` vs
//! `title`), so each logical field resolves through [`Field::aliases`], an
//! ordered list of accepted keys. A text field takes the first alias holding
//! a non-empty string; anything else counts as missing and gets the field's
//! default. Defaults are only applied after the payload parsed and had the
//! right top-level shape.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SchemaError;
use crate::model::{
    Chapter, ContentBlock, CourseOutline, Generated, GenerationKind, QaAnswer, QuizQuestion,
    Section, OPTION_COUNT,
};
use crate::prompt::QUESTIONS_PER_QUIZ;

/// Title used when the model omits one.
pub const DEFAULT_COURSE_TITLE: &str = "Untitled Course";

/// Question text used when the model omits one.
pub const DEFAULT_QUESTION: &str = "Question not available";

/// Language used for answers that name none.
pub const DEFAULT_ANSWER_LANGUAGE: &str = "general";

type Object = Map<String, Value>;

// ============================================================================
// Alias table
// ============================================================================

/// A logical field read from model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Course title.
    CourseTitle,
    /// Course description.
    CourseDescription,
    /// Course language.
    CourseLanguage,
    /// Course chapter array.
    CourseChapters,
    /// Chapter name.
    ChapterName,
    /// Chapter description.
    ChapterDescription,
    /// Chapter section array.
    ChapterSections,
    /// Section title.
    SectionTitle,
    /// Section content (array of blocks, or a single string).
    SectionContent,
    /// Content block type tag.
    BlockType,
    /// Paragraph text.
    BlockText,
    /// Code block language.
    BlockLang,
    /// Code block source.
    BlockCode,
    /// Question text.
    Question,
    /// Labeled option `a1`.
    Option1,
    /// Labeled option `a2`.
    Option2,
    /// Labeled option `a3`.
    Option3,
    /// Labeled option `a4`.
    Option4,
    /// Positional option array.
    Options,
    /// Correct option label.
    Correct,
    /// Q&A answer text.
    Answer,
    /// Q&A answer language.
    AnswerLanguage,
}

/// Labeled option fields, in option order.
const OPTION_FIELDS: [Field; OPTION_COUNT] =
    [Field::Option1, Field::Option2, Field::Option3, Field::Option4];

impl Field {
    /// Accepted source keys, highest priority first.
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::CourseTitle | Self::SectionTitle => &["t", "title"],
            Self::CourseDescription | Self::ChapterDescription => &["d", "description"],
            Self::CourseLanguage => &["l", "language", "lang"],
            Self::CourseChapters => &["c", "chapters", "parts"],
            Self::ChapterName => &["n", "name", "title"],
            Self::ChapterSections => &["s", "sections"],
            Self::SectionContent => &["c", "content"],
            Self::BlockType => &["type", "kind"],
            Self::BlockText => &["text", "t", "content"],
            Self::BlockLang => &["lang", "language", "l"],
            Self::BlockCode => &["code"],
            Self::Question => &["q", "question"],
            Self::Option1 => &["a1"],
            Self::Option2 => &["a2"],
            Self::Option3 => &["a3"],
            Self::Option4 => &["a4"],
            Self::Options => &["options", "answers"],
            Self::Correct => &["correct", "answer"],
            Self::Answer => &["a", "answer"],
            Self::AnswerLanguage => &["l", "language"],
        }
    }
}

/// First alias holding a non-empty string.
fn text(obj: &Object, field: Field) -> Option<&str> {
    field.aliases().iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    })
}

/// First alias holding an array.
fn array(obj: &Object, field: Field) -> Option<&Vec<Value>> {
    field
        .aliases()
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
}

fn text_or(obj: &Object, field: Field, default: &str) -> String {
    text(obj, field).unwrap_or(default).to_string()
}

// ============================================================================
// Entry points
// ============================================================================

/// Parses `text` and normalizes it into the shape `kind` requires.
///
/// # Errors
///
/// Returns [`SchemaError`] when `text` is not JSON or its top-level shape is
/// wrong for `kind` (object for courses and answers, array for questions).
pub fn normalize(kind: GenerationKind, text: &str) -> Result<Generated, SchemaError> {
    match kind {
        GenerationKind::Course => normalize_course(text).map(Generated::Course),
        GenerationKind::Questions => normalize_questions(text).map(Generated::Questions),
        GenerationKind::Qa => normalize_answer(text).map(Generated::Answer),
    }
}

/// Normalizes a course outline payload.
///
/// # Errors
///
/// Returns [`SchemaError`] for invalid JSON or a non-object payload.
pub fn normalize_course(text: &str) -> Result<CourseOutline, SchemaError> {
    let value = parse(text)?;
    let obj = expect_object(&value, text, GenerationKind::Course)?;

    let chapters: Vec<Chapter> = array(obj, Field::CourseChapters)
        .map(|items| items.iter().filter_map(Value::as_object).map(chapter).collect())
        .unwrap_or_default();

    debug!(chapters = chapters.len(), "Normalized course outline");
    Ok(CourseOutline {
        title: text_or(obj, Field::CourseTitle, DEFAULT_COURSE_TITLE),
        description: text_or(obj, Field::CourseDescription, ""),
        language: text_or(obj, Field::CourseLanguage, ""),
        chapters,
    })
}

/// Normalizes a quiz payload.
///
/// Keeps at most the first three questions and never pads a shorter list.
///
/// # Errors
///
/// Returns [`SchemaError`] for invalid JSON or a non-array payload.
pub fn normalize_questions(text: &str) -> Result<Vec<QuizQuestion>, SchemaError> {
    let value = parse(text)?;
    let Value::Array(items) = &value else {
        return Err(shape_error(&value, text, GenerationKind::Questions));
    };

    if items.len() > QUESTIONS_PER_QUIZ {
        debug!(
            received = items.len(),
            kept = QUESTIONS_PER_QUIZ,
            "Truncating model questions"
        );
    }

    Ok(items
        .iter()
        .take(QUESTIONS_PER_QUIZ)
        .enumerate()
        .map(|(index, item)| question(item, index))
        .collect())
}

/// Normalizes a Q&A payload.
///
/// # Errors
///
/// Returns [`SchemaError`] for invalid JSON or a non-object payload.
pub fn normalize_answer(text: &str) -> Result<QaAnswer, SchemaError> {
    let value = parse(text)?;
    let obj = expect_object(&value, text, GenerationKind::Qa)?;

    Ok(QaAnswer {
        answer: text_or(obj, Field::Answer, ""),
        language: text_or(obj, Field::AnswerLanguage, DEFAULT_ANSWER_LANGUAGE),
    })
}

// ============================================================================
// Shape checks
// ============================================================================

fn parse(text: &str) -> Result<Value, SchemaError> {
    serde_json::from_str(text).map_err(|e| SchemaError::new(format!("invalid JSON: {e}"), text))
}

fn expect_object<'a>(
    value: &'a Value,
    text: &str,
    kind: GenerationKind,
) -> Result<&'a Object, SchemaError> {
    value
        .as_object()
        .ok_or_else(|| shape_error(value, text, kind))
}

fn shape_error(value: &Value, text: &str, kind: GenerationKind) -> SchemaError {
    let expected = match kind {
        GenerationKind::Questions => "array",
        GenerationKind::Course | GenerationKind::Qa => "object",
    };
    SchemaError::new(
        format!(
            "expected a JSON {expected} for a {kind} payload, found {}",
            json_type(value)
        ),
        text,
    )
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Course pieces
// ============================================================================

fn chapter(obj: &Object) -> Chapter {
    Chapter {
        name: text_or(obj, Field::ChapterName, ""),
        description: text_or(obj, Field::ChapterDescription, ""),
        sections: array(obj, Field::ChapterSections)
            .map(|items| items.iter().filter_map(Value::as_object).map(section).collect())
            .unwrap_or_default(),
    }
}

fn section(obj: &Object) -> Section {
    let content = match text(obj, Field::SectionContent) {
        // A bare string body is a single paragraph.
        Some(body) => vec![ContentBlock::Paragraph {
            text: body.to_string(),
        }],
        None => array(obj, Field::SectionContent)
            .map(|items| items.iter().filter_map(content_block).collect())
            .unwrap_or_default(),
    };

    Section {
        title: text_or(obj, Field::SectionTitle, ""),
        content,
    }
}

/// Converts one content entry; entries without any text are dropped.
fn content_block(value: &Value) -> Option<ContentBlock> {
    let obj = match value {
        Value::String(s) if !s.is_empty() => {
            return Some(ContentBlock::Paragraph { text: s.clone() })
        }
        Value::Object(obj) => obj,
        _ => return None,
    };

    let is_code = match text(obj, Field::BlockType) {
        Some(tag) => match tag.to_ascii_lowercase().as_str() {
            "code" => true,
            "p" | "paragraph" | "text" => false,
            _ => return None,
        },
        None => text(obj, Field::BlockCode).is_some(),
    };

    if is_code {
        Some(ContentBlock::Code {
            lang: text_or(obj, Field::BlockLang, ""),
            code: text(obj, Field::BlockCode)?.to_string(),
        })
    } else {
        Some(ContentBlock::Paragraph {
            text: text(obj, Field::BlockText)?.to_string(),
        })
    }
}

// ============================================================================
// Quiz pieces
// ============================================================================

fn question(value: &Value, index: usize) -> QuizQuestion {
    let empty = Object::new();
    let obj = value.as_object().unwrap_or(&empty);
    let positional = array(obj, Field::Options);

    let options: [String; OPTION_COUNT] = std::array::from_fn(|i| {
        text(obj, OPTION_FIELDS[i])
            .or_else(|| match positional.and_then(|items| items.get(i)) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
                _ => None,
            })
            .map_or_else(|| format!("Option {}", i + 1), str::to_string)
    });

    let correct_option_index = correct_index(obj, &options);

    QuizQuestion {
        question: text_or(obj, Field::Question, DEFAULT_QUESTION),
        options,
        correct_option_index,
        part_index: index,
    }
}

/// Resolves the correct-answer label to an option index.
///
/// Accepts `a1`..`a4` in any case, a bare `1`..`4`, or the exact text of one
/// of the options. Missing or unrecognized labels point at the first option.
fn correct_index(obj: &Object, options: &[String; OPTION_COUNT]) -> usize {
    let Some(label) = text(obj, Field::Correct).map(str::trim) else {
        return 0;
    };

    let lower = label.to_ascii_lowercase();
    let number = lower.strip_prefix('a').unwrap_or(&lower);
    match number.parse::<usize>() {
        Ok(n) if (1..=OPTION_COUNT).contains(&n) => n - 1,
        _ => options.iter().position(|o| o == label).unwrap_or(0),
    }
}
