//! Tolerant parsing of language-model replies.
//!
//! Models are asked for bare JSON but routinely wrap it in Markdown fences or
//! prose. [`extract_json`] recovers the object; the typed parsers then accept
//! the common deviations (floats for integers, numbers for strings, missing
//! fields) instead of rejecting the whole reply.

use serde_json::{Map, Value};

use crate::{
  Error, Result,
  assignment::QuestionKind,
  submission::{NoteMap, ScoreMap},
};

const EXCERPT_CHARS: usize = 200;

/// Locate the JSON object inside a model reply.
///
/// Strips surrounding whitespace and a Markdown code fence. If what remains
/// is not valid JSON, falls back to the span from the first `{` to the last
/// `}`.
pub fn extract_json(reply: &str) -> Result<&str> {
  let body = strip_fence(reply.trim());
  if serde_json::from_str::<Value>(body).is_ok() {
    return Ok(body);
  }
  match (body.find('{'), body.rfind('}')) {
    (Some(start), Some(end)) if start < end => Ok(&body[start..=end]),
    _ => Err(Error::NoJsonObject),
  }
}

fn strip_fence(text: &str) -> &str {
  let Some(rest) = text.strip_prefix("```") else {
    return text;
  };
  // Drop the info string (`json`, `JSON`, ...) on the opening line.
  let rest = match rest.find('\n') {
    Some(nl) => &rest[nl + 1..],
    None => rest,
  };
  rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// The first [`EXCERPT_CHARS`] characters of a reply, for error messages.
pub fn excerpt(reply: &str) -> String {
  let trimmed = reply.trim();
  match trimmed.char_indices().nth(EXCERPT_CHARS) {
    Some((idx, _)) => format!("{}...", &trimmed[..idx]),
    None => trimmed.to_owned(),
  }
}

fn malformed(reason: impl Into<String>, reply: &str) -> Error {
  Error::MalformedReply { reason: reason.into(), excerpt: excerpt(reply) }
}

fn parse_object(reply: &str) -> Result<Map<String, Value>> {
  let json = extract_json(reply).map_err(|e| malformed(e.to_string(), reply))?;
  match serde_json::from_str::<Value>(json) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(_) => Err(malformed("top-level value is not an object", reply)),
    Err(e) => Err(malformed(e.to_string(), reply)),
  }
}

/// Coerce an integer, a float (rounded) or a numeric string.
fn as_points(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
    Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
    _ => None,
  }
}

/// Strings pass through; anything else is rendered as JSON.
fn as_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

// ─── Grading ─────────────────────────────────────────────────────────────────

/// A parsed grading reply.
///
/// The per-question maps are decoded independently: `None` means the field
/// was absent, `Some(Err(_))` that it was present but unusable.
#[derive(Debug)]
pub struct GradingReply {
  pub total_score:       i64,
  pub ai_feedback:       String,
  pub question_scores:   Option<Result<ScoreMap>>,
  pub question_feedback: Option<Result<NoteMap>>,
}

impl GradingReply {
  /// Fails unless the reply holds a JSON object with a numeric
  /// `total_score`.
  pub fn parse(reply: &str) -> Result<Self> {
    let obj = parse_object(reply)?;

    let total_score = obj
      .get("total_score")
      .and_then(as_points)
      .ok_or_else(|| malformed("missing or non-numeric total_score", reply))?;

    let ai_feedback = obj.get("ai_feedback").map(as_text).unwrap_or_default();

    let question_scores = obj.get("question_scores").map(|v| score_map(v, reply));
    let question_feedback =
      obj.get("question_feedback").map(|v| note_map(v, reply));

    Ok(Self { total_score, ai_feedback, question_scores, question_feedback })
  }
}

fn score_map(value: &Value, reply: &str) -> Result<ScoreMap> {
  let Value::Object(entries) = value else {
    return Err(malformed("question_scores is not an object", reply));
  };
  entries
    .iter()
    .map(|(id, v)| {
      as_points(v)
        .map(|points| (id.clone(), points))
        .ok_or_else(|| malformed(format!("non-numeric score for question {id}"), reply))
    })
    .collect()
}

fn note_map(value: &Value, reply: &str) -> Result<NoteMap> {
  let Value::Object(entries) = value else {
    return Err(malformed("question_feedback is not an object", reply));
  };
  Ok(entries.iter().map(|(id, v)| (id.clone(), as_text(v))).collect())
}

// ─── Generation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestion {
  pub kind:    QuestionKind,
  pub content: String,
  pub answer:  String,
  pub score:   i64,
}

/// A parsed assignment-authoring reply.
#[derive(Debug, Clone)]
pub struct GeneratedAssignment {
  pub title:       String,
  pub description: String,
  pub questions:   Vec<GeneratedQuestion>,
}

impl GeneratedAssignment {
  /// Answers that are not strings are stringified, a missing score is 0
  /// and an unrecognised question type is treated as `code`. A reply with
  /// no usable questions is an error.
  pub fn parse(reply: &str) -> Result<Self> {
    let obj = parse_object(reply)?;

    let title = obj.get("title").map(as_text).unwrap_or_default();
    let description = obj.get("description").map(as_text).unwrap_or_default();

    let questions: Vec<GeneratedQuestion> = obj
      .get("questions")
      .and_then(Value::as_array)
      .map(|items| items.iter().filter_map(Value::as_object).map(question).collect())
      .unwrap_or_default();

    if questions.is_empty() {
      return Err(malformed("reply contained no questions", reply));
    }

    Ok(Self { title, description, questions })
  }
}

fn question(obj: &Map<String, Value>) -> GeneratedQuestion {
  let kind_name = obj
    .get("type")
    .and_then(Value::as_str)
    .map(|s| s.trim().to_ascii_lowercase())
    .unwrap_or_default();

  let kind = match kind_name.as_str() {
    "choice" => QuestionKind::Choice { options: options(obj.get("options")) },
    "fill" => QuestionKind::Fill,
    _ => QuestionKind::Code,
  };

  GeneratedQuestion {
    kind,
    content: obj.get("content").map(as_text).unwrap_or_default(),
    answer: obj.get("answer").map(as_text).unwrap_or_default(),
    score: obj.get("score").and_then(as_points).unwrap_or(0),
  }
}

/// Options arrive either as a list or as a `{"A": "..."}` object.
fn options(value: Option<&Value>) -> Vec<String> {
  match value {
    Some(Value::Array(items)) => items.iter().map(as_text).collect(),
    Some(Value::Object(entries)) => entries
      .iter()
      .map(|(label, text)| format!("{label}. {}", as_text(text)))
      .collect(),
    _ => Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extract_passes_bare_json_through() {
    assert_eq!(extract_json("  {\"a\":1}\n").unwrap(), "{\"a\":1}");
  }

  #[test]
  fn extract_strips_fences() {
    let reply = "```json\n{\"total_score\": 7}\n```";
    assert_eq!(extract_json(reply).unwrap(), "{\"total_score\": 7}");
    let bare = "```\n{\"x\": true}\n```";
    assert_eq!(extract_json(bare).unwrap(), "{\"x\": true}");
  }

  #[test]
  fn extract_falls_back_to_outer_braces() {
    let reply = "Sure! Here is the result: {\"a\": {\"b\": 2}} Hope it helps.";
    assert_eq!(extract_json(reply).unwrap(), "{\"a\": {\"b\": 2}}");
  }

  #[test]
  fn extract_fails_without_braces() {
    assert!(matches!(extract_json("no json here"), Err(Error::NoJsonObject)));
    assert!(matches!(extract_json("} backwards {"), Err(Error::NoJsonObject)));
  }

  #[test]
  fn grading_reply_full_shape() {
    let reply = r#"{"total_score":10,"ai_feedback":"ok","question_scores":{"q1":10},"question_feedback":{"q1":"correct"}}"#;
    let parsed = GradingReply::parse(reply).unwrap();
    assert_eq!(parsed.total_score, 10);
    assert_eq!(parsed.ai_feedback, "ok");
    assert_eq!(parsed.question_scores.unwrap().unwrap()["q1"], 10);
    assert_eq!(parsed.question_feedback.unwrap().unwrap()["q1"], "correct");
  }

  #[test]
  fn grading_reply_rounds_floats_and_reads_numeric_strings() {
    let parsed = GradingReply::parse(r#"{"total_score": 87.6, "question_scores": {"a": "4.5"}}"#).unwrap();
    assert_eq!(parsed.total_score, 88);
    assert_eq!(parsed.question_scores.unwrap().unwrap()["a"], 5);
    assert!(parsed.question_feedback.is_none());
  }

  #[test]
  fn grading_reply_maps_fail_independently() {
    let reply = r#"{"total_score": 3, "question_scores": "n/a", "question_feedback": {"q": "fine"}}"#;
    let parsed = GradingReply::parse(reply).unwrap();
    assert!(parsed.question_scores.unwrap().is_err());
    assert_eq!(parsed.question_feedback.unwrap().unwrap()["q"], "fine");
  }

  #[test]
  fn grading_reply_needs_total_score() {
    let err = GradingReply::parse("Great work overall, 9/10!").unwrap_err();
    assert!(matches!(err, Error::MalformedReply { .. }));
    assert!(GradingReply::parse(r#"{"ai_feedback": "nice"}"#).is_err());
  }

  #[test]
  fn generated_assignment_is_tolerant() {
    let reply = r#"```json
{
  "title": "Maps",
  "description": "Go maps",
  "questions": [
    {"type": "choice", "content": "Zero value of a map?", "options": ["A. nil", "B. {}"], "answer": "A", "score": 10},
    {"type": "fill", "content": "Builtin to delete a key: __", "answer": "delete"},
    {"type": "essay", "content": "Write a word counter", "answer": {"hint": "use map[string]int"}, "score": 20.4}
  ]
}
```"#;
    let parsed = GeneratedAssignment::parse(reply).unwrap();
    assert_eq!(parsed.title, "Maps");
    assert_eq!(parsed.questions.len(), 3);
    assert_eq!(
      parsed.questions[0].kind,
      QuestionKind::Choice { options: vec!["A. nil".into(), "B. {}".into()] }
    );
    assert_eq!(parsed.questions[1].score, 0);
    assert_eq!(parsed.questions[2].kind, QuestionKind::Code);
    assert_eq!(parsed.questions[2].answer, r#"{"hint":"use map[string]int"}"#);
    assert_eq!(parsed.questions[2].score, 20);
  }

  #[test]
  fn generated_assignment_without_questions_is_an_error() {
    let err = GeneratedAssignment::parse(r#"{"title": "Empty", "questions": []}"#).unwrap_err();
    match err {
      Error::MalformedReply { reason, excerpt } => {
        assert!(reason.contains("no questions"));
        assert!(excerpt.starts_with("{\"title\""));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn excerpt_truncates_on_char_boundary() {
    let long = "é".repeat(300);
    let e = excerpt(&long);
    assert_eq!(e.chars().count(), EXCERPT_CHARS + 3);
    assert!(e.ends_with("..."));
  }
}
