//! Prompt text sent to the language model.

use std::fmt::Write as _;

use crate::{
  assignment::{Assignment, Question, QuestionKind},
  submission::Submission,
};

/// Seeds every tutor session.
pub const CHAT_SYSTEM_PROMPT: &str = "You are a patient Go teaching assistant. \
  Answer students' questions about the Go language clearly and concisely, \
  with short code examples where they help. Guide students towards the \
  answer rather than handing over complete homework solutions.";

/// Shown to the grader in place of a missing answer.
pub const NO_ANSWER: &str = "(no answer)";

/// Ask the model to author a new assignment on `topic`.
pub fn generation_prompt(topic: &str, difficulty: &str) -> String {
  format!(
    "Create a Go programming assignment about \"{topic}\" at {difficulty} \
     difficulty. Include 3 to 5 questions, mixing multiple-choice (\"choice\"), \
     fill-in-the-blank (\"fill\") and coding (\"code\") questions.\n\
     \n\
     Reply with a single JSON object and nothing else, in this shape:\n\
     {{\n  \"title\": \"...\",\n  \"description\": \"...\",\n  \"questions\": [\n    \
     {{\"type\": \"choice\", \"content\": \"...\", \"options\": [\"A. ...\", \"B. ...\"], \
     \"answer\": \"A\", \"score\": 20}}\n  ]\n}}\n\
     \n\
     Every question needs type, content, answer and score. Only choice \
     questions have options."
  )
}

/// Build the single-turn grading prompt for one submission.
///
/// The answer key lists every question with its id, type, maximum score and
/// canonical answer; the student's answers follow in the same order.
pub fn grading_prompt(
  assignment: &Assignment,
  questions: &[Question],
  submission: &Submission,
) -> String {
  let mut out = String::new();

  let _ = writeln!(out, "Grade the following assignment submission.");
  let _ = writeln!(out);
  let _ = writeln!(out, "Title: {}", assignment.title);
  let _ = writeln!(out, "Description: {}", assignment.description);

  if !questions.is_empty() {
    let _ = writeln!(out);
    let _ = writeln!(out, "## Answer key");
    for q in questions {
      let _ = writeln!(
        out,
        "- Question {} [id: {}, type: {}, max score: {}]",
        q.order_num,
        q.id,
        q.kind.discriminant(),
        q.score
      );
      let _ = writeln!(out, "  Prompt: {}", q.content);
      if let QuestionKind::Choice { options } = &q.kind
        && !options.is_empty()
      {
        let _ = writeln!(out, "  Options: {}", options.join(" | "));
      }
      let _ = writeln!(out, "  Standard answer: {}", q.answer);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Student answers");
    for q in questions {
      let answer = submission
        .answers
        .get(&q.id.to_string())
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .unwrap_or(NO_ANSWER);
      let _ = writeln!(out, "- Question {} [id: {}]: {}", q.order_num, q.id, answer);
    }
  }

  if !submission.code.trim().is_empty() {
    let _ = writeln!(out);
    let _ = writeln!(out, "## Student code");
    let _ = writeln!(out, "```go\n{}\n```", submission.code.trim_end());
  }

  let _ = writeln!(out);
  let _ = writeln!(out, "## Instructions");
  let _ = writeln!(
    out,
    "Grade choice and fill questions by exact match against the standard \
     answer: award the full score when the answer matches and 0 otherwise. \
     Give no partial credit for answers that are merely close. Grade code on \
     correctness first, then clarity and idiomatic style."
  );
  let _ = writeln!(
    out,
    "Reply with a single JSON object and nothing else:\n\
     {{\"total_score\": <integer>, \"ai_feedback\": \"<markdown feedback>\", \
     \"question_scores\": {{\"<question id>\": <integer>}}, \
     \"question_feedback\": {{\"<question id>\": \"<short note>\"}}}}"
  );

  out
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::{
    assignment::{AssignmentKind, AssignmentStatus},
    submission::SubmissionStatus,
  };

  fn assignment() -> Assignment {
    Assignment {
      id:          Uuid::new_v4(),
      title:       "Slices".into(),
      description: "Working with slices".into(),
      teacher_id:  Uuid::new_v4(),
      kind:        AssignmentKind::Mixed,
      status:      AssignmentStatus::Published,
      class_id:    None,
      rubric:      None,
      deadline:    None,
      created_at:  Utc::now(),
      updated_at:  Utc::now(),
    }
  }

  fn question(a: &Assignment, order_num: i64, kind: QuestionKind, answer: &str) -> Question {
    Question {
      id: Uuid::new_v4(),
      assignment_id: a.id,
      kind,
      content: format!("question {order_num}"),
      answer: answer.into(),
      score: 10,
      order_num,
    }
  }

  fn submission(a: &Assignment) -> Submission {
    Submission {
      id:                Uuid::new_v4(),
      assignment_id:     a.id,
      student_id:        Uuid::new_v4(),
      student_name:      "Ada".into(),
      answers:           Default::default(),
      code:              String::new(),
      total_score:       None,
      ai_feedback:       String::new(),
      teacher_feedback:  String::new(),
      question_scores:   Default::default(),
      question_feedback: Default::default(),
      status:            SubmissionStatus::Submitted,
      created_at:        Utc::now(),
      updated_at:        Utc::now(),
    }
  }

  #[test]
  fn grading_prompt_lists_key_and_marks_missing_answers() {
    let a = assignment();
    let q1 = question(&a, 1, QuestionKind::Choice { options: vec!["A. len".into(), "B. cap".into()] }, "B");
    let q2 = question(&a, 2, QuestionKind::Fill, "make");
    let mut s = submission(&a);
    s.answers.insert(q1.id.to_string(), "B".into());

    let prompt = grading_prompt(&a, &[q1.clone(), q2.clone()], &s);

    assert!(prompt.contains(&format!("[id: {}, type: choice, max score: 10]", q1.id)));
    assert!(prompt.contains("Standard answer: make"));
    assert!(prompt.contains("Options: A. len | B. cap"));
    assert!(prompt.contains(&format!("[id: {}]: B", q1.id)));
    assert!(prompt.contains(&format!("[id: {}]: {NO_ANSWER}", q2.id)));
    assert!(prompt.contains("no partial credit"));
    assert!(!prompt.contains("## Student code"));
  }

  #[test]
  fn grading_prompt_embeds_code() {
    let a = assignment();
    let mut s = submission(&a);
    s.code = "package main\n\nfunc main() {}\n".into();

    let prompt = grading_prompt(&a, &[], &s);
    assert!(prompt.contains("```go\npackage main\n\nfunc main() {}\n```"));
    assert!(!prompt.contains("## Answer key"));
  }

  #[test]
  fn generation_prompt_names_topic_and_difficulty() {
    let p = generation_prompt("goroutines", "hard");
    assert!(p.contains("\"goroutines\""));
    assert!(p.contains("hard difficulty"));
  }
}
