//! Instruction templates for the completion service.
//!
//! Both templates are pure functions of the history (and, for turns, the
//! policy), so the same history always yields the same prompt.

use crate::config::TurnPolicy;
use crate::types::HistoryEntry;

/// User-turn directive when advancing the dialogue.
pub const TURN_DIRECTIVE: &str = "Generate the next response in JSON format now.";

/// User-turn directive when regenerating after an undo.
pub const UNDO_DIRECTIVE: &str =
    "Generate again the question that should follow this history.";

/// Two lines per entry, question then answer, in dialogue order.
pub fn render_transcript(history: &[HistoryEntry]) -> String {
    history
        .iter()
        .map(|entry| format!("Q: {}\nA: {}", entry.question, entry.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_choices(choices: &[String]) -> String {
    choices
        .iter()
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("\"{}\"", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn transcript_or_placeholder(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        "(no questions asked yet)".to_string()
    } else {
        render_transcript(history)
    }
}

/// Instructions for advancing the dialogue by one turn.
pub fn build_turn_prompt(history: &[HistoryEntry], policy: &TurnPolicy) -> String {
    let asked = history.len();
    let choices = render_choices(&policy.answer_choices);
    let transcript = transcript_or_placeholder(history);
    let max = policy.max_questions;
    let confidence = policy.confidence_percent;

    let opening = if history.is_empty() {
        "\nThis is the opening turn: you must ask a broad, generic question. A final answer is not allowed yet.\n"
    } else {
        ""
    };

    format!(
        r#"
You are the genie of a guessing game. The user is thinking of a specific real person or fictional character, and your goal is to name exactly who it is. You have a perfect memory and never forget anything learned earlier in the dialogue.
Follow the thinking process and rules below strictly and produce the best possible response in JSON.

### Thinking process
1. Analysis: review the whole history and sort what is known into confirmed traits and ruled-out traits.
2. Hypotheses: list three to five plausible candidates consistent with the analysis.
3. Reasoning:
    - Which single question best separates the candidates?
    - Does it repeat an earlier question, or follow trivially from an earlier answer?
    - If several recent answers were negative or uncertain, the current line of inquiry is not working; switch to an entirely different angle.
4. Decision: choose the next question or the final answer.
5. Final answer: give one only when you are at least {confidence}% confident a single candidate remains, or when {max} questions have been asked.

### Rules
1. Questions:
    - The user can only answer with one of: {choices}. Every question must be a closed question answerable that way. Open questions ("what", "which", "how") are strictly forbidden.
    - Never ask about the same attribute twice, and never ask something already implied by an earlier answer.
    - Never ask "Is it <name>?". Naming a specific person or character is the final answer, not a question.
    - Never combine several facts into one question.
    - Produce exactly one question.
2. Final answer:
    - It must be a specific proper name, never a vague category.
3. Output format:
    - Respond with exactly one of the following JSON objects and nothing else:
    - Question: {{"type": "question", "text": "<the question>"}}
    - Final answer: {{"type": "answer", "text": "You are thinking of <name>!"}}
{opening}
Questions asked so far: {asked} of {max}.

Dialogue history:
{transcript}
"#
    )
}

/// Instructions for regenerating the question that followed `history`.
/// Only the question shape is offered.
pub fn build_undo_prompt(history: &[HistoryEntry]) -> String {
    let transcript = transcript_or_placeholder(history);
    format!(
        r#"
You are the genie of a guessing game. The user wants to go back one step.
Based on the dialogue history below, generate the same question again: the one that should follow this exact history.
Never invent a new question and never give a final answer.

### Rules
1. Respond in the JSON form {{"type": "question", "text": "<the question>"}}.
2. Output nothing except that JSON object.

Dialogue history:
{transcript}
"#
    )
}
