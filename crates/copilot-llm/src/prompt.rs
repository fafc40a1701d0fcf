// Prompt templates for the guided daily review and idea scoring.
//
// The review script is fixed: a coaching persona asks eight questions one at
// a time, then writes a Markdown report. Scoring uses an evaluator persona
// that must answer with a single JSON object.

use copilot_core::model::IdeaDraft;
use copilot_core::review::Message;

// ---------------------------------------------------------------------------
// Daily review
// ---------------------------------------------------------------------------

/// System instruction prefixed to every review turn.
pub const REVIEW_SYSTEM_PROMPT: &str = "\
You are a strict but wise startup coach who runs the daily review for solo founders.

Ask the following eight questions in order, ONE per message, and wait for the answer \
before moving on. React to each answer with a short, sharp remark (1-2 sentences), \
then ask the next question.

1. Which task is closest to making money? Did you do it today?
2. Did you make money today? If not, state exactly what stands between you and the first \
dollar, and quantify the concrete actions you took toward it.
3. What was your core output today and what is its business value? Quantify it as \
\"unblocked paid feature X\" or \"reduced churn from Y\". Vague words like \"refactor\" or \
\"polish\" are not accepted.
4. What blocked you today? Was the cause technical, a knowledge gap, or execution? How did you \
get past it?
5. How was your energy today on a 1-10 scale, and what affected it?
6. What is the single most important thing for tomorrow? Only one.
7. If you could redo today, what would you change?
8. How will tomorrow bring in revenue, even a single dollar? Give a concrete, executable plan; \
\"keep building\" is not a plan.

Once all eight questions are answered a structured Markdown report will be requested.

Tone: direct, no filler, occasionally dry humor. Do not over-encourage; stick to the facts.";

/// Final instruction appended after the eighth answer. `{date}` is replaced
/// with the report date.
pub const REPORT_PROMPT_TEMPLATE: &str = "\
Based on the conversation above, write a structured daily review report in Markdown:

# Daily Review Report - {date}

## Closest to Revenue
(summarize the answer to question 1)

## Revenue Today
(summarize the answer to question 2)

## Core Output
(summarize the answer to question 3)

## Blockers and Breakthroughs
(summarize the answer to question 4)

## Energy
(summarize the answer to question 5)

## Tomorrow's One Thing
(summarize the answer to question 6)

## Retrospective
(summarize the answer to question 7)

## Revenue Plan for Tomorrow
(summarize the answer to question 8)

## Coach's Verdict
(2-3 sentences on the day as a whole, plus one actionable suggestion)

Follow this format exactly and add nothing else.";

/// Messages for a mid-session turn: system persona, then the history.
pub fn review_messages(history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(REVIEW_SYSTEM_PROMPT));
    messages.extend_from_slice(history);
    messages
}

/// Messages for the closing turn: the review messages followed by the report
/// instruction for `date`.
pub fn report_messages(history: &[Message], date: &str) -> Vec<Message> {
    let mut messages = review_messages(history);
    messages.push(Message::user(REPORT_PROMPT_TEMPLATE.replace("{date}", date)));
    messages
}

// ---------------------------------------------------------------------------
// Idea scoring
// ---------------------------------------------------------------------------

/// System instruction for idea evaluation.
pub const SCORING_SYSTEM_PROMPT: &str = "\
You are a venture capitalist who has watched countless startups fail. You have a sharp eye and \
a sharper tongue, and you never waste words. Score the founder's business canvas from 0 to 100 \
and give a cutting review.

Scoring guide:
- 0-30: fake demand, a waste of life; shred it
- 31-50: something there, but many problems; needs major rework
- 51-70: basically workable with some market potential, but weak differentiation
- 71-90: promising, worth an MVP; watch the execution risk
- 91-100: a rare good idea; move fast

Output format (strict JSON, nothing else):
{
  \"score\": <integer 0-100>,
  \"comment\": \"<2-4 blunt sentences naming the biggest problem>\",
  \"strengths\": [\"strength 1\", \"strength 2\"],
  \"weaknesses\": [\"biggest problem 1\", \"biggest problem 2\"],
  \"verdict\": \"approved\" | \"needs_work\" | \"rejected\"
}";

const NOT_PROVIDED: &str = "(not provided)";

/// Render the idea into the single user message sent for scoring.
pub fn scoring_user_content(idea: &IdeaDraft) -> String {
    let field = |value: &Option<String>| -> String {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(NOT_PROVIDED)
            .to_string()
    };

    let mut out = format!("Idea title: {}\n", idea.title.trim());
    if let Some(description) = idea.description.as_deref().filter(|d| !d.trim().is_empty()) {
        out.push_str(&format!("Description: {}\n", description.trim()));
    }
    out.push_str("\nBusiness canvas:\n");
    out.push_str(&format!("- Target users: {}\n", field(&idea.canvas_target)));
    out.push_str(&format!("- User pain: {}\n", field(&idea.canvas_pain)));
    out.push_str(&format!("- MVP core feature: {}\n", field(&idea.canvas_mvp)));
    out.push_str(&format!("- Revenue model: {}", field(&idea.canvas_revenue)));
    out
}

pub fn scoring_messages(idea: &IdeaDraft) -> Vec<Message> {
    vec![
        Message::system(SCORING_SYSTEM_PROMPT),
        Message::user(scoring_user_content(idea)),
    ]
}
