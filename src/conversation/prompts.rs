//! Prompt builders for the three-turn exchange.
//!
//! Pure functions from conversation state to prompt text, one per turn
//! plus the setup-time rationale prompt. Keeping them free of I/O makes
//! the wording testable without a backend.

use crate::memory::RECORD_DELIMITER;

/// Opinions closer than this trigger the devil's-advocate instruction.
pub const DEVILS_ADVOCATE_THRESHOLD: f64 = 0.3;

/// Fixed instruction injected when two agents already largely agree.
const DEVILS_ADVOCATE: &str = "Challenge the other person's reasoning even if you \
    partly agree. Play devil's advocate to explore weaknesses in their argument.";

/// Trailer demanding the labeled opinion line on turns 2 and 3.
const OPINION_TRAILER: &str = "After your response, on a new line write exactly: \
    OPINION: <your updated opinion as a float from -1.0 to 1.0>";

/// One speaker's view of the world when a prompt is built.
#[derive(Debug, Clone, Copy)]
pub struct SpeakerContext<'a> {
    /// Current stance text.
    pub stance: &'a str,
    /// Numeric opinion recovered from the stance.
    pub score: f64,
    /// Current rationale.
    pub rationale: &'a str,
}

/// Returns the challenge instruction when the two opinions differ by
/// less than [`DEVILS_ADVOCATE_THRESHOLD`]. The comparison is strict: a
/// difference of exactly 0.3 gets no instruction.
pub fn devils_advocate_instruction(difference: f64) -> Option<&'static str> {
    if difference.abs() < DEVILS_ADVOCATE_THRESHOLD {
        Some(DEVILS_ADVOCATE)
    } else {
        None
    }
}

/// Turn-1 prompt: the opening agent states its position and one argument.
pub fn build_opening_prompt(
    topic: &str,
    speaker: &SpeakerContext<'_>,
    memory: &[String],
    challenge: Option<&str>,
) -> String {
    format!(
        "Topic: \"{topic}\"\n\
         Your position: {stance} (score: {score:.2})\n\
         Your reasoning: {rationale}\n\
         {memory}{challenge}\
         State your position on this topic and give ONE specific argument \
         supporting it. Be direct, with no hedging or seeking common ground. \
         1-3 sentences only.",
        stance = speaker.stance,
        score = speaker.score,
        rationale = speaker.rationale,
        memory = memory_context(memory),
        challenge = challenge_block(challenge),
    )
}

/// Turn-2 prompt: the responding agent counters the opening turn and
/// must end with the labeled opinion line.
pub fn build_response_prompt(
    topic: &str,
    speaker: &SpeakerContext<'_>,
    memory: &[String],
    challenge: Option<&str>,
    opening: &str,
) -> String {
    format!(
        "Topic: \"{topic}\"\n\
         Your position: {stance} (score: {score:.2})\n\
         Your reasoning: {rationale}\n\
         {memory}{challenge}\
         Someone said: \"{opening}\"\n\n\
         Respond to their argument. Defend your own position with a specific \
         counterpoint or evidence. Do not simply agree. 1-3 sentences only.\n\n\
         {OPINION_TRAILER}",
        stance = speaker.stance,
        score = speaker.score,
        rationale = speaker.rationale,
        memory = memory_context(memory),
        challenge = challenge_block(challenge),
    )
}

/// Turn-3 prompt: the opening agent weighs both prior turns, may shift
/// or hold, and must end with the labeled opinion line.
pub fn build_reply_prompt(
    topic: &str,
    speaker: &SpeakerContext<'_>,
    challenge: Option<&str>,
    opening: &str,
    response: &str,
) -> String {
    format!(
        "Topic: \"{topic}\"\n\
         Your position: {stance} (score: {score:.2})\n\
         Your reasoning: {rationale}\n\
         {challenge}\
         Conversation so far:\n\
         You said: \"{opening}\"\n\
         They replied: \"{response}\"\n\n\
         Respond to their points. You may shift your view if they made a \
         compelling argument, or push back if you disagree. Be specific. \
         1-3 sentences only.\n\n\
         {OPINION_TRAILER}",
        stance = speaker.stance,
        score = speaker.score,
        rationale = speaker.rationale,
        challenge = challenge_block(challenge),
    )
}

/// Setup-time prompt asking for a one-sentence rationale for an opinion.
pub fn build_rationale_prompt(opinion: f64, topic: &str) -> String {
    format!(
        "The topic is: \"{topic}\"\n\
         A person's opinion on this is {opinion:.2} on a scale from -1.0 \
         (strongly against) to +1.0 (strongly in favor).\n\
         Write ONE specific sentence explaining why they hold this position. \
         Be concrete: reference a specific concern, experience, or value. \
         Do not be generic."
    )
}

fn memory_context(memory: &[String]) -> String {
    if memory.is_empty() {
        return String::new();
    }
    format!(
        "\nYour recent conversation history:\n{}\n",
        memory.join(RECORD_DELIMITER)
    )
}

fn challenge_block(challenge: Option<&str>) -> String {
    match challenge {
        Some(instruction) => format!("{instruction}\n\n"),
        None => String::new(),
    }
}
