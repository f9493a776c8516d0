//! Three-turn conversations: prompt construction and orchestration.

pub mod orchestrator;
pub mod prompts;

pub use orchestrator::{ConversationOrchestrator, ConversationOutcome};
pub use prompts::{
    build_opening_prompt, build_rationale_prompt, build_reply_prompt, build_response_prompt,
    devils_advocate_instruction, SpeakerContext, DEVILS_ADVOCATE_THRESHOLD,
};
