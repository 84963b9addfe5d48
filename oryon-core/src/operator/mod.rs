//! Operator prompts: free-form chat and structured change plans

mod plan;

pub use plan::{extract_plan, find_json_block, generate_plan, FileChange, Plan, PlanRequest, PLAN_SYSTEM};

use crate::provider::{Mode, ProviderRouter};
use crate::Result;

/// System prompt for conversational requests
pub const CHAT_SYSTEM: &str =
    "You are ORYON Operator. Answer concisely and propose concrete next actions when relevant.";

/// Answer a chat message through the router
pub async fn chat(router: &ProviderRouter, message: &str, mode: Mode) -> Result<String> {
    router.respond(CHAT_SYSTEM, message, mode).await
}
