use std::path::Path;

use crate::core::context::ContextStore;

/// System prompt sent at the head of every request.
pub fn build_system_prompt(
    system_message: &str,
    context: &ContextStore,
    working_dir: Option<&Path>,
) -> String {
    let mut prompt = system_message.trim().to_string();

    if let Some(dir) = working_dir {
        prompt.push_str(&format!("\n\nWorking directory: {}", dir.display()));
    }

    if !context.is_empty() {
        prompt.push_str("\n\nCurrent context:");
        for (key, value) in context.entries() {
            prompt.push_str(&format!("\n- {key}: {value}"));
        }
    }

    prompt
}
