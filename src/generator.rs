//! Prompt assembly and code extraction for the send pipeline.
//!
//! The model is instructed to answer with a single fenced Python block; only
//! the inner text of the first fence is kept. Nothing here checks that the
//! snippet is valid Python, that is the interpreter's job.

use regex::Regex;
use crate::error::ChatError;
use crate::openai::{ApiMessage, OpenAIClient};
use crate::session::ChatHistory;

pub const SYSTEM_PROMPT: &str = "\
You are an assistant made for Blender, the 3D software.
Respond only with valid Python code inside triple backticks (```).
Avoid destructive operations, do not add cameras or lights unless asked.
Example:

```python
import bpy
bpy.ops.mesh.primitive_cube_add(location=(0,0,0))
```";

/// Ordered message list: system prompt first, prior turns in conversation
/// order, the new user message last.
pub fn build_messages(history: &ChatHistory, user_message: &str) -> Vec<ApiMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ApiMessage::new("system", SYSTEM_PROMPT));
    for msg in history.iter() {
        messages.push(ApiMessage::new(msg.role.as_str(), msg.content.clone()));
    }
    messages.push(ApiMessage::new("user", user_message));
    messages
}

/// Inner text of the first triple-backtick fence, with an optional language
/// tag ("python", "py", ...) stripped. `None` when the reply has no fence.
pub fn extract_code_block(text: &str) -> Option<String> {
    let re = Regex::new(r"(?s)```(?:[a-zA-Z0-9_+-]*\n)?(.*?)```")
        .ok()?;
    let inner = re.captures(text)?.get(1)?.as_str();
    let code = inner.trim_matches('\n').trim_end();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

/// One full generation: send the conversation, pull the first code block out
/// of the reply. `NoCode` when the model answered without a fence.
pub async fn generate(
    client: &OpenAIClient,
    model: &str,
    messages: &[ApiMessage],
) -> Result<String, ChatError> {
    let reply = client.chat(model, messages).await?;
    extract_code_block(&reply).ok_or(ChatError::NoCode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatRole;

    #[test]
    fn extracts_a_bare_fenced_block() {
        assert_eq!(extract_code_block("```print(1)```").as_deref(), Some("print(1)"));
    }

    #[test]
    fn strips_the_language_tag() {
        let reply = "Here you go:\n```python\nimport bpy\nbpy.ops.mesh.primitive_cube_add()\n```\nEnjoy!";
        assert_eq!(
            extract_code_block(reply).as_deref(),
            Some("import bpy\nbpy.ops.mesh.primitive_cube_add()")
        );
    }

    #[test]
    fn takes_only_the_first_block() {
        let reply = "```python\nfirst()\n```\nand then\n```python\nsecond()\n```";
        assert_eq!(extract_code_block(reply).as_deref(), Some("first()"));
    }

    #[test]
    fn no_fence_means_no_code() {
        assert!(extract_code_block("I cannot write that for you.").is_none());
        assert!(extract_code_block("").is_none());
        assert!(extract_code_block("``````").is_none());
    }

    #[test]
    fn message_list_keeps_conversation_order() {
        let mut history = ChatHistory::new();
        history.append(ChatRole::User, "add a cube at the origin");
        history.append(ChatRole::Assistant, "bpy.ops.mesh.primitive_cube_add()");

        let messages = build_messages(&history, "now scale it by 2");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "add a cube at the origin");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "now scale it by 2");
    }

    #[test]
    fn empty_history_still_sends_system_then_user() {
        let history = ChatHistory::new();
        let messages = build_messages(&history, "add a cube at the origin");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }
}
