//! Prompt rendering.

use modelroute_core::{BackendId, Task, TaskType};

use crate::context::AugmentedInput;

/// Turns a task and its assembled context into backend prompt text.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, task: &Task, input: &AugmentedInput, backend: BackendId) -> String;
}

/// ChatML renderer with a system prompt per backend and an instruction
/// block per task type.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    fn system_prompt(backend: BackendId) -> &'static str {
        match backend {
            BackendId::DeepSeek => {
                "You are an expert programming assistant with deep knowledge of software development. \
                 Your responses should be technical, precise, and focused on practical implementation."
            }
            BackendId::Friday => {
                "You are FRIDAY, a warm, witty and highly competent assistant. \
                 Explain concepts in an accessible way."
            }
            BackendId::Huginn => "You are Huginn, a fast and concise assistant. Keep answers short.",
            BackendId::Mixtral => {
                "You are a knowledgeable general assistant. Give accurate, well-structured answers."
            }
            BackendId::Phi => {
                "You are a careful writer. Produce clear, natural prose and documentation."
            }
        }
    }

    fn instructions(task_type: TaskType) -> &'static str {
        match task_type {
            TaskType::Explanation => {
                "Please explain the following in detail. Focus on overall purpose, key components \
                 and how they interact, and notable patterns used."
            }
            TaskType::Generation => {
                "Please generate code for the following description. Include error handling and \
                 comment complex logic."
            }
            TaskType::Debugging => {
                "Please help debug the following. Identify the root cause, suggest a specific fix \
                 and provide a corrected version."
            }
            TaskType::TestGeneration => {
                "Please write tests for the following code. Cover normal behaviour and edge cases."
            }
            TaskType::Documentation => {
                "Please write documentation for the following. Describe parameters, return values \
                 and usage."
            }
            TaskType::GeneralConversation => "",
        }
    }

    /// Wrap a system and user prompt in the ChatML layout.
    pub fn wrap(system: &str, user: &str) -> String {
        format!(
            "<|im_start|>system\n{}<|im_end|>\n<|im_start|>user\n{}<|im_end|>\n<|im_start|>assistant\n",
            system.trim(),
            user.trim()
        )
    }
}

impl PromptRenderer for TemplateRenderer {
    fn render(&self, task: &Task, input: &AugmentedInput, backend: BackendId) -> String {
        let mut system = Self::system_prompt(backend).to_string();
        if !input.body.is_empty() {
            system.push_str("\n\n");
            system.push_str(&input.body);
        }

        let instructions = Self::instructions(task.task_type);
        let user = if instructions.is_empty() {
            task.input.clone()
        } else {
            format!("{instructions}\n\n{}", task.input)
        };

        Self::wrap(&system, &user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelroute_core::Context;

    #[test]
    fn test_render_chatml_layout() {
        let task = Task::new(TaskType::Debugging, "panic at index 3");
        let input = AugmentedInput {
            context: Context::default(),
            retrieved: vec![],
            degraded: false,
            body: "Session metadata:\n- lang: rust".to_string(),
        };

        let prompt = TemplateRenderer::new().render(&task, &input, BackendId::DeepSeek);

        assert!(prompt.starts_with("<|im_start|>system\nYou are an expert programming"));
        assert!(prompt.contains("- lang: rust<|im_end|>"));
        assert!(prompt.contains("root cause"));
        assert!(prompt.contains("panic at index 3<|im_end|>"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn test_conversation_has_no_instruction_block() {
        let task = Task::new(TaskType::GeneralConversation, "hello");
        let input = AugmentedInput::default();
        let prompt = TemplateRenderer::new().render(&task, &input, BackendId::Huginn);
        assert!(prompt.contains("<|im_start|>user\nhello<|im_end|>"));
    }
}
