//! Outbound prompt construction.
//!
//! Combines a fixed instruction template with the gathered context and the
//! user's raw request.

use crate::context::GatheredContext;

pub const DEFAULT_INSTRUCTIONS: &str = "\
You are an expert software engineer helping a developer phrase requests for an AI coding assistant.
Rewrite the developer's request into a clear, specific and actionable prompt.
Keep the original intent. Mention concrete files, components or APIs when the context makes them obvious.
State acceptance criteria when they can be inferred. Do not invent requirements.
Reply with the improved prompt only, without preamble.";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instructions: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn build(&self, user_input: &str, context: &GatheredContext) -> String {
        let mut out = String::with_capacity(self.instructions.len() + user_input.len() + 256);
        out.push_str(&self.instructions);
        out.push_str("\n\n");

        if let Some(project) = &context.project {
            out.push_str("## Project\n");
            out.push_str(&format!("Language: {}\n", project.language));
            if let Some(fw) = &project.framework {
                out.push_str(&format!("Framework: {}\n", fw));
            }
            for c in &project.constraints {
                out.push_str(&format!("- {}\n", c));
            }
            out.push('\n');
        }

        if let Some(file) = &context.active_file {
            out.push_str(&format!("## Active file: {} ({})\n", file.relative_path, file.language));
            if let Some(line) = file.cursor_line {
                out.push_str(&format!("Cursor at line {}\n", line));
            }
            out.push_str("```\n");
            out.push_str(&file.content);
            if !file.content.ends_with('\n') {
                out.push('\n');
            }
            if file.truncated {
                out.push_str("... (truncated)\n");
            }
            out.push_str("```\n\n");
        }

        out.push_str("## Request\n");
        out.push_str(user_input.trim());
        out
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
