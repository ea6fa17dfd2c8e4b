//! Prompt templates for grounded answering

use crate::retrieval::Context;

/// Prompt builder for retrieval-augmented answers
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the grounded answer prompt. The model is constrained to the
    /// assembled context; ungrounded questions never reach this point
    /// because the orchestrator short-circuits on empty context.
    pub fn build_answer_prompt(question: &str, context: &Context) -> String {
        format!(
            r#"You are a product support assistant that ONLY uses information from the provided documentation.

RULES:
1. ONLY use information that is explicitly stated in the CONTEXT below
2. If the answer is not in the context, say the documentation does not cover it
3. NEVER use external knowledge or make assumptions beyond the context
4. Stay close to the source text; do not paraphrase in ways that change meaning

CONTEXT:
{context}

QUESTION: {question}

Provide a grounded answer using ONLY the documentation above:"#,
            context = context.text,
            question = question
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_context_and_question() {
        let ctx = Context {
            text: "[1] manual.pdf\n\nHold the reset button.\n\n---\n\n".to_string(),
            passage_ids: vec!["p1".to_string()],
        };
        let prompt = PromptBuilder::build_answer_prompt("How do I reset?", &ctx);
        assert!(prompt.contains("Hold the reset button."));
        assert!(prompt.contains("QUESTION: How do I reset?"));
    }
}
