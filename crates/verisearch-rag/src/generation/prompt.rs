//! Prompt templates for grounded answer generation

use crate::types::{ChatMessage, Segment};

/// Delimiter between context passages
pub const PASSAGE_DELIMITER: &str = "\n\n---\n\n";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Concatenate passages with their source labels, in rank order
    pub fn build_context(passages: &[Segment]) -> String {
        passages
            .iter()
            .map(|p| format!("[Source: {}]\n{}", p.label(), p.text()))
            .collect::<Vec<_>>()
            .join(PASSAGE_DELIMITER)
    }

    /// Fold prior turns into `ROLE: content` blocks
    pub fn build_history(history: &[ChatMessage]) -> String {
        history
            .iter()
            .map(|m| format!("{}: {}\n\n", m.role, m.content))
            .collect()
    }

    /// Build the full RAG prompt
    pub fn build_rag_prompt(question: &str, context: &str, history: &[ChatMessage]) -> String {
        let history_text = Self::build_history(history);
        let history_block = if history_text.is_empty() {
            String::new()
        } else {
            format!("CONVERSATION HISTORY:\n{}", history_text)
        };

        format!(
            r#"You are VeriSearch, an intelligent assistant that answers questions based on company documents.

CONTEXT FROM DOCUMENTS:
{context}

{history_block}

USER QUESTION: {question}

Instructions:
1. Answer based ONLY on the provided context
2. If the context doesn't contain the answer, say so clearly
3. Cite specific documents or pages when possible
4. Be concise but comprehensive
5. Use formatting (bullet points, bold) for clarity

ANSWER:"#,
            context = context,
            history_block = history_block,
            question = question
        )
    }
}
