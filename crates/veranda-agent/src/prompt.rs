use veranda_core::RetrievedChunk;

/// Separator between retrieved context snippets inside the prompt.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Compose the final prompt from the query, retrieved context, and prior
/// conversation history.
///
/// The mapping is a deterministic 2x2 table: history, when present, is
/// always prefixed regardless of the context branch; the context branch
/// picks between the grounded-answer template and the nothing-found
/// template (which leans on the system prompt's strict-grounding rules).
pub fn build_prompt(query: &str, contexts: &[RetrievedChunk], history: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !history.is_empty() {
        parts.push(format!("Previous conversation context:\n{history}\n"));
    }

    if contexts.is_empty() {
        parts.push(format!(
            "The user asked: \"{query}\". No information was found in the knowledge base. \
             Follow your instructions for how to respond when no relevant information is available."
        ));
    } else {
        let context_str = contexts
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        parts.push(format!(
            "Use the following knowledge base context to answer the user's query.\n\n\
             Context:\n{context_str}\n\n\
             User Query: \"{query}\"\n\n\
             Remember to follow your rules strictly: if the context is not relevant, you must decline to answer."
        ));
    }

    parts.join("\n")
}

/// Prompt for the direct (no knowledge base) path, still memory-aware.
pub fn build_direct_prompt(query: &str, history: &str) -> String {
    if history.is_empty() {
        query.to_string()
    } else {
        format!("Previous conversation context:\n{history}\n\nCurrent query: {query}")
    }
}
