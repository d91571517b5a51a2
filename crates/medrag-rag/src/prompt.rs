//! Prompt construction for the two answer branches.
use medrag_core::config::PromptConfig;
use medrag_core::types::RetrievedChunk;

/// Text of the first `context_chunks` chunks, each cut to `context_chars`
/// characters, separated by a blank line.
pub fn build_context(chunks: &[RetrievedChunk], config: &PromptConfig) -> String {
    chunks
        .iter()
        .take(config.context_chunks)
        .map(|c| c.text.chars().take(config.context_chars).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn grounded_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a medical assistant answering strictly from WHO guideline excerpts.\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n\n\
         Instructions:\n\
         - Use ONLY the context\n\
         - Be concise (3-5 lines)\n\
         - If partially unclear, answer what is known\n\n\
         Answer:\n"
    )
}

/// Used when nothing cleared the similarity floor.
pub fn fallback_prompt(question: &str) -> String {
    format!(
        "You are a medical assistant.\n\n\
         Give a GENERAL medical explanation.\n\
         This answer is NOT based on WHO or retrieved guidelines.\n\n\
         Question:\n{question}\n\n\
         Answer briefly (3-5 lines):\n"
    )
}
