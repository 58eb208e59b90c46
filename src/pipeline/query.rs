use super::types::RetrievedChunk;
use crate::completion::{CompletionClient, CompletionError, CompletionRequest, PromptTemplate};
use std::sync::Arc;

/// Rewrites a user question into a retrieval query.
#[derive(Clone)]
pub struct QueryRefiner {
    completion: Arc<dyn CompletionClient>,
}

impl QueryRefiner {
    /// Refiner backed by `completion`.
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    /// One completion call; an empty refinement falls back to the original question.
    pub async fn refine(&self, question: &str) -> Result<String, CompletionError> {
        let refined = self
            .completion
            .complete(CompletionRequest::new(PromptTemplate::RefineQuery).with("question", question))
            .await?;
        let refined = refined.trim();
        if refined.is_empty() {
            tracing::debug!("Empty query refinement; using the original question");
            return Ok(question.trim().to_string());
        }
        Ok(refined.to_string())
    }
}

/// Answers a refined query from retrieved chunks.
#[derive(Clone)]
pub struct Responder {
    completion: Arc<dyn CompletionClient>,
}

impl Responder {
    /// Responder backed by `completion`.
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    /// One completion call with the chunks rendered as labelled context.
    pub async fn answer(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<String, CompletionError> {
        let request = CompletionRequest::new(PromptTemplate::GroundedAnswer)
            .with("context", render_context(chunks))
            .with("question", query);
        let answer = self.completion.complete(request).await?;
        Ok(answer.trim().to_string())
    }
}

/// Chunks joined by blank lines, each prefixed with `[filename, page P, paragraph N]`.
pub fn render_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "[{}, page {}, paragraph {}]\n{}",
                chunk.filename, chunk.page, chunk.paragraph, chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::ScriptedCompletion;

    fn chunk(filename: &str, page: u32, paragraph: u32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.into(),
            score: 0.5,
            document_id: "d".into(),
            filename: filename.into(),
            page,
            paragraph,
        }
    }

    #[tokio::test]
    async fn blank_refinement_falls_back_to_question() {
        let refiner = QueryRefiner::new(Arc::new(ScriptedCompletion::constant("   ")));
        assert_eq!(refiner.refine(" what is rust? ").await.unwrap(), "what is rust?");
    }

    #[tokio::test]
    async fn refinement_is_trimmed() {
        let refiner = QueryRefiner::new(Arc::new(ScriptedCompletion::constant(" rust language\n")));
        assert_eq!(refiner.refine("hey, what's rust").await.unwrap(), "rust language");
    }

    #[tokio::test]
    async fn answer_receives_labelled_context() {
        let completion = Arc::new(ScriptedCompletion::constant("Paris."));
        let responder = Responder::new(completion.clone());
        let chunks = [chunk("atlas.pdf", 2, 3, "Paris is the capital of France.")];

        assert_eq!(responder.answer("capital of France", &chunks).await.unwrap(), "Paris.");
        let requests = completion.requests().await;
        assert_eq!(requests[0].template, PromptTemplate::GroundedAnswer);
        assert_eq!(
            requests[0].variable("context"),
            Some("[atlas.pdf, page 2, paragraph 3]\nParis is the capital of France.")
        );
        assert_eq!(requests[0].variable("question"), Some("capital of France"));
    }

    #[test]
    fn context_separates_chunks_with_blank_lines() {
        let context = render_context(&[chunk("a.pdf", 1, 1, "one"), chunk("b.png", 1, 2, "two")]);
        assert_eq!(context, "[a.pdf, page 1, paragraph 1]\none\n\n[b.png, page 1, paragraph 2]\ntwo");
    }
}
