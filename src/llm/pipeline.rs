use crate::llm::models::{GenerationInput, GenerationOutcome};
use crate::llm::parser::parse_response;
use crate::llm::prompts::{build_prompt, validate_input};
use crate::llm::{LlmError, ProgressSink, SchemaGenerator};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Validate, build the prompt, call the generator and parse what comes back.
///
/// Validation failures return before the generator is touched. Generator failures are returned
/// as they are. Parsing never fails.
pub async fn generate_schema(
    input: &GenerationInput,
    generator: &dyn SchemaGenerator,
    progress: Option<&dyn ProgressSink>,
) -> Result<GenerationOutcome, LlmError> {
    let report = validate_input(input);
    if !report.is_valid {
        warn!("Rejected generation request: {}", report.errors.join(", "));
        return Err(LlmError::Validation(report.errors));
    }

    let prompt = build_prompt(input);
    info!(
        "Generating schema in {} mode with model {}",
        prompt.mode,
        generator.model()
    );

    let started = Instant::now();
    let raw = generator.generate(&prompt, progress).await?;
    let duration_ms = started.elapsed().as_millis() as u64;
    debug!("Raw response ({} chars) after {}ms", raw.text.len(), duration_ms);

    let result = parse_response(&raw.text);
    info!(
        "Schema generated: {} suggestions, cost estimate: {}",
        result.suggestions.len(),
        result.estimated_cost.as_deref().unwrap_or("none")
    );

    Ok(GenerationOutcome {
        result,
        mode: prompt.mode,
        model: raw.model,
        duration_ms,
        tokens_used: raw.tokens_used,
        prompt_used: prompt.user_instruction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::{GenerationMode, PromptConfig, RawResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedGenerator {
        text: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SchemaGenerator for CannedGenerator {
        async fn generate(
            &self,
            _prompt: &PromptConfig,
            _progress: Option<&dyn ProgressSink>,
        ) -> Result<RawResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawResponse {
                text: self.text.to_string(),
                model: "canned".to_string(),
                tokens_used: Some(42),
            })
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl SchemaGenerator for FailingGenerator {
        async fn generate(
            &self,
            _prompt: &PromptConfig,
            _progress: Option<&dyn ProgressSink>,
        ) -> Result<RawResponse, LlmError> {
            Err(LlmError::Upstream {
                status: 429,
                message: "Rate limit reached".to_string(),
            })
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_validation_short_circuits() {
        let generator = CannedGenerator {
            text: "",
            calls: AtomicUsize::new(0),
        };
        let input = GenerationInput::from_description("tiny");

        let err = generate_schema(&input, &generator, None).await.unwrap_err();
        assert!(matches!(err, LlmError::Validation(ref errors) if errors.len() == 1));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_outcome_carries_metadata() {
        let generator = CannedGenerator {
            text: "```sql\nCREATE TABLE books (id INT);\n```\nExplanation: one table",
            calls: AtomicUsize::new(0),
        };
        let input = GenerationInput::from_description("A catalogue of books");

        let outcome = generate_schema(&input, &generator, None).await.unwrap();
        assert_eq!(outcome.mode, GenerationMode::NewSchema);
        assert_eq!(outcome.model, "canned");
        assert_eq!(outcome.tokens_used, Some(42));
        assert_eq!(outcome.result.sql, "CREATE TABLE books (id INT);");
        assert_eq!(outcome.result.explanation, "one table");
        assert!(outcome.prompt_used.contains("A catalogue of books"));
    }

    #[tokio::test]
    async fn test_generator_errors_propagate() {
        let input = GenerationInput::from_description("A catalogue of books");
        let err = generate_schema(&input, &FailingGenerator, None).await.unwrap_err();
        assert!(matches!(err, LlmError::Upstream { status: 429, .. }));
    }
}
