//! Adversarial test-case generation: prompt the generating agent through the
//! invoker, then parse its completion for a fenced code block plus a
//! "Description:" line, falling back to a language-specific stub when the
//! target has no code or the completion yields neither.

use crate::invoker::AgentInvoker;
use crate::types::{Agent, AgentId, DebateContext, InvokerError};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCategory {
    Functional,
    EdgeCase,
    Performance,
    Security,
    Concurrency,
    ErrorHandling,
}

#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: String,
    pub generator_agent: AgentId,
    pub target_solution: String,
    pub language: String,
    pub code: String,
    pub description: String,
    pub category: TestCategory,
    pub difficulty: String,
    pub created_at: SystemTime,
}

/// Builds a test case targeting `target_code` on behalf of `generator`, by
/// prompting it through `invoker` with the target code, language, context,
/// and difficulty. Falls back to a language-specific stub without invoking
/// anything when there is no target code to write a test against.
pub async fn generate_test_case(
    generator: &Agent,
    invoker: &dyn AgentInvoker,
    ctx: &DebateContext,
    deadline: Duration,
    target_solution: &str,
    language: &str,
    target_code: &str,
    context: &str,
    difficulty: &str,
) -> Result<TestCase, InvokerError> {
    let (code, description) = if target_code.trim().is_empty() {
        (stub_for_language(language), String::new())
    } else {
        let prompt = build_prompt(language, target_code, context, difficulty);
        let response = invoker.invoke(generator, &prompt, ctx, deadline).await?;
        parse_completion(&response.content, language)
    };
    let category = infer_category(&description, &code);

    Ok(TestCase {
        id: make_test_id(&generator.id, target_solution),
        generator_agent: generator.id,
        target_solution: target_solution.to_string(),
        language: language.to_string(),
        code,
        description,
        category,
        difficulty: difficulty.to_string(),
        created_at: SystemTime::now(),
    })
}

/// Prompt asking the generating agent to write an adversarial test, in the
/// fenced-code-block-plus-description shape `parse_completion` expects.
fn build_prompt(language: &str, target_code: &str, context: &str, difficulty: &str) -> String {
    format!(
        "Write a {difficulty} adversarial {language} test for the following code.\n\
         context: {context}\n\
         code:\n```{language}\n{target_code}\n```\n\
         Respond with a line starting \"Description:\" followed by a fenced {language} code block containing the test."
    )
}

fn parse_completion(completion: &str, language: &str) -> (String, String) {
    let description = completion
        .lines()
        .find(|l| l.starts_with("Description:"))
        .map(|l| l.trim_start_matches("Description:").trim().to_string())
        .unwrap_or_default();

    let fence = format!("```{language}");
    if let Some(start) = completion.find(&fence) {
        let after = &completion[start + fence.len()..];
        if let Some(end) = after.find("```") {
            let code = after[..end].trim().to_string();
            if !code.is_empty() {
                return (code, description);
            }
        }
    }
    // Generic fence without a language tag.
    if let Some(start) = completion.find("```") {
        let after = &completion[start + 3..];
        if let Some(end) = after.find("```") {
            let code = after[..end].trim().to_string();
            if !code.is_empty() {
                return (code, description);
            }
        }
    }

    (stub_for_language(language), description)
}

fn stub_for_language(language: &str) -> String {
    match language {
        "python" => "assert True  # no code block found; stub test".to_string(),
        "rust" => "#[test]\nfn stub() { assert!(true); }".to_string(),
        "javascript" | "typescript" => "console.assert(true);".to_string(),
        "go" => "func TestStub(t *testing.T) {}".to_string(),
        _ => "// stub test: no code block found".to_string(),
    }
}

fn infer_category(description: &str, code: &str) -> TestCategory {
    let haystack = format!("{description} {code}").to_lowercase();
    if haystack.contains("inject") || haystack.contains("security") {
        TestCategory::Security
    } else if haystack.contains("concurrent") || haystack.contains("race") || haystack.contains("thread") {
        TestCategory::Concurrency
    } else if haystack.contains("performance") || haystack.contains("speed") || haystack.contains("memory") {
        TestCategory::Performance
    } else if haystack.contains("error") || haystack.contains("exception") || haystack.contains("fail") {
        TestCategory::ErrorHandling
    } else if haystack.contains("edge") || haystack.contains("boundary") || haystack.contains("limit") {
        TestCategory::EdgeCase
    } else {
        TestCategory::Functional
    }
}

fn make_test_id(generator_agent: &AgentId, target_solution: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generator_agent.to_string().as_bytes());
    hasher.update(target_solution.as_bytes());
    let digest = hasher.finalize();
    let short_hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("test_{generator_agent}_{short_hex}_{unix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::FixtureInvoker;
    use crate::types::AgentRole;

    fn generator_agent() -> Agent {
        Agent::new(AgentRole::TestAgent, "p", "m")
    }

    #[tokio::test]
    async fn falls_back_to_stub_when_no_code_block() {
        let agent = generator_agent();
        let invoker = FixtureInvoker::new();
        let ctx = DebateContext::new("topic");
        let tc = generate_test_case(&agent, &invoker, &ctx, Duration::from_secs(1), "sol-a", "python", "", "ctx", "easy")
            .await
            .unwrap();
        assert!(tc.code.contains("stub"));
    }

    #[test]
    fn category_inferred_from_security_keywords() {
        assert_eq!(
            infer_category("check sql injection", ""),
            TestCategory::Security
        );
    }

    #[tokio::test]
    async fn test_id_has_expected_shape() {
        let agent = generator_agent();
        let invoker = FixtureInvoker::new()
            .with_response("TestAgent", "Description: exercise\n```python\nassert f() is None\n```");
        let ctx = DebateContext::new("topic");
        let tc = generate_test_case(
            &agent,
            &invoker,
            &ctx,
            Duration::from_secs(1),
            "sol-a",
            "python",
            "def f(): pass",
            "ctx",
            "easy",
        )
        .await
        .unwrap();
        let parts: Vec<&str> = tc.id.split('_').collect();
        assert_eq!(parts[0], "test");
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[2].len(), 8);
    }
}
