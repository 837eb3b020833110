//! Interview question supply.
//!
//! Questions come from a [`QuestionSource`]. Two are provided: an HTTP client
//! for a remote question service, and [`ModelQuestionGenerator`], which writes
//! technical questions with a generative model and mixes in HR questions.
//! Whatever the source, a failed or empty fetch leaves the session with
//! [`default_questions`].

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rand::seq::IndexedRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{HR_QUESTIONS_PER_INTERVIEW, MIN_GENERATED_QUESTION_LEN};
use crate::error::ProctorError;
use crate::retry::{RetryPolicy, generate_with_fallback};
use crate::traits::{GenerativeModel, QuestionSource};

/// Path of the question endpoint relative to the service base URL.
pub const GENERATE_QUESTIONS_PATH: &str = "/api/generate-questions";

/// General HR questions, used for mixing and as the fallback list.
pub const DEFAULT_HR_QUESTIONS: [&str; 8] = [
    "Tell me about yourself.",
    "Why should we hire you?",
    "What are your strengths and weaknesses?",
    "Where do you see yourself in 5 years?",
    "Why are you interested in this company?",
    "Describe a challenging situation you faced at work.",
    "What motivates you to do your best work?",
    "How do you handle stress and pressure?",
];

/// The first `count` HR questions.
pub fn default_questions(count: usize) -> Vec<String> {
    DEFAULT_HR_QUESTIONS
        .iter()
        .take(count)
        .map(|q| q.to_string())
        .collect()
}

/// Prompt asking for exactly `count` technical questions as a JSON array.
pub fn technical_prompt(domain: &str, level: &str, count: usize) -> String {
    format!(
        "Respond ONLY with a valid JSON array of exactly {count} technical interview questions as strings.\n\
         Do NOT include any explanations, markdown, or extra text.\n\
         Example: [\"Q1\", \"Q2\", \"Q3\"]\n\
         Domain: {domain}\n\
         Level: {level}\n"
    )
}

/// Extracts questions from raw model output.
///
/// The text between the first `[` and the last `]` is parsed as a JSON array
/// of strings. Without brackets, numbered (`1.`) or bulleted (`-`, `*`)
/// lines are taken instead, keeping those longer than ten characters.
///
/// # Errors
/// - [`ProctorError::QuestionSource`] - Brackets were found but the content is not a string array
pub fn parse_generated_questions(raw: &str) -> Result<Vec<String>, ProctorError> {
    if let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) {
        if start < end {
            return serde_json::from_str::<Vec<String>>(&raw[start..=end]).map_err(|e| {
                ProctorError::QuestionSource(format!("malformed question array: {e}"))
            });
        }
    }

    Ok(raw
        .lines()
        .filter_map(|line| strip_list_marker(line.trim()))
        .map(str::trim)
        .filter(|q| q.chars().count() > MIN_GENERATED_QUESTION_LEN)
        .map(str::to_string)
        .collect())
}

/// Strips a leading `12.` or `-`/`*` bullet; `None` when the line has neither.
fn strip_list_marker(line: &str) -> Option<&str> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        return line[digits..].strip_prefix('.');
    }
    let rest = line.strip_prefix('-').or_else(|| line.strip_prefix('*'))?;
    rest.starts_with(char::is_whitespace).then_some(rest)
}

/// Puts `hr_count` randomly chosen HR questions ahead of `technical`, truncated to `count`.
pub fn mix_questions<R: Rng + ?Sized>(
    rng: &mut R,
    technical: Vec<String>,
    hr_count: usize,
    count: usize,
) -> Vec<String> {
    let mut questions: Vec<String> = DEFAULT_HR_QUESTIONS
        .choose_multiple(rng, hr_count)
        .map(|q| q.to_string())
        .collect();
    questions.extend(technical);
    questions.truncate(count);
    questions
}

/// Writes questions with a generative model.
#[derive(Debug, Clone)]
pub struct ModelQuestionGenerator {
    backend: Arc<dyn GenerativeModel>,
    retry: RetryPolicy,
}

impl ModelQuestionGenerator {
    pub fn new(backend: Arc<dyn GenerativeModel>) -> Self {
        Self::with_retry_policy(backend, RetryPolicy::default())
    }

    pub fn with_retry_policy(backend: Arc<dyn GenerativeModel>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Produces `count` questions for `domain` at `level`.
    ///
    /// A missing domain or level yields the first `count` HR questions
    /// without calling the model.
    ///
    /// # Errors
    /// - [`ProctorError::Generation`] - Every model attempt failed
    /// - [`ProctorError::QuestionSource`] - The model output could not be parsed
    pub async fn generate(
        &self,
        domain: Option<&str>,
        level: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, ProctorError> {
        let (Some(domain), Some(level)) = (
            domain.filter(|d| !d.is_empty()),
            level.filter(|l| !l.is_empty()),
        ) else {
            debug!("no domain or level; serving HR questions");
            return Ok(default_questions(count));
        };

        let technical_count = count.saturating_sub(HR_QUESTIONS_PER_INTERVIEW);
        let prompt = technical_prompt(domain, level, technical_count);
        let raw = generate_with_fallback(self.backend.as_ref(), &self.retry, &prompt).await?;
        let technical = parse_generated_questions(&raw)?;
        info!(
            domain,
            level,
            technical = technical.len(),
            "generated interview questions"
        );

        Ok(mix_questions(
            &mut rand::rng(),
            technical,
            HR_QUESTIONS_PER_INTERVIEW,
            count,
        ))
    }
}

#[async_trait]
impl QuestionSource for ModelQuestionGenerator {
    async fn fetch_questions(
        &self,
        domain: Option<&str>,
        level: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, ProctorError> {
        self.generate(domain, level, count).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionRequest<'a> {
    domain: Option<&'a str>,
    level: Option<&'a str>,
    num_questions: usize,
}

#[derive(Debug, Deserialize)]
struct QuestionResponse {
    #[serde(default)]
    questions: Vec<String>,
    error: Option<String>,
}

/// [`QuestionSource`] backed by a remote question service.
#[derive(Debug, Clone)]
pub struct HttpQuestionSource {
    client: Client,
    endpoint: String,
}

impl HttpQuestionSource {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}{GENERATE_QUESTIONS_PATH}",
                base_url.trim_end_matches('/')
            ),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn fetch_questions(
        &self,
        domain: Option<&str>,
        level: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, ProctorError> {
        let body = QuestionRequest {
            domain,
            level,
            num_questions: count,
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let payload: QuestionResponse = response.json().await?;

        if !status.is_success() {
            let reason = payload
                .error
                .unwrap_or_else(|| format!("question service returned {status}"));
            warn!(%status, %reason, "question fetch failed");
            return Err(ProctorError::QuestionSource(reason));
        }
        Ok(payload.questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn json_array_is_extracted_from_noise() {
        let raw = "Sure! ```json\n[\"What is ownership?\", \"Explain lifetimes.\"]\n```";
        assert_eq!(
            parse_generated_questions(raw).unwrap(),
            vec!["What is ownership?", "Explain lifetimes."]
        );
    }

    #[test]
    fn malformed_array_is_an_error() {
        assert!(matches!(
            parse_generated_questions("[not json]"),
            Err(ProctorError::QuestionSource(_))
        ));
    }

    #[test]
    fn list_lines_are_the_fallback() {
        let raw = "Here you go:\n1. What is a borrow checker?\n2. Short?\n- Explain Send and Sync.\n*nope, no space\nplain line that is long";
        assert_eq!(
            parse_generated_questions(raw).unwrap(),
            vec!["What is a borrow checker?", "Explain Send and Sync."]
        );
    }

    #[test]
    fn mixing_puts_two_hr_questions_first() {
        let mut rng = StdRng::seed_from_u64(7);
        let technical = vec!["T1".to_string(), "T2".to_string(), "T3".to_string()];
        let mixed = mix_questions(&mut rng, technical, 2, 4);
        assert_eq!(mixed.len(), 4);
        assert!(DEFAULT_HR_QUESTIONS.contains(&mixed[0].as_str()));
        assert!(DEFAULT_HR_QUESTIONS.contains(&mixed[1].as_str()));
        assert_ne!(mixed[0], mixed[1]);
        assert_eq!(&mixed[2..], ["T1", "T2"]);
    }

    #[test]
    fn default_questions_are_capped_by_list_length() {
        assert_eq!(default_questions(2), vec!["Tell me about yourself.", "Why should we hire you?"]);
        assert_eq!(default_questions(50).len(), DEFAULT_HR_QUESTIONS.len());
    }

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl GenerativeModel for Unreachable {
        async fn generate(&self, _model_id: &str, _prompt: &str) -> Result<String, ProctorError> {
            panic!("model must not be called without a domain");
        }
    }

    #[tokio::test]
    async fn missing_level_serves_hr_questions() {
        let generator = ModelQuestionGenerator::new(Arc::new(Unreachable));
        let questions = generator.generate(Some("backend"), None, 3).await.unwrap();
        assert_eq!(questions, default_questions(3));
    }

    #[derive(Debug)]
    struct Canned(&'static str);

    #[async_trait]
    impl GenerativeModel for Canned {
        async fn generate(&self, _model_id: &str, prompt: &str) -> Result<String, ProctorError> {
            assert!(prompt.contains("exactly 3 technical"));
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn generated_questions_follow_hr_questions() {
        let generator = ModelQuestionGenerator::new(Arc::new(Canned(
            r#"["How does TCP handshake work?", "What is a B-tree?", "Explain CAP."]"#,
        )));
        let questions = generator
            .generate(Some("backend"), Some("medium"), 5)
            .await
            .unwrap();
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[2], "How does TCP handshake work?");
        assert_eq!(questions[4], "Explain CAP.");
    }
}
