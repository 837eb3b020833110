//! Answer collection and submission for evaluation.
//!
//! The completed interview is evaluated as one document: every recorded
//! answer, the final posture average and the interview domain. Two sinks are
//! provided: [`HttpEvaluationSink`] posts it to a remote service, and
//! [`ModelAnswerEvaluator`] asks a generative model to grade it directly.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::NO_ANSWER_PLACEHOLDER;
use crate::error::ProctorError;
use crate::retry::{RetryPolicy, generate_with_fallback};
use crate::traits::{EvaluationSink, GenerativeModel};

/// Path of the evaluation endpoint relative to the service base URL.
pub const EVALUATE_PATH: &str = "/api/evaluate-responses";

/// One question and the candidate's answer to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub response: String,
}

impl AnswerRecord {
    /// Records `draft` as the answer to `question`.
    ///
    /// Blank drafts are stored as the no-answer placeholder.
    pub fn from_draft(question: impl Into<String>, draft: &str) -> Self {
        let trimmed = draft.trim();
        let response = if trimmed.is_empty() {
            NO_ANSWER_PLACEHOLDER.to_string()
        } else {
            trimmed.to_string()
        };
        Self {
            question: question.into(),
            response,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.response == NO_ANSWER_PLACEHOLDER
    }
}

/// Posture summary sent with the answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureSummary {
    /// Final rolling average, formatted with two decimals.
    #[serde(rename = "spineAngle")]
    pub spine_angle: String,
}

impl PostureSummary {
    pub fn from_average(average: f64) -> Self {
        Self {
            spine_angle: format!("{average:.2}"),
        }
    }
}

/// Body of the evaluation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub answers: Vec<AnswerRecord>,
    pub posture: PostureSummary,
    pub domain: Option<String>,
}

/// Score and advice for a single answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question: String,
    /// Services return either a number or a short label here.
    pub score: serde_json::Value,
    #[serde(default)]
    pub improvement: String,
}

/// Evaluation returned for a completed interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub overall_proficiency: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub results: Vec<QuestionResult>,
}

#[derive(Debug, Deserialize)]
struct EvaluationEnvelope {
    evaluation: Option<Evaluation>,
    error: Option<String>,
}

/// [`EvaluationSink`] posting to an HTTP evaluation service.
#[derive(Debug, Clone)]
pub struct HttpEvaluationSink {
    client: Client,
    endpoint: String,
}

impl HttpEvaluationSink {
    /// Creates a sink for the service at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{EVALUATE_PATH}", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EvaluationSink for HttpEvaluationSink {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, ProctorError> {
        debug!(
            endpoint = %self.endpoint,
            answers = request.answers.len(),
            "submitting answers for evaluation"
        );
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        let envelope: EvaluationEnvelope = response.json().await?;

        match (status.is_success(), envelope) {
            (
                true,
                EvaluationEnvelope {
                    evaluation: Some(evaluation),
                    ..
                },
            ) => Ok(evaluation),
            (_, EvaluationEnvelope { error, .. }) => {
                let reason = error.unwrap_or_else(|| format!("unexpected response ({status})"));
                warn!(%status, %reason, "evaluation rejected");
                Err(ProctorError::Evaluation(reason))
            }
        }
    }
}

/// Prompt asking a model to grade `request` as a single evaluation object.
pub fn evaluation_prompt(request: &EvaluationRequest, level: Option<&str>) -> String {
    let domain = request.domain.as_deref().unwrap_or("general");
    let level = level.unwrap_or("unspecified");
    let mut prompt = format!(
        "You are an expert interview evaluator. Grade the following Q&A pairs for a {level} {domain} interview.\n\
         Respond ONLY with a single JSON object with this structure:\n\
         {{\"overall_proficiency\": \"<short proficiency label>\", \
         \"feedback\": \"<one-paragraph summary>\", \
         \"results\": [{{\"question\": \"<question>\", \"score\": <integer 1-5>, \
         \"improvement\": \"<one actionable suggestion>\"}}]}}\n\
         Average spine angle during the interview: {} degrees.\n\
         Q&A pairs:\n",
        request.posture.spine_angle
    );
    for (i, answer) in request.answers.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "Q{n}: {}\nA{n}: {}",
            answer.question,
            answer.response,
            n = i + 1
        );
    }
    prompt
}

/// Parses the JSON object between the first `{` and the last `}` of `raw`.
///
/// # Errors
/// - [`ProctorError::Evaluation`] - No object found, or it is not an evaluation
pub fn parse_model_evaluation(raw: &str) -> Result<Evaluation, ProctorError> {
    let object = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(ProctorError::Evaluation(
                "No JSON object found in model response".to_string(),
            ));
        }
    };
    serde_json::from_str(object)
        .map_err(|e| ProctorError::Evaluation(format!("malformed evaluation object: {e}")))
}

/// [`EvaluationSink`] that grades answers with a generative model.
#[derive(Debug, Clone)]
pub struct ModelAnswerEvaluator {
    backend: Arc<dyn GenerativeModel>,
    retry: RetryPolicy,
    level: Option<String>,
}

impl ModelAnswerEvaluator {
    pub fn new(backend: Arc<dyn GenerativeModel>) -> Self {
        Self::with_retry_policy(backend, RetryPolicy::default())
    }

    pub fn with_retry_policy(backend: Arc<dyn GenerativeModel>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            level: None,
        }
    }

    /// Sets the target seniority named in the prompt.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }
}

#[async_trait]
impl EvaluationSink for ModelAnswerEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, ProctorError> {
        if request.answers.is_empty() {
            return Err(ProctorError::Evaluation("No answers provided.".to_string()));
        }

        let prompt = evaluation_prompt(request, self.level.as_deref());
        let raw = generate_with_fallback(self.backend.as_ref(), &self.retry, &prompt).await?;
        let evaluation = parse_model_evaluation(&raw).inspect_err(|e| {
            warn!(error = %e, "model evaluation could not be parsed");
        })?;
        info!(
            proficiency = %evaluation.overall_proficiency,
            results = evaluation.results.len(),
            "answers evaluated by model"
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_drafts_become_placeholder() {
        let record = AnswerRecord::from_draft("Q1", "   \n");
        assert_eq!(record.response, "No answer provided");
        assert!(record.is_blank());

        let record = AnswerRecord::from_draft("Q1", "  I led the migration. ");
        assert_eq!(record.response, "I led the migration.");
    }

    #[test]
    fn request_uses_wire_field_names() {
        let request = EvaluationRequest {
            answers: vec![AnswerRecord::from_draft("Q1", "A1")],
            posture: PostureSummary::from_average(12.3456),
            domain: Some("backend".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["posture"]["spineAngle"], "12.35");
        assert_eq!(json["answers"][0]["response"], "A1");
        assert_eq!(json["domain"], "backend");
    }

    #[test]
    fn evaluation_accepts_numeric_or_text_scores() {
        let evaluation: Evaluation = serde_json::from_str(
            r#"{
                "overall_proficiency": "Intermediate",
                "feedback": "Solid fundamentals.",
                "results": [
                    {"question": "Q1", "score": 7, "improvement": "Be concise."},
                    {"question": "Q2", "score": "N/A"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(evaluation.overall_proficiency, "Intermediate");
        assert_eq!(evaluation.results[0].score, 7);
        assert_eq!(evaluation.results[1].improvement, "");
    }

    #[test]
    fn camel_case_proficiency_key_is_rejected() {
        let result = serde_json::from_str::<Evaluation>(
            r#"{"overallProficiency":"Good","feedback":"ok","results":[]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn service_response_envelope_deserializes() {
        let envelope: EvaluationEnvelope = serde_json::from_str(
            r#"{"evaluation":{"overall_proficiency":"Good","feedback":"ok","results":[{"question":"Q1","score":4,"improvement":"x"}]}}"#,
        )
        .unwrap();
        assert!(envelope.error.is_none());
        let evaluation = envelope.evaluation.unwrap();
        assert_eq!(evaluation.overall_proficiency, "Good");
        assert_eq!(evaluation.feedback, "ok");
        assert_eq!(evaluation.results[0].question, "Q1");
        assert_eq!(evaluation.results[0].score, 4);
        assert_eq!(evaluation.results[0].improvement, "x");

        let json = serde_json::to_value(&evaluation).unwrap();
        assert_eq!(json["overall_proficiency"], "Good");
    }

    #[test]
    fn error_envelope_carries_reason() {
        let envelope: EvaluationEnvelope =
            serde_json::from_str(r#"{"error":"Failed to parse evaluation from model."}"#).unwrap();
        assert!(envelope.evaluation.is_none());
        assert_eq!(
            envelope.error.as_deref(),
            Some("Failed to parse evaluation from model.")
        );
    }

    fn sample_request() -> EvaluationRequest {
        EvaluationRequest {
            answers: vec![
                AnswerRecord::from_draft("What is a B-tree?", "A balanced search tree."),
                AnswerRecord::from_draft("Why should we hire you?", ""),
            ],
            posture: PostureSummary::from_average(14.2),
            domain: Some("backend".to_string()),
        }
    }

    #[test]
    fn prompt_lists_answers_and_context() {
        let prompt = evaluation_prompt(&sample_request(), Some("senior"));
        assert!(prompt.contains("senior backend interview"));
        assert!(prompt.contains("Q1: What is a B-tree?\nA1: A balanced search tree."));
        assert!(prompt.contains("A2: No answer provided"));
        assert!(prompt.contains("14.20 degrees"));
        assert!(prompt.contains("\"overall_proficiency\""));
    }

    #[test]
    fn model_object_is_cut_from_surrounding_text() {
        let raw = "```json\n{\"overall_proficiency\": \"Advanced\", \"feedback\": \"Clear.\", \
                   \"results\": [{\"question\": \"Q1\", \"score\": 5, \"improvement\": \"None\"}]}\n```";
        let evaluation = parse_model_evaluation(raw).unwrap();
        assert_eq!(evaluation.overall_proficiency, "Advanced");
        assert_eq!(evaluation.results[0].score, 5);
    }

    #[test]
    fn model_text_without_object_is_an_error() {
        assert!(matches!(
            parse_model_evaluation("I cannot grade this."),
            Err(ProctorError::Evaluation(_))
        ));
        assert!(matches!(
            parse_model_evaluation("{\"score\": 3}"),
            Err(ProctorError::Evaluation(_))
        ));
    }

    #[derive(Debug)]
    struct Canned(Vec<&'static str>, std::sync::Mutex<usize>);

    #[async_trait]
    impl GenerativeModel for Canned {
        async fn generate(&self, _model_id: &str, prompt: &str) -> Result<String, ProctorError> {
            assert!(prompt.contains("Q&A pairs"));
            let mut calls = self.1.lock().unwrap();
            let reply = self.0.get(*calls).copied().unwrap_or("");
            *calls += 1;
            Ok(reply.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn model_evaluator_retries_empty_replies() {
        let backend = Arc::new(Canned(
            vec!["", r#"{"overall_proficiency":"Intermediate","feedback":"ok","results":[]}"#],
            std::sync::Mutex::new(0),
        ));
        let evaluator = ModelAnswerEvaluator::new(backend.clone()).with_level("mid");
        let evaluation = evaluator.evaluate(&sample_request()).await.unwrap();
        assert_eq!(evaluation.overall_proficiency, "Intermediate");
        assert_eq!(*backend.1.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn model_evaluator_rejects_empty_answer_list() {
        let backend = Arc::new(Canned(Vec::new(), std::sync::Mutex::new(0)));
        let evaluator = ModelAnswerEvaluator::new(backend.clone());
        let request = EvaluationRequest {
            answers: Vec::new(),
            ..sample_request()
        };
        assert!(matches!(
            evaluator.evaluate(&request).await,
            Err(ProctorError::Evaluation(_))
        ));
        assert_eq!(*backend.1.lock().unwrap(), 0);
    }

    #[test]
    fn endpoint_joins_base_url() {
        let sink = HttpEvaluationSink::new("http://localhost:5000/");
        assert_eq!(
            sink.endpoint(),
            "http://localhost:5000/api/evaluate-responses"
        );
    }
}
