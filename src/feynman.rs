//! Feynman-technique scoring of free-text explanations by a generative model.

use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PING_PROMPT: &str =
    "Hello, this is a test. Please respond with 'API is working' if you can see this message.";

const REQUIRED_FIELDS: [&str; 8] = [
    "understandingScore",
    "strengths",
    "weaknesses",
    "improvementSuggestions",
    "conceptualGaps",
    "applicationAbility",
    "overallFeedback",
    "nextSteps",
];

// Greedy: from the first '{' to the last '}'
static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("json object pattern is valid"));

/// A text-generation backend addressed by model name.
pub trait ScoringModel {
    fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

impl<T: ScoringModel + ?Sized> ScoringModel for Box<T> {
    fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        (**self).generate(model, prompt)
    }
}

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl ScoringModel for GeminiClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| Error::upstream(format!("request to {model} failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| Error::upstream(format!("reading {model} response failed: {e}")))?;
        if !status.is_success() {
            return Err(Error::upstream_with_raw(
                format!("{model} returned {}", status.as_u16()),
                text,
            ));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| Error::upstream_with_raw(format!("unexpected {model} response: {e}"), text.clone()))?;
        let out: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(model, length = out.len(), "Model responded");
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeynmanAnalysis {
    pub understanding_score: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvement_suggestions: Vec<String>,
    pub conceptual_gaps: Vec<String>,
    pub application_ability: String,
    pub overall_feedback: String,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeynmanReport {
    pub analysis: FeynmanAnalysis,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PingReport {
    pub model: String,
    pub response: String,
}

pub struct Analyzer<M> {
    model: M,
    models: Vec<String>,
    attempt_delay: Duration,
    quota_delay: Duration,
}

impl<M: ScoringModel> Analyzer<M> {
    pub fn new(model: M, models: Vec<String>) -> Self {
        Self {
            model,
            models,
            attempt_delay: Duration::from_secs(1),
            quota_delay: Duration::from_secs(2),
        }
    }

    #[cfg(test)]
    pub fn with_delays(mut self, attempt_delay: Duration, quota_delay: Duration) -> Self {
        self.attempt_delay = attempt_delay;
        self.quota_delay = quota_delay;
        self
    }

    pub fn analyze(&self, topic: &str, explanation: &str) -> Result<FeynmanReport> {
        let topic = topic.trim();
        let explanation = explanation.trim();
        if topic.is_empty() || explanation.is_empty() {
            return Err(Error::validation("Topic and explanation are required"));
        }

        let text = self.generate_with_fallback(&build_prompt(topic, explanation))?;
        let analysis = parse_analysis(&text)?;

        info!(topic, score = analysis.understanding_score, "Scored explanation");
        Ok(FeynmanReport {
            analysis,
            topic: topic.to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Checks that the first configured model answers at all.
    pub fn ping(&self) -> Result<PingReport> {
        let model = self
            .models
            .first()
            .ok_or_else(|| Error::validation("No models configured"))?;
        let response = self.model.generate(model, PING_PROMPT)?;
        Ok(PingReport {
            model: model.clone(),
            response,
        })
    }

    // Tries each model in order; a quota failure waits longer before moving on
    fn generate_with_fallback(&self, prompt: &str) -> Result<String> {
        let last = self.models.len().saturating_sub(1);

        for (i, name) in self.models.iter().enumerate() {
            debug!(model = %name, "Trying model");
            thread::sleep(self.attempt_delay);

            let err = match self.model.generate(name, prompt) {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if is_quota_error(&err) {
                warn!(model = %name, "Quota limit reached");
                if i == last {
                    return Err(Error::upstream(
                        "All models have reached their quota limits. Please try again later or upgrade your API plan.",
                    ));
                }
                thread::sleep(self.quota_delay);
                continue;
            }

            if i == last {
                return Err(err);
            }
            warn!(model = %name, error = %err, "Model failed, trying next");
        }

        Err(Error::validation("No models configured"))
    }
}

fn is_quota_error(err: &Error) -> bool {
    let message = err.to_string();
    message.contains("429") || message.contains("quota")
}

pub fn build_prompt(topic: &str, explanation: &str) -> String {
    format!(
        r#"You are an expert educator using the Feynman Technique to evaluate a student's understanding of a topic.

TOPIC: {topic}

STUDENT'S EXPLANATION:
{explanation}

Please analyze this explanation using the Feynman Technique principles and provide a comprehensive evaluation in the following JSON format:

{{
  "understandingScore": <number 1-10>,
  "strengths": ["<strength1>", "<strength2>", "<strength3>"],
  "weaknesses": ["<weakness1>", "<weakness2>", "<weakness3>"],
  "improvementSuggestions": ["<suggestion1>", "<suggestion2>", "<suggestion3>"],
  "conceptualGaps": ["<gap1>", "<gap2>"],
  "applicationAbility": "<assessment of ability to apply knowledge>",
  "overallFeedback": "<comprehensive feedback paragraph>",
  "nextSteps": ["<next step 1>", "<next step 2>", "<next step 3>"]
}}

EVALUATION CRITERIA:
1. Understanding Score (1-10): clarity, accuracy, depth, and ability to explain complex concepts simply
2. Strengths: what the student explained well, clear concepts, good examples, logical flow
3. Weaknesses: gaps, misconceptions, unclear explanations, missing key concepts
4. Improvement Suggestions: specific, actionable advice to enhance understanding
5. Conceptual Gaps: fundamental concepts that seem to be missing or misunderstood
6. Application Ability: whether they can apply this knowledge to solve problems or explain to others
7. Overall Feedback: a paragraph summarizing their current level and what to focus on
8. Next Steps: specific actions to improve their understanding

Focus on whether they truly understand the concepts or just memorized facts, their ability to explain complex ideas simply, and any misconceptions in fundamental understanding.

Provide honest, constructive feedback that will help them improve their understanding."#
    )
}

pub fn extract_json(text: &str) -> Option<&str> {
    JSON_OBJECT_RE.find(text).map(|m| m.as_str())
}

/// Parses model output into an analysis. Any failure keeps the raw text.
pub fn parse_analysis(text: &str) -> Result<FeynmanAnalysis> {
    let parse_failure = || Error::upstream_with_raw("Error parsing AI response", text);

    let candidate = extract_json(text).ok_or_else(parse_failure)?;
    let value: Value = serde_json::from_str(candidate).map_err(|_| parse_failure())?;

    for field in REQUIRED_FIELDS {
        if !is_present(value.get(field)) {
            return Err(Error::upstream_with_raw(
                format!("Invalid AI response: missing {field}"),
                text,
            ));
        }
    }

    serde_json::from_value(value).map_err(|_| parse_failure())
}

// Null, false, zero and empty strings count as missing
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}
