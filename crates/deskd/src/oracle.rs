//! Classification oracle seam and the Gemini-backed client.
//!
//! The oracle is an opaque async function: ticket text in, validated
//! `Classification` out. Malformed or truncated model output is a hard
//! `DeskError::Oracle`; there is no default classification fallback,
//! so a parse failure leaves the affected ticket untouched.

use async_trait::async_trait;
use desk_shared::{Attachment, Classification, DeskError, Template};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";
const IMAGE_MODEL: &str = "gemini-3-pro-preview";

const SYSTEM_INSTRUCTION: &str = "\
You are the decision-making engine for a customer support desk.
Analyze the email and agent notes, walk the decision tree below, and return JSON only.

BRANCH 1: SUBSCRIPTION / RECHARGE ISSUES
- Trigger: payment failed, subscription not active, or missing credits.
- Check 3 mandatory items: User ID (UID), Payment Method, Payment Proof.
- Any item missing -> category SUBSCRIPTION_MISSING_INFO, use the missing-info template.
- All items present -> category SUBSCRIPTION_VERIFIED.

BRANCH 2: NSFW PRODUCT -> category NSFW_ISSUE.
BRANCH 3: ACCOUNT ERROR / USAGE -> category ACCOUNT_USAGE_ERROR.
BRANCH 4: ACCOUNT DELETION -> category ACCOUNT_DELETION.
BRANCH 5: POST-DELETION BILLING -> category POST_DELETION_BILLING.
BRANCH 6: BOT POWER / ENERGY -> category BOT_POWER_ISSUE.
Anything else -> category OTHER.

INPUT HANDLING:
- AGENT NOTES are operator overrides. A value typed there is PRESENT even if the email lacks it.
- Image attachments mean Payment Proof is potentially present.
- PREVIOUS THREAD SUMMARY is continuity context from earlier messages in the thread.

OUTPUT:
- Copy the selected template text into reply_email verbatim.
- Fill thread_summary with a rolling structured summary of the whole thread so far.
- Set should_auto_send = true only if confidence >= 0.75.";

/// Everything the oracle needs for one classification.
#[derive(Debug, Clone)]
pub struct ClassifyRequest<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub attachments: &'a [Attachment],
    /// Most recent rolling summary from the same thread
    pub previous_summary: Option<&'a str>,
    /// Operator overrides, one per line
    pub agent_notes: Option<&'a str>,
    pub templates: &'a [Template],
    /// Model override; the client default applies when `None`
    pub model: Option<&'a str>,
}

/// Result of the opportunistic image scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInsights {
    pub summary: String,
    #[serde(default)]
    pub detected_issues: Vec<String>,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_payment_platform: Option<String>,
}

/// LLM-backed classification service.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Classify one ticket. Fails with `DeskError::Oracle` on transport
    /// error or unparseable output.
    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification, DeskError>;

    /// Scan an attachment image for payment evidence.
    async fn classify_image(
        &self,
        bytes: &[u8],
        mime_type: &str,
        context: &str,
    ) -> Result<ImageInsights, DeskError>;
}

#[derive(Serialize)]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

/// Gemini HTTP client.
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    /// Build the user prompt: ticket text, override notes, continuity
    /// context, and the full template set so the model can copy bodies
    /// verbatim.
    fn build_prompt(request: &ClassifyRequest<'_>) -> String {
        let mut prompt = String::new();
        prompt.push_str("EMAIL ANALYSIS TASK:\n\n");
        prompt.push_str(&format!("SUBJECT: {}\n", request.subject));
        prompt.push_str(&format!("BODY: {}\n", request.body));
        prompt.push_str(&format!(
            "HAS_IMAGE_ATTACHMENTS: {}\n",
            request.attachments.iter().any(|a| a.is_image())
        ));
        prompt.push_str(&format!(
            "AGENT_NOTES_OVERRIDE: {}\n",
            request.agent_notes.unwrap_or("None")
        ));
        prompt.push_str(&format!(
            "PREVIOUS_THREAD_SUMMARY: {}\n",
            request.previous_summary.unwrap_or("No prior context")
        ));
        prompt.push_str("\nAVAILABLE TEMPLATES (USE VERBATIM, DO NOT MODIFY CONTENT):\n");
        for template in request.templates {
            prompt.push_str(&format!(
                "--- id: {} | name: {} | rule: {}\n{}\n",
                template.id, template.name, template.rule_prompt, template.body
            ));
        }
        prompt.push_str(
            "\nINSTRUCTION:\n\
             1. Classify the email per the decision tree.\n\
             2. For subscription issues, strictly check UID, method and proof.\n\
             3. Return the chosen template id in selected_template_id and its full text in reply_email.\n\
             4. Extract metadata (user_id, payment_method, has_payment_proof, is_info_complete, missing_fields, branch_path).\n",
        );
        prompt
    }

    async fn call_model(&self, model: &str, request: GeminiRequest) -> Result<String, DeskError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_URL, model, self.api_key
        );

        info!("[>] oracle call [{}]", model);
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeskError::Oracle(format!("transport error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DeskError::Oracle(format!(
                "model returned {status}: {error_text}"
            )));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| DeskError::Oracle(format!("malformed response envelope: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| DeskError::Oracle("empty candidate list".to_string()))?;

        debug!("[<] oracle response ({} chars)", text.len());
        Ok(text)
    }
}

/// Strip a markdown code fence or surrounding prose, keeping the
/// outermost JSON object. Returns the input unchanged when no braces
/// are found so the parse error carries the original text.
pub fn extract_json(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

#[async_trait]
impl ClassificationOracle for GeminiClient {
    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification, DeskError> {
        let model = request.model.unwrap_or(&self.model);
        let prompt = Self::build_prompt(request);

        let body = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(SYSTEM_INSTRUCTION.to_string()),
                    inline_data: None,
                }],
            },
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(prompt),
                    inline_data: None,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let text = self.call_model(model, body).await?;

        // Direct parse first, then retry on the extracted JSON object
        // in case the model wrapped it in prose or a code fence.
        match Classification::from_json(&text) {
            Ok(result) => Ok(result),
            Err(first_err) => {
                let stripped = extract_json(&text);
                Classification::from_json(stripped).map_err(|_| {
                    warn!("oracle output rejected: {first_err}");
                    first_err
                })
            }
        }
    }

    async fn classify_image(
        &self,
        bytes: &[u8],
        mime_type: &str,
        context: &str,
    ) -> Result<ImageInsights, DeskError> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

        let body = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(
                        "Extract UID, transaction id, payment platform (Stripe/PayPal) and \
                         status from this support attachment. Return JSON with summary, \
                         detected_issues, recommendation, extracted_uid, extracted_payment_platform."
                            .to_string(),
                    ),
                    inline_data: None,
                }],
            },
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: encoded,
                        }),
                    },
                    GeminiPart {
                        text: Some(format!("Context: {context}")),
                        inline_data: None,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let text = self.call_model(IMAGE_MODEL, body).await?;
        serde_json::from_str(extract_json(&text))
            .map_err(|e| DeskError::Oracle(format!("unparseable image scan: {e}")))
    }
}
