use crate::config::Settings;
use crate::domain::contract::{LlmRecommendationPackage, MAX_KEY_DRIVERS};
use crate::domain::{AnalysisContext, RecommendationPackage};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::LlmClient;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const REPAIR_ATTEMPTS: u32 = 2;

const TOOL_NAME_EMIT_RECOMMENDATION: &str = "emit_recommendation";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(
        &self,
        req: CreateMessageRequest,
    ) -> anyhow::Result<CreateMessageResponse> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            return Err(LlmDiagnosticsError {
                raw_output: Some(text),
                ..LlmDiagnosticsError::new(PROVIDER, "http", format!("status={status}"))
            }
            .into());
        }

        serde_json::from_str::<CreateMessageResponse>(&text)
            .with_context(|| format!("failed to decode Anthropic response: {text}"))
    }

    fn tools() -> Vec<Tool> {
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["recommendation", "risk_level", "reasoning", "key_drivers"],
            "properties": {
                "recommendation": {"type": "string", "enum": ["BUY", "HOLD", "SELL"]},
                "risk_level": {"type": "string", "enum": ["Low", "Medium", "High"]},
                "reasoning": {"type": "string"},
                "key_drivers": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": MAX_KEY_DRIVERS,
                    "items": {"type": "string"}
                }
            }
        });

        vec![Tool {
            name: TOOL_NAME_EMIT_RECOMMENDATION,
            description: "Emit the final investment recommendation as structured JSON",
            input_schema: schema,
        }]
    }

    fn tool_choice() -> ToolChoice {
        ToolChoice::Tool {
            name: TOOL_NAME_EMIT_RECOMMENDATION,
        }
    }

    fn system_prompt() -> String {
        [
            "You are a senior investment strategist reviewing one stock.",
            "Base every statement on the provided metrics. Do not invent data.",
            "Decision framework:",
            "- BUY: strong technicals (Bullish trend, RSI < 70) AND reasonable valuation OR strong momentum (Sharpe >= 0.5).",
            "- HOLD: conflicting or incomplete signals.",
            "- SELL: weak technicals (Bearish trend) AND (high P/E OR current drawdown deeper than -15%).",
            "Risk context:",
            "- max_drawdown covers the whole lookback window; do not penalize a crash the stock has since recovered from.",
            "- Weigh current_drawdown and volatility for immediate risk.",
            "- A high P/E is acceptable for high-growth companies when momentum is strong.",
            "Output rules:",
            "- recommendation is one of BUY, HOLD, SELL",
            "- risk_level is one of Low, Medium, High",
            "- reasoning is under 100 words",
            "- key_drivers lists 3-5 specific data points, e.g. \"Current drawdown of -5%\", \"RSI of 65\"",
            "Return ONLY valid JSON. Do not wrap in markdown.",
        ]
        .join("\n")
    }

    fn user_prompt(ctx: &AnalysisContext) -> String {
        format!(
            "Task: Recommend BUY, HOLD or SELL for ticker={}.\n\nMetrics JSON (null means unavailable):\n{}",
            ctx.ticker,
            ctx.to_json()
        )
    }

    fn repair_prompt(previous_output: &str) -> String {
        let schema = [
            "{",
            "  \"recommendation\": \"BUY | HOLD | SELL\",",
            "  \"risk_level\": \"Low | Medium | High\",",
            "  \"reasoning\": \"text\",",
            "  \"key_drivers\": [\"point 1\", \"point 2\", \"point 3\"]",
            "}",
        ]
        .join("\n");

        format!(
            "Your previous message was NOT valid JSON for the required schema.\n\n\
TASK: Output ONLY a single JSON object that exactly matches the schema.\n\
- Do NOT include any markdown, prose, or code fences.\n\
- Use double quotes for all JSON strings.\n\
- key_drivers MUST have between 1 and {MAX_KEY_DRIVERS} non-empty strings.\n\n\
SCHEMA:\n{schema}\n\n\
INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}"
        )
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_package(
        res: &CreateMessageResponse,
    ) -> anyhow::Result<Option<LlmRecommendationPackage>> {
        for block in &res.content {
            if let ContentBlock::ToolUse { name, input, .. } = block {
                if name == TOOL_NAME_EMIT_RECOMMENDATION {
                    let parsed = serde_json::from_value::<LlmRecommendationPackage>(input.clone())
                        .context("failed to decode tool_use.input into LlmRecommendationPackage")?;
                    return Ok(Some(parsed));
                }
            }
        }
        Ok(None)
    }

    fn request(&self, max_tokens: u32, content: String) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content,
            }],
            tools: Some(Self::tools()),
            tool_choice: Some(Self::tool_choice()),
        }
    }

    async fn try_parse_with_repairs(
        &self,
        ticker: &str,
        initial_text: String,
    ) -> anyhow::Result<RecommendationPackage> {
        let first_err = match json::parse_package(&initial_text) {
            Ok(package) => return Ok(package),
            Err(err) => err,
        };

        let mut last_err = first_err;
        let mut last_text = initial_text;

        for attempt in 1..=REPAIR_ATTEMPTS {
            let req = self.request(self.max_tokens, Self::repair_prompt(&last_text));
            let repair_res = self.create_message(req).await?;

            let parsed = match Self::response_tool_package(&repair_res)? {
                Some(tool_package) => tool_package.validate_and_into_package(),
                None => json::parse_package(&Self::response_text(&repair_res)),
            };
            match parsed {
                Ok(package) => return Ok(package),
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        ticker,
                        error = %err,
                        "LLM output still invalid after repair attempt"
                    );
                    last_err = err;
                    last_text = Self::response_text(&repair_res);
                }
            }
        }

        Err(LlmDiagnosticsError {
            raw_output: Some(last_text),
            ..LlmDiagnosticsError::new(
                PROVIDER,
                "parse_after_repair",
                format!("final_error={last_err:#}"),
            )
        }
        .into())
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate_recommendation(
        &self,
        ctx: &AnalysisContext,
    ) -> anyhow::Result<RecommendationPackage> {
        let prompt = Self::user_prompt(ctx);
        let mut res = self
            .create_message(self.request(self.max_tokens, prompt.clone()))
            .await?;

        // If the model hit max_tokens, retry once with a higher ceiling.
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = self.max_tokens.saturating_mul(2).max(2048);
            tracing::warn!(
                ticker = %ctx.ticker,
                from = self.max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            res = self.create_message(self.request(bumped, prompt)).await?;
        }

        if let Some(tool_package) = Self::response_tool_package(&res)? {
            return tool_package.validate_and_into_package();
        }

        let text = Self::response_text(&res);
        self.try_parse_with_repairs(&ctx.ticker, text).await
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        #[allow(dead_code)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}
