//! 온라인 생성 백엔드 - OpenAI 호환 chat completions (Groq)
//!
//! 언어별 시스템 프롬프트로 과학 튜터 역할을 고정하고, 요청 전체에
//! 명시적 타임아웃을 강제합니다. 빈 응답은 성공이 아니라 실패로
//! 신호되어 라우터가 폴백할 수 있게 합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TutorConfig;
use crate::language::Language;

use super::{BackendError, GenerationBackend};

// ============================================================================
// Prompt Tables
// ============================================================================

/// 영어 시스템 프롬프트
const SYSTEM_PROMPT_EN: &str = "\
You are an expert AI tutor specializing in science education.

Your role:
- Provide clear, accurate explanations tailored to the student's level
- Use analogies and examples to make concepts relatable
- Break down complex topics into digestible parts
- Encourage understanding over memorization

Guidelines:
- Answer ONLY what is asked - no extra topics
- Use proper scientific terminology with simple explanations
- Include relevant formulas when applicable
- Answer only in English
- Keep responses concise but complete
- Never fabricate information";

/// 힌디어 시스템 프롬프트
const SYSTEM_PROMPT_HI: &str = "\
आप विज्ञान शिक्षा में विशेषज्ञ AI ट्यूटर हैं।

आपकी भूमिका:
- छात्र के स्तर के अनुसार स्पष्ट, सटीक स्पष्टीकरण प्रदान करें
- अवधारणाओं को समझने योग्य बनाने के लिए उदाहरण और सादृश्य का उपयोग करें
- जटिल विषयों को सरल भागों में विभाजित करें

दिशानिर्देश:
- केवल पूछे गए प्रश्न का उत्तर दें
- जहां लागू हो प्रासंगिक सूत्र शामिल करें
- उत्तर केवल हिंदी में दें, संक्षिप्त लेकिन पूर्ण रखें
- कभी भी काल्पनिक जानकारी न दें";

/// 마라티어 시스템 프롬프트
const SYSTEM_PROMPT_MR: &str = "\
तुम्ही विज्ञान शिक्षणात तज्ञ AI शिक्षक आहात।

तुमची भूमिका:
- विद्यार्थ्याच्या पातळीनुसार स्पष्ट, अचूक स्पष्टीकरण द्या
- संकल्पना समजण्यासाठी उदाहरणे आणि साधर्म्य वापरा
- गुंतागुंतीचे विषय सोप्या भागात विभाजित करा

मार्गदर्शक तत्त्वे:
- फक्त विचारलेल्या प्रश्नाचे उत्तर द्या
- जिथे लागू असेल तिथे संबंधित सूत्रे समाविष्ट करा
- उत्तरे फक्त मराठीत द्या, संक्षिप्त पण पूर्ण ठेवा
- कधीही काल्पनिक माहिती देऊ नका";

/// 언어별 시스템 프롬프트 선택
fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::En => SYSTEM_PROMPT_EN,
        Language::Hi => SYSTEM_PROMPT_HI,
        Language::Mr => SYSTEM_PROMPT_MR,
    }
}

/// 언어별 사용자 프롬프트 구성
fn user_prompt(language: Language, question: &str, context: Option<&str>) -> String {
    let instruction = match language {
        Language::En => format!(
            "Answer the following question clearly and accurately.\n\n\
             Question: {question}\n\n\
             Provide a focused, educational response."
        ),
        Language::Hi => format!(
            "निम्नलिखित प्रश्न का स्पष्ट और सटीक उत्तर दें। \
             पूरा उत्तर केवल हिंदी में होना चाहिए।\n\n\
             प्रश्न: {question}"
        ),
        Language::Mr => format!(
            "खालील प्रश्नाचे स्पष्ट आणि अचूक उत्तर द्या. \
             संपूर्ण उत्तर फक्त मराठीत असावे.\n\n\
             प्रश्न: {question}"
        ),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => {
            format!("Reference material:\n{ctx}\n\n{instruction}")
        }
        _ => instruction,
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// chat completions 요청 본문
/// source: https://console.groq.com/docs/api-reference
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ============================================================================
// OnlineModel
// ============================================================================

/// 네트워크 생성 백엔드
pub struct OnlineModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl OnlineModel {
    /// 설정과 API 키로 생성
    pub fn new(config: &TutorConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.online_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.online_base_url.clone(),
            api_key,
            model: config.online_model.clone(),
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 1024,
        })
    }
}

#[async_trait]
impl GenerationBackend for OnlineModel {
    async fn generate(
        &self,
        question: &str,
        language: Language,
        context: Option<&str>,
    ) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(language).to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(language, question, context),
                },
            ],
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "online model returned error");
            return Err(BackendError::Http(format!("{}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|_| BackendError::EmptyAnswer)?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(BackendError::EmptyAnswer);
        }

        Ok(answer.to_string())
    }

    fn name(&self) -> &str {
        "online"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_embeds_question() {
        let prompt = user_prompt(Language::En, "What is force?", None);
        assert!(prompt.contains("What is force?"));
        assert!(!prompt.contains("Reference material"));
    }

    #[test]
    fn test_user_prompt_with_context() {
        let prompt = user_prompt(Language::En, "What is force?", Some("Force is a push."));
        assert!(prompt.starts_with("Reference material:"));
        assert!(prompt.contains("Force is a push."));
    }

    #[test]
    fn test_prompts_per_language() {
        // 언어별 프롬프트가 해당 언어 지시를 포함
        assert!(system_prompt(Language::En).contains("English"));
        assert!(system_prompt(Language::Hi).contains("हिंदी"));
        assert!(system_prompt(Language::Mr).contains("मराठीत"));

        let hi = user_prompt(Language::Hi, "बल क्या है?", None);
        assert!(hi.contains("प्रश्न: बल क्या है?"));
    }
}
