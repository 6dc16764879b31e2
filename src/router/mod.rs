//! 라우터 모듈 - 온라인 우선, 오프라인 RAG 폴백 상태 머신
//!
//! 흐름: 언어 감지 → 온라인 백엔드 시도 → (실패 시) 검색 + 로컬
//! 백엔드 폴백 → (그마저 실패 시) 고정 사과 메시지.
//!
//! 라우터는 호출 간 가변 상태를 갖지 않아 독립 질의들이 동시에
//! 호출해도 안전하며, 어떤 경로로든 예외를 경계 밖으로 전파하지
//! 않고 항상 완결된 `RouterResult`를 반환합니다.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::knowledge::Retriever;
use crate::language::{self, Language};
use crate::model::{BackendError, GenerationBackend};

// ============================================================================
// Types
// ============================================================================

/// 답변을 만든 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// 온라인 백엔드 성공
    Online,
    /// 오프라인 RAG 폴백
    Offline,
    /// 양쪽 모두 실패
    Error,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Online => "online",
            Mode::Offline => "offline",
            Mode::Error => "error",
        };
        f.write_str(s)
    }
}

/// 라우팅 결과
///
/// 호출당 정확히 하나의 mode가 설정되고, confidence는 [0, 1] 범위,
/// language는 지원 집합 안의 값입니다.
#[derive(Debug, Clone, Serialize)]
pub struct RouterResult {
    pub text: String,
    pub mode: Mode,
    pub confidence: f32,
    pub language: Language,
}

/// 라우터 신뢰도/임계값 설정
///
/// mode별 신뢰도는 고정 상수입니다. 휴리스틱 검색 신뢰도와 산술
/// 혼합하지 않습니다.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// 온라인 성공 시 신뢰도
    pub online_confidence: f32,
    /// 폴백이 답을 만들었을 때 신뢰도
    pub offline_confidence: f32,
    /// 폴백이 답을 만들지 못했을 때 신뢰도
    pub degraded_confidence: f32,
    /// 이 길이 미만의 답변은 실패로 취급
    pub min_answer_chars: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            online_confidence: 0.92,
            offline_confidence: 0.75,
            degraded_confidence: 0.30,
            min_answer_chars: 20,
        }
    }
}

// ============================================================================
// Message Tables
// ============================================================================

/// "자료 없음" 고정 메시지 (언어별)
const INSUFFICIENT_INFO_EN: &str =
    "I don't have information about this in my study materials. \
     Please try rephrasing or ask about another topic.";
const INSUFFICIENT_INFO_HI: &str =
    "मेरी अध्ययन सामग्री में इस विषय की जानकारी नहीं है। \
     कृपया प्रश्न को दूसरे शब्दों में पूछें या कोई और विषय पूछें।";
const INSUFFICIENT_INFO_MR: &str =
    "माझ्या अभ्यास साहित्यात या विषयाची माहिती नाही. \
     कृपया प्रश्न वेगळ्या शब्दांत विचारा किंवा दुसरा विषय विचारा.";

/// 전체 실패 사과 메시지 (언어별)
const APOLOGY_EN: &str =
    "Sorry, I am unable to answer right now. Please try again in a moment.";
const APOLOGY_HI: &str =
    "क्षमा करें, मैं अभी उत्तर नहीं दे पा रहा हूँ। कृपया थोड़ी देर बाद फिर प्रयास करें।";
const APOLOGY_MR: &str =
    "क्षमस्व, मी सध्या उत्तर देऊ शकत नाही. कृपया थोड्या वेळाने पुन्हा प्रयत्न करा.";

/// 언어별 "자료 없음" 메시지
pub fn insufficient_info(language: Language) -> &'static str {
    match language {
        Language::En => INSUFFICIENT_INFO_EN,
        Language::Hi => INSUFFICIENT_INFO_HI,
        Language::Mr => INSUFFICIENT_INFO_MR,
    }
}

/// 언어별 사과 메시지
pub fn apology(language: Language) -> &'static str {
    match language {
        Language::En => APOLOGY_EN,
        Language::Hi => APOLOGY_HI,
        Language::Mr => APOLOGY_MR,
    }
}

// ============================================================================
// TutorRouter
// ============================================================================

/// 질문 라우터
///
/// 핸들(검색기, 백엔드)은 생성 시점에 명시적으로 주입됩니다.
pub struct TutorRouter {
    retriever: Arc<dyn Retriever>,
    online: Arc<dyn GenerationBackend>,
    fallback: Arc<dyn GenerationBackend>,
    config: RouterConfig,
}

impl TutorRouter {
    /// 새 라우터 생성
    pub fn new(
        retriever: Arc<dyn Retriever>,
        online: Arc<dyn GenerationBackend>,
        fallback: Arc<dyn GenerationBackend>,
        config: RouterConfig,
    ) -> Self {
        Self {
            retriever,
            online,
            fallback,
            config,
        }
    }

    /// 질문 라우팅 - 유일한 공개 진입점
    ///
    /// 온라인 백엔드는 호출당 한 번만 시도하고, 폴백도 한 번만
    /// 시도합니다. 항상 완결된 결과를 반환합니다.
    pub async fn route(&self, question: &str) -> RouterResult {
        let lang = language::detect(question);

        match self.try_online(question, lang).await {
            Ok(text) => RouterResult {
                text,
                mode: Mode::Online,
                confidence: self.config.online_confidence.clamp(0.0, 1.0),
                language: lang,
            },
            Err(e) => {
                tracing::warn!(error = %e, "online model failed; switching to offline RAG");
                self.try_fallback(question, lang).await
            }
        }
    }

    /// 온라인 백엔드 시도
    ///
    /// 호출이 성공해도 다듬은 답변이 최소 길이에 못 미치면 실패로
    /// 취급합니다 ("기술적으로는 성공했지만 내용이 없는" 경우).
    async fn try_online(&self, question: &str, lang: Language) -> Result<String, BackendError> {
        let answer = self.online.generate(question, lang, None).await?;

        let trimmed = answer.trim();
        if trimmed.chars().count() < self.config.min_answer_chars {
            return Err(BackendError::EmptyAnswer);
        }

        Ok(trimmed.to_string())
    }

    /// 오프라인 폴백 - 실패해도 결과를 반환
    async fn try_fallback(&self, question: &str, lang: Language) -> RouterResult {
        match self.run_fallback(question, lang).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "offline fallback failed");
                RouterResult {
                    text: apology(lang).to_string(),
                    mode: Mode::Error,
                    confidence: 0.0,
                    language: lang,
                }
            }
        }
    }

    /// 검색 + 로컬 백엔드 실행
    ///
    /// 여기서의 Err는 치명 경로(error mode)로 이어집니다. 답변이
    /// 비거나 너무 짧은 것은 Err가 아니라 "자료 없음" 결과입니다.
    async fn run_fallback(&self, question: &str, lang: Language) -> Result<RouterResult> {
        let retrieved = self.retriever.retrieve(question, None).await?;

        let answer = if retrieved.is_empty() {
            // 컨텍스트가 없으면 생성을 시도하지 않음 (근거 없는 답변 방지)
            None
        } else {
            match self
                .fallback
                .generate(question, lang, Some(&retrieved.context))
                .await
            {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.chars().count() >= self.config.min_answer_chars {
                        Some(trimmed.to_string())
                    } else {
                        None
                    }
                }
                // 빈 답변은 소프트 실패
                Err(BackendError::EmptyAnswer) => None,
                // 프로세스/타임아웃 실패는 치명 경로
                Err(e) => return Err(e.into()),
            }
        };

        let result = match answer {
            Some(text) => RouterResult {
                text,
                mode: Mode::Offline,
                confidence: self.config.offline_confidence.clamp(0.0, 1.0),
                language: lang,
            },
            None => RouterResult {
                text: insufficient_info(lang).to_string(),
                mode: Mode::Offline,
                confidence: self.config.degraded_confidence.clamp(0.0, 1.0),
                language: lang,
            },
        };

        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::knowledge::RetrievalResult;

    // ------------------------------------------------------------------
    // Mocks
    // ------------------------------------------------------------------

    /// 고정 컨텍스트를 반환하는 검색기
    struct StaticRetriever(RetrievalResult);

    #[async_trait]
    impl Retriever for StaticRetriever {
        async fn retrieve(&self, _query: &str, _subject: Option<&str>) -> Result<RetrievalResult> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    /// 항상 실패하는 검색기
    struct BrokenRetriever;

    #[async_trait]
    impl Retriever for BrokenRetriever {
        async fn retrieve(&self, _query: &str, _subject: Option<&str>) -> Result<RetrievalResult> {
            anyhow::bail!("store unavailable")
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    /// 고정 답변 백엔드
    struct EchoBackend(String);

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate(
            &self,
            _question: &str,
            _language: Language,
            _context: Option<&str>,
        ) -> Result<String, BackendError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    /// 항상 실패하는 백엔드
    struct FailingBackend;

    #[async_trait]
    impl GenerationBackend for FailingBackend {
        async fn generate(
            &self,
            _question: &str,
            _language: Language,
            _context: Option<&str>,
        ) -> Result<String, BackendError> {
            Err(BackendError::Http("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn context_result() -> RetrievalResult {
        RetrievalResult {
            context: "Force is a push or a pull acting on a body.".to_string(),
            confidence: 0.8,
        }
    }

    fn long_answer() -> String {
        "Force is an interaction that changes the motion of an object.".to_string()
    }

    fn router(
        retriever: Arc<dyn Retriever>,
        online: Arc<dyn GenerationBackend>,
        fallback: Arc<dyn GenerationBackend>,
    ) -> TutorRouter {
        TutorRouter::new(retriever, online, fallback, RouterConfig::default())
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_online_success() {
        let r = router(
            Arc::new(StaticRetriever(context_result())),
            Arc::new(EchoBackend(long_answer())),
            Arc::new(FailingBackend),
        );

        let result = r.route("What is force?").await;
        assert_eq!(result.mode, Mode::Online);
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.language, Language::En);
        assert_eq!(result.text, long_answer());
    }

    #[tokio::test]
    async fn test_short_online_answer_triggers_fallback() {
        // 온라인이 "성공"했지만 답변이 최소 길이 미만 → 폴백
        let r = router(
            Arc::new(StaticRetriever(context_result())),
            Arc::new(EchoBackend("ok".to_string())),
            Arc::new(EchoBackend(long_answer())),
        );

        let result = r.route("What is force?").await;
        assert_eq!(result.mode, Mode::Offline);
        assert_eq!(result.confidence, 0.75);
    }

    #[tokio::test]
    async fn test_online_failure_falls_back_offline() {
        let r = router(
            Arc::new(StaticRetriever(context_result())),
            Arc::new(FailingBackend),
            Arc::new(EchoBackend(long_answer())),
        );

        let result = r.route("What is force?").await;
        assert_eq!(result.mode, Mode::Offline);
        assert_eq!(result.confidence, 0.75);
        assert_eq!(result.text, long_answer());
    }

    #[tokio::test]
    async fn test_empty_context_yields_insufficient_info() {
        // 온라인 실패 + 검색 결과 없음 → 고정 "자료 없음" 메시지, 감소 신뢰도
        let r = router(
            Arc::new(StaticRetriever(RetrievalResult::empty())),
            Arc::new(FailingBackend),
            Arc::new(EchoBackend(long_answer())),
        );

        let result = r.route("What is dark matter?").await;
        assert_eq!(result.mode, Mode::Offline);
        assert_eq!(result.confidence, 0.30);
        assert_eq!(result.text, insufficient_info(Language::En));
    }

    #[tokio::test]
    async fn test_total_failure_yields_error_mode() {
        // 온라인과 폴백 모두 실패 → error mode, 신뢰도 정확히 0
        let r = router(
            Arc::new(StaticRetriever(context_result())),
            Arc::new(FailingBackend),
            Arc::new(FailingBackend),
        );

        let result = r.route("What is force?").await;
        assert_eq!(result.mode, Mode::Error);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.text, apology(Language::En));
    }

    #[tokio::test]
    async fn test_retriever_failure_yields_error_mode() {
        let r = router(
            Arc::new(BrokenRetriever),
            Arc::new(FailingBackend),
            Arc::new(EchoBackend(long_answer())),
        );

        let result = r.route("What is force?").await;
        assert_eq!(result.mode, Mode::Error);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_language_carried_through_fallback() {
        let r = router(
            Arc::new(StaticRetriever(RetrievalResult::empty())),
            Arc::new(FailingBackend),
            Arc::new(FailingBackend),
        );

        let result = r.route("बल क्या है?").await;
        assert_eq!(result.language, Language::Hi);
        assert_eq!(result.text, insufficient_info(Language::Hi));

        let result = r.route("जडत्व म्हणजे काय?").await;
        assert_eq!(result.language, Language::Mr);
    }

    #[tokio::test]
    async fn test_result_envelope_always_valid() {
        // 어떤 조합에서도 mode는 셋 중 하나, confidence는 [0,1]
        let cases: Vec<TutorRouter> = vec![
            router(
                Arc::new(StaticRetriever(context_result())),
                Arc::new(EchoBackend(long_answer())),
                Arc::new(EchoBackend(long_answer())),
            ),
            router(
                Arc::new(StaticRetriever(RetrievalResult::empty())),
                Arc::new(FailingBackend),
                Arc::new(FailingBackend),
            ),
            router(
                Arc::new(BrokenRetriever),
                Arc::new(FailingBackend),
                Arc::new(FailingBackend),
            ),
        ];

        for r in cases {
            let result = r.route("What is force?").await;
            assert!(matches!(result.mode, Mode::Online | Mode::Offline | Mode::Error));
            assert!((0.0..=1.0).contains(&result.confidence));
            assert!(matches!(
                result.language,
                Language::En | Language::Hi | Language::Mr
            ));
            assert!(!result.text.is_empty());
        }
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Online).unwrap(), "\"online\"");
        assert_eq!(serde_json::to_string(&Mode::Offline).unwrap(), "\"offline\"");
        assert_eq!(serde_json::to_string(&Mode::Error).unwrap(), "\"error\"");
    }
}
