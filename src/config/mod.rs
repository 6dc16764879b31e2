//! 설정 모듈 - 환경변수 기반 설정 로드 및 시작 시점 검증
//!
//! 모든 튜닝 상수(청크 임계값, top-K, 신뢰도 상수, 타임아웃)는
//! 환경변수로 덮어쓸 수 있고, 기본값이 제공됩니다.
//! 말뭉치 부재 같은 설정/데이터 오류는 질의 시점이 아니라
//! 시작 시점에 감지되어 서빙을 차단합니다.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::ingest::ChunkPolicy;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.tutor-rag/)
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TUTOR_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tutor-rag")
}

// ============================================================================
// TutorConfig
// ============================================================================

/// 코어 설정
///
/// `from_env()`로 한 번 로드하여 Retriever/Router 생성자에 명시적으로
/// 전달합니다. 모듈 전역 싱글톤은 사용하지 않습니다.
#[derive(Debug, Clone)]
pub struct TutorConfig {
    /// 소스 문서 디렉토리
    pub docs_dir: PathBuf,
    /// 데이터 디렉토리 (말뭉치, 임베딩 인덱스)
    pub data_dir: PathBuf,
    /// 청킹 정책 (임계값 순서 검증 포함)
    pub chunking: ChunkPolicy,
    /// 검색 결과 상위 K개
    pub top_k: usize,
    /// 온라인 모드 고정 신뢰도
    pub online_confidence: f32,
    /// 오프라인 모드 고정 신뢰도
    pub offline_confidence: f32,
    /// 폴백이 답을 내지 못했을 때의 감소 신뢰도
    pub degraded_confidence: f32,
    /// 답변 최소 길이 (이 미만은 실패로 취급)
    pub min_answer_chars: usize,
    /// 온라인 백엔드 타임아웃 (초)
    pub online_timeout_secs: u64,
    /// 로컬 백엔드 타임아웃 (초)
    pub local_timeout_secs: u64,
    /// 온라인 모델 이름
    pub online_model: String,
    /// OpenAI 호환 API 베이스 URL
    pub online_base_url: String,
    /// 로컬 모델 실행 명령어
    pub local_model_cmd: String,
    /// 로컬 모델 이름
    pub local_model: String,
}

impl TutorConfig {
    /// 환경변수에서 설정 로드
    ///
    /// 잘못된 숫자 형식이나 임계값 순서 위반은 설정 오류로 즉시
    /// 실패합니다.
    pub fn from_env() -> Result<Self> {
        let chunking = ChunkPolicy {
            max_chars: env_parse("CHUNK_MAX_CHARS", 2000)?,
            new_after: env_parse("CHUNK_NEW_AFTER", 1500)?,
            combine_under: env_parse("CHUNK_COMBINE_UNDER", 500)?,
            min_chars: env_parse("CHUNK_MIN_CHARS", 150)?,
            summarize_over: env_parse("CHUNK_SUMMARIZE_OVER", 1800)?,
        };
        chunking.validate()?;

        let config = Self {
            docs_dir: PathBuf::from(env_or("TUTOR_DOCS_DIR", "docs")),
            data_dir: get_data_dir(),
            chunking,
            top_k: env_parse("TOP_K", 3)?,
            online_confidence: env_parse("ONLINE_CONFIDENCE", 0.92)?,
            offline_confidence: env_parse("OFFLINE_CONFIDENCE", 0.75)?,
            degraded_confidence: env_parse("DEGRADED_CONFIDENCE", 0.30)?,
            min_answer_chars: env_parse("MIN_ANSWER_CHARS", 20)?,
            online_timeout_secs: env_parse("ONLINE_TIMEOUT_SECS", 15)?,
            local_timeout_secs: env_parse("LOCAL_TIMEOUT_SECS", 60)?,
            online_model: env_or("ONLINE_MODEL", "llama-3.1-8b-instant"),
            online_base_url: env_or("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            local_model_cmd: env_or("LOCAL_MODEL_CMD", "ollama"),
            local_model: env_or("LOCAL_MODEL", "llama3.2:3b"),
        };

        config.validate_confidence()?;
        Ok(config)
    }

    /// 말뭉치 파일 경로
    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }

    /// 임베딩 인덱스 파일 경로
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("embeddings.json")
    }

    /// 서빙 전 검증
    ///
    /// 말뭉치가 없으면 실패합니다. 온라인 API 키 부재는 경고만 합니다
    /// (오프라인 폴백 경로는 여전히 동작).
    pub fn validate_for_serving(&self) -> Result<()> {
        let corpus = self.corpus_path();
        if !corpus.exists() {
            bail!(
                "말뭉치 파일이 없습니다: {}\n먼저 실행: tutor-rag ingest --dir <docs>",
                corpus.display()
            );
        }

        if !has_groq_key() {
            tracing::warn!("GROQ_API_KEY not set; online mode will fail over immediately");
        }

        Ok(())
    }

    /// 신뢰도 상수 범위 검증
    fn validate_confidence(&self) -> Result<()> {
        for (name, value) in [
            ("ONLINE_CONFIDENCE", self.online_confidence),
            ("OFFLINE_CONFIDENCE", self.offline_confidence),
            ("DEGRADED_CONFIDENCE", self.degraded_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be in [0, 1], got {}", name, value);
            }
        }
        Ok(())
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// Groq API 키 로드 (환경변수에서)
pub fn get_groq_key() -> Result<String> {
    match std::env::var("GROQ_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => bail!(
            "API key not found. Set GROQ_API_KEY environment variable.\n\
             Get your API key at: https://console.groq.com/keys"
        ),
    }
}

/// Groq API 키 존재 여부 확인
pub fn has_groq_key() -> bool {
    std::env::var("GROQ_API_KEY")
        .map(|k| !k.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 환경변수 읽기 (없으면 기본값)
fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => val,
        _ => default.to_string(),
    }
}

/// 환경변수 파싱 (없으면 기본값, 형식 오류는 실패)
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => val
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: {}", key, val)),
        _ => Ok(default),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_default() {
        std::env::remove_var("TUTOR_TEST_MISSING");
        let v: usize = env_parse("TUTOR_TEST_MISSING", 7).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn test_env_parse_invalid() {
        std::env::set_var("TUTOR_TEST_BAD", "not-a-number");
        let result: Result<usize> = env_parse("TUTOR_TEST_BAD", 1);
        assert!(result.is_err());
        std::env::remove_var("TUTOR_TEST_BAD");
    }

    #[test]
    fn test_env_or_default() {
        std::env::remove_var("TUTOR_TEST_STR");
        assert_eq!(env_or("TUTOR_TEST_STR", "fallback"), "fallback");
    }

    #[test]
    fn test_data_dir_not_empty() {
        let dir = get_data_dir();
        assert!(!dir.as_os_str().is_empty());
    }
}
