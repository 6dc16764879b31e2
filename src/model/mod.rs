//! 생성 백엔드 모듈 - 온라인/로컬 모델 공통 인터페이스
//!
//! 두 백엔드 모두 "질문 + 언어 + 선택적 컨텍스트 → 답변" 하나의
//! 계약을 구현합니다. 네트워크 오류, 타임아웃, 프로세스 실패, 빈 답변
//! 등 모든 실패 신호는 `BackendError`로 통일되어 라우터가 일괄적으로
//! "백엔드 사용 불가"로 취급합니다.

pub mod local;
pub mod online;

use async_trait::async_trait;
use thiserror::Error;

use crate::language::Language;

pub use local::LocalModel;
pub use online::OnlineModel;

// ============================================================================
// BackendError
// ============================================================================

/// 백엔드 실패 신호
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP 요청 실패 또는 비정상 응답
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// 타임아웃 초과
    #[error("backend timed out")]
    Timeout,

    /// 로컬 프로세스 실패 (스폰 실패 또는 비정상 종료)
    #[error("process failed (exit {code:?}): {stderr}")]
    Process {
        code: Option<i32>,
        stderr: String,
    },

    /// 빈 답변 또는 파싱 불가 응답
    #[error("empty or malformed answer")]
    EmptyAnswer,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Http(e.to_string())
        }
    }
}

// ============================================================================
// GenerationBackend Trait
// ============================================================================

/// 답변 생성 백엔드 트레이트
///
/// 구현체는 주어진 언어로 된 답변 문자열을 반환하거나
/// `BackendError`로 실패를 신호합니다.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// 답변 생성
    ///
    /// `context`가 주어지면 그 내용에 근거한 답변을 생성해야 합니다.
    async fn generate(
        &self,
        question: &str,
        language: Language,
        context: Option<&str>,
    ) -> Result<String, BackendError>;

    /// 백엔드 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
