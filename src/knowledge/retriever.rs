//! Retriever 트레이트 및 검색 결과 타입
//!
//! 키워드(lexical)와 벡터 전략이 공유하는 인터페이스입니다.
//! 두 전략 모두 과목(subject) 필터링을 지원합니다.

use anyhow::Result;
use async_trait::async_trait;

/// 컨텍스트 청크 구분자
///
/// 상위 청크들을 생성 백엔드에 넘길 때 이 구분자로 연결합니다.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

// ============================================================================
// Types
// ============================================================================

/// 검색 결과
///
/// 불변식: `context`가 비어 있으면 `confidence`는 정확히 0.0이고,
/// 그 역도 성립합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    /// 스코어 내림차순으로 연결된 청크 텍스트
    pub context: String,
    /// 휴리스틱 신뢰도 (0.0 ~ 1.0, 보정된 확률 아님)
    pub confidence: f32,
}

impl RetrievalResult {
    /// 매칭 없음 결과 (빈 컨텍스트 ⇔ 신뢰도 0)
    pub fn empty() -> Self {
        Self {
            context: String::new(),
            confidence: 0.0,
        }
    }

    /// 컨텍스트 존재 여부
    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

// ============================================================================
// Retriever Trait
// ============================================================================

/// 검색 전략 트레이트
///
/// 질의 문자열을 관련 청크들의 컨텍스트와 신뢰도로 매핑합니다.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// 질의에 대한 컨텍스트 검색
    ///
    /// `subject`가 주어지면 해당 과목의 청크만 스코어링합니다.
    async fn retrieve(&self, query: &str, subject: Option<&str>) -> Result<RetrievalResult>;

    /// 전략 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 청크 텍스트들을 구분자로 연결
pub fn join_context<'a>(chunks: impl IntoIterator<Item = &'a str>) -> String {
    chunks.into_iter().collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

/// 라인 단위 중복 제거
///
/// 반복적인 출력을 내는 생성기를 거친 텍스트를 정리합니다.
/// 대소문자 구분 정확 일치, 최초 등장 순서 유지.
pub fn dedup_lines(text: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    text.lines()
        .filter(|line| seen.insert(*line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Tests
// ============================================================================
