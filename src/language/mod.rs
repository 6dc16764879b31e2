//! 언어 감지 모듈 - 질문 텍스트의 언어 분류 (en/hi/mr)
//!
//! 데바나가리 스크립트 감지를 우선하고, 힌디/마라티는 키워드 카운트로
//! 구분합니다. 라틴 스크립트는 whatlang 통계 감지로 폴백합니다.
//! 학습이나 세션 상태 없이 항상 같은 입력에 같은 결과를 반환합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Language
// ============================================================================

/// 지원 언어 코드
///
/// 감지기나 백엔드가 이 집합 밖의 코드를 반환하면 경계에서 `En`으로
/// 정규화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// 영어
    En,
    /// 힌디어
    Hi,
    /// 마라티어
    Mr,
}

impl Language {
    /// 기본 언어
    pub const DEFAULT: Language = Language::En;

    /// ISO 639-1 코드 반환
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Mr => "mr",
        }
    }

    /// 코드 문자열에서 변환
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::En),
            "hi" => Some(Language::Hi),
            "mr" => Some(Language::Mr),
            _ => None,
        }
    }

    /// 지원 집합 밖의 코드를 기본 언어로 정규화
    pub fn normalize(code: &str) -> Self {
        Self::from_code(code).unwrap_or(Self::DEFAULT)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Keyword Tables
// ============================================================================

/// 마라티어 판별 키워드 (v1, 수작업 큐레이션)
///
/// 데바나가리 텍스트에서 힌디어와 구분하기 위한 고정 목록입니다.
/// 제어 흐름과 분리된 데이터 테이블로 유지합니다.
pub const MARATHI_KEYWORDS: &[&str] = &[
    "आहे", "म्हणजे", "मध्ये", "सांग", "समजाव", "काय", "कसे", "आणि", "चे", "चा",
];

/// 힌디어 판별 키워드 (v1, 수작업 큐레이션)
pub const HINDI_KEYWORDS: &[&str] = &[
    "क्या", "कैसे", "क्यों", "है", "हैं", "और", "की", "के", "का", "में",
];

/// 감지를 시도할 최소 문자 수 (이 미만은 기본 언어)
const MIN_DETECT_CHARS: usize = 3;

// ============================================================================
// Detection
// ============================================================================

/// 텍스트의 언어를 감지
///
/// 규칙 순서:
/// 1. 3자 미만 → 기본 언어
/// 2. 데바나가리 문자 포함 → 힌디 또는 마라티 (키워드 카운트로 구분,
///    동점이면 힌디 - 명시적 정책)
/// 3. 그 외 → whatlang 통계 감지, 실패 또는 미지원 언어면 기본 언어
pub fn detect(text: &str) -> Language {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_DETECT_CHARS {
        return Language::DEFAULT;
    }

    // 데바나가리 블록 (U+0900 ~ U+097F) 포함 여부
    if trimmed.chars().any(is_devanagari) {
        return disambiguate_devanagari(trimmed);
    }

    // 통계 감지 폴백
    match whatlang::detect(trimmed) {
        Some(info) => match info.lang() {
            whatlang::Lang::Eng => Language::En,
            whatlang::Lang::Hin => Language::Hi,
            whatlang::Lang::Mar => Language::Mr,
            // 지원 집합 밖 → 기본 언어
            _ => Language::DEFAULT,
        },
        None => Language::DEFAULT,
    }
}

/// 데바나가리 블록 문자 여부
fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

/// 데바나가리 텍스트의 힌디/마라티 구분
///
/// 키워드 출현 횟수가 높은 쪽이 승리합니다. 동점은 힌디로 판정합니다.
fn disambiguate_devanagari(text: &str) -> Language {
    let marathi_hits = count_keyword_hits(text, MARATHI_KEYWORDS);
    let hindi_hits = count_keyword_hits(text, HINDI_KEYWORDS);

    tracing::debug!(marathi_hits, hindi_hits, "devanagari disambiguation");

    if marathi_hits > hindi_hits {
        Language::Mr
    } else {
        // 동점 포함 - 힌디가 기본
        Language::Hi
    }
}

/// 키워드 테이블의 총 출현 횟수 카운트
fn count_keyword_hits(text: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .map(|kw| text.matches(kw).count())
        .sum()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hindi_question() {
        assert_eq!(detect("बल क्या है?"), Language::Hi);
    }

    #[test]
    fn test_marathi_question() {
        assert_eq!(detect("जडत्व म्हणजे काय?"), Language::Mr);
    }

    #[test]
    fn test_english_question() {
        assert_eq!(detect("What is force?"), Language::En);
    }

    #[test]
    fn test_short_input_defaults() {
        // 길이 1 입력은 기본 언어
        assert_eq!(detect("क"), Language::En);
        assert_eq!(detect(""), Language::En);
        assert_eq!(detect("  a  "), Language::En);
    }

    #[test]
    fn test_devanagari_never_english() {
        // 키워드가 하나도 없어도 데바나가리면 힌디/마라티
        let lang = detect("विज्ञान शिक्षण");
        assert!(lang == Language::Hi || lang == Language::Mr);
    }

    #[test]
    fn test_tie_resolves_to_hindi() {
        // 양쪽 키워드 0개 = 동점 → 힌디 (명시적 정책)
        assert_eq!(detect("विज्ञान"), Language::Hi);
    }

    #[test]
    fn test_marathi_keyword_count_wins() {
        // 마라티 키워드가 더 많으면 마라티
        assert_eq!(detect("प्रकाश म्हणजे काय ते सांग"), Language::Mr);
    }

    #[test]
    fn test_normalize_unsupported_code() {
        assert_eq!(Language::normalize("fr"), Language::En);
        assert_eq!(Language::normalize("hi"), Language::Hi);
        assert_eq!(Language::normalize(""), Language::En);
    }

    #[test]
    fn test_code_round_trip() {
        for lang in [Language::En, Language::Hi, Language::Mr] {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
    }

    #[test]
    fn test_keyword_hit_counting() {
        assert_eq!(count_keyword_hits("आहे आहे", &["आहे"]), 2);
        assert_eq!(count_keyword_hits("hello", &["आहे"]), 0);
    }
}
