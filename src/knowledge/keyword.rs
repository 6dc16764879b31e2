//! 키워드 검색 - term-frequency 기반 lexical 전략
//!
//! 질의 토큰이 청크에 등장하는 빈도의 합으로 스코어링합니다.
//! IDF 가중치나 길이 정규화 없이 순수 TF 중첩만 사용합니다.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use super::retriever::{join_context, RetrievalResult, Retriever};
use super::store::ChunkStore;

// ============================================================================
// Stopwords
// ============================================================================

/// 불용어 테이블 (v1) - 영어/힌디/마라티 기능어
///
/// 토큰화 시 제거되는 고정 집합입니다. 제어 흐름과 분리된 데이터
/// 테이블로 유지합니다.
pub const STOPWORDS: &[&str] = &[
    // English
    "is", "are", "was", "were", "the", "a", "an",
    "what", "why", "how", "when", "where",
    "and", "or", "of", "to", "in", "on", "for",
    "with", "from", "that", "this",
    // Hindi
    "क्या", "कैसे", "क्यों", "है", "में", "और", "का", "की", "के",
    // Marathi
    "आहे", "मध्ये", "आणि", "चे", "चा",
];

/// 토큰 최소 길이 (이 미만은 제거)
const MIN_TOKEN_CHARS: usize = 3;

/// 단어 토큰 정규식
fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("Invalid regex"))
}

/// 텍스트 토큰화
///
/// 소문자화 후 단어 토큰을 추출하고, 3자 미만 토큰과 불용어를
/// 제거합니다.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();

    word_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

// ============================================================================
// KeywordRetriever
// ============================================================================

/// 키워드 검색기
///
/// 스코어는 질의 토큰별 청크 내 등장 빈도의 합입니다. 동점 청크는
/// 말뭉치 원래 순서를 유지합니다 (stable sort).
pub struct KeywordRetriever {
    store: Arc<ChunkStore>,
    top_k: usize,
}

impl KeywordRetriever {
    /// 새 키워드 검색기 생성
    pub fn new(store: Arc<ChunkStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    /// 청크 스코어 계산 (질의 토큰의 청크 내 빈도 합)
    fn score_chunk(query_tokens: &[String], content: &str) -> usize {
        let chunk_tokens = tokenize(content);

        let mut counter: HashMap<&str, usize> = HashMap::new();
        for token in &chunk_tokens {
            *counter.entry(token.as_str()).or_insert(0) += 1;
        }

        query_tokens
            .iter()
            .map(|token| counter.get(token.as_str()).copied().unwrap_or(0))
            .sum()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, subject: Option<&str>) -> Result<RetrievalResult> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        // 전체(또는 과목 필터) 청크 스코어링
        let mut scored: Vec<(usize, &str)> = self
            .store
            .iter_subject(subject)
            .map(|chunk| (Self::score_chunk(&query_tokens, &chunk.content), chunk.content.as_str()))
            .collect();

        // 스코어 내림차순, 동점은 말뭉치 순서 유지 (sort_by는 stable)
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let top: Vec<&str> = scored
            .iter()
            .take(self.top_k)
            .filter(|(score, _)| *score > 0)
            .map(|(_, content)| *content)
            .collect();

        if top.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        // 휴리스틱 신뢰도: 최고 스코어 / 질의 토큰 수 (1.0에서 포화).
        // 보정된 확률이 아니므로 다른 신뢰도와 산술 혼합하지 말 것.
        let top_score = scored[0].0;
        let confidence = (top_score as f32 / query_tokens.len() as f32).min(1.0);

        tracing::debug!(
            matches = top.len(),
            top_score,
            confidence,
            "keyword retrieval"
        );

        Ok(RetrievalResult {
            context: join_context(top),
            confidence,
        })
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::store::Chunk;

    fn store_from(contents: &[&str]) -> Arc<ChunkStore> {
        let chunks = contents
            .iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                id: i as u32,
                subject: None,
                content: content.to_string(),
            })
            .collect();
        Arc::new(ChunkStore::new(chunks).unwrap())
    }

    #[test]
    fn test_tokenize_filters_short_and_stopwords() {
        let tokens = tokenize("What is the force of gravity?");
        assert_eq!(tokens, vec!["force", "gravity"]);
    }

    #[test]
    fn test_tokenize_lowercases() {
        let tokens = tokenize("FORCE Gravity");
        assert_eq!(tokens, vec!["force", "gravity"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("is the a").is_empty());
    }

    #[tokio::test]
    async fn test_no_match_returns_empty_and_zero() {
        let store = store_from(&[
            "Plants make food by photosynthesis.",
            "Water boils at hundred degrees.",
        ]);
        let retriever = KeywordRetriever::new(store, 3);

        let result = retriever.retrieve("quantum entanglement", None).await.unwrap();
        assert_eq!(result.context, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_top_chunk_ordering() {
        let store = store_from(&[
            "Gravity pulls objects down.",
            "Gravity gravity gravity everywhere, gravity acts on mass.",
            "Nothing relevant here at all.",
        ]);
        let retriever = KeywordRetriever::new(store, 2);

        let result = retriever.retrieve("gravity", None).await.unwrap();
        // 빈도가 높은 청크가 먼저
        assert!(result.context.starts_with("Gravity gravity gravity"));
        // 스코어 0인 청크는 제외
        assert!(!result.context.contains("Nothing relevant"));
    }

    #[tokio::test]
    async fn test_confidence_saturates_at_one() {
        let store = store_from(&["force force force force. It acts twice."]);
        let retriever = KeywordRetriever::new(store, 3);

        // top_score=4, 질의 토큰 1개 → min(1.0, 4/1) = 1.0
        let result = retriever.retrieve("force", None).await.unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_confidence_monotonic_in_term_frequency() {
        let sparse = store_from(&["Energy is conserved in collisions."]);
        let dense = store_from(&["Energy energy transfers; energy is conserved."]);

        let q = "energy conservation";
        let low = KeywordRetriever::new(sparse, 3)
            .retrieve(q, None)
            .await
            .unwrap();
        let high = KeywordRetriever::new(dense, 3)
            .retrieve(q, None)
            .await
            .unwrap();

        // 매칭 빈도가 늘어나면 신뢰도는 감소하지 않음
        assert!(high.confidence >= low.confidence);
    }

    #[tokio::test]
    async fn test_tie_keeps_corpus_order() {
        let store = store_from(&[
            "Light travels fast.",
            "Light bends in water.",
        ]);
        let retriever = KeywordRetriever::new(store, 2);

        let result = retriever.retrieve("light", None).await.unwrap();
        // 동점이므로 말뭉치 순서 유지
        assert!(result.context.starts_with("Light travels fast."));
    }

    #[tokio::test]
    async fn test_subject_filter_restricts_scope() {
        let chunks = vec![
            Chunk {
                id: 0,
                subject: Some("physics".to_string()),
                content: "Force changes motion of a body.".to_string(),
            },
            Chunk {
                id: 1,
                subject: Some("biology".to_string()),
                content: "Muscles exert force on bones.".to_string(),
            },
        ];
        let store = Arc::new(ChunkStore::new(chunks).unwrap());
        let retriever = KeywordRetriever::new(store, 3);

        let result = retriever.retrieve("force", Some("biology")).await.unwrap();
        assert!(result.context.contains("Muscles"));
        assert!(!result.context.contains("motion of a body"));
    }

    #[tokio::test]
    async fn test_hindi_query_matches_devanagari_chunk() {
        let store = store_from(&[
            "बल एक धक्का या खिंचाव होता है। बल गति बदलता है।",
        ]);
        let retriever = KeywordRetriever::new(store, 3);

        let result = retriever.retrieve("बल क्या होता है", None).await.unwrap();
        assert!(!result.is_empty());
        assert!(result.confidence > 0.0);
    }
}
