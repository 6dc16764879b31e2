//! 벡터 검색 - 임베딩 L2 선형 스캔 전략
//!
//! 저장된 청크 임베딩 전체에 대해 정확한 L2 거리 선형 스캔을
//! 수행합니다. 이 말뭉치 규모에서는 근사 인덱스 구조가 필요하지
//! 않습니다. 인덱스는 오프라인에서 빌드되어 JSON으로 영속됩니다.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;

use super::retriever::{join_context, RetrievalResult, Retriever};
use super::store::ChunkStore;

// ============================================================================
// Types
// ============================================================================

/// 임베딩된 청크 엔트리
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// 대상 청크 ID
    pub chunk_id: u32,
    /// 과목 태그 (필터링용, 청크와 동일)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 임베딩 인덱스
///
/// 로드 후 읽기 전용으로 여러 동시 질의가 공유합니다.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    /// 벡터 차원
    dimension: usize,
    /// 엔트리 목록
    entries: Vec<EmbeddedChunk>,
}

impl EmbeddingIndex {
    /// 말뭉치 전체를 임베딩하여 인덱스 빌드 (오프라인 배치)
    pub async fn build(store: &ChunkStore, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let mut entries = Vec::with_capacity(store.len());

        for (i, chunk) in store.chunks().iter().enumerate() {
            tracing::debug!("embedding chunk {}/{}", i + 1, store.len());

            let embedding = embedder
                .embed(&chunk.content)
                .await
                .with_context(|| format!("Failed to embed chunk {}", chunk.id))?;

            entries.push(EmbeddedChunk {
                chunk_id: chunk.id,
                subject: chunk.subject.clone(),
                embedding,
            });
        }

        tracing::info!(entries = entries.len(), "built embedding index");

        Ok(Self {
            dimension: embedder.dimension(),
            entries,
        })
    }

    /// 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read index file: {}", path.display()))?;

        let index: Self = serde_json::from_str(&raw).context("Failed to parse index file")?;

        for entry in &index.entries {
            if entry.embedding.len() != index.dimension {
                bail!(
                    "Index entry for chunk {} has dimension {} (expected {})",
                    entry.chunk_id,
                    entry.embedding.len(),
                    index.dimension
                );
            }
        }

        Ok(index)
    }

    /// 파일로 저장
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create index directory")?;
            }
        }

        let json = serde_json::to_string(self).context("Failed to serialize index")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write index file: {}", path.display()))?;

        tracing::info!(entries = self.entries.len(), path = %path.display(), "saved index");
        Ok(())
    }

    /// 엔트리 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Distance
// ============================================================================

/// L2 (유클리드) 거리 계산
///
/// 차원이 다르거나 빈 벡터면 무한대를 반환하여 후보에서 밀려나게
/// 합니다.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::INFINITY;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// VectorRetriever
// ============================================================================

/// 벡터 검색기
///
/// 질의를 임베딩하고 전체 엔트리에 대해 L2 거리 오름차순 상위 K개를
/// 선택합니다.
pub struct VectorRetriever {
    store: Arc<ChunkStore>,
    index: Arc<EmbeddingIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl VectorRetriever {
    /// 새 벡터 검색기 생성
    pub fn new(
        store: Arc<ChunkStore>,
        index: Arc<EmbeddingIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            top_k,
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, subject: Option<&str>) -> Result<RetrievalResult> {
        if self.index.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        // 정확한 선형 스캔 (과목 필터 적용)
        let mut scored: Vec<(f32, u32)> = self
            .index
            .entries
            .iter()
            .filter(|entry| match subject {
                Some(s) => entry.subject.as_deref() == Some(s),
                None => true,
            })
            .map(|entry| (l2_distance(&query_embedding, &entry.embedding), entry.chunk_id))
            .filter(|(dist, _)| dist.is_finite())
            .collect();

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_k);

        // 범위 밖 chunk_id는 방어적으로 건너뜀
        let mut contexts = Vec::with_capacity(scored.len());
        let mut distances = Vec::with_capacity(scored.len());
        for (dist, chunk_id) in &scored {
            match self.store.get(*chunk_id) {
                Some(chunk) => {
                    contexts.push(chunk.content.as_str());
                    distances.push(*dist);
                }
                None => {
                    tracing::warn!(chunk_id, "index entry points to missing chunk; skipped");
                }
            }
        }

        if contexts.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        // 휴리스틱 신뢰도: 1 / (1 + 평균 거리). 거리가 작을수록 1에
        // 가까워집니다. 보정된 확률이 아닙니다.
        let mean_distance = distances.iter().sum::<f32>() / distances.len() as f32;
        let confidence = (1.0 / (1.0 + mean_distance)).clamp(0.0, 1.0);

        tracing::debug!(
            matches = contexts.len(),
            mean_distance,
            confidence,
            "vector retrieval"
        );

        Ok(RetrievalResult {
            context: join_context(contexts),
            confidence,
        })
    }

    fn name(&self) -> &'static str {
        "vector"
    }
}

// ============================================================================
// Tests
// ============================================================================
