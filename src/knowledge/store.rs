//! Chunk Store - 말뭉치 청크 저장소 (JSON 직렬화)
//!
//! 인제스트 배치가 생성한 청크 시퀀스를 저장하고, 질의 시점에
//! 한 번 로드합니다. 로드 후에는 읽기 전용이며 프로세스 수명 동안
//! 변경되지 않습니다 (말뭉치 갱신 = 전체 재로드).

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 검색 가능한 텍스트 단위
///
/// 인제스트 시점에 한 번 생성되는 불변 레코드입니다.
/// `content`는 비어 있지 않고 공백이 정규화된 상태입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 말뭉치 내 고유 ID (0부터 연속, 소스 순서)
    pub id: u32,
    /// 출처 과목/문서 태그
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// 정제된 본문 텍스트
    pub content: String,
}

/// 말뭉치 파일 포맷
///
/// save → load 왕복 시 id, 순서, 내용이 동일하게 유지됩니다.
#[derive(Debug, Serialize, Deserialize)]
struct CorpusFile {
    /// 생성 시각
    created_at: DateTime<Utc>,
    /// 청크 레코드 시퀀스
    chunks: Vec<Chunk>,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub total_content_bytes: usize,
    pub subjects: Vec<String>,
}

// ============================================================================
// ChunkStore
// ============================================================================

/// 읽기 전용 청크 저장소
///
/// 로드 이후 쓰기가 없으므로 잠금 없이 여러 동시 질의가 공유할 수
/// 있습니다.
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    /// 청크 시퀀스로 저장소 생성
    ///
    /// id 중복과 빈 content는 데이터 오류로 거부합니다.
    pub fn new(chunks: Vec<Chunk>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for chunk in &chunks {
            if !seen.insert(chunk.id) {
                bail!("Duplicate chunk id in corpus: {}", chunk.id);
            }
            if chunk.content.trim().is_empty() {
                bail!("Empty chunk content (id={})", chunk.id);
            }
        }
        Ok(Self { chunks })
    }

    /// 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;

        let file: CorpusFile =
            serde_json::from_str(&raw).context("Failed to parse corpus file")?;

        tracing::info!(
            chunks = file.chunks.len(),
            created_at = %file.created_at,
            "loaded corpus"
        );

        Self::new(file.chunks)
    }

    /// 파일로 저장
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create corpus directory")?;
            }
        }

        let file = CorpusFile {
            created_at: Utc::now(),
            chunks: self.chunks.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .context("Failed to serialize corpus")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write corpus file: {}", path.display()))?;

        tracing::info!(chunks = self.chunks.len(), path = %path.display(), "saved corpus");
        Ok(())
    }

    /// 청크 수
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 전체 청크 슬라이스
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// ID로 청크 조회
    ///
    /// id가 연속이면 인덱스 접근, 아니면 선형 탐색으로 폴백합니다.
    pub fn get(&self, id: u32) -> Option<&Chunk> {
        match self.chunks.get(id as usize) {
            Some(chunk) if chunk.id == id => Some(chunk),
            _ => self.chunks.iter().find(|c| c.id == id),
        }
    }

    /// 과목 필터 반복자
    ///
    /// `subject`가 None이면 전체 청크를 순회합니다.
    pub fn iter_subject<'a>(
        &'a self,
        subject: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Chunk> + 'a {
        self.chunks.iter().filter(move |chunk| match subject {
            Some(s) => chunk.subject.as_deref() == Some(s),
            None => true,
        })
    }

    /// 저장소 통계
    pub fn stats(&self) -> StoreStats {
        let mut subjects: Vec<String> = self
            .chunks
            .iter()
            .filter_map(|c| c.subject.clone())
            .collect();
        subjects.sort();
        subjects.dedup();

        StoreStats {
            chunk_count: self.chunks.len(),
            total_content_bytes: self.chunks.iter().map(|c| c.content.len()).sum(),
            subjects,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            Chunk {
                id: 0,
                subject: Some("physics".to_string()),
                content: "Force is a push or a pull. It changes motion.".to_string(),
            },
            Chunk {
                id: 1,
                subject: Some("biology".to_string()),
                content: "Cells are the basic unit of life. They divide.".to_string(),
            },
            Chunk {
                id: 2,
                subject: Some("physics".to_string()),
                content: "Inertia resists change in motion. Mass measures it.".to_string(),
            },
        ]
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("documents.json");

        let store = ChunkStore::new(sample_chunks()).unwrap();
        store.save(&path).unwrap();

        let loaded = ChunkStore::load(&path).unwrap();

        // id, 순서, 내용이 동일해야 함
        assert_eq!(loaded.chunks(), store.chunks());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut chunks = sample_chunks();
        chunks[2].id = 0;
        assert!(ChunkStore::new(chunks).is_err());
    }

    #[test]
    fn test_empty_content_rejected() {
        let mut chunks = sample_chunks();
        chunks[1].content = "   ".to_string();
        assert!(ChunkStore::new(chunks).is_err());
    }

    #[test]
    fn test_get_by_id() {
        let store = ChunkStore::new(sample_chunks()).unwrap();
        assert_eq!(store.get(1).unwrap().id, 1);
        assert!(store.get(99).is_none());
    }

    #[test]
    fn test_subject_filter() {
        let store = ChunkStore::new(sample_chunks()).unwrap();

        let physics: Vec<_> = store.iter_subject(Some("physics")).collect();
        assert_eq!(physics.len(), 2);

        let all: Vec<_> = store.iter_subject(None).collect();
        assert_eq!(all.len(), 3);

        let none: Vec<_> = store.iter_subject(Some("chemistry")).collect();
        assert!(none.is_empty());
    }

    #[test]
    fn test_stats() {
        let store = ChunkStore::new(sample_chunks()).unwrap();
        let stats = store.stats();
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.subjects, vec!["biology", "physics"]);
    }
}
