//! tutor-rag - 과학 튜터 RAG 시스템
//!
//! 학생 질문을 과학 말뭉치 기반으로 답변합니다. 온라인 LLM을
//! 우선 시도하고, 불가능하면 로컬 검색 기반 생성으로 폴백합니다.
//!
//! - ingest: 문서 → 정제된 청크 말뭉치 (오프라인 배치)
//! - knowledge: 청크 저장소 + 키워드/벡터 검색 전략
//! - language: 질문 언어 감지 (en/hi/mr)
//! - model: 온라인/로컬 생성 백엔드
//! - router: 감지 → 온라인 → 폴백 상태 머신

pub mod cli;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod ingest;
pub mod knowledge;
pub mod language;
pub mod model;
pub mod router;

// Re-exports
pub use config::TutorConfig;
pub use embedding::{EmbeddingProvider, GeminiEmbedding};
pub use ingest::{ChunkPolicy, Ingestor, SourceDocument};
pub use knowledge::{
    Chunk, ChunkStore, EmbeddingIndex, KeywordRetriever, RetrievalResult, Retriever,
    VectorRetriever,
};
pub use language::Language;
pub use model::{BackendError, GenerationBackend, LocalModel, OnlineModel};
pub use router::{Mode, RouterConfig, RouterResult, TutorRouter};
