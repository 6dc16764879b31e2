//! Knowledge 모듈 - 청크 저장소와 검색 전략
//!
//! - Store: 인제스트 산출물(청크 시퀀스)의 JSON 영속화 및 로드
//! - Keyword: term-frequency 기반 lexical 검색
//! - Vector: 임베딩 L2 선형 스캔 검색
//! - Retriever: 두 전략이 공유하는 트레이트와 결과 타입

mod keyword;
mod retriever;
mod store;
mod vector;

// Re-exports
pub use keyword::{tokenize, KeywordRetriever, STOPWORDS};
pub use retriever::{
    dedup_lines, join_context, RetrievalResult, Retriever, CONTEXT_SEPARATOR,
};
pub use store::{Chunk, ChunkStore, StoreStats};
pub use vector::{l2_distance, EmbeddedChunk, EmbeddingIndex, VectorRetriever};
