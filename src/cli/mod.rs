//! CLI 모듈
//!
//! tutor-rag CLI 명령어 정의 및 구현
//! - ingest: 문서 디렉토리 → 청크 말뭉치
//! - index: 말뭉치 → 임베딩 인덱스 (벡터 검색용)
//! - ask: 질문 라우팅 (온라인 → 오프라인 폴백)
//! - search: 검색 전략 직접 실행 (디버깅용)
//! - status: 시스템 상태 확인

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{has_groq_key, TutorConfig};
use crate::embedding::{self, GeminiEmbedding};
use crate::extractor::{collect_sources, ContentExtractor};
use crate::ingest::Ingestor;
use crate::knowledge::{
    ChunkStore, EmbeddingIndex, KeywordRetriever, Retriever, VectorRetriever,
};
use crate::model::{GenerationBackend, LocalModel, OnlineModel};
use crate::router::{RouterConfig, TutorRouter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "tutor-rag")]
#[command(version, about = "과학 튜터 RAG 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서 디렉토리를 인제스트하여 말뭉치 생성
    Ingest {
        /// 소스 문서 디렉토리 (기본: 설정의 docs_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 단일 파일 인제스트
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 과목 태그 (기본: 파일 이름)
        #[arg(short, long)]
        subject: Option<String>,

        /// 긴/표 형태 청크를 로컬 모델로 요약
        #[arg(long)]
        summarize: bool,
    },

    /// 말뭉치 임베딩 인덱스 빌드 (벡터 검색용)
    Index,

    /// 질문하기 (온라인 → 오프라인 폴백 라우팅)
    Ask {
        /// 질문 텍스트
        question: String,

        /// 키워드 대신 벡터 검색 전략 사용
        #[arg(long)]
        vector: bool,

        /// 결과를 JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 검색 전략 직접 실행 (라우팅 없이)
    Search {
        /// 검색 질의
        query: String,

        /// 과목 필터
        #[arg(short, long)]
        subject: Option<String>,

        /// 키워드 대신 벡터 검색 전략 사용
        #[arg(long)]
        vector: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = TutorConfig::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Ingest {
            dir,
            file,
            subject,
            summarize,
        } => cmd_ingest(&config, dir, file, subject, summarize).await,
        Commands::Index => cmd_index(&config).await,
        Commands::Ask {
            question,
            vector,
            json,
        } => cmd_ask(&config, &question, vector, json).await,
        Commands::Search {
            query,
            subject,
            vector,
        } => cmd_search(&config, &query, subject.as_deref(), vector).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 인제스트 명령어 (ingest)
///
/// 문서 디렉토리(또는 단일 파일)에서 청크 말뭉치를 만들어
/// 영속합니다.
async fn cmd_ingest(
    config: &TutorConfig,
    dir: Option<PathBuf>,
    file: Option<PathBuf>,
    subject: Option<String>,
    summarize: bool,
) -> Result<()> {
    let files = if let Some(file_path) = file {
        vec![file_path]
    } else {
        let dir = dir.unwrap_or_else(|| config.docs_dir.clone());
        collect_sources(&dir)?
    };

    if files.is_empty() {
        println!("[!] 인제스트할 파일이 없습니다.");
        return Ok(());
    }

    println!("[*] 인제스트 대상: {} 파일", files.len());

    // 추출
    let extractor = ContentExtractor::new();
    let mut documents = Vec::with_capacity(files.len());

    for (i, path) in files.iter().enumerate() {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        print!("[{}/{}] {}... ", i + 1, files.len(), name);

        match extractor.extract_document(path, subject.as_deref()).await {
            Ok(doc) => {
                println!("요소 {} 개", doc.elements.len());
                documents.push(doc);
            }
            Err(e) => {
                // 추출 실패는 배치를 중단하지 않음
                println!("실패: {}", e);
            }
        }
    }

    // 청크 빌드
    let mut ingestor = Ingestor::new(config.chunking.clone());
    if summarize {
        let local: Arc<dyn GenerationBackend> = Arc::new(LocalModel::new(config));
        ingestor = ingestor.with_summarizer(
            local,
            Duration::from_secs(config.local_timeout_secs),
        );
        println!("[*] 요약 활성화: {} {}", config.local_model_cmd, config.local_model);
    }

    let chunks = ingestor.build(&documents).await;
    if chunks.is_empty() {
        bail!("유효한 청크가 없습니다. 문서 내용을 확인하세요.");
    }

    let store = ChunkStore::new(chunks)?;
    let corpus_path = config.corpus_path();
    store.save(&corpus_path)?;

    let stats = store.stats();
    println!();
    println!("[OK] 말뭉치 저장됨: {}", corpus_path.display());
    println!("     청크 {} 개, {} bytes", stats.chunk_count, stats.total_content_bytes);
    println!("     과목: {}", stats.subjects.join(", "));

    Ok(())
}

/// 인덱스 명령어 (index)
///
/// 말뭉치 전체를 임베딩하여 벡터 검색 인덱스를 빌드합니다.
async fn cmd_index(config: &TutorConfig) -> Result<()> {
    if !embedding::has_api_key() {
        bail!(
            "임베딩 API 키가 설정되지 않았습니다.\n\
             설정: export GEMINI_API_KEY=your-key"
        );
    }

    let store = ChunkStore::load(&config.corpus_path())
        .context("말뭉치 로드 실패 - 먼저 ingest를 실행하세요")?;

    println!("[*] 청크 {} 개 임베딩 중...", store.len());

    let embedder = GeminiEmbedding::from_env()?;
    let index = EmbeddingIndex::build(&store, &embedder).await?;

    let index_path = config.index_path();
    index.save(&index_path)?;

    println!("[OK] 인덱스 저장됨: {} ({} 엔트리)", index_path.display(), index.len());
    Ok(())
}

/// 질문 명령어 (ask)
///
/// 라우터를 통해 온라인 → 오프라인 폴백 경로로 답변합니다.
async fn cmd_ask(config: &TutorConfig, question: &str, vector: bool, json: bool) -> Result<()> {
    config.validate_for_serving()?;

    let store = Arc::new(ChunkStore::load(&config.corpus_path())?);
    let retriever = build_retriever(config, store, vector)?;

    // 키가 없어도 온라인 백엔드는 구성 (호출 시 실패 → 폴백)
    let api_key = crate::config::get_groq_key().unwrap_or_default();
    let online: Arc<dyn GenerationBackend> = Arc::new(OnlineModel::new(config, api_key)?);
    let local: Arc<dyn GenerationBackend> = Arc::new(LocalModel::new(config));

    let router = TutorRouter::new(
        retriever,
        online,
        local,
        RouterConfig {
            online_confidence: config.online_confidence,
            offline_confidence: config.offline_confidence,
            degraded_confidence: config.degraded_confidence,
            min_answer_chars: config.min_answer_chars,
        },
    );

    let result = router.route(question).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.text);
        println!();
        println!(
            "[모드: {} | 신뢰도: {:.2} | 언어: {}]",
            result.mode, result.confidence, result.language
        );
    }

    Ok(())
}

/// 검색 명령어 (search)
///
/// 라우팅 없이 검색 전략만 실행하여 컨텍스트와 신뢰도를 보여줍니다.
async fn cmd_search(
    config: &TutorConfig,
    query: &str,
    subject: Option<&str>,
    vector: bool,
) -> Result<()> {
    config.validate_for_serving()?;

    let store = Arc::new(ChunkStore::load(&config.corpus_path())?);
    let retriever = build_retriever(config, store, vector)?;

    println!("[*] 검색 중 ({}): \"{}\"", retriever.name(), query);

    let result = retriever.retrieve(query, subject).await?;

    if result.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 신뢰도: {:.3}\n", result.confidence);
    println!("{}", result.context);

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &TutorConfig) -> Result<()> {
    println!("tutor-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 문서 디렉토리: {}", config.docs_dir.display());

    // 말뭉치 상태
    match ChunkStore::load(&config.corpus_path()) {
        Ok(store) => {
            let stats = store.stats();
            println!("[OK] 말뭉치: 청크 {} 개, {} bytes", stats.chunk_count, stats.total_content_bytes);
            if !stats.subjects.is_empty() {
                println!("     과목: {}", stats.subjects.join(", "));
            }
        }
        Err(_) => {
            println!("[!] 말뭉치 없음 - 실행: tutor-rag ingest --dir <docs>");
        }
    }

    // 임베딩 인덱스 상태
    match EmbeddingIndex::load(&config.index_path()) {
        Ok(index) => println!("[OK] 임베딩 인덱스: {} 엔트리", index.len()),
        Err(_) => println!("[!] 임베딩 인덱스 없음 (키워드 검색만 가능)"),
    }

    // 온라인 모델 상태
    if has_groq_key() {
        println!("[OK] 온라인 모델: {} (키 설정됨)", config.online_model);
    } else {
        println!("[!] GROQ_API_KEY 미설정 - 온라인 모드는 즉시 폴백됩니다");
    }

    // 로컬 모델 상태
    let local = LocalModel::new(config);
    if local.is_available().await {
        println!("[OK] 로컬 모델: {} {}", config.local_model_cmd, config.local_model);
    } else {
        println!(
            "[!] 로컬 모델 사용 불가: {} (오프라인 생성은 실패합니다)",
            config.local_model_cmd
        );
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 설정에 따라 검색 전략 구성
fn build_retriever(
    config: &TutorConfig,
    store: Arc<ChunkStore>,
    vector: bool,
) -> Result<Arc<dyn Retriever>> {
    if vector {
        let index = EmbeddingIndex::load(&config.index_path())
            .context("임베딩 인덱스 로드 실패 - 먼저 index를 실행하세요")?;
        let embedder = GeminiEmbedding::from_env().context("임베딩 프로바이더 생성 실패")?;

        Ok(Arc::new(VectorRetriever::new(
            store,
            Arc::new(index),
            Arc::new(embedder),
            config.top_k,
        )))
    } else {
        Ok(Arc::new(KeywordRetriever::new(store, config.top_k)))
    }
}
