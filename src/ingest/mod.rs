//! 인제스트 모듈 - 원문 요소를 검색 가능한 청크로 변환
//!
//! 오프라인 단일 작성자 배치입니다. 추출기가 넘긴 요소 텍스트를
//! 문자 예산 기반으로 묶고, OCR/마크업 잡음을 정리하고, 비산문
//! 조각을 걸러낸 뒤 0부터 연속된 id를 부여합니다. 서빙은 배치가
//! 완료되어 영속된 말뭉치만 로드하므로 동시 쓰기 보호가 필요
//! 없습니다.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{bail, Result};
use regex::Regex;

use crate::knowledge::Chunk;
use crate::language;
use crate::model::GenerationBackend;

// ============================================================================
// Chunk Policy
// ============================================================================

/// 청킹 임계값 정책
///
/// `combine_under < new_after < max_chars` 순서가 지켜져야 하며,
/// 위반은 설정 오류입니다.
#[derive(Debug, Clone)]
pub struct ChunkPolicy {
    /// 청크 하드 캡 (문자 수)
    pub max_chars: usize,
    /// 이 길이를 초과하면 새 청크 시작
    pub new_after: usize,
    /// 이 길이 미만 청크는 이웃과 병합
    pub combine_under: usize,
    /// 유효 청크 최소 길이
    pub min_chars: usize,
    /// 이 길이를 초과하면 요약 대상 (요약 백엔드가 있을 때만)
    pub summarize_over: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            new_after: 1500,
            combine_under: 500,
            min_chars: 150,
            summarize_over: 1800,
        }
    }
}

impl ChunkPolicy {
    /// 임계값 순서 검증
    pub fn validate(&self) -> Result<()> {
        if !(self.combine_under < self.new_after && self.new_after < self.max_chars) {
            bail!(
                "Chunk thresholds must satisfy combine_under < new_after < max_chars \
                 (got {} / {} / {})",
                self.combine_under,
                self.new_after,
                self.max_chars
            );
        }
        Ok(())
    }
}

// ============================================================================
// Cleaning
// ============================================================================

/// 그림 캡션 패턴 ("Fig 8.4: ..." 형태)
fn caption_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)Fig\.?\s*\d+(\.\d+)*\s*:.*").expect("Invalid regex"))
}

/// 청크 텍스트 정제
///
/// 그림 캡션, 수식/숫자 잡음 라인, 러닝 헤더를 제거하고 공백을
/// 단일 스페이스로 정규화합니다.
pub fn clean_text(text: &str, header_word: &str) -> String {
    // 1. 그림 캡션 제거
    let text = caption_regex().replace_all(text, "");

    // 2. 수식/숫자 잡음 라인 제거, 줄바꿈은 공백으로
    let mut cleaned: String = text
        .lines()
        .filter(|line| !is_noise_line(line))
        .collect::<Vec<_>>()
        .join(" ");

    // 3. 러닝 헤더 제거 (단어 경계 일치)
    if !header_word.is_empty() {
        let header_re = Regex::new(&format!(r"\b{}\b", regex::escape(header_word)))
            .expect("Invalid regex");
        cleaned = header_re.replace_all(&cleaned, "").into_owned();
    }

    // 4. 공백 정규화
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 수식/숫자 잡음 라인 여부
///
/// 숫자와 기호만으로 구성된 라인(쪽 번호, 식 번호)이거나, 등호를
/// 포함하면서 수식 문자만으로 구성된 라인(예: "F = ma (8.4)")을
/// 잡음으로 판정합니다.
fn is_noise_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }

    let symbolic_only = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || " .()=+-*/^".contains(c));
    if symbolic_only {
        return true;
    }

    trimmed.contains('=')
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || " =+-()./^".contains(c))
}

// ============================================================================
// Validity
// ============================================================================

/// 문장 종결 부호 (영어 구두점 + 데바나가리 단다)
pub const SENTENCE_TERMINATORS: &[char] = &['.', '?', '!', '।'];

/// 청크 유효성 검사
///
/// 최소 길이 미만이거나 문장 종결 부호가 2개 미만이면 비산문
/// 조각(고립된 라벨, 헤더)으로 보고 버립니다.
pub fn is_valid_chunk(text: &str, min_chars: usize) -> bool {
    if text.chars().count() < min_chars {
        return false;
    }

    let terminators = text
        .chars()
        .filter(|c| SENTENCE_TERMINATORS.contains(c))
        .count();

    terminators >= 2
}

// ============================================================================
// Chunk Assembly
// ============================================================================

/// 요소들을 문자 예산에 따라 청크로 조립
///
/// 누적 길이가 `new_after`를 초과하면 청크를 마감하고, 어떤 청크도
/// `max_chars`를 넘지 않으며, `combine_under` 미만 청크는 이웃과
/// 병합됩니다.
pub fn assemble_chunks(elements: &[String], policy: &ChunkPolicy) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for element in elements {
        let element = element.trim();
        if element.is_empty() {
            continue;
        }

        let current_len = current.chars().count();
        let element_len = element.chars().count();

        // 추가하면 하드 캡을 넘는 경우 먼저 마감
        if !current.is_empty() && current_len + element_len + 1 > policy.max_chars {
            chunks.push(std::mem::take(&mut current));
        }

        // 요소 자체가 하드 캡보다 크면 분할
        if element_len > policy.max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_at_cap(element, policy.max_chars));
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(element);

        // 누적 길이가 new_after를 초과하면 새 청크 시작
        if current.chars().count() > policy.new_after {
            chunks.push(std::mem::take(&mut current));
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    merge_small_chunks(chunks, policy)
}

/// 하드 캡 크기로 강제 분할 (UTF-8 문자 경계 유지)
fn split_at_cap(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 너무 작은 청크를 이전 이웃과 병합
fn merge_small_chunks(chunks: Vec<String>, policy: &ChunkPolicy) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for chunk in chunks {
        if let Some(last) = result.last_mut() {
            let last_len = last.chars().count();
            let chunk_len = chunk.chars().count();

            if (last_len < policy.combine_under || chunk_len < policy.combine_under)
                && last_len + chunk_len + 1 <= policy.max_chars
            {
                last.push('\n');
                last.push_str(&chunk);
                continue;
            }
        }
        result.push(chunk);
    }

    result
}

// ============================================================================
// Ingestor
// ============================================================================

/// 추출기가 넘긴 문서 하나 (과목 태그 + 분절된 요소 텍스트)
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub subject: Option<String>,
    pub elements: Vec<String>,
}

/// 인제스트 배치 실행기
///
/// 선택적으로 요약 백엔드를 붙이면 표 형태이거나 과도하게 긴 청크를
/// 요약으로 대체합니다. 요약 실패는 치명적이지 않으며 원문을
/// 유지합니다.
pub struct Ingestor {
    policy: ChunkPolicy,
    header_word: String,
    summarizer: Option<Arc<dyn GenerationBackend>>,
    summarize_timeout: Duration,
}

impl Ingestor {
    /// 새 인제스터 생성 (기본 러닝 헤더: "SCIENCE")
    pub fn new(policy: ChunkPolicy) -> Self {
        Self {
            policy,
            header_word: "SCIENCE".to_string(),
            summarizer: None,
            summarize_timeout: Duration::from_secs(60),
        }
    }

    /// 러닝 헤더 단어 지정
    pub fn with_header_word(mut self, word: impl Into<String>) -> Self {
        self.header_word = word.into();
        self
    }

    /// 요약 백엔드 연결
    pub fn with_summarizer(
        mut self,
        backend: Arc<dyn GenerationBackend>,
        timeout: Duration,
    ) -> Self {
        self.summarizer = Some(backend);
        self.summarize_timeout = timeout;
        self
    }

    /// 문서 배치를 청크 시퀀스로 변환
    ///
    /// id는 소스 순서대로 0부터 연속 부여됩니다. 유효성 검사에
    /// 떨어진 청크는 배치를 중단하지 않고 버려집니다.
    pub async fn build(&self, documents: &[SourceDocument]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut next_id: u32 = 0;
        let mut dropped = 0usize;

        for doc in documents {
            for raw in assemble_chunks(&doc.elements, &self.policy) {
                let cleaned = clean_text(&raw, &self.header_word);

                if !is_valid_chunk(&cleaned, self.policy.min_chars) {
                    dropped += 1;
                    continue;
                }

                let content = if self.wants_summary(&raw, &cleaned) {
                    self.summarize(&cleaned).await.unwrap_or(cleaned)
                } else {
                    cleaned
                };

                chunks.push(Chunk {
                    id: next_id,
                    subject: doc.subject.clone(),
                    content,
                });
                next_id += 1;
            }
        }

        tracing::info!(kept = chunks.len(), dropped, "ingestion batch complete");
        chunks
    }

    /// 요약 대상 여부 (표 형태 또는 길이 초과)
    fn wants_summary(&self, raw: &str, cleaned: &str) -> bool {
        if self.summarizer.is_none() {
            return false;
        }
        looks_tabular(raw) || cleaned.chars().count() > self.policy.summarize_over
    }

    /// 청크 요약 시도
    ///
    /// 실패, 타임아웃, 너무 짧은 결과는 None을 반환하여 호출자가
    /// 원문을 유지하게 합니다.
    async fn summarize(&self, text: &str) -> Option<String> {
        let backend = self.summarizer.as_ref()?;

        let instruction = "Summarize the study material factually for revision. \
                           Keep every formula, number, and unit exactly as written.";
        let lang = language::detect(text);

        let result = tokio::time::timeout(
            self.summarize_timeout,
            backend.generate(instruction, lang, Some(text)),
        )
        .await;

        match result {
            Ok(Ok(summary)) => {
                let summary = summary.trim();
                if summary.chars().count() >= self.policy.min_chars / 2 {
                    Some(summary.to_string())
                } else {
                    tracing::debug!("summary too short; keeping original chunk");
                    None
                }
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "summarization failed; keeping original chunk");
                None
            }
            Err(_) => {
                tracing::debug!("summarization timed out; keeping original chunk");
                None
            }
        }
    }
}

/// 탭이나 파이프 구분자가 반복되면 표 형태로 판정
fn looks_tabular(text: &str) -> bool {
    text.contains('\t') || text.matches('|').count() >= 4
}

// ============================================================================
// Tests
// ============================================================================
