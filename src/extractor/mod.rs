//! 소스 문서 수집 및 추출 모듈
//!
//! 문서 디렉토리를 순회하여 지원 형식(PDF, 텍스트/마크다운)에서
//! 문단 단위 요소 텍스트를 추출합니다. 형식 파싱은 이 모듈에
//! 격리되고, 인제스트 코어는 이미 분절된 요소 텍스트만 받습니다.

pub mod pdf;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::ingest::SourceDocument;

// ============================================================================
// Source Types
// ============================================================================

/// 지원하는 소스 파일 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// 텍스트/마크다운 파일
    Text,
    /// PDF 파일
    Pdf,
}

impl SourceType {
    /// 확장자로 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" => Some(SourceType::Text),
            "pdf" => Some(SourceType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Collection
// ============================================================================

/// 디렉토리에서 지원 소스 파일 수집
///
/// .gitignore 패턴을 존중하고, 결정적 순서를 위해 경로로 정렬합니다.
pub fn collect_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Docs directory not found: {}", dir.display());
    }

    let mut files: Vec<PathBuf> = WalkBuilder::new(dir)
        .follow_links(false)
        .build()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && SourceType::from_path(path).is_some())
        .collect();

    files.sort();

    tracing::info!(count = files.len(), dir = %dir.display(), "collected source files");
    Ok(files)
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 요소 텍스트 추출
    ///
    /// 요소는 문단 수준의 텍스트 블록입니다. 빈 파일이면 빈 벡터를
    /// 반환합니다.
    pub async fn extract(&self, path: &Path) -> Result<Vec<String>> {
        let source_type = SourceType::from_path(path)
            .with_context(|| format!("Unsupported file type: {:?}", path))?;

        match source_type {
            SourceType::Text => self.extract_text(path).await,
            SourceType::Pdf => self.extract_pdf(path).await,
        }
    }

    /// 소스 파일을 과목 태그가 붙은 문서로 추출
    ///
    /// 과목이 지정되지 않으면 파일 이름(확장자 제외)을 사용합니다.
    pub async fn extract_document(
        &self,
        path: &Path,
        subject: Option<&str>,
    ) -> Result<SourceDocument> {
        let elements = self.extract(path).await?;

        let subject = subject
            .map(|s| s.to_string())
            .or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            });

        Ok(SourceDocument { subject, elements })
    }

    /// 텍스트 파일에서 추출
    async fn extract_text(&self, path: &Path) -> Result<Vec<String>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        Ok(split_elements(&text))
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<Vec<String>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path_buf = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_pages(&path_buf))
            .await
            .context("PDF extraction task failed")??;

        Ok(pages.iter().flat_map(|page| split_elements(page)).collect())
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// 텍스트를 문단 요소로 분절 (빈 줄 기준)
fn split_elements(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|block| block.trim().to_string())
        .filter(|block| !block.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
