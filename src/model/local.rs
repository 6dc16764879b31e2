//! 로컬 생성 백엔드 - 외부 프로세스 기반 (기본: ollama run)
//!
//! 프롬프트를 stdin으로 전달하고 stdout/stderr를 모두 캡처합니다.
//! 모든 호출은 타임아웃으로 제한되며, 프로세스 실행 방식은 이 모듈
//! 안에 격리되어 라우터는 `GenerationBackend` 계약만 알면 됩니다.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::TutorConfig;
use crate::knowledge::dedup_lines;
use crate::language::Language;

use super::{BackendError, GenerationBackend};

// ============================================================================
// Prompt Building
// ============================================================================

/// 컨텍스트 근거 답변 프롬프트 구성
///
/// 컨텍스트가 있으면 그 안의 정보만 사용하도록 지시하고, 답변 언어를
/// 고정합니다.
fn grounded_prompt(language: Language, question: &str, context: Option<&str>) -> String {
    let answer_in = match language {
        Language::En => "Answer in English.",
        Language::Hi => "उत्तर केवल हिंदी में दें।",
        Language::Mr => "उत्तर फक्त मराठीत द्या.",
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!(
            "You are a science tutor. Answer the question using ONLY the study \
             material below. If the material does not cover the question, say so \
             briefly. Do not invent facts. {answer_in}\n\n\
             Study material:\n{ctx}\n\n\
             Question: {question}\n\
             Answer:"
        ),
        _ => format!(
            "You are a science tutor. Answer the question briefly and factually. \
             {answer_in}\n\n\
             Question: {question}\n\
             Answer:"
        ),
    }
}

// ============================================================================
// LocalModel
// ============================================================================

/// 서브프로세스 생성 백엔드
///
/// `<command> run <model>` 형태로 실행합니다 (ollama CLI 규약).
pub struct LocalModel {
    command: String,
    model: String,
    timeout: Duration,
}

impl LocalModel {
    /// 설정으로 생성
    pub fn new(config: &TutorConfig) -> Self {
        Self {
            command: config.local_model_cmd.clone(),
            model: config.local_model.clone(),
            timeout: Duration::from_secs(config.local_timeout_secs),
        }
    }

    /// 명령어/모델 직접 지정 생성
    pub fn with_command(command: String, model: String, timeout: Duration) -> Self {
        Self {
            command,
            model,
            timeout,
        }
    }

    /// 로컬 모델 실행 가능 여부 확인
    pub async fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("list")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success())
    }

    /// 프로세스 실행 및 출력 수집
    async fn run_process(&self, prompt: &str) -> Result<String, BackendError> {
        let mut child = Command::new(&self.command)
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Process {
                code: None,
                stderr: format!("spawn failed: {}", e),
            })?;

        // 프롬프트를 stdin으로 전달 후 닫음. 프로세스가 stdin을 다
        // 읽기 전에 종료할 수 있으므로 쓰기 오류는 무시하고 종료
        // 상태로 판정합니다.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(prompt.as_bytes()).await;
        }

        // 타임아웃 초과 시 kill_on_drop이 프로세스를 정리
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| BackendError::Timeout)?
            .map_err(|e| BackendError::Process {
                code: None,
                stderr: format!("wait failed: {}", e),
            })?;

        if !output.status.success() {
            return Err(BackendError::Process {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl GenerationBackend for LocalModel {
    async fn generate(
        &self,
        question: &str,
        language: Language,
        context: Option<&str>,
    ) -> Result<String, BackendError> {
        let prompt = grounded_prompt(language, question, context);

        tracing::debug!(command = %self.command, model = %self.model, "invoking local model");

        let raw = self.run_process(&prompt).await?;

        // 로컬 모델은 반복 출력을 내는 경우가 있어 라인 단위 중복 제거
        let answer = dedup_lines(raw.trim());
        if answer.trim().is_empty() {
            return Err(BackendError::EmptyAnswer);
        }

        Ok(answer)
    }

    fn name(&self) -> &str {
        "local"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grounded_prompt_with_context() {
        let prompt = grounded_prompt(
            Language::En,
            "What is inertia?",
            Some("Inertia resists change in motion."),
        );
        assert!(prompt.contains("Study material:"));
        assert!(prompt.contains("Inertia resists change in motion."));
        assert!(prompt.contains("Question: What is inertia?"));
    }

    #[test]
    fn test_grounded_prompt_without_context() {
        let prompt = grounded_prompt(Language::Hi, "बल क्या है?", None);
        assert!(!prompt.contains("Study material:"));
        assert!(prompt.contains("हिंदी"));
        assert!(prompt.contains("बल क्या है?"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_process_error() {
        let model = LocalModel::with_command(
            "definitely-not-a-real-command-xyz".to_string(),
            "none".to_string(),
            Duration::from_secs(5),
        );

        let result = model.generate("question", Language::En, None).await;
        assert!(matches!(result, Err(BackendError::Process { .. })));
    }

    #[tokio::test]
    async fn test_subprocess_output_captured() {
        // echo는 stdin을 무시하고 인자("run <model>")를 출력하므로
        // 파이프라인 전체(스폰 → 수집 → 정리)를 검증할 수 있음
        let model = LocalModel::with_command(
            "echo".to_string(),
            "hello".to_string(),
            Duration::from_secs(5),
        );

        let answer = model.generate("question", Language::En, None).await.unwrap();
        assert_eq!(answer, "run hello");
    }
}
