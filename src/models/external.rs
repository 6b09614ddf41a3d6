//! # External Process Models
//!
//! Bridges to detection models that live outside this process, typically
//! neural models served by a Python script. The contract is a single JSON
//! exchange per batch:
//!
//! ```text
//! stdin : {"language": "cpp", "functions": ["int f() {...}", ...]}
//! stdout: [{"predicted": true, "probability": 0.93, "line_scores": [["int", 0.1], ...]}, ...]
//! ```

use super::{DetectionModel, RawDetectionResult};
use crate::config::ExternalModelConfig;
use crate::parser::Language;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Serialize)]
struct InferenceRequest<'a> {
    language: &'a str,
    functions: &'a [&'a str],
}

/// A model driven by running a configured command.
pub struct ExternalModel {
    config: ExternalModelConfig,
}

impl ExternalModel {
    pub fn new(config: ExternalModelConfig) -> Self {
        Self { config }
    }

    /// Resolves the command to an executable path.
    fn program(&self) -> Result<PathBuf> {
        let command = Path::new(&self.config.command);

        if command.components().count() > 1 {
            if command.is_file() {
                return Ok(command.to_path_buf());
            }
            bail!("command {} does not exist", command.display());
        }

        find_in_path(&self.config.command)
            .with_context(|| format!("command '{}' not found in PATH", self.config.command))
    }
}

impl DetectionModel for ExternalModel {
    fn label(&self) -> &str {
        &self.config.label
    }

    fn detail(&self) -> &str {
        &self.config.detail
    }

    fn load(&self) -> Result<()> {
        let program = self.program()?;

        if self.config.load_args.is_empty() {
            return Ok(());
        }

        log::info!("Running load step for {}: {}", self.config.label, program.display());
        let output = Command::new(&program)
            .args(&self.config.load_args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to start {}", program.display()))?;

        if !output.status.success() {
            bail!(
                "load step exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }

    fn infer(&self, functions: &[&str], language: Language) -> Result<Vec<RawDetectionResult>> {
        let program = self.program()?;
        let request = serde_json::to_vec(&InferenceRequest {
            language: language.as_str(),
            functions,
        })?;

        let mut child = Command::new(&program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", program.display()))?;

        // The child may fill its stdout pipe before draining stdin.
        let mut stdin = child.stdin.take().context("child stdin unavailable")?;
        let writer = std::thread::spawn(move || stdin.write_all(&request));

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", program.display()))?;

        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::debug!("{} closed stdin early: {}", self.config.label, e),
            Err(_) => bail!("stdin writer thread panicked"),
        }

        if !output.status.success() {
            bail!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let results: Vec<RawDetectionResult> = serde_json::from_slice(&output.stdout)
            .context("malformed JSON on stdout")?;

        if results.len() != functions.len() {
            bail!(
                "returned {} result(s) for {} function(s)",
                results.len(),
                functions.len()
            );
        }

        Ok(results)
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_model(script: &str, load_args: Vec<String>) -> ExternalModel {
        ExternalModel::new(ExternalModelConfig {
            label: "Shell".to_string(),
            detail: "Shell test model".to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            load_args,
        })
    }

    #[test]
    fn test_parses_results() {
        let model = shell_model(
            r#"cat > /dev/null; echo '[{"predicted": false, "probability": 0.8}, {"predicted": true, "probability": 0.95, "line_scores": [["a", 1.0]]}]'"#,
            Vec::new(),
        );
        model.load().unwrap();

        let results = model.infer(&["int f();", "int g();"], Language::C).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[0].predicted);
        assert!(results[1].predicted);
        assert_eq!(results[1].line_scores.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_receives_request_on_stdin() {
        let model = shell_model(
            r#"if grep -q '"language":"cpp"'; then echo '[{"predicted": false, "probability": 1.0}]'; else exit 3; fi"#,
            Vec::new(),
        );
        assert!(model.infer(&["void f() {}"], Language::Cpp).is_ok());
        assert!(model.infer(&["void f() {}"], Language::C).is_err());
    }

    #[test]
    fn test_count_mismatch_fails() {
        let model = shell_model(
            r#"cat > /dev/null; echo '[{"predicted": false, "probability": 1.0}]'"#,
            Vec::new(),
        );
        let err = model.infer(&["a", "b"], Language::C).unwrap_err();
        assert!(err.to_string().contains("1 result(s) for 2"));
    }

    #[test]
    fn test_bad_output_fails() {
        let model = shell_model("cat > /dev/null; echo not-json", Vec::new());
        assert!(model.infer(&["a"], Language::C).is_err());

        let model = shell_model("cat > /dev/null; exit 1", Vec::new());
        assert!(model.infer(&["a"], Language::C).is_err());
    }

    #[test]
    fn test_load_step() {
        let ok = shell_model("", vec!["-c".to_string(), "exit 0".to_string()]);
        assert!(ok.load().is_ok());

        let failing = shell_model("", vec!["-c".to_string(), "exit 2".to_string()]);
        assert!(failing.load().is_err());
    }

    #[test]
    fn test_missing_command() {
        let model = ExternalModel::new(ExternalModelConfig {
            label: "Missing".to_string(),
            detail: String::new(),
            command: "definitely-not-a-real-command-imdbug".to_string(),
            args: Vec::new(),
            load_args: Vec::new(),
        });
        assert!(model.load().is_err());
    }
}
