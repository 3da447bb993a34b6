//! Candidate versions printed by an external command.

use std::process::Command;

use anyhow::Context;

use crate::ledger::{Candidate, CandidateSource};

/// Runs a command and reads one candidate per non-empty stdout line.
///
/// A line is `<version> [key=value ...]`; the pairs become metadata. The
/// dependency name is exported to the command as `STAGEHAND_DEPENDENCY`.
#[derive(Debug, Clone)]
pub struct CommandSource {
    command: Vec<String>,
}

impl CommandSource {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl CandidateSource for CommandSource {
    fn fetch(&mut self, name: &str) -> anyhow::Result<Vec<Candidate>> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Empty command for dependency '{}'", name))?;

        let output = Command::new(program)
            .args(args)
            .env("STAGEHAND_DEPENDENCY", name)
            .output()
            .with_context(|| format!("Failed to run '{}'", program))?;

        if !output.status.success() {
            anyhow::bail!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8(output.stdout)
            .with_context(|| format!("'{}' printed non-UTF-8 output", program))?;
        Ok(stdout.lines().filter_map(parse_line).collect())
    }
}

fn parse_line(line: &str) -> Option<Candidate> {
    let mut fields = line.split_whitespace();
    let mut candidate = Candidate::new(fields.next()?);
    for field in fields {
        if let Some((key, value)) = field.split_once('=') {
            candidate = candidate.with_meta(key, value);
        }
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_meta() {
        let candidate = parse_line("v1.2.0 digest=sha256:abc channel=stable").unwrap();
        assert_eq!(candidate.version, "v1.2.0");
        assert_eq!(candidate.meta["digest"], serde_yaml::Value::from("sha256:abc"));
        assert_eq!(candidate.meta.len(), 2);
        assert!(parse_line("   ").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_reads_stdout() {
        let mut source = CommandSource::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo v1.0.0; echo; echo \"v1.1.0 for=$STAGEHAND_DEPENDENCY\"".to_string(),
        ]);
        let candidates = source.fetch("app").unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].meta["for"], serde_yaml::Value::from("app"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_failure() {
        let mut source =
            CommandSource::new(vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()]);
        assert!(source.fetch("app").is_err());
    }
}
