//! Encoder command templates
//!
//! Templates carry two placeholders, `{{ListPath}}` and `{{OutputPath}}`
//! (a leading dot, `{{.ListPath}}`, is accepted as well). In argv mode the
//! template is split into words before substitution, so substituted paths
//! always stay within the word they appear in. Shell mode renders one string
//! for `sh -c`; any interpolated value is then interpreted by the shell.

use common::cameras::CommandMode;
use std::fmt;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AssembleError, TemplateError};

/// Interpreter for shell-mode templates.
pub const SHELL: &str = "sh";

const LIST_PATH: &str = "ListPath";
const OUTPUT_PATH: &str = "OutputPath";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
  /// Literal text and its byte offset in the template.
  Text { text: String, offset: usize },
  Var(String),
}

/// A parsed encoder template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
  segments: Vec<Segment>,
}

struct Values<'a> {
  list_path: &'a str,
  output_path: &'a str,
}

impl Values<'_> {
  fn lookup(&self, variable: &str) -> Result<&str, TemplateError> {
    match variable {
      LIST_PATH => Ok(self.list_path),
      OUTPUT_PATH => Ok(self.output_path),
      _ => Err(TemplateError::Exec {
        variable: variable.to_string(),
      }),
    }
  }
}

impl CommandTemplate {
  pub fn parse(template: &str) -> Result<Self, TemplateError> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    while let Some(found) = template[cursor..].find("{{") {
      let open = cursor + found;
      if open > cursor {
        segments.push(Segment::Text {
          text: template[cursor..open].to_string(),
          offset: cursor,
        });
      }

      let body_start = open + 2;
      let close = template[body_start..]
        .find("}}")
        .map(|i| body_start + i)
        .ok_or_else(|| TemplateError::Parse {
          position: open,
          reason: "unclosed action".to_string(),
        })?;

      let body = template[body_start..close].trim();
      let name = body.strip_prefix('.').unwrap_or(body);
      if name.is_empty() {
        return Err(TemplateError::Parse {
          position: open,
          reason: "missing value for action".to_string(),
        });
      }
      if let Some(bad) = name.chars().find(|c| !(c.is_alphanumeric() || *c == '_')) {
        return Err(TemplateError::Parse {
          position: open,
          reason: format!("unexpected {:?} in action", bad),
        });
      }

      segments.push(Segment::Var(name.to_string()));
      cursor = close + 2;
    }

    if cursor < template.len() {
      segments.push(Segment::Text {
        text: template[cursor..].to_string(),
        offset: cursor,
      });
    }

    Ok(Self { segments })
  }

  /// Substitute both placeholders and return the command line as one string.
  pub fn render(&self, list_path: &str, output_path: &str) -> Result<String, TemplateError> {
    let values = Values {
      list_path,
      output_path,
    };

    let mut rendered = String::new();
    for segment in &self.segments {
      match segment {
        Segment::Text { text, .. } => rendered.push_str(text),
        Segment::Var(name) => rendered.push_str(values.lookup(name)?),
      }
    }
    Ok(rendered)
  }

  /// Split the template into words, honouring single quotes, double quotes
  /// and backslash escapes in the literal text, then substitute placeholders
  /// inside each word. Substituted values are never split or unquoted.
  pub fn render_words(
    &self,
    list_path: &str,
    output_path: &str,
  ) -> Result<Vec<String>, TemplateError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Quote {
      None,
      Single,
      Double,
    }

    let values = Values {
      list_path,
      output_path,
    };

    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut quote_start = 0;

    for segment in &self.segments {
      let (text, offset) = match segment {
        Segment::Var(name) => {
          word.push_str(values.lookup(name)?);
          in_word = true;
          continue;
        }
        Segment::Text { text, offset } => (text, *offset),
      };

      let mut chars = text.char_indices().peekable();
      while let Some((i, c)) = chars.next() {
        match (quote, c) {
          (Quote::None, c) if c.is_whitespace() => {
            if in_word {
              words.push(std::mem::take(&mut word));
              in_word = false;
            }
          }
          (Quote::None, '\'') => {
            quote = Quote::Single;
            quote_start = offset + i;
            in_word = true;
          }
          (Quote::None, '"') => {
            quote = Quote::Double;
            quote_start = offset + i;
            in_word = true;
          }
          (Quote::None, '\\') => {
            if let Some((_, escaped)) = chars.next() {
              word.push(escaped);
            }
            in_word = true;
          }
          (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
          (Quote::Double, '\\') => match chars.peek() {
            Some((_, next @ ('"' | '\\' | '$' | '`'))) => {
              word.push(*next);
              chars.next();
            }
            _ => word.push('\\'),
          },
          (_, c) => {
            word.push(c);
            in_word = true;
          }
        }
      }
    }

    if quote != Quote::None {
      return Err(TemplateError::Parse {
        position: quote_start,
        reason: "unterminated quoted string".to_string(),
      });
    }
    if in_word {
      words.push(word);
    }

    Ok(words)
  }

  /// The executable named by the template, if any.
  pub fn program(&self) -> Result<Option<String>, TemplateError> {
    Ok(self.render_words("", "")?.into_iter().next())
  }
}

/// Render `template` with the two run paths into a single command line.
pub fn render(template: &str, list_path: &str, output_path: &str) -> Result<String, TemplateError> {
  CommandTemplate::parse(template)?.render(list_path, output_path)
}

/// A ready-to-run encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderCommand {
  Argv { program: String, args: Vec<String> },
  Shell { line: String },
}

impl EncoderCommand {
  pub fn program(&self) -> &str {
    match self {
      EncoderCommand::Argv { program, .. } => program,
      EncoderCommand::Shell { .. } => SHELL,
    }
  }

  /// Run to completion and return combined stdout and stderr.
  ///
  /// A non-zero exit is an `EncoderExecution` error carrying that output.
  pub async fn run(&self) -> Result<String, AssembleError> {
    let mut command = match self {
      EncoderCommand::Argv { program, args } => {
        let mut command = Command::new(program);
        command.args(args);
        command
      }
      EncoderCommand::Shell { line } => {
        let mut command = Command::new(SHELL);
        command.arg("-c").arg(line);
        command
      }
    };

    debug!(command = %self, "starting encoder");

    let output = command
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|source| AssembleError::EncoderSpawn {
        program: self.program().to_string(),
        source,
      })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
      return Err(AssembleError::EncoderExecution {
        status: output.status.to_string(),
        output: combined.trim_end().to_string(),
      });
    }

    Ok(combined)
  }
}

impl fmt::Display for EncoderCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EncoderCommand::Argv { program, args } => {
        write!(f, "{}", program)?;
        for arg in args {
          write!(f, " {}", arg)?;
        }
        Ok(())
      }
      EncoderCommand::Shell { line } => write!(f, "sh -c {:?}", line),
    }
  }
}

/// Build the encoder invocation for one run.
pub fn build_command(
  mode: CommandMode,
  template: &CommandTemplate,
  list_path: &Path,
  output_path: &Path,
) -> Result<EncoderCommand, TemplateError> {
  let list_path = list_path.to_string_lossy();
  let output_path = output_path.to_string_lossy();

  match mode {
    CommandMode::Argv => {
      let mut words = template.render_words(&list_path, &output_path)?.into_iter();
      let program = words.next().ok_or_else(|| TemplateError::Parse {
        position: 0,
        reason: "template names no program".to_string(),
      })?;
      Ok(EncoderCommand::Argv {
        program,
        args: words.collect(),
      })
    }
    CommandMode::Shell => Ok(EncoderCommand::Shell {
      line: template.render(&list_path, &output_path)?,
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn test_render_exact_substitution() {
    let rendered = render("-i {{ListPath}} -y {{OutputPath}}", "/a.txt", "/b.mp4").unwrap();
    assert_eq!(rendered, "-i /a.txt -y /b.mp4");
  }

  #[test]
  fn test_render_accepts_dotted_and_spaced_placeholders() {
    let rendered = render("-i {{.ListPath}} -y {{ .OutputPath }}", "/a.txt", "/b.mp4").unwrap();
    assert_eq!(rendered, "-i /a.txt -y /b.mp4");
  }

  #[test]
  fn test_unclosed_action_is_parse_error() {
    let err = CommandTemplate::parse("ffmpeg -i {{ListPath").unwrap_err();
    assert_eq!(
      err,
      TemplateError::Parse {
        position: 10,
        reason: "unclosed action".to_string()
      }
    );
  }

  #[test]
  fn test_empty_action_is_parse_error() {
    assert!(matches!(
      CommandTemplate::parse("ffmpeg {{ . }}"),
      Err(TemplateError::Parse { .. })
    ));
    assert!(matches!(
      CommandTemplate::parse("ffmpeg {{ List Path }}"),
      Err(TemplateError::Parse { .. })
    ));
  }

  #[test]
  fn test_unknown_variable_is_exec_error() {
    let template = CommandTemplate::parse("ffmpeg -i {{.Input}}").unwrap();
    assert_eq!(
      template.render("/a", "/b").unwrap_err(),
      TemplateError::Exec {
        variable: "Input".to_string()
      }
    );
    assert!(template.render_words("/a", "/b").is_err());
  }

  #[test]
  fn test_words_keep_substituted_paths_whole() {
    let template = CommandTemplate::parse("ffmpeg -i {{ListPath}} -y {{OutputPath}}").unwrap();
    let words = template
      .render_words("/tmp/my cams/front.txt", "/tmp/out; rm -rf x.mp4")
      .unwrap();
    assert_eq!(
      words,
      vec!["ffmpeg", "-i", "/tmp/my cams/front.txt", "-y", "/tmp/out; rm -rf x.mp4"]
    );
  }

  #[test]
  fn test_words_honour_quotes() {
    let template =
      CommandTemplate::parse(r#"enc -vf "fps=24, format=yuv420p" -t 'a b' x\ y "" --o={{OutputPath}}"#)
        .unwrap();
    let words = template.render_words("/l", "/o.mp4").unwrap();
    assert_eq!(
      words,
      vec!["enc", "-vf", "fps=24, format=yuv420p", "-t", "a b", "x y", "", "--o=/o.mp4"]
    );
  }

  #[test]
  fn test_unterminated_quote_is_parse_error() {
    let template = CommandTemplate::parse("ffmpeg -vf 'fps=24 {{OutputPath}}").unwrap();
    assert!(matches!(
      template.render_words("/l", "/o"),
      Err(TemplateError::Parse { position: 11, .. })
    ));
  }

  #[test]
  fn test_program_is_first_word() {
    let template = CommandTemplate::parse("  ffmpeg -f concat -i {{.ListPath}}").unwrap();
    assert_eq!(template.program().unwrap().as_deref(), Some("ffmpeg"));
    assert_eq!(CommandTemplate::parse("   ").unwrap().program().unwrap(), None);
  }

  #[test]
  fn test_build_argv_command() {
    let template = CommandTemplate::parse("cp {{ListPath}} {{OutputPath}}").unwrap();
    let command = build_command(
      CommandMode::Argv,
      &template,
      &PathBuf::from("/out/cam-1.txt"),
      &PathBuf::from("/out/cam-1.mp4"),
    )
    .unwrap();

    assert_eq!(
      command,
      EncoderCommand::Argv {
        program: "cp".to_string(),
        args: vec!["/out/cam-1.txt".to_string(), "/out/cam-1.mp4".to_string()],
      }
    );
    assert_eq!(command.to_string(), "cp /out/cam-1.txt /out/cam-1.mp4");
  }

  #[test]
  fn test_build_shell_command() {
    let template = CommandTemplate::parse("cat {{ListPath}} > {{OutputPath}}").unwrap();
    let command = build_command(
      CommandMode::Shell,
      &template,
      Path::new("/l.txt"),
      Path::new("/o.mp4"),
    )
    .unwrap();

    assert_eq!(
      command,
      EncoderCommand::Shell {
        line: "cat /l.txt > /o.mp4".to_string()
      }
    );
    assert_eq!(command.program(), "sh");
  }

  #[test]
  fn test_build_rejects_template_without_program() {
    let template = CommandTemplate::parse("").unwrap();
    assert!(build_command(CommandMode::Argv, &template, Path::new("/l"), Path::new("/o")).is_err());
  }

  #[tokio::test]
  async fn test_run_returns_combined_output() {
    let command = EncoderCommand::Shell {
      line: "echo out; echo err 1>&2".to_string(),
    };
    let output = command.run().await.unwrap();
    assert!(output.contains("out"));
    assert!(output.contains("err"));
  }

  #[tokio::test]
  async fn test_run_reports_failure_output() {
    let command = EncoderCommand::Shell {
      line: "echo broken input 1>&2; exit 3".to_string(),
    };
    match command.run().await.unwrap_err() {
      AssembleError::EncoderExecution { status, output } => {
        assert!(status.contains('3'));
        assert_eq!(output, "broken input");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_run_missing_program_is_spawn_error() {
    let command = EncoderCommand::Argv {
      program: "definitely-not-an-encoder-4242".to_string(),
      args: vec![],
    };
    assert!(matches!(
      command.run().await,
      Err(AssembleError::EncoderSpawn { .. })
    ));
  }
}
