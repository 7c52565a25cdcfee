//! Line-oriented account of a running task
//!
//! Every task writes what it is doing to a [`TaskReport`]. The CLI echoes each
//! line to stdout as it happens; tests and `--json` output read the recorded
//! lines and notes afterwards.

/// Recorded output of one task
#[derive(Debug, Default)]
pub struct TaskReport {
  echo: bool,
  lines: Vec<String>,
  notes: Vec<String>,
}

impl TaskReport {
  /// A report that only records
  pub fn new() -> Self {
    Self::default()
  }

  /// A report that also prints every line to stdout
  pub fn echoing() -> Self {
    Self {
      echo: true,
      ..Self::default()
    }
  }

  /// Record a progress line
  pub fn line(&mut self, line: impl Into<String>) {
    let line = line.into();
    if self.echo {
      println!("{}", line);
    }
    self.lines.push(line);
  }

  pub fn blank(&mut self) {
    self.line(String::new());
  }

  /// Record an informational notice: something the user should know that did
  /// not stop the task
  pub fn note(&mut self, note: impl Into<String>) {
    let note = note.into();
    tracing::info!(notice = %note);
    self.notes.push(note.clone());
    self.line(note);
  }

  pub fn lines(&self) -> &[String] {
    &self.lines
  }

  pub fn notes(&self) -> &[String] {
    &self.notes
  }

  /// Whether any recorded line contains `needle`
  pub fn contains(&self, needle: &str) -> bool {
    self.lines.iter().any(|l| l.contains(needle))
  }
}
