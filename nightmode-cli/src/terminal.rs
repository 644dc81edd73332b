// ============================================================================
// nightmode-cli/src/terminal.rs
// ============================================================================
//
// TERMINAL INTERACTION: styled output, prompts and the replace countdown
//
// KEY COMPONENTS:
// - styling: symbols and spacing shared by all output
// - print_* helpers: section headers and status lines
// - TermPrompter: the operator side of the planning questions
// - CountdownGate: last chance to stop before a source file is replaced
//
// Questions are written to stdout and answers read from stdin line by line.
// Once the first countdown starts, stdin belongs to a reader thread that
// forwards lines over a channel so the countdown can time out.

use console::{Term, style};
use nightmode_core::{CoreError, CoreResult, GateDecision, ProbedStream, Prompter, ReplaceGate};
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Styling constants for terminal output
pub mod styling {
    pub const SUCCESS_SYMBOL: &str = "✓";
    pub const ERROR_SYMBOL: &str = "✗";
    pub const SECTION_PREFIX: &str = "===== ";
    pub const SECTION_SUFFIX: &str = " =====";
    pub const STATUS_INDENT: &str = "  ";
    pub const STATUS_LABEL_WIDTH: usize = 16;
}

/// Print a section header for major workflow phases
pub fn print_section(title: &str) {
    log::info!(
        "{}{}{}",
        styling::SECTION_PREFIX,
        style(title.to_uppercase()).cyan().bold(),
        styling::SECTION_SUFFIX
    );
}

/// Print a status line (key-value pair)
pub fn print_status(label: &str, value: &str) {
    log::info!("{}{}", styling::STATUS_INDENT, format_status(label, value));
}

/// Print a success message
pub fn print_success(message: &str) {
    log::info!(
        "{}{} {}",
        styling::STATUS_INDENT,
        styling::SUCCESS_SYMBOL,
        message
    );
}

fn format_status(label: &str, value: &str) -> String {
    format!(
        "{:<width$} {}",
        format!("{label}:"),
        value,
        width = styling::STATUS_LABEL_WIDTH
    )
}

/// Reads one line from stdin. End of input is an error: every question
/// needs an answer.
fn read_answer() -> CoreResult<String> {
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err(CoreError::OperationFailed(
            "standard input closed while waiting for an answer".to_string(),
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ============================================================================
// PROMPTER
// ============================================================================

/// Asks planning questions on the terminal.
pub struct TermPrompter {
    term: Term,
}

impl TermPrompter {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for TermPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TermPrompter {
    fn show(&mut self, line: &str) -> CoreResult<()> {
        self.term.write_line(line)?;
        Ok(())
    }

    fn ask(&mut self, question: &str) -> CoreResult<String> {
        self.term.write_str(&style(question).bold().to_string())?;
        self.term.flush()?;
        read_answer()
    }
}

// ============================================================================
// REPLACE GATE
// ============================================================================

/// What the operator typed during the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountdownInput {
    Proceed,
    Abort,
    Unknown,
}

fn classify_input(line: &str) -> CountdownInput {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => CountdownInput::Proceed,
        "a" | "abort" => CountdownInput::Abort,
        _ => CountdownInput::Unknown,
    }
}

/// Shows the verified output and waits out the replace delay. Enter proceeds
/// at once, `abort` stops the run, silence proceeds when the delay expires.
pub struct CountdownGate {
    term: Term,
    lines: Option<Receiver<String>>,
}

impl CountdownGate {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            lines: None,
        }
    }

    fn lines(&mut self) -> &Receiver<String> {
        self.lines.get_or_insert_with(|| {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let stdin = io::stdin();
                loop {
                    let mut line = String::new();
                    match stdin.lock().read_line(&mut line) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
            rx
        })
    }
}

impl Default for CountdownGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplaceGate for CountdownGate {
    fn confirm(
        &mut self,
        output: &Path,
        streams: &[ProbedStream],
        delay: Duration,
    ) -> CoreResult<GateDecision> {
        self.term.write_line("")?;
        self.term
            .write_line(&format!("Streams of {}:", style(output.display()).bold()))?;
        for stream in streams {
            self.term.write_line(&format!("{}{}", styling::STATUS_INDENT, stream))?;
        }
        if delay.is_zero() {
            return Ok(GateDecision::Proceed);
        }
        self.term.write_line(&format!(
            "Replacing the source in {}s. Press Enter to continue now or type 'abort' to stop.",
            delay.as_secs()
        ))?;

        let deadline = Instant::now() + delay;
        let term = self.term.clone();
        let lines = self.lines();
        // Answers typed before the countdown started must not count.
        while lines.try_recv().is_ok() {}

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(GateDecision::Proceed);
            }
            match lines.recv_timeout(remaining) {
                Ok(line) => match classify_input(&line) {
                    CountdownInput::Proceed => return Ok(GateDecision::Proceed),
                    CountdownInput::Abort => {
                        term.write_line(&format!(
                            "{} {}",
                            styling::ERROR_SYMBOL,
                            style("Aborted").red().bold()
                        ))?;
                        return Ok(GateDecision::Abort);
                    }
                    CountdownInput::Unknown => {
                        term.write_line("Press Enter to continue or type 'abort' to stop.")?;
                    }
                },
                Err(RecvTimeoutError::Timeout) => return Ok(GateDecision::Proceed),
                Err(RecvTimeoutError::Disconnected) => {
                    // No terminal input: the delay still applies.
                    thread::sleep(remaining);
                    return Ok(GateDecision::Proceed);
                }
            }
        }
    }
}
