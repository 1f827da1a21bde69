//! Line-based terminal front end with colored output

use crate::command::ActionResult;
use crate::core::types::UtteranceId;
use crate::ui::state::{LogCategory, StatusBoard};
use crate::ui::FrontEnd;
use crossterm::style::{Color, Stylize};
use std::io::{self, BufRead, Stdout, StdinLock, Write};

const PROMPT: &str = "amp> ";

pub struct TerminalFrontEnd<R, W> {
    input: R,
    output: W,
    board: StatusBoard,
    color: bool,
    /// Text of the command awaiting its result
    pending: String,
}

impl TerminalFrontEnd<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout(), true)
    }
}

impl<R: BufRead, W: Write> TerminalFrontEnd<R, W> {
    pub fn new(input: R, output: W, color: bool) -> Self {
        Self {
            input,
            output,
            board: StatusBoard::new(),
            color,
            pending: String::new(),
        }
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    /// Show `message` and read one reply line
    pub fn ask(&mut self, message: &str) -> io::Result<String> {
        self.announce(message)?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> FrontEnd for TerminalFrontEnd<R, W> {
    fn read_utterance(&mut self) -> io::Result<Option<String>> {
        let prompt = self.paint(PROMPT, Color::Cyan);
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let text = line.trim().to_string();
        self.pending = text.clone();
        Ok(Some(text))
    }

    fn issue(&mut self, id: UtteranceId) {
        self.board.issue(id);
    }

    fn render(&mut self, result: &ActionResult) -> io::Result<()> {
        let utterance = std::mem::take(&mut self.pending);
        if !self.board.accept(&utterance, result.clone()) {
            return Ok(());
        }
        let (marker, color) = match LogCategory::of(result) {
            LogCategory::Success => ("ok", Color::Green),
            LogCategory::Warning => ("ok", Color::Yellow),
            LogCategory::Failure => ("error", Color::Red),
        };
        let marker = self.paint(marker, color);
        writeln!(self.output, "{} {}", marker, result.message)?;
        if let Some(warning) = &result.warning {
            let line = self.paint(&format!("   warning: {}", warning), Color::Yellow);
            writeln!(self.output, "{}", line)?;
        }
        self.output.flush()
    }

    fn announce(&mut self, message: &str) -> io::Result<()> {
        let text = self.paint(message, Color::DarkGrey);
        writeln!(self.output, "{}", text)?;
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AmpError;
    use std::io::Cursor;

    fn plain(input: &str) -> TerminalFrontEnd<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalFrontEnd::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), false)
    }

    #[test]
    fn test_reads_lines_until_eof() {
        let mut ui = plain("play jazz\n  pause  \n");
        assert_eq!(ui.read_utterance().unwrap().as_deref(), Some("play jazz"));
        assert_eq!(ui.read_utterance().unwrap().as_deref(), Some("pause"));
        assert_eq!(ui.read_utterance().unwrap(), None);
    }

    #[test]
    fn test_renders_latest_result_only() {
        let mut ui = plain("");
        let stale = UtteranceId::new();
        let latest = UtteranceId::new();
        ui.issue(stale);
        ui.issue(latest);

        ui.render(&ActionResult::success(stale, "Playing old")).unwrap();
        let mut result = ActionResult::success(latest, "Volume set to 100%");
        result.warning = Some("clamped".into());
        ui.render(&result).unwrap();

        let out = String::from_utf8(ui.into_output()).unwrap();
        assert!(!out.contains("Playing old"));
        assert!(out.contains("ok Volume set to 100%"));
        assert!(out.contains("warning: clamped"));
    }

    #[test]
    fn test_renders_failures() {
        let mut ui = plain("");
        let id = UtteranceId::new();
        ui.issue(id);
        ui.render(&ActionResult::from_error(id, &AmpError::Validation("Nothing is playing".into())))
            .unwrap();
        let out = String::from_utf8(ui.into_output()).unwrap();
        assert_eq!(out, "error Nothing is playing\n");
    }

    #[test]
    fn test_ask_reads_reply() {
        let mut ui = plain("http://localhost/callback?code=x\n");
        let reply = ui.ask("Paste the URL:").unwrap();
        assert_eq!(reply, "http://localhost/callback?code=x");
    }
}
