use anyhow::Result;
use chatdesk::app::{ChatContext, Rejection, ResponseObserver, SubmitOutcome};
use chatdesk::config::Config;
use chatdesk::logging::init_tracing;
use chatdesk::state::{ToolInvocation, ToolStatus, TranscriptEntry, TRANSPORT_ERROR_BANNER};
use chatdesk::types::{Attachment, SessionDetail};
use chatdesk::util::truncate_to_display_width;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use serde_json::Value;
use std::io::{self, IsTerminal, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

const TOOL_NAME_WIDTH: usize = 24;
const TOOL_DETAIL_WIDTH: usize = 72;
const WAITING_CAPTION: &str = "* Waiting for response...";
const HELP_TEXT: &str = "\
/new                  start a new session
/open <session-id>    continue an existing session and show its history
/sessions             list sessions
/attach <hash> [name] attach an uploaded document to the next message
/help                 show this help
/quit                 exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStyle {
    Normal,
    Status,
    Thinking,
    Tool,
    Error,
}

#[derive(Debug, PartialEq, Eq)]
enum LocalCommand {
    New,
    Open(String),
    Sessions,
    Attach(Attachment),
    Help,
    Quit,
    Usage(&'static str),
}

fn parse_local_command(line: &str) -> Option<LocalCommand> {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let command = match command {
        "/new" => LocalCommand::New,
        "/sessions" => LocalCommand::Sessions,
        "/help" => LocalCommand::Help,
        "/quit" | "/exit" => LocalCommand::Quit,
        "/open" => match parts.next() {
            Some(id) => LocalCommand::Open(id.to_string()),
            None => LocalCommand::Usage("/open <session-id>"),
        },
        "/attach" => match parts.next() {
            Some(hash) => {
                let name = parts.collect::<Vec<_>>().join(" ");
                LocalCommand::Attach(Attachment {
                    hash: hash.to_string(),
                    name: if name.is_empty() {
                        hash.to_string()
                    } else {
                        name
                    },
                })
            }
            None => LocalCommand::Usage("/attach <hash> [name]"),
        },
        _ => LocalCommand::Usage("unknown command, try /help"),
    };
    Some(command)
}

fn value_preview(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Line-mode renderer for one response at a time.
struct TerminalPrinter<W: Write + Send> {
    out: W,
    colors_enabled: bool,
    show_thoughts: bool,
    active_style: LineStyle,
    line_open: bool,
    in_thought: bool,
    answer_started: bool,
    waiting: bool,
}

impl TerminalPrinter<io::Stdout> {
    fn stdout(show_thoughts: bool) -> Self {
        Self::new(io::stdout(), colors_enabled(), show_thoughts)
    }
}

impl<W: Write + Send> TerminalPrinter<W> {
    fn new(out: W, colors_enabled: bool, show_thoughts: bool) -> Self {
        Self {
            out,
            colors_enabled,
            show_thoughts,
            active_style: LineStyle::Normal,
            line_open: false,
            in_thought: false,
            answer_started: false,
            waiting: false,
        }
    }

    fn set_style(&mut self, style: LineStyle) -> io::Result<()> {
        if !self.colors_enabled || self.active_style == style {
            self.active_style = style;
            return Ok(());
        }
        queue!(self.out, ResetColor, SetAttribute(Attribute::Reset))?;
        match style {
            LineStyle::Normal => {}
            LineStyle::Status => queue!(self.out, SetAttribute(Attribute::Dim))?,
            LineStyle::Thinking => queue!(
                self.out,
                SetAttribute(Attribute::Italic),
                SetForegroundColor(Color::DarkGrey)
            )?,
            LineStyle::Tool => queue!(self.out, SetForegroundColor(Color::Yellow))?,
            LineStyle::Error => queue!(self.out, SetForegroundColor(Color::Red))?,
        }
        self.active_style = style;
        Ok(())
    }

    fn ensure_newline(&mut self) -> io::Result<()> {
        if self.line_open {
            self.set_style(LineStyle::Normal)?;
            queue!(self.out, Print("\n"))?;
            self.line_open = false;
        }
        Ok(())
    }

    fn print_line(&mut self, style: LineStyle, text: &str) -> io::Result<()> {
        self.ensure_newline()?;
        self.in_thought = false;
        self.set_style(style)?;
        queue!(self.out, Print(text))?;
        self.set_style(LineStyle::Normal)?;
        queue!(self.out, Print("\n"))?;
        self.out.flush()
    }

    fn print_inline(&mut self, style: LineStyle, text: &str) -> io::Result<()> {
        self.set_style(style)?;
        queue!(self.out, Print(text))?;
        self.line_open = !text.ends_with('\n');
        self.out.flush()
    }

    fn show_waiting(&mut self) -> io::Result<()> {
        self.ensure_newline()?;
        self.waiting = true;
        self.print_inline(LineStyle::Status, WAITING_CAPTION)
    }

    /// Erases the waiting caption on a terminal; in plain output it stays as its own line.
    fn clear_waiting(&mut self) -> io::Result<()> {
        if !self.waiting {
            return Ok(());
        }
        self.waiting = false;
        if self.colors_enabled {
            self.set_style(LineStyle::Normal)?;
            queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            self.line_open = false;
        } else {
            self.ensure_newline()?;
        }
        self.out.flush()
    }

    fn print_thought(&mut self, delta: &str) -> io::Result<()> {
        if !self.show_thoughts {
            return Ok(());
        }
        if !self.in_thought {
            self.print_line(LineStyle::Thinking, "* Thinking")?;
            self.in_thought = true;
        }
        self.print_inline(LineStyle::Thinking, delta)
    }

    fn print_tool(&mut self, tool: &ToolInvocation) -> io::Result<()> {
        let name = truncate_to_display_width(&tool.name, TOOL_NAME_WIDTH);
        let line = match tool.status {
            ToolStatus::Running => {
                let input = truncate_to_display_width(&value_preview(&tool.input), TOOL_DETAIL_WIDTH);
                format!("  ⋯ {name} running {input}")
            }
            ToolStatus::Completed => {
                let output = tool.output.as_ref().map(value_preview).unwrap_or_default();
                let output = truncate_to_display_width(&output, TOOL_DETAIL_WIDTH);
                format!("  ✓ {name} done {output}")
            }
        };
        self.print_line(LineStyle::Tool, line.trim_end())
    }

    fn print_answer(&mut self, delta: &str) -> io::Result<()> {
        if !self.answer_started {
            self.ensure_newline()?;
            self.in_thought = false;
            self.answer_started = true;
        }
        self.print_inline(LineStyle::Normal, delta)
    }

    fn finish_turn(&mut self, entry: &TranscriptEntry) -> io::Result<()> {
        self.clear_waiting()?;
        self.ensure_newline()?;
        if entry.transport_error.is_some() {
            self.print_line(LineStyle::Error, TRANSPORT_ERROR_BANNER)?;
        }
        self.in_thought = false;
        self.answer_started = false;
        self.set_style(LineStyle::Normal)?;
        self.out.flush()
    }

    fn print_history(&mut self, detail: &SessionDetail) -> io::Result<()> {
        let title = detail
            .title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or("New chat");
        self.notice(&format!("* session {}  {title}", detail.id))?;
        if detail.history.is_empty() {
            return self.notice("* no earlier messages");
        }
        for message in &detail.history {
            let label = if message.role == "user" { "you" } else { "assistant" };
            self.print_line(LineStyle::Status, &format!("[{label}]"))?;
            self.print_line(LineStyle::Normal, message.content.trim_end())?;
        }
        Ok(())
    }

    fn notice(&mut self, text: &str) -> io::Result<()> {
        self.print_line(LineStyle::Status, text)
    }

    fn prompt(&mut self) -> io::Result<()> {
        self.ensure_newline()?;
        self.set_style(LineStyle::Normal)?;
        queue!(self.out, Print("> "))?;
        self.out.flush()
    }
}

impl<W: Write + Send> ResponseObserver for TerminalPrinter<W> {
    fn on_waiting(&mut self) {
        let _ = self.show_waiting();
    }

    fn on_first_output(&mut self) {
        let _ = self.clear_waiting();
    }

    fn on_status(&mut self, caption: &str) {
        let _ = self.print_line(LineStyle::Status, &format!("* {caption}"));
    }

    fn on_thought(&mut self, delta: &str, _thought: &str) {
        let _ = self.print_thought(delta);
    }

    fn on_tool_update(&mut self, tool: &ToolInvocation) {
        let _ = self.print_tool(tool);
    }

    fn on_answer_chunk(&mut self, delta: &str, _answer_html: &str) {
        let _ = self.print_answer(delta);
    }

    fn on_error(&mut self, message: &str) {
        let _ = self.print_line(LineStyle::Error, &format!("* Error: {message}"));
    }

    fn on_done(&mut self, entry: &TranscriptEntry) {
        let _ = self.finish_turn(entry);
    }
}

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal()
}

/// Returns `false` when the REPL should exit.
async fn run_local_command<W: Write + Send>(
    command: LocalCommand,
    ctx: &mut ChatContext,
    pending: &mut Vec<Attachment>,
    printer: &mut TerminalPrinter<W>,
) -> Result<bool> {
    match command {
        LocalCommand::New => {
            if ctx.new_session() {
                pending.clear();
                printer.notice(&format!("* new session {}", ctx.session_id()))?;
            }
        }
        LocalCommand::Open(id) => match ctx.open_session(id).await {
            Ok(Some(detail)) => printer.print_history(&detail)?,
            Ok(None) => printer.notice(&format!(
                "* session {} (history unavailable)",
                ctx.session_id()
            ))?,
            Err(_) => printer.notice("* a response is still streaming")?,
        },
        LocalCommand::Sessions => {
            if !ctx.refresh_sessions().await {
                printer.notice("* session list unavailable, showing cached entries")?;
            }
            let sessions = ctx.sessions();
            if sessions.is_empty() {
                printer.notice("* no sessions")?;
            }
            for session in sessions {
                let marker = if session.id == ctx.session_id() { "*" } else { " " };
                printer.notice(&format!(
                    "{marker} {}  {}",
                    session.id,
                    session.display_title()
                ))?;
            }
        }
        LocalCommand::Attach(attachment) => {
            printer.notice(&format!("* attached {}", attachment.name))?;
            pending.push(attachment);
        }
        LocalCommand::Help => printer.notice(HELP_TEXT)?,
        LocalCommand::Quit => return Ok(false),
        LocalCommand::Usage(usage) => printer.notice(&format!("* usage: {usage}"))?,
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    init_tracing(config.log_path.as_deref())?;

    let mut ctx = ChatContext::from_config(&config)?;
    let mut printer = TerminalPrinter::stdout(ctx.settings().auto_expand_thoughts);
    let mut pending: Vec<Attachment> = Vec::new();
    ctx.refresh_sessions().await;
    printer.notice(&format!(
        "* chatdesk session {} (/help for commands)",
        ctx.session_id()
    ))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        printer.prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        if let Some(command) = parse_local_command(&line) {
            if !run_local_command(command, &mut ctx, &mut pending, &mut printer).await? {
                break;
            }
            continue;
        }

        match ctx.submit(&line, &pending, &mut printer).await {
            SubmitOutcome::Completed(_) => pending.clear(),
            SubmitOutcome::Rejected(Rejection::EmptyInput) => {}
            SubmitOutcome::Rejected(Rejection::Busy) => {
                printer.notice("* a response is still streaming")?;
            }
        }
    }

    printer.ensure_newline()?;
    Ok(())
}
