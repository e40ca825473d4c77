use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use std::io;
use std::time::{Duration, Instant};

use crate::StatusCode;
use crate::git::{GitChangeSource, GitError};
use crate::highlight::DiffHighlighter;
use crate::picker::{BulkAction, ListEntry, Picker, RebuildOutcome};

const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);
const FINGERPRINT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Terminal host around the picker core.
///
/// Owns the preview cache and the external-change polling; the picker owns
/// the list and the focus.
pub struct App {
    picker: Picker<GitChangeSource>,
    highlighter: DiffHighlighter,
    should_quit: bool,
    show_help: bool,
    confirm_discard: bool,
    status_message: Option<(String, Instant)>,
    exit_message: Option<String>,
    last_fingerprint: String,
    last_fingerprint_poll: Instant,
    preview_for: Option<(String, bool)>,
    preview: Vec<Line<'static>>,
    preview_scroll: u16,
}

impl App {
    pub fn new(picker: Picker<GitChangeSource>) -> Self {
        let last_fingerprint = picker.source().fingerprint().unwrap_or_default();
        Self {
            picker,
            highlighter: DiffHighlighter::new(),
            should_quit: false,
            show_help: false,
            confirm_discard: false,
            status_message: None,
            exit_message: None,
            last_fingerprint,
            last_fingerprint_poll: Instant::now(),
            preview_for: None,
            preview: Vec::new(),
            preview_scroll: 0,
        }
    }

    fn handle_input(&mut self, key: event::KeyEvent) {
        if self.confirm_discard {
            self.confirm_discard = false;
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                let result = self.picker.discard_focused();
                self.apply_outcome(result);
            }
            return;
        }

        if self.show_help {
            self.show_help = false;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.picker.close();
                self.should_quit = true;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.picker.focus_next();
                self.preview_scroll = 0;
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.picker.focus_prev();
                self.preview_scroll = 0;
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                let result = self.picker.toggle_focused();
                self.apply_outcome(result);
            }
            KeyCode::Char('d') => {
                if self.picker.focused_file().is_some() {
                    self.confirm_discard = true;
                }
            }
            KeyCode::Char('a') => {
                let result = self.picker.stage_all();
                self.apply_outcome(result);
            }
            KeyCode::Char('u') => {
                let result = self.picker.unstage_all();
                self.apply_outcome(result);
            }
            KeyCode::Char('r') => {
                let result = self.picker.refresh();
                self.apply_outcome(result);
            }
            KeyCode::PageDown => {
                self.preview_scroll = self.preview_scroll.saturating_add(10);
            }
            KeyCode::PageUp => {
                self.preview_scroll = self.preview_scroll.saturating_sub(10);
            }
            _ => {}
        }
    }

    /// Fold a picker operation result into app state.
    ///
    /// Failures become a transient status message with the previous list
    /// still visible; a drained change set ends the session.
    fn apply_outcome(&mut self, result: std::result::Result<RebuildOutcome, GitError>) {
        match result {
            Ok(RebuildOutcome::Closed) => {
                self.exit_message = Some("No more changes".to_string());
                self.should_quit = true;
            }
            Ok(_) => {
                self.preview_for = None;
                // the rebuild already reflects our own mutation; resync the
                // fingerprint so it does not re-trigger a rebuild
                if let Ok(fp) = self.picker.source().fingerprint() {
                    self.last_fingerprint = fp;
                }
            }
            Err(err) => {
                self.status_message = Some((err.to_string(), Instant::now()));
            }
        }
    }

    /// Poll the repository fingerprint and run any due debounced rebuild.
    fn poll_external(&mut self, now: Instant) {
        if now.duration_since(self.last_fingerprint_poll) >= FINGERPRINT_POLL_INTERVAL {
            self.last_fingerprint_poll = now;
            if let Ok(fp) = self.picker.source().fingerprint()
                && fp != self.last_fingerprint
            {
                self.last_fingerprint = fp;
                self.picker.notify_changed(now);
            }
        }

        let result = self.picker.tick(now);
        if !matches!(result, Ok(RebuildOutcome::Idle)) {
            self.apply_outcome(result);
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let expired = self
            .status_message
            .as_ref()
            .map(|(_, time)| time.elapsed() >= STATUS_MESSAGE_TTL)
            .unwrap_or(false);
        if expired {
            self.status_message = None;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .split(frame.area());

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[0]);

        self.render_list(frame, panes[0]);
        self.ensure_preview();
        self.render_preview(frame, panes[1]);
        self.render_status_bar(frame, chunks[1]);

        if self.show_help {
            self.render_help(frame);
        }
        if self.confirm_discard {
            self.render_confirm(frame);
        }
    }

    fn render_list(&self, frame: &mut Frame, area: Rect) {
        let focused = self.picker.focused();
        let items: Vec<ListItem> = self
            .picker
            .entries()
            .iter()
            .enumerate()
            .map(|(idx, entry)| match entry {
                ListEntry::Separator { group, count } => ListItem::new(Line::from(Span::styled(
                    format!("── {} ({}) ──", group.label(), count),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))),
                ListEntry::Action(action) => {
                    let hint = match action {
                        BulkAction::StageAll => "  (a) Stage All",
                        BulkAction::UnstageAll => "  (u) Unstage All",
                    };
                    ListItem::new(Line::from(Span::styled(
                        hint,
                        Style::default().fg(Color::DarkGray),
                    )))
                }
                ListEntry::File(change) => {
                    let color = match change.status {
                        StatusCode::Added | StatusCode::Untracked => Color::Green,
                        StatusCode::Deleted => Color::Red,
                        StatusCode::Conflicted => Color::Magenta,
                        _ => Color::Yellow,
                    };
                    let mut style = Style::default().fg(color);
                    let mut marker = ' ';
                    if Some(idx) == focused {
                        style = style.add_modifier(Modifier::BOLD);
                        marker = '>';
                    }
                    ListItem::new(Line::from(vec![
                        Span::styled(format!("{} {} ", marker, change.status.symbol()), style),
                        Span::styled(change.file_name().to_string(), style),
                        Span::styled(
                            format!("  {}", change.dir_prefix()),
                            Style::default().fg(Color::DarkGray),
                        ),
                    ]))
                }
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Changes (Space: toggle, d: discard)"),
        );

        frame.render_widget(list, area);
    }

    /// Recompute the preview when the focused entry changed.
    ///
    /// Keyed by `(path, staged)` so staged and unstaged halves of a
    /// partially staged file preview their own diffs. `apply_outcome`
    /// invalidates the key on every rebuild.
    fn ensure_preview(&mut self) {
        let Some(change) = self.picker.focused_file().cloned() else {
            self.preview_for = None;
            self.preview.clear();
            return;
        };

        let key = (change.path.clone(), change.staged);
        if self.preview_for.as_ref() == Some(&key) {
            return;
        }

        self.preview = match self.picker.source().diff(&change) {
            Ok(diff) if diff.is_empty() => {
                vec![Line::from(Span::styled(
                    "(no diff content)",
                    Style::default().fg(Color::DarkGray),
                ))]
            }
            Ok(diff) => self.highlighter.render(&change.path, &diff),
            Err(err) => vec![Line::from(Span::styled(
                err.to_string(),
                Style::default().fg(Color::Red),
            ))],
        };
        self.preview_for = Some(key);
        self.preview_scroll = 0;
    }

    fn render_preview(&self, frame: &mut Frame, area: Rect) {
        let title = match self.picker.focused_file() {
            Some(change) if change.staged => format!("Diff (staged) — {}", change.path),
            Some(change) => format!("Diff — {}", change.path),
            None => "Diff".to_string(),
        };

        let paragraph = Paragraph::new(Text::from(self.preview.clone()))
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .scroll((self.preview_scroll, 0));

        frame.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let status_text = match &self.status_message {
            Some((msg, _)) => msg.clone(),
            None => format!(
                "{} staged, {} unstaged | j/k: move  Space: toggle  a/u: all  d: discard  r: refresh  ?: help  q: quit",
                self.picker.staged_count(),
                self.picker.unstaged_count()
            ),
        };

        let paragraph = Paragraph::new(status_text)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });

        frame.render_widget(paragraph, area);
    }

    fn render_help(&self, frame: &mut Frame) {
        let help_text = vec![
            "git-stage-picker — Keyboard Shortcuts",
            "",
            "Navigation:",
            "  j / Down      - Next file",
            "  k / Up        - Previous file",
            "  PgDn / PgUp   - Scroll diff preview",
            "",
            "Actions:",
            "  Space / Enter - Stage or unstage the focused file",
            "  a             - Stage all changes",
            "  u             - Unstage all changes",
            "  d             - Discard the focused file (asks first)",
            "  r             - Refresh the list",
            "",
            "Other:",
            "  ?             - Show this help",
            "  q / Esc       - Quit",
            "",
            "Press any key to close this help",
        ];

        let text = Text::from(help_text.iter().map(|&s| Line::from(s)).collect::<Vec<_>>());
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false });

        let area = centered_rect(60, 70, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }

    fn render_confirm(&self, frame: &mut Frame) {
        let Some(change) = self.picker.focused_file() else {
            return;
        };
        let verb = if change.status == StatusCode::Untracked {
            "Delete untracked file"
        } else {
            "Discard changes to"
        };
        let message = format!("{} {}?\n\nThis cannot be undone.\n\n(y)es / (n)o", verb, change.path);

        let paragraph = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL).title("Confirm"))
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::Yellow));

        let area = centered_rect(50, 30, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Setup the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Failed to create terminal")
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Run the interactive picker until dismissal or a drained change set.
///
/// Returns an informational message for the caller to print after the
/// terminal has been restored.
pub fn run_tui(picker: Picker<GitChangeSource>) -> Result<Option<String>> {
    let mut app = App::new(picker);

    // Restore the terminal even if rendering panics
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;

    let result = (|| -> Result<()> {
        loop {
            terminal
                .draw(|f| app.render(f))
                .context("Failed to draw frame")?;

            if app.should_quit {
                break;
            }

            if event::poll(Duration::from_millis(200)).context("Failed to poll events")?
                && let Event::Key(key) = event::read().context("Failed to read event")?
            {
                // Ignore key release events
                if key.kind == event::KeyEventKind::Press {
                    app.handle_input(key);
                }
            }

            app.poll_external(Instant::now());
        }
        Ok(())
    })();

    restore_terminal(&mut terminal)?;
    result.map(|_| app.exit_message)
}
