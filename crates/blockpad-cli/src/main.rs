use anyhow::Result;
use blockpad_config::Config;
use blockpad_engine::{Editor, Keymap, Language, io};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::{
    env,
    io::stdout,
    path::PathBuf,
    process,
    time::{Duration, Instant},
};

struct App {
    editor: Editor,
    scratch_path: PathBuf,
    clipboard: Option<String>,
    status: String,
}

impl App {
    fn new(config: &Config) -> Result<Self> {
        let content = io::load_scratch(&config.scratch_path)?;
        let mut editor = Editor::new(&content);

        if let Some(language) = Language::from_token(&config.default_language) {
            editor.set_default_language(language);
        }
        editor.set_keymap(Keymap::from_name(&config.keymap));
        editor.set_autosave_delay(Duration::from_millis(config.autosave_delay_ms));
        editor.set_detection_delay(Duration::from_millis(config.detection_delay_ms));
        editor.set_show_line_numbers(config.show_line_numbers);
        editor.set_show_fold_gutter(config.show_fold_gutter);

        let scratch_path = config.scratch_path.clone();
        let save_path = scratch_path.clone();
        editor.set_save_fn(Some(Box::new(move |content: &str| {
            io::save_scratch(&save_path, content)?;
            Ok(())
        })));

        Ok(Self {
            editor,
            scratch_path,
            clipboard: None,
            status: String::new(),
        })
    }

    /// Returns `true` when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.status.clear();

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('q') => {
                    self.editor.flush_saves();
                    return true;
                }
                KeyCode::Char('s') => {
                    if !self.editor.is_dirty() {
                        self.status = "no changes to save".to_string();
                    } else if self.editor.flush_saves() {
                        self.status = format!("saved to {}", self.scratch_path.display());
                    } else {
                        self.status = "save failed (see log)".to_string();
                    }
                }
                KeyCode::Char('n') => {
                    let current = self.editor.current_block().id;
                    let result = self.editor.insert_block_after(current, None).map(|_| ());
                    self.report(result);
                }
                KeyCode::Char('d') => {
                    let current = self.editor.current_block().id;
                    let result = self.editor.delete_block(current);
                    self.report(result);
                }
                KeyCode::Char('l') => {
                    let block = self.editor.current_block();
                    let next = self.editor.effective_language(block).cycle();
                    match self.editor.change_current_language(Some(next), false) {
                        Ok(()) => self.status = format!("language: {next}"),
                        Err(e) => self.status = e.to_string(),
                    }
                }
                KeyCode::Char('f') => match self.editor.format_current_block() {
                    Ok(true) => self.status = "formatted".to_string(),
                    Ok(false) => self.status = "nothing to format".to_string(),
                    Err(e) => self.status = e.to_string(),
                },
                KeyCode::Char('c') => {
                    if let Some(text) = self.editor.copy() {
                        self.status = format!("copied {} bytes", text.len());
                        self.clipboard = Some(text);
                    }
                }
                KeyCode::Char('x') => match self.editor.cut() {
                    Ok(Some(text)) => {
                        self.status = format!("cut {} bytes", text.len());
                        self.clipboard = Some(text);
                    }
                    Ok(None) => {}
                    Err(e) => self.status = e.to_string(),
                },
                KeyCode::Char('v') => {
                    if let Some(text) = self.clipboard.clone() {
                        let result = self.editor.paste(&text).map(|_| ());
                        self.report(result);
                    }
                }
                KeyCode::Char('a') => {
                    let current = self.editor.current_block().id;
                    let _ = self.editor.select_block(current);
                }
                KeyCode::Down => {
                    self.editor.next_block();
                }
                KeyCode::Up => {
                    self.editor.previous_block();
                }
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::F(2) => {
                let current = self.editor.current_block().id;
                let folded = self.editor.toggle_fold(current);
                self.status = if folded { "folded" } else { "unfolded" }.to_string();
            }
            KeyCode::Char(c) => {
                let result = self.editor.insert_text(&c.to_string()).map(|_| ());
                self.report(result);
            }
            KeyCode::Enter => {
                let result = self.editor.insert_text("\n").map(|_| ());
                self.report(result);
            }
            KeyCode::Tab => {
                let result = self.editor.insert_text("    ").map(|_| ());
                self.report(result);
            }
            KeyCode::Backspace => {
                let result = self.editor.backspace().map(|_| ());
                self.report(result);
            }
            KeyCode::Left => self.move_caret(-1),
            KeyCode::Right => self.move_caret(1),
            KeyCode::Home | KeyCode::End => self.move_caret_line(key.code),
            KeyCode::Up | KeyCode::Down => self.move_caret_vertical(key.code),
            KeyCode::Esc => {
                let caret = self.editor.selection().end;
                self.editor.set_selection(caret..caret);
            }
            _ => {}
        }
        false
    }

    fn report(&mut self, result: Result<(), blockpad_engine::EditError>) {
        if let Err(e) = result {
            self.status = e.to_string();
        }
    }

    fn move_caret(&mut self, direction: isize) {
        let text = self.editor.get_content();
        let caret = self.editor.selection().end;
        let new = if direction < 0 {
            text[..caret]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0)
        } else {
            text[caret..]
                .chars()
                .next()
                .map(|c| caret + c.len_utf8())
                .unwrap_or(caret)
        };
        self.editor.set_selection(new..new);
    }

    fn move_caret_line(&mut self, code: KeyCode) {
        let text = self.editor.get_content();
        let caret = self.editor.selection().end;
        let new = match code {
            KeyCode::Home => text[..caret].rfind('\n').map(|i| i + 1).unwrap_or(0),
            _ => text[caret..].find('\n').map(|i| caret + i).unwrap_or(text.len()),
        };
        self.editor.set_selection(new..new);
    }

    fn move_caret_vertical(&mut self, code: KeyCode) {
        let lines = self.visible_lines();
        if lines.is_empty() {
            return;
        }
        let caret = self.editor.selection().end;
        let row = caret_row(&lines, caret);
        let col = caret - lines[row].range.start;
        let new_row = match code {
            KeyCode::Up if row > 0 => row - 1,
            KeyCode::Down if row + 1 < lines.len() => row + 1,
            _ => return,
        };
        let text = self.editor.get_content();
        let target = lines[new_row].range.clone();
        // Land on the same column, clamped before the target line's newline.
        let line_len = if text[target.clone()].ends_with('\n') {
            target.len() - 1
        } else {
            target.len()
        };
        let new = target.start + col.min(line_len);
        self.editor.set_selection(new..new);
    }

    /// Gutter lines with those hidden by a fold removed.
    fn visible_lines(&self) -> Vec<blockpad_engine::GutterLine> {
        let folds: Vec<std::ops::Range<usize>> = self
            .editor
            .get_blocks()
            .iter()
            .filter(|b| self.editor.is_folded(b.id))
            .filter_map(|b| self.editor.fold_range(b.id))
            .collect();
        self.editor
            .line_numbers()
            .into_iter()
            .filter(|line| {
                !folds
                    .iter()
                    .any(|f| line.range.start >= f.start && line.range.end <= f.end)
            })
            .collect()
    }
}

/// The visible row the caret sits on. The caret belongs to the line whose
/// range contains it, or to the last line when it sits at the very end.
fn caret_row(lines: &[blockpad_engine::GutterLine], caret: usize) -> usize {
    lines
        .iter()
        .position(|l| caret >= l.range.start && caret < l.range.end)
        .unwrap_or_else(|| lines.len().saturating_sub(1))
}

/// Terminal column of a byte offset within its line. Cells are chars,
/// not bytes, so multibyte content needs counting rather than
/// subtraction.
fn caret_column(line: &str, byte_offset: usize) -> usize {
    line[..byte_offset.min(line.len())].chars().count()
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    // An explicit path argument overrides the configured scratch location
    if args.len() == 2 {
        config.scratch_path = PathBuf::from(&args[1]);
    } else if args.len() > 2 {
        eprintln!("Usage: {} [scratch-file-path]", args[0]);
        process::exit(1);
    }

    let mut app = match App::new(&config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!(
                "Error: Failed to open scratch file '{}': {e}",
                config.scratch_path.display()
            );
            process::exit(1);
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        // Wake up in time for the next detection or autosave deadline, but
        // at least every 250ms so the status line stays fresh.
        let timeout = app
            .editor
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_millis(250))
            .min(Duration::from_millis(250));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key) {
                    return Ok(());
                }
            }
        }

        app.editor.poll(Instant::now());
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.area());

    let content = app.editor.get_content();
    let lines = app.visible_lines();
    let show_numbers = app.editor.show_line_numbers();
    let show_folds = app.editor.show_fold_gutter();

    let max_number = lines.iter().filter_map(|l| l.number).max().unwrap_or(1);
    let digits = max_number.to_string().len();
    let gutter_width = if show_numbers { digits + 1 } else { 0 };

    let rendered: Vec<Line> = lines
        .iter()
        .map(|line| {
            let text = content[line.range.clone()].trim_end_matches('\n').to_string();
            let mut spans = Vec::new();
            if show_numbers {
                let gutter = match line.number {
                    Some(n) => format!("{n:>digits$} "),
                    None => " ".repeat(gutter_width),
                };
                spans.push(Span::styled(gutter, Style::default().fg(Color::DarkGray)));
            }
            match line.number {
                // Marker lines render dimmed so block boundaries read as
                // chrome rather than content.
                None => spans.push(Span::styled(
                    text,
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )),
                Some(_) => {
                    spans.push(Span::raw(text));
                    if show_folds && app.editor.is_folded(line.block) {
                        if let Some(fold) = app.editor.fold_range(line.block) {
                            if line.range.end == fold.start {
                                spans.push(Span::styled(
                                    " ⋯",
                                    Style::default().fg(Color::Yellow),
                                ));
                            }
                        }
                    }
                }
            }
            Line::from(spans)
        })
        .collect();

    let inner_height = chunks[0].height.saturating_sub(2) as usize;
    let caret = app.editor.selection().end;
    let row = caret_row(&lines, caret);
    let scroll = row.saturating_sub(inner_height.saturating_sub(1)) as u16;

    let editor_pane = Paragraph::new(rendered)
        .block(Block::default().borders(Borders::ALL).title("blockpad"))
        .scroll((scroll, 0));
    f.render_widget(editor_pane, chunks[0]);

    // Place the terminal cursor at the caret
    if let Some(line) = lines.get(row) {
        let col = (caret_column(&content[line.range.clone()], caret - line.range.start)
            + gutter_width) as u16;
        let x = chunks[0].x + 1 + col.min(chunks[0].width.saturating_sub(3));
        let y = chunks[0].y + 1 + (row as u16).saturating_sub(scroll);
        f.set_cursor_position(Position::new(x, y));
    }

    // Status line
    let block = app.editor.current_block();
    let language = app.editor.effective_language(block);
    let auto = if block.auto { " (auto)" } else { "" };
    let position = app
        .editor
        .get_blocks()
        .iter()
        .position(|b| b.id == block.id)
        .map(|i| i + 1)
        .unwrap_or(1);
    let dirty = if app.editor.is_dirty() { " [+]" } else { "" };
    let status = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" block {position}/{}", app.editor.get_blocks().len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(format!("  {language}{auto}{dirty}  ")),
        Span::styled(app.status.clone(), Style::default().fg(Color::Yellow)),
    ]));
    f.render_widget(status, chunks[1]);

    // Instructions
    let help = Paragraph::new(Line::from(vec![
        Span::raw("^Q: Quit | ^S: Save | ^N: New block | ^D: Delete block | "),
        Span::raw("^L: Language | ^F: Format | ^↑/^↓: Blocks | F2: Fold"),
    ]))
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[2]);
}
