use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use hk_core::change::ChangeRecord;

use super::view;

pub enum ReviewMode {
    Browsing,
    Confirming,
}

pub struct ReviewState {
    pub records: Vec<ChangeRecord>,
    pub selected: usize,
    pub mode: ReviewMode,
}

enum Outcome {
    Apply,
    Cancel,
}

impl ReviewState {
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self {
            records,
            selected: 0,
            mode: ReviewMode::Browsing,
        }
    }

    pub fn selected_count(&self) -> usize {
        self.records.iter().filter(|r| r.selected).count()
    }

    fn toggle(&mut self) {
        if let Some(record) = self.records.get_mut(self.selected) {
            record.selected = !record.selected;
        }
    }

    fn select_all(&mut self, on: bool) {
        for record in &mut self.records {
            record.selected = on;
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Option<Outcome> {
        match self.mode {
            ReviewMode::Browsing => match code {
                KeyCode::Char('q') | KeyCode::Esc => return Some(Outcome::Cancel),
                KeyCode::Up | KeyCode::Char('k') => {
                    self.selected = self.selected.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.selected + 1 < self.records.len() {
                        self.selected += 1;
                    }
                }
                KeyCode::Char(' ') => self.toggle(),
                KeyCode::Char('a') => self.select_all(true),
                KeyCode::Char('n') => self.select_all(false),
                KeyCode::Enter => {
                    if self.selected_count() > 0 {
                        self.mode = ReviewMode::Confirming;
                    }
                }
                _ => {}
            },
            ReviewMode::Confirming => match code {
                KeyCode::Char('y') => return Some(Outcome::Apply),
                KeyCode::Char('n') | KeyCode::Esc => self.mode = ReviewMode::Browsing,
                _ => {}
            },
        }
        None
    }
}

/// Run the review TUI on stderr.
pub fn run_review(records: Vec<ChangeRecord>) -> color_eyre::Result<Option<Vec<ChangeRecord>>> {
    let mut stderr = io::stderr();
    execute!(stderr, EnterAlternateScreen, cursor::Hide)?;
    terminal::enable_raw_mode()?;

    let backend = CrosstermBackend::new(io::stderr());
    let mut terminal = Terminal::new(backend)?;

    let mut state = ReviewState::new(records);

    let outcome = loop {
        terminal.draw(|f| view::render_review(f, &state))?;

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(outcome) = state.handle_key(key.code) {
                break outcome;
            }
        }
    };

    terminal::disable_raw_mode()?;
    execute!(stderr, LeaveAlternateScreen, cursor::Show)?;

    Ok(match outcome {
        Outcome::Apply => Some(state.records),
        Outcome::Cancel => None,
    })
}
