use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState};

use super::app::{ReviewMode, ReviewState};

fn type_label(kind: &str) -> (&'static str, Color) {
    match kind {
        "delete_file" => ("DELETE", Color::Red),
        "rename_file" => ("RENAME", Color::Yellow),
        "remove_dir" => ("REMOVE DIR", Color::Magenta),
        _ => ("UNKNOWN", Color::DarkGray),
    }
}

pub fn render_review(f: &mut Frame, state: &ReviewState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // table
            Constraint::Length(1), // status bar
        ])
        .split(f.area());

    let rows: Vec<Row> = state
        .records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let (label, color) = type_label(&r.kind);
            let style = if i == state.selected {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(if r.selected { "[x]" } else { "[ ]" }),
                Cell::from(Span::styled(label, Style::default().fg(color))),
                Cell::from(format!("{}", r.target.display())),
                Cell::from(
                    r.new_name
                        .as_ref()
                        .map(|n| n.display().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(11),
            Constraint::Percentage(50),
            Constraint::Percentage(40),
        ],
    )
    .header(
        Row::new(vec!["", "Type", "Target", "New name"]).style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(Block::default().borders(Borders::ALL).title("Planned changes"));

    // Dim the table when overlay is active
    let table = if matches!(state.mode, ReviewMode::Confirming) {
        table.style(Style::default().fg(Color::DarkGray))
    } else {
        table
    };
    // ratatui scrolls the offset so the cursor row stays on screen
    let mut table_state = TableState::default().with_selected(Some(state.selected));
    f.render_stateful_widget(table, chunks[0], &mut table_state);

    let status = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {}/{} selected ", state.selected_count(), state.records.len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            " | q: quit | j/k: navigate | space: toggle | a/n: all/none | Enter: apply",
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    f.render_widget(status, chunks[1]);

    if matches!(state.mode, ReviewMode::Confirming) {
        render_confirm_dialog(f, state.selected_count());
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn render_confirm_dialog(f: &mut Frame, count: usize) {
    let width = 40;
    let height = 5;
    let area = centered_rect(width, height, f.area());

    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Apply {count} changes "));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text = Paragraph::new(vec![
        Line::from("Are you sure?"),
        Line::from(""),
        Line::from(Span::styled(
            "y: yes  n/Esc: back",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    f.render_widget(text, inner);
}
