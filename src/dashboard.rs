//! Terminal browser for the request history.

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::{error::Error, io, path::Path};

use crate::history::{read_history, HistoryRecord, RequestKind};

pub fn run_dashboard(history: &Path) -> Result<(), Box<dyn Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();
    table_state.select(Some(0));

    loop {
        // Re-read each tick so requests answered in another shell show up.
        let mut records = read_history(history).unwrap_or_default();
        records.reverse();
        terminal.draw(|f| ui(f, &records, &mut table_state))?;

        if event::poll(std::time::Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Down => table_state.select(next_row(table_state.selected(), records.len())),
                    KeyCode::Up => table_state.select(previous_row(table_state.selected(), records.len())),
                    _ => {}
                }
            }
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Row below the selection, wrapping to the top.
fn next_row(selected: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match selected {
        Some(i) if i + 1 < len => Some(i + 1),
        _ => Some(0),
    }
}

fn previous_row(selected: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match selected {
        Some(i) if i > 0 && i < len => Some(i - 1),
        _ => Some(len - 1),
    }
}

fn kind_label(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Hospitals => "Hospitals",
        RequestKind::Donors => "Donors",
        RequestKind::Availability => "Blood stock",
        RequestKind::BloodRequest => "Blood request",
    }
}

fn summary(records: &[HistoryRecord]) -> String {
    let count = |kind| records.iter().filter(|r| r.kind == kind).count();
    let empty = records.iter().filter(|r| r.result_count == 0).count();
    format!(
        "{} requests | hospitals {} | donors {} | blood stock {} | blood requests {} | empty {} | q to quit",
        records.len(),
        count(RequestKind::Hospitals),
        count(RequestKind::Donors),
        count(RequestKind::Availability),
        count(RequestKind::BloodRequest),
        empty
    )
}

fn ui(f: &mut Frame, records: &[HistoryRecord], table_state: &mut TableState) {
    let rects = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)].as_ref())
        .margin(1)
        .split(f.size());

    let selected_style = Style::default().add_modifier(Modifier::REVERSED).fg(Color::Yellow);
    let normal_style = Style::default().fg(Color::White);
    let header_cells = ["When", "Request", "City", "Query", "Detail", "Results", "Top match", "Score"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells)
        .style(normal_style)
        .height(1)
        .bottom_margin(1);

    let rows = records.iter().map(|item| {
        let top = match (&item.top_result, &item.reason) {
            (Some(name), _) => name.clone(),
            (None, Some(reason)) => reason.clone(),
            (None, None) => "-".to_string(),
        };
        let style = if item.result_count == 0 {
            Style::default().fg(Color::Red)
        } else {
            normal_style
        };
        let cells = vec![
            Cell::from(item.timestamp.format("%Y-%m-%d %H:%M").to_string()),
            Cell::from(kind_label(item.kind)),
            Cell::from(item.city.clone()),
            Cell::from(item.query.clone()),
            Cell::from(item.detail.clone()),
            Cell::from(item.result_count.to_string()),
            Cell::from(top),
            Cell::from(item.top_score.map_or_else(|| "-".to_string(), |s| format!("{s:.3}"))),
        ];
        Row::new(cells).style(style)
    });

    let col_widths = vec![
        Constraint::Min(16), // When
        Constraint::Min(11), // Request
        Constraint::Min(10), // City
        Constraint::Min(24), // Query
        Constraint::Min(18), // Detail
        Constraint::Min(7),  // Results
        Constraint::Min(20), // Top match
        Constraint::Min(6),  // Score
    ];

    let table = Table::new(rows, col_widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Care Match History"))
        .highlight_style(selected_style)
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, rects[0], table_state);

    let footer = Paragraph::new(Line::from(summary(records)))
        .block(Block::default().borders(Borders::ALL).title("Summary"));
    f.render_widget(footer, rects[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::as_of;

    #[test]
    fn navigation_wraps_both_ways() {
        assert_eq!(next_row(Some(0), 3), Some(1));
        assert_eq!(next_row(Some(2), 3), Some(0));
        assert_eq!(previous_row(Some(0), 3), Some(2));
        assert_eq!(previous_row(Some(2), 3), Some(1));
        assert_eq!(next_row(None, 3), Some(0));
        assert_eq!(next_row(Some(0), 0), None);
        assert_eq!(previous_row(Some(5), 0), None);
    }

    #[test]
    fn stale_selection_is_clamped_after_history_shrinks() {
        assert_eq!(next_row(Some(9), 2), Some(0));
        assert_eq!(previous_row(Some(9), 2), Some(1));
    }

    #[test]
    fn summary_counts_kinds_and_empties() {
        let base = HistoryRecord {
            timestamp: as_of(),
            kind: RequestKind::Hospitals,
            city: "Delhi".into(),
            query: "chest pain".into(),
            detail: String::new(),
            result_count: 2,
            top_result: Some("AIIMS".into()),
            top_score: Some(0.9),
            reason: None,
        };
        let donors = HistoryRecord {
            kind: RequestKind::Donors,
            result_count: 0,
            top_result: None,
            top_score: None,
            reason: Some("no_compatible_donors".into()),
            ..base.clone()
        };
        let line = summary(&[base, donors]);
        assert!(line.starts_with("2 requests | hospitals 1 | donors 1 | blood stock 0 | blood requests 0 | empty 1"));
    }
}
