use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{browser, classes, review, set_detail};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status line
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_status(f, app, chunks[2]);
    draw_help_bar(f, app, chunks[3]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec!["Classes", "Browse", "Set", "Review"];
    let selected = match app.view {
        View::Classes => 0,
        View::Browser => 1,
        View::SetDetail => 2,
        View::Review => 3,
    };

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" StudyBuddy ({}) ", app.username)),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Classes => classes::draw(f, app, area),
        View::Browser => browser::draw(f, app, area),
        View::SetDetail => set_detail::draw(f, app, area),
        View::Review => review::draw(f, app, area),
    }
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let text = app.status.as_deref().unwrap_or("");
    let color = if text.starts_with("Error") {
        Color::Red
    } else {
        Color::Green
    };
    f.render_widget(Paragraph::new(text).style(Style::default().fg(color)), area);
}

fn key(k: &'static str) -> Span<'static> {
    Span::styled(k, Style::default().fg(Color::Cyan))
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = match app.view {
        View::Classes => vec![
            key("j/k"),
            Span::raw(" Nav  "),
            key("g/G"),
            Span::raw(" Top/Bot  "),
            key("l/<CR>"),
            Span::raw(" Open  "),
            key("^r"),
            Span::raw(" Refresh  "),
        ],
        View::Browser => vec![
            key("j/k"),
            Span::raw(" Nav  "),
            key("l/<CR>"),
            Span::raw(" Open  "),
            key("h/<Esc>"),
            Span::raw(" Up  "),
            key("^r"),
            Span::raw(" Refresh  "),
        ],
        View::SetDetail => vec![
            key("l/<CR>"),
            Span::raw(" Review  "),
            key("R"),
            Span::raw(" Reset progress  "),
            key("h/<Esc>"),
            Span::raw(" Back  "),
        ],
        View::Review => vec![
            key("<Space>"),
            Span::raw(" Flip  "),
            key("0-5"),
            Span::raw(" Rate  "),
            key("<Esc>"),
            Span::raw(" Stop  "),
        ],
    };

    if app.view != View::Review {
        spans.extend(vec![key("q"), Span::raw(" Quit")]);
    }

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    f.render_widget(help, area);
}
