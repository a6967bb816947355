use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::set_detail::level_color;
use crate::models::Flashcard;
use crate::recall::{mastery_label, MAX_KNOWLEDGE_LEVEL, MIN_KNOWLEDGE_LEVEL};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(session) = &app.review else {
        let block = Block::default().borders(Borders::ALL).title(" Review ");
        f.render_widget(Paragraph::new("No review in progress").block(block), area);
        return;
    };

    let Some(card) = session.current() else {
        let block = Block::default().borders(Borders::ALL).title(" Review ");
        f.render_widget(Paragraph::new("All cards reviewed").block(block), area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40), // Front
            Constraint::Min(0),         // Back
            Constraint::Length(3),      // Rating scale
        ])
        .split(area);

    let title = format!(
        " {} - card {}/{} ",
        session.title,
        session.index + 1,
        session.cards.len()
    );

    draw_face(f, chunks[0], &title, &card.front, card.front_math.as_deref(), Color::Cyan);

    if session.revealed {
        draw_face(f, chunks[1], " Answer ", &card.back, card.back_math.as_deref(), Color::Green);
    } else {
        let hidden = Paragraph::new("Press <Space> to reveal the answer")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Answer "));
        f.render_widget(hidden, chunks[1]);
    }

    draw_scale(f, card, session.revealed, chunks[2]);
}

fn draw_face(f: &mut Frame, area: Rect, title: &str, text: &str, math: Option<&str>, color: Color) {
    let mut lines = vec![Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ))];
    if let Some(math) = math {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            math.to_string(),
            Style::default().fg(Color::Magenta),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .title_style(Style::default().fg(color));
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    f.render_widget(paragraph, area);
}

fn draw_scale(f: &mut Frame, card: &Flashcard, revealed: bool, area: Rect) {
    let mut spans = Vec::new();
    for level in MIN_KNOWLEDGE_LEVEL..=MAX_KNOWLEDGE_LEVEL {
        let style = if revealed {
            Style::default().fg(level_color(level))
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{} {}", level, mastery_label(level)), style));
        spans.push(Span::raw("  "));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Rate {} ", card.id))
        .title_style(Style::default().fg(Color::Yellow));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}
