use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame,
};

use super::mastery_bar;
use crate::recall::mastery_label;
use crate::service::LocatedSet;
use crate::tui::{truncate_line, App};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(located) = &app.selected_set else {
        let block = Block::default().borders(Borders::ALL).title(" Set ");
        f.render_widget(Paragraph::new("No set selected").block(block), area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Header
            Constraint::Length(3), // Completion gauge
            Constraint::Min(0),    // Cards
        ])
        .split(area);

    draw_header(f, located, chunks[0]);
    draw_completion(f, located, chunks[1]);
    draw_cards(f, located, chunks[2]);
}

fn draw_header(f: &mut Frame, located: &LocatedSet, area: Rect) {
    let progress = &located.progress;
    let location = if located.folder_path.is_root() {
        "(class root)".to_string()
    } else {
        located.folder_path.to_string()
    };

    let text = vec![
        Line::from(vec![
            Span::styled(
                located.set.title.clone(),
                Style::default().fg(Color::White),
            ),
            Span::styled(format!("  in {}", location), Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(Span::styled(
            located.set.description.clone(),
            Style::default().fg(Color::Gray),
        )),
        Line::from(vec![
            Span::styled("Reviewed: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}/{}", progress.reviewed_cards, progress.total_cards),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Mastered: ", Style::default().fg(Color::Gray)),
            Span::styled(
                progress.mastered_cards.to_string(),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  "),
            Span::styled("Avg: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.1}", progress.avg_knowledge),
                Style::default().fg(level_color(progress.avg_knowledge.round() as i32)),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Flashcard Set ")
        .title_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_completion(f: &mut Frame, located: &LocatedSet, area: Rect) {
    let percent = located.progress.completion().clamp(0.0, 100.0);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Completion "))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(percent.round() as u16)
        .label(format!("{:.0}% reviewed", percent));
    f.render_widget(gauge, area);
}

fn draw_cards(f: &mut Frame, located: &LocatedSet, area: Rect) {
    let set = &located.set;
    let items: Vec<ListItem> = set
        .cards
        .iter()
        .map(|card| {
            let level = set
                .active_recall_data
                .get(&card.id)
                .map(|record| record.knowledge_level);
            let (bar, label, color) = match level {
                Some(level) => (mastery_bar(level), mastery_label(level), level_color(level)),
                None => (mastery_bar(0), "Not reviewed", Color::DarkGray),
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", bar), Style::default().fg(color)),
                Span::styled(format!("{:<14}", label), Style::default().fg(color)),
                Span::styled(
                    truncate_line(&card.front, 50),
                    Style::default().fg(Color::White),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Cards ({}) ", set.cards.len()))
        .title_style(Style::default().fg(Color::Magenta));

    if items.is_empty() {
        let paragraph = Paragraph::new("This set has no cards.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        f.render_widget(List::new(items).block(block), area);
    }
}

pub(crate) fn level_color(level: i32) -> Color {
    match level {
        4.. => Color::Green,
        2..=3 => Color::Yellow,
        _ => Color::Red,
    }
}
