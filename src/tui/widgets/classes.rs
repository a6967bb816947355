use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, ListItem, Paragraph},
    Frame,
};

use super::{draw_list, header_style};
use crate::tree;
use crate::tui::{truncate_line, App};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    if app.classes.items.is_empty() {
        let block = Block::default().borders(Borders::ALL).title(" Classes ");
        let hint = Paragraph::new("No classes yet. Create one with `studybuddy class create <name>`.").block(block);
        f.render_widget(hint, area);
        return;
    }

    let items: Vec<ListItem> = app
        .classes
        .items
        .iter()
        .map(|class| {
            let stats = tree::summarize(class);
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<30}", truncate_line(&class.name, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(format!("{:>8}", stats.folders), Style::default().fg(Color::Yellow)),
                Span::styled(format!("{:>8}", stats.files), Style::default().fg(Color::Cyan)),
                Span::styled(format!("{:>8}", stats.flashcard_sets), Style::default().fg(Color::Green)),
                Span::styled(format!("{:>8}", stats.cards), Style::default().fg(Color::Green)),
            ]))
        })
        .collect();

    let header = Line::from(vec![
        Span::styled(format!("{:<30}", "Name"), header_style()),
        Span::styled(
            format!("{:>8}{:>8}{:>8}{:>8}", "Folders", "Files", "Sets", "Cards"),
            header_style(),
        ),
    ]);

    draw_list(f, area, " Classes ".to_string(), header, items, app.classes.selected);
}
