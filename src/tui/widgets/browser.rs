use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, ListItem, Paragraph},
    Frame,
};

use super::{draw_list, header_style, mastery_bar};
use crate::recall::SetProgress;
use crate::tui::{truncate_line, App, Entry};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = format!(" {} ", app.breadcrumb());

    if app.entries.items.is_empty() {
        let block = Block::default().borders(Borders::ALL).title(title);
        f.render_widget(Paragraph::new("This folder is empty.").block(block), area);
        return;
    }

    let items: Vec<ListItem> = app.entries.items.iter().map(entry_line).collect();

    let header = Line::from(vec![
        Span::styled(format!("{:<8}", "Kind"), header_style()),
        Span::styled(format!("{:<32}", "Name"), header_style()),
        Span::styled("Details", header_style()),
    ]);

    draw_list(f, area, title, header, items, app.entries.selected);
}

fn entry_line(entry: &Entry) -> ListItem<'static> {
    let (kind, color, name, details) = match entry {
        Entry::Folder(folder) => (
            "dir",
            Color::Yellow,
            format!("{}/", folder.name),
            Span::raw(format!(
                "{} folders, {} files, {} sets",
                folder.folders.len(),
                folder.files.len(),
                folder.flashcard_sets.len()
            )),
        ),
        Entry::Set(set) => {
            let progress = SetProgress::of(set);
            (
                "set",
                Color::Green,
                set.title.clone(),
                Span::styled(
                    format!(
                        "{} {} cards, {:.0}% reviewed",
                        mastery_bar(progress.avg_knowledge.round() as i32),
                        progress.total_cards,
                        progress.completion()
                    ),
                    Style::default().fg(Color::Green),
                ),
            )
        }
        Entry::File(file) => (
            "file",
            Color::Cyan,
            file.name.clone(),
            Span::raw(match &file.blob {
                Some(blob) => format!("{}, {} bytes", blob.media_type, blob.size),
                None => "text".to_string(),
            }),
        ),
    };

    ListItem::new(Line::from(vec![
        Span::styled(format!("{:<8}", kind), Style::default().fg(color)),
        Span::styled(
            format!("{:<32}", truncate_line(&name, 30)),
            Style::default().fg(Color::White),
        ),
        details,
    ]))
}
