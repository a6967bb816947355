pub mod browser;
pub mod classes;
pub mod review;
pub mod set_detail;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

pub(crate) fn mastery_bar(level: i32) -> String {
    let filled = level.clamp(0, 5) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(5 - filled))
}

/// A bordered list with a column header line above the items.
pub(crate) fn draw_list(
    f: &mut Frame,
    area: Rect,
    title: String,
    header: Line<'static>,
    items: Vec<ListItem<'static>>,
    selected: Option<usize>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(selected);

    // Render header separately at the top of content area
    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };
    f.render_stateful_widget(list, list_area, &mut state);
}

pub(crate) fn header_style() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mastery_bar_fills_by_level() {
        assert_eq!(mastery_bar(0), "░░░░░");
        assert_eq!(mastery_bar(3), "███░░");
        assert_eq!(mastery_bar(9), "█████");
    }
}
