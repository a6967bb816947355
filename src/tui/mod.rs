mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::seq::SliceRandom;
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::auth::Principal;
use crate::db::Database;
use crate::error::Result;
use crate::models::{Class, File, Flashcard, FlashcardSet, Folder};
use crate::recall::mastery_label;
use crate::service::{LocatedSet, StudyService};
use crate::tree::{self, FolderPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Classes,
    Browser,
    SetDetail,
    Review,
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i >= self.items.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i == 0 {
                    self.items.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

/// One row of the folder browser.
#[derive(Debug, Clone)]
pub enum Entry {
    Folder(Folder),
    Set(FlashcardSet),
    File(File),
}

impl Entry {
    fn for_node(node: &dyn tree::TreeNode) -> Vec<Entry> {
        let folders = node.folders().iter().cloned().map(Entry::Folder);
        let sets = node.flashcard_sets().iter().cloned().map(Entry::Set);
        let files = node.files().iter().cloned().map(Entry::File);
        folders.chain(sets).chain(files).collect()
    }
}

/// A pass over a set's cards in random order.
pub struct ReviewSession {
    pub set_id: String,
    pub title: String,
    pub cards: Vec<Flashcard>,
    pub index: usize,
    pub revealed: bool,
    pub levels: Vec<i32>,
}

impl ReviewSession {
    fn start(set: &FlashcardSet) -> Self {
        let mut cards = set.cards.as_slice().to_vec();
        cards.shuffle(&mut rand::thread_rng());
        Self {
            set_id: set.id.clone(),
            title: set.title.clone(),
            cards,
            index: 0,
            revealed: false,
            levels: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.index)
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.cards.len()
    }

    fn advance(&mut self, level: i32) {
        self.levels.push(level);
        self.index += 1;
        self.revealed = false;
    }
}

pub struct App {
    service: StudyService<Database>,
    principal: Principal,
    pub view: View,
    pub username: String,
    pub classes: StatefulList<Class>,
    pub current_class: Option<Class>,
    pub path: FolderPath,
    // Display names matching `path` segment for segment
    pub path_names: Vec<String>,
    pub entries: StatefulList<Entry>,
    pub selected_set: Option<LocatedSet>,
    pub review: Option<ReviewSession>,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(service: StudyService<Database>, principal: Principal) -> Result<Self> {
        let username = service.whoami(&principal)?.username;
        let classes = service.list_classes(&principal)?;

        Ok(Self {
            service,
            principal,
            view: View::Classes,
            username,
            classes: StatefulList::with_items(classes),
            current_class: None,
            path: FolderPath::root(),
            path_names: Vec::new(),
            entries: StatefulList::with_items(Vec::new()),
            selected_set: None,
            review: None,
            status: None,
            should_quit: false,
        })
    }

    pub fn breadcrumb(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(class) = &self.current_class {
            parts.push(&class.name);
        }
        parts.extend(self.path_names.iter().map(String::as_str));
        parts.join(" / ")
    }

    pub fn refresh_data(&mut self) -> Result<()> {
        self.classes = StatefulList::with_items(self.service.list_classes(&self.principal)?);
        if self.current_class.is_some() {
            self.reload_entries()?;
        }
        if let Some(located) = &self.selected_set {
            let (class_id, set_id) = (self.class_id()?, located.set.id.clone());
            self.selected_set = Some(self.service.get_set(&self.principal, &class_id, &set_id)?);
        }
        Ok(())
    }

    fn class_id(&self) -> Result<String> {
        self.current_class
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or_else(|| crate::error::Error::validation("No class selected"))
    }

    fn reload_entries(&mut self) -> Result<()> {
        let class_id = self.class_id()?;
        let class = self.service.get_class(&self.principal, &class_id)?;
        let entries = Entry::for_node(tree::locate(&class, &self.path)?);
        let keep = self.entries.selected;

        self.entries = StatefulList::with_items(entries);
        if let Some(i) = keep.filter(|i| *i < self.entries.items.len()) {
            self.entries.selected = Some(i);
        }
        self.current_class = Some(class);
        Ok(())
    }

    fn open_class(&mut self) -> Result<()> {
        if let Some(class) = self.classes.selected_item() {
            self.current_class = Some(class.clone());
            self.path = FolderPath::root();
            self.path_names.clear();
            self.entries = StatefulList::with_items(Vec::new());
            self.reload_entries()?;
            self.view = View::Browser;
        }
        Ok(())
    }

    fn open_entry(&mut self) -> Result<()> {
        match self.entries.selected_item().cloned() {
            Some(Entry::Folder(folder)) => {
                self.path = self.path.child(&folder.id);
                self.path_names.push(folder.name);
                self.entries = StatefulList::with_items(Vec::new());
                self.reload_entries()?;
            }
            Some(Entry::Set(set)) => {
                let class_id = self.class_id()?;
                self.selected_set = Some(self.service.get_set(&self.principal, &class_id, &set.id)?);
                self.view = View::SetDetail;
            }
            Some(Entry::File(file)) => {
                self.status = Some(match (&file.blob, &file.content) {
                    (Some(blob), _) => format!("{}: {} ({} bytes)", file.name, blob.media_type, blob.size),
                    (None, Some(text)) => format!("{}: {}", file.name, first_line(text)),
                    (None, None) => format!("{}: empty", file.name),
                });
            }
            None => {}
        }
        Ok(())
    }

    fn go_up(&mut self) -> Result<()> {
        match self.path.parent() {
            Some(parent) => {
                self.path = parent;
                self.path_names.pop();
                self.entries = StatefulList::with_items(Vec::new());
                self.reload_entries()?;
            }
            None => {
                self.current_class = None;
                self.view = View::Classes;
                self.classes = StatefulList::with_items(self.service.list_classes(&self.principal)?);
            }
        }
        Ok(())
    }

    fn start_review(&mut self) {
        let Some(located) = &self.selected_set else {
            return;
        };
        if located.set.cards.is_empty() {
            self.status = Some("This set has no cards".into());
            return;
        }
        self.review = Some(ReviewSession::start(&located.set));
        self.view = View::Review;
    }

    fn rate_card(&mut self, level: i32) -> Result<()> {
        let class_id = self.class_id()?;
        let Some(session) = &mut self.review else {
            return Ok(());
        };
        let Some(card) = session.current() else {
            return Ok(());
        };

        let record = self
            .service
            .record_review(&self.principal, &class_id, &session.set_id, &card.id, level)?;
        self.status = Some(format!("{} -> {}", truncate_line(&card.front, 40), mastery_label(record.knowledge_level)));
        session.advance(record.knowledge_level);

        if session.is_finished() {
            self.finish_review()?;
        }
        Ok(())
    }

    fn finish_review(&mut self) -> Result<()> {
        if let Some(session) = self.review.take() {
            let reviewed = session.levels.len();
            if reviewed > 0 {
                let avg = session.levels.iter().sum::<i32>() as f64 / reviewed as f64;
                self.status = Some(format!("Reviewed {} cards, average level {:.1}", reviewed, avg));
            }
        }
        self.view = View::SetDetail;
        self.refresh_data()
    }

    fn reset_progress(&mut self) -> Result<()> {
        let class_id = self.class_id()?;
        if let Some(located) = &self.selected_set {
            self.service.reset_recall(&self.principal, &class_id, &located.set.id)?;
            self.status = Some("Review progress cleared".into());
        }
        self.refresh_data()
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        if self.view == View::Review {
            return self.handle_review_key(key);
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
                self.status = Some("Refreshed".into());
            }

            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::Browser => self.go_up()?,
                View::SetDetail => {
                    self.selected_set = None;
                    self.view = View::Browser;
                    self.reload_entries()?;
                }
                View::Classes | View::Review => {}
            },

            KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => match self.view {
                View::Classes => self.open_class()?,
                View::Browser => self.open_entry()?,
                View::SetDetail => self.start_review(),
                View::Review => {}
            },

            KeyCode::Char('j') | KeyCode::Down => match self.view {
                View::Classes => self.classes.next(),
                View::Browser => self.entries.next(),
                _ => {}
            },
            KeyCode::Char('k') | KeyCode::Up => match self.view {
                View::Classes => self.classes.previous(),
                View::Browser => self.entries.previous(),
                _ => {}
            },

            KeyCode::Char('g') => match self.view {
                View::Classes => self.classes.first(),
                View::Browser => self.entries.first(),
                _ => {}
            },
            KeyCode::Char('G') => match self.view {
                View::Classes => self.classes.last(),
                View::Browser => self.entries.last(),
                _ => {}
            },

            KeyCode::Char('R') if self.view == View::SetDetail => self.reset_progress()?,

            _ => {}
        }
        Ok(())
    }

    fn handle_review_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Esc | KeyCode::Char('q') => self.finish_review()?,
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(session) = &mut self.review {
                    session.revealed = !session.revealed;
                }
            }
            KeyCode::Char(c @ '0'..='5') => {
                let revealed = self.review.as_ref().is_some_and(|s| s.revealed);
                if revealed {
                    self.rate_card(c as i32 - '0' as i32)?;
                } else {
                    self.status = Some("Reveal the answer first (space)".into());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn first_line(text: &str) -> String {
    truncate_line(text.lines().next().unwrap_or(""), 60)
}

pub(crate) fn truncate_line(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

pub fn run(service: StudyService<Database>, principal: Principal) -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Create app state before touching the terminal so setup errors print normally
    let mut app = App::new(service, principal)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                // Failed actions are reported in the status line
                if let Err(e) = app.handle_key(key.code, key.modifiers) {
                    app.status = Some(format!("Error: {}", e));
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
