mod auth;
mod config;
mod db;
mod error;
mod feynman;
mod models;
mod recall;
mod service;
mod storage;
mod tree;
mod tui;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use auth::{Auth, Principal, Registration};
use config::Config;
use db::Database;
use error::{Error, Result};
use feynman::{Analyzer, GeminiClient, ScoringModel};
use models::{
    CardInput, ClassUpdate, File, FileUpdate, FlashcardSet, FlashcardSetUpdate, Folder, FolderUpdate,
    JsonOutput, NewClass, NewFile, NewFlashcardSet, NewFolder,
};
use recall::{mastery_label, SetProgress};
use service::StudyService;
use storage::LocalBlobStore;
use tree::FolderPath;

#[derive(Parser)]
#[command(name = "studybuddy")]
#[command(about = "Organize classes, folders, files and flashcards, and practice with active recall")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Session token (defaults to the one saved by `login`)
    #[arg(long, global = true, env = "STUDYBUDDY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Create an account and log in
    Register {
        #[arg(long, short)]
        username: String,

        #[arg(long, short)]
        email: String,

        #[arg(long, short)]
        password: String,
    },

    /// Log in and remember the session
    Login {
        #[arg(long, short)]
        email: String,

        #[arg(long, short)]
        password: String,
    },

    /// Forget the saved session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Manage classes
    #[command(subcommand)]
    Class(ClassCommands),

    /// Manage folders inside a class
    #[command(subcommand)]
    Folder(FolderCommands),

    /// Manage files inside a class
    #[command(subcommand)]
    File(FileCommands),

    /// Manage flashcard sets inside a class
    #[command(subcommand)]
    Set(SetCommands),

    /// Record how well a card was recalled (0-5)
    Review {
        class_id: String,
        set_id: String,
        card_id: String,

        /// Knowledge level, clamped to 0-5
        #[arg(long, short, allow_hyphen_values = true)]
        level: i32,
    },

    /// Clear all active-recall progress of a set
    Reset { class_id: String, set_id: String },

    /// Score an explanation with the Feynman technique
    Explain {
        #[arg(long, short)]
        topic: String,

        /// Explanation text; read from stdin when omitted
        #[arg(long, short)]
        explanation: Option<String>,
    },

    /// Check that the language model is reachable
    Ping,

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum ClassCommands {
    /// List all classes
    List,

    /// Create a class
    Create { name: String },

    /// Rename a class
    Rename { id: String, name: String },

    /// Delete a class and everything in it
    Delete { id: String },

    /// Count folders, files, sets and cards in a class
    Stats { id: String },
}

#[derive(Subcommand)]
enum FolderCommands {
    /// List folders at a path
    List {
        class_id: String,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Create a folder at a path
    Create {
        class_id: String,
        name: String,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Rename a folder
    Rename {
        class_id: String,
        id: String,
        name: String,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Delete a folder and everything beneath it
    Delete {
        class_id: String,
        id: String,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },
}

#[derive(Subcommand)]
enum FileCommands {
    /// List files at a path
    List {
        class_id: String,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Create a text file
    Create {
        class_id: String,
        name: String,

        #[arg(long, short)]
        content: Option<String>,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Upload a file from disk
    Upload {
        class_id: String,
        source: PathBuf,

        /// Stored name (defaults to the source file name)
        #[arg(long, short)]
        name: Option<String>,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Update a file's name or text
    Update {
        class_id: String,
        id: String,

        #[arg(long, short)]
        name: Option<String>,

        #[arg(long, short)]
        content: Option<String>,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Write a file's bytes to stdout or a file
    Cat {
        class_id: String,
        id: String,

        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Delete a file
    Delete {
        class_id: String,
        id: String,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },
}

#[derive(Subcommand)]
enum SetCommands {
    /// List flashcard sets at a path
    List {
        class_id: String,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Create a flashcard set
    Create {
        class_id: String,

        #[arg(long, short)]
        title: String,

        #[arg(long, short)]
        description: Option<String>,

        /// JSON array of cards, or @file containing one
        #[arg(long, short)]
        cards: String,

        #[arg(long, short, default_value = "", value_parser = parse_path)]
        path: FolderPath,
    },

    /// Show a set (searched anywhere in the class)
    Show { class_id: String, set_id: String },

    /// Update a set's title, description or cards
    Update {
        class_id: String,
        set_id: String,

        #[arg(long, short)]
        title: Option<String>,

        #[arg(long, short)]
        description: Option<String>,

        /// JSON array of cards, or @file containing one
        #[arg(long, short)]
        cards: Option<String>,
    },

    /// Delete a set
    Delete { class_id: String, set_id: String },
}

fn parse_path(s: &str) -> std::result::Result<FolderPath, String> {
    s.parse::<FolderPath>().map_err(|e| e.to_string())
}

fn parse_cards(arg: &str) -> Result<Vec<CardInput>> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => arg.to_string(),
    };
    serde_json::from_str(&raw).map_err(|e| Error::validation(format!("Invalid cards JSON: {e}")))
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout is reserved for command output
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_service(config: &Config) -> Result<StudyService<Database>> {
    config.ensure_dirs()?;
    if config.uses_dev_jwt_secret() {
        warn!("STUDYBUDDY_JWT_SECRET is not set; tokens are signed with the public development secret");
    }
    let db = Database::open(&config.db_path)?;
    db.init()?;

    let mut service = StudyService::new(db, Auth::new(&config.jwt_secret))
        .with_blob_store(Box::new(LocalBlobStore::new(&config.storage_dir)?));

    if let Some(key) = &config.gemini_api_key {
        let client: Box<dyn ScoringModel> = Box::new(GeminiClient::new(key)?);
        service = service.with_analyzer(Analyzer::new(client, config.models.clone()));
    }
    Ok(service)
}

fn main() {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_logging(&config);

    let json = cli.json;
    if let Err(e) = run(cli, &config) {
        if json {
            match serde_json::to_string(&JsonOutput::from_error(&e)) {
                Ok(out) => println!("{}", out),
                Err(_) => eprintln!("Error: {}", e),
            }
        } else {
            eprintln!("Error: {}", e);
            if let Some(raw) = e.raw_response() {
                eprintln!("Raw response:\n{}", raw);
            }
            if e.is_retryable() {
                eprintln!("This may succeed if you try again.");
            }
        }
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    let service = build_service(config)?;
    let json = cli.json;

    // Only account commands may run without a principal
    let token = cli.token.clone().or_else(|| config.load_session());
    let principal = || -> Result<Principal> { service.authenticate(token.as_deref()) };

    match cli.command {
        Commands::Init => {
            let users = service.store().count_users()?;
            if json {
                print_json(serde_json::json!({ "db_path": config.db_path, "users": users }))?;
            } else {
                println!("Database initialized at: {} ({} users)", config.db_path.display(), users);
            }
        }

        Commands::Register {
            username,
            email,
            password,
        } => {
            let session = service.register(Registration {
                username: Some(username),
                email: Some(email),
                password: Some(password),
            })?;
            config.save_session(&session.token)?;
            if json {
                print_json(&session)?;
            } else {
                println!("Registered '{}' ({}). You are logged in.", session.user.username, session.user.id);
            }
        }

        Commands::Login { email, password } => {
            let session = service.login(&email, &password)?;
            config.save_session(&session.token)?;
            if json {
                print_json(&session)?;
            } else {
                println!("Logged in as '{}'.", session.user.username);
            }
        }

        Commands::Logout => {
            config.clear_session()?;
            if json {
                print_json(())?;
            } else {
                println!("Logged out.");
            }
        }

        Commands::Whoami => {
            let profile = service.whoami(&principal()?)?;
            if json {
                print_json(&profile)?;
            } else {
                println!("{} <{}> ({})", profile.username, profile.email, profile.id);
            }
        }

        Commands::Class(cmd) => run_class(&service, &principal()?, cmd, json)?,
        Commands::Folder(cmd) => run_folder(&service, &principal()?, cmd, json)?,
        Commands::File(cmd) => run_file(&service, &principal()?, cmd, json)?,
        Commands::Set(cmd) => run_set(&service, &principal()?, cmd, json)?,

        Commands::Review {
            class_id,
            set_id,
            card_id,
            level,
        } => {
            let record = service.record_review(&principal()?, &class_id, &set_id, &card_id, level)?;
            if json {
                print_json(&record)?;
            } else {
                println!(
                    "Card {}: {} (level {}), reviewed {} time(s).",
                    card_id,
                    mastery_label(record.knowledge_level),
                    record.knowledge_level,
                    record.review_count
                );
            }
        }

        Commands::Reset { class_id, set_id } => {
            let set = service.reset_recall(&principal()?, &class_id, &set_id)?;
            if json {
                print_json(&set)?;
            } else {
                println!("Cleared review progress for '{}'.", set.title);
            }
        }

        Commands::Explain { topic, explanation } => {
            let principal = principal()?;
            let explanation = match explanation {
                Some(text) => text,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let report = service.explain(&principal, &topic, &explanation)?;
            if json {
                print_json(&report)?;
            } else {
                let a = &report.analysis;
                println!("=== Feynman Analysis: {} ===", report.topic);
                println!("Understanding score: {}/10", a.understanding_score);
                print_list("Strengths", &a.strengths);
                print_list("Weaknesses", &a.weaknesses);
                print_list("Improvement suggestions", &a.improvement_suggestions);
                print_list("Conceptual gaps", &a.conceptual_gaps);
                println!();
                println!("Application ability: {}", a.application_ability);
                println!();
                println!("{}", a.overall_feedback);
                print_list("Next steps", &a.next_steps);
            }
        }

        Commands::Ping => {
            let report = service.ping(&principal()?)?;
            if json {
                print_json(&report)?;
            } else {
                println!("{} responded: {}", report.model, report.response.trim());
            }
        }

        Commands::Tui => {
            let principal = principal()?;
            tui::run(service, principal).map_err(|e| Error::Internal(format!("terminal UI failed: {e}")))?;
        }
    }

    Ok(())
}

fn run_class(service: &StudyService<Database>, principal: &Principal, cmd: ClassCommands, json: bool) -> Result<()> {
    match cmd {
        ClassCommands::List => {
            let classes = service.list_classes(principal)?;
            if json {
                print_json(&classes)?;
            } else if classes.is_empty() {
                println!("No classes found.");
            } else {
                println!("{:<38} {:<30} {:>7} {:>5} {:>5}", "ID", "NAME", "FOLDERS", "FILES", "SETS");
                println!("{}", "-".repeat(89));
                for class in &classes {
                    let stats = tree::summarize(class);
                    println!(
                        "{:<38} {:<30} {:>7} {:>5} {:>5}",
                        class.id,
                        truncate(&class.name, 28),
                        stats.folders,
                        stats.files,
                        stats.flashcard_sets
                    );
                }
            }
        }

        ClassCommands::Create { name } => {
            let class = service.create_class(principal, NewClass { name: Some(name) })?;
            if json {
                print_json(&class)?;
            } else {
                println!("Added class '{}' with ID: {}", class.name, class.id);
            }
        }

        ClassCommands::Rename { id, name } => {
            let class = service.update_class(principal, &id, ClassUpdate { name: Some(name) })?;
            if json {
                print_json(&class)?;
            } else {
                println!("Class {} is now '{}'.", class.id, class.name);
            }
        }

        ClassCommands::Delete { id } => {
            let class = service.delete_class(principal, &id)?;
            if json {
                print_json(&class)?;
            } else {
                println!("Class '{}' deleted.", class.name);
            }
        }

        ClassCommands::Stats { id } => {
            let stats = service.class_stats(principal, &id)?;
            if json {
                print_json(&stats)?;
            } else {
                println!("=== Class Statistics ===");
                println!("Folders: {}", stats.folders);
                println!("Files: {}", stats.files);
                println!("Flashcard sets: {}", stats.flashcard_sets);
                println!("Cards: {}", stats.cards);
            }
        }
    }
    Ok(())
}

fn run_folder(service: &StudyService<Database>, principal: &Principal, cmd: FolderCommands, json: bool) -> Result<()> {
    match cmd {
        FolderCommands::List { class_id, path } => {
            let folders: Vec<Folder> = service.list(principal, &class_id, &path)?;
            if json {
                print_json(&folders)?;
            } else if folders.is_empty() {
                println!("No folders found.");
            } else {
                println!("{:<38} {:<30} CONTENTS", "ID", "NAME");
                println!("{}", "-".repeat(80));
                for folder in &folders {
                    println!(
                        "{:<38} {:<30} {} folders, {} files, {} sets",
                        folder.id,
                        truncate(&folder.name, 28),
                        folder.folders.len(),
                        folder.files.len(),
                        folder.flashcard_sets.len()
                    );
                }
            }
        }

        FolderCommands::Create { class_id, name, path } => {
            let folder: Folder = service.create(principal, &class_id, &path, NewFolder { name: Some(name) })?;
            if json {
                print_json(&folder)?;
            } else {
                println!("Added folder '{}' with ID: {}", folder.name, folder.id);
                println!("Path: {}", path.child(&folder.id));
            }
        }

        FolderCommands::Rename {
            class_id,
            id,
            name,
            path,
        } => {
            let folder: Folder = service.update(principal, &class_id, &path, &id, FolderUpdate { name: Some(name) })?;
            if json {
                print_json(&folder)?;
            } else {
                println!("Folder {} is now '{}'.", folder.id, folder.name);
            }
        }

        FolderCommands::Delete { class_id, id, path } => {
            let folder: Folder = service.delete(principal, &class_id, &path, &id)?;
            if json {
                print_json(&folder)?;
            } else {
                println!("Folder '{}' deleted.", folder.name);
            }
        }
    }
    Ok(())
}

fn run_file(service: &StudyService<Database>, principal: &Principal, cmd: FileCommands, json: bool) -> Result<()> {
    match cmd {
        FileCommands::List { class_id, path } => {
            let files: Vec<File> = service.list(principal, &class_id, &path)?;
            if json {
                print_json(&files)?;
            } else if files.is_empty() {
                println!("No files found.");
            } else {
                println!("{:<38} {:<30} {:<24} SIZE", "ID", "NAME", "TYPE");
                println!("{}", "-".repeat(100));
                for file in &files {
                    let (kind, size) = match (&file.blob, &file.content) {
                        (Some(blob), _) => (blob.media_type.clone(), blob.size),
                        (None, Some(text)) => ("text".to_string(), text.len() as u64),
                        (None, None) => ("-".to_string(), 0),
                    };
                    println!(
                        "{:<38} {:<30} {:<24} {}",
                        file.id,
                        truncate(&file.name, 28),
                        truncate(&kind, 22),
                        size
                    );
                }
            }
        }

        FileCommands::Create {
            class_id,
            name,
            content,
            path,
        } => {
            let payload = NewFile {
                name: Some(name),
                content,
                blob: None,
            };
            let file: File = service.create(principal, &class_id, &path, payload)?;
            if json {
                print_json(&file)?;
            } else {
                println!("Added file '{}' with ID: {}", file.name, file.id);
            }
        }

        FileCommands::Upload {
            class_id,
            source,
            name,
            path,
        } => {
            let bytes = std::fs::read(&source)?;
            let name = name
                .or_else(|| source.file_name().and_then(|n| n.to_str()).map(str::to_string))
                .ok_or_else(|| Error::validation("File name is required"))?;
            let file = service.upload_file(principal, &class_id, &path, &name, &bytes)?;
            if json {
                print_json(&file)?;
            } else {
                println!("Uploaded '{}' ({} bytes) with ID: {}", file.name, bytes.len(), file.id);
            }
        }

        FileCommands::Update {
            class_id,
            id,
            name,
            content,
            path,
        } => {
            let file: File = service.update(principal, &class_id, &path, &id, FileUpdate { name, content })?;
            if json {
                print_json(&file)?;
            } else {
                println!("Updated file '{}'.", file.name);
            }
        }

        FileCommands::Cat {
            class_id,
            id,
            output,
            path,
        } => {
            let copied = match &output {
                Some(target) => {
                    let mut out = std::fs::File::create(target)?;
                    service.read_file(principal, &class_id, &path, &id, &mut out)?
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut out = stdout.lock();
                    let n = service.read_file(principal, &class_id, &path, &id, &mut out)?;
                    out.flush()?;
                    n
                }
            };
            if let Some(target) = output {
                if json {
                    print_json(serde_json::json!({ "bytes": copied, "output": target }))?;
                } else {
                    println!("Wrote {} bytes to {}", copied, target.display());
                }
            }
        }

        FileCommands::Delete { class_id, id, path } => {
            let file: File = service.delete(principal, &class_id, &path, &id)?;
            if json {
                print_json(&file)?;
            } else {
                println!("File '{}' deleted.", file.name);
            }
        }
    }
    Ok(())
}

fn run_set(service: &StudyService<Database>, principal: &Principal, cmd: SetCommands, json: bool) -> Result<()> {
    match cmd {
        SetCommands::List { class_id, path } => {
            let sets: Vec<FlashcardSet> = service.list(principal, &class_id, &path)?;
            if json {
                print_json(&sets)?;
            } else if sets.is_empty() {
                println!("No flashcard sets found.");
            } else {
                println!("{:<38} {:<30} {:>5} {:>9}", "ID", "TITLE", "CARDS", "REVIEWED");
                println!("{}", "-".repeat(85));
                for set in &sets {
                    let progress = SetProgress::of(set);
                    println!(
                        "{:<38} {:<30} {:>5} {:>8.0}%",
                        set.id,
                        truncate(&set.title, 28),
                        progress.total_cards,
                        progress.completion()
                    );
                }
            }
        }

        SetCommands::Create {
            class_id,
            title,
            description,
            cards,
            path,
        } => {
            let payload = NewFlashcardSet {
                title: Some(title),
                description,
                cards: Some(parse_cards(&cards)?),
            };
            let set: FlashcardSet = service.create(principal, &class_id, &path, payload)?;
            if json {
                print_json(&set)?;
            } else {
                println!("Added set '{}' ({} cards) with ID: {}", set.title, set.cards.len(), set.id);
            }
        }

        SetCommands::Show { class_id, set_id } => {
            let located = service.get_set(principal, &class_id, &set_id)?;
            if json {
                print_json(&located)?;
            } else {
                let set = &located.set;
                println!("Set: {}", set.title);
                println!("ID: {}", set.id);
                println!(
                    "Path: {}",
                    if located.folder_path.is_root() {
                        "(class root)".to_string()
                    } else {
                        located.folder_path.to_string()
                    }
                );
                if !set.description.is_empty() {
                    println!("Description: {}", set.description);
                }
                println!();
                println!("--- Progress ---");
                println!(
                    "Reviewed: {}/{} cards ({:.0}%)",
                    located.progress.reviewed_cards,
                    located.progress.total_cards,
                    located.progress.completion()
                );
                println!("Average level: {:.1}/5", located.progress.avg_knowledge);
                println!();
                println!("{:<38} {:<30} {:<12} REVIEWS", "CARD", "FRONT", "MASTERY");
                println!("{}", "-".repeat(90));
                for card in &set.cards {
                    let (label, reviews) = match set.active_recall_data.get(&card.id) {
                        Some(r) => (mastery_label(r.knowledge_level), r.review_count),
                        None => ("-", 0),
                    };
                    println!("{:<38} {:<30} {:<12} {}", card.id, truncate(&card.front, 28), label, reviews);
                }
            }
        }

        SetCommands::Update {
            class_id,
            set_id,
            title,
            description,
            cards,
        } => {
            let payload = FlashcardSetUpdate {
                title,
                description,
                cards: cards.as_deref().map(parse_cards).transpose()?,
            };
            let set = service.update_set(principal, &class_id, &set_id, payload)?;
            if json {
                print_json(&set)?;
            } else {
                println!("Updated set '{}' ({} cards).", set.title, set.cards.len());
            }
        }

        SetCommands::Delete { class_id, set_id } => {
            let set = service.delete_set(principal, &class_id, &set_id)?;
            if json {
                print_json(&set)?;
            } else {
                println!("Set '{}' deleted.", set.title);
            }
        }
    }
    Ok(())
}

fn print_list(title: &str, items: &[String]) {
    println!();
    println!("{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod truncate_tests {
        use super::*;

        #[test]
        fn short_string_unchanged() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn exact_length_unchanged() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn long_string_truncated() {
            assert_eq!(truncate("hello world", 8), "hello...");
        }

        #[test]
        fn multibyte_is_not_split() {
            assert_eq!(truncate("ééééééé", 5), "éé...");
        }
    }

    mod cli_tests {
        use super::*;

        #[test]
        fn path_accepts_both_encodings() {
            let cli = Cli::try_parse_from(["studybuddy", "folder", "list", "c1", "--path", "a,b"]).unwrap();
            let Commands::Folder(FolderCommands::List { path, .. }) = cli.command else {
                panic!("wrong command");
            };
            assert_eq!(path.segments(), ["a", "b"]);

            let cli = Cli::try_parse_from(["studybuddy", "folder", "list", "c1", "--path", r#"["a","b"]"#]).unwrap();
            let Commands::Folder(FolderCommands::List { path, .. }) = cli.command else {
                panic!("wrong command");
            };
            assert_eq!(path.segments(), ["a", "b"]);
        }

        #[test]
        fn path_defaults_to_root() {
            let cli = Cli::try_parse_from(["studybuddy", "set", "list", "c1"]).unwrap();
            let Commands::Set(SetCommands::List { path, .. }) = cli.command else {
                panic!("wrong command");
            };
            assert!(path.is_root());
        }

        #[test]
        fn review_accepts_negative_level() {
            let cli = Cli::try_parse_from(["studybuddy", "review", "c", "s", "k", "--level", "-2"]).unwrap();
            let Commands::Review { level, .. } = cli.command else {
                panic!("wrong command");
            };
            assert_eq!(level, -2);
        }

        #[test]
        fn global_flags_anywhere() {
            let cli = Cli::try_parse_from(["studybuddy", "class", "list", "--json", "--token", "t"]).unwrap();
            assert!(cli.json);
            assert_eq!(cli.token.as_deref(), Some("t"));
        }
    }

    mod cards_tests {
        use super::*;

        #[test]
        fn inline_cards() {
            let cards = parse_cards(r#"[{"front": "Q", "back": "A", "front_math": "x^2"}]"#).unwrap();
            assert_eq!(cards.len(), 1);
            assert_eq!(cards[0].front_math.as_deref(), Some("x^2"));
        }

        #[test]
        fn cards_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("cards.json");
            std::fs::write(&path, r#"[{"front": "Q", "back": "A"}]"#).unwrap();
            let cards = parse_cards(&format!("@{}", path.display())).unwrap();
            assert_eq!(cards[0].back.as_deref(), Some("A"));
        }

        #[test]
        fn bad_cards_json_is_validation_error() {
            assert_eq!(parse_cards("not json").unwrap_err().kind(), "validation");
        }
    }
}
