use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jiukisidian::config::Settings;
use jiukisidian::export::{self, ExportFormat, SketchRasterizer};
use jiukisidian::file_io::FILE_EXTENSION;
use jiukisidian::projects::ProjectId;
use jiukisidian::recovery::{RecoveryAction, RecoveryBoundary};
use jiukisidian::shapes::{PageId, Point};
use jiukisidian::storage::DirStorage;
use jiukisidian::{Board, BoardError, NoteAction, NoteCommand, RichText, Session, ShapeId, assets};

/// Infinite-canvas board of rich-text note cards
#[derive(Parser, Debug)]
#[command(name = "jiukisidian")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the project index and snapshots
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage projects
    #[command(subcommand)]
    Projects(ProjectsCommand),
    /// Manage pages of the active project
    #[command(subcommand)]
    Pages(PagesCommand),
    /// Work with notes on the current page
    #[command(subcommand)]
    Note(NoteSubcommand),
    /// Print the current page
    Show,
    /// Export the current page (png, jpg, pdf, json) or the whole project
    Export {
        /// png, jpg, pdf, json or project
        format: String,
        /// Destination directory (defaults to the configured export dir)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Import a project file or an image
    Import { file: PathBuf },
    /// Clear every key in local storage
    Reset,
}

#[derive(Subcommand, Debug)]
enum ProjectsCommand {
    List,
    Create { name: String },
    Delete { id: String },
    Switch { id: String },
}

#[derive(Subcommand, Debug)]
enum PagesCommand {
    List,
    Create {
        #[arg(default_value = "")]
        name: String,
    },
    /// Pages are addressed by their 1-based position
    Rename { page: usize, name: String },
    Delete { page: usize },
    Switch { page: usize },
}

#[derive(Subcommand, Debug)]
enum NoteSubcommand {
    /// Add a note centered on (x, y)
    Add {
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        /// Text appended to the note's last paragraph
        #[arg(long)]
        text: Option<String>,
    },
    /// Send a formatting command to a note
    Format {
        id: String,
        /// bold, italic, h1, h2, list, align, color or emoji
        action: String,
        value: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut settings = Settings::load();
    if let Some(dir) = args.storage_dir {
        settings.storage_dir = dir;
    }
    let mut storage = DirStorage::new(&settings.storage_dir);
    let mut boundary = RecoveryBoundary::new();

    if let Command::Reset = args.command {
        boundary.recover(RecoveryAction::HardReset, &mut storage)?;
        println!("Cleared {}", storage.root().display());
        return Ok(());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let command = args.command;
    let options = settings.board_options();
    boundary.guard(|| {
        let mut session = Session::open(storage.clone(), options)?;
        rt.block_on(run(&mut session, command, &settings))
    });

    if let Some(fault) = boundary.fault().cloned() {
        // Stored state is left as it was
        boundary.recover(RecoveryAction::SoftReload, &mut storage)?;
        anyhow::bail!(
            "{}\nIf this keeps happening, `jiukisidian reset` clears all local projects.",
            fault.message
        );
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("JIUK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn,jiukisidian=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(session: &mut Session<DirStorage>, command: Command, settings: &Settings) -> jiukisidian::Result<()> {
    match command {
        Command::Projects(cmd) => projects(session, cmd)?,
        Command::Pages(cmd) => pages(session, cmd)?,
        Command::Note(NoteSubcommand::Add { x, y, text }) => {
            let board = session.board_mut();
            board.set_viewport_center(Point::new(x, y));
            let id = board.create_note()?;
            if let Some(text) = text {
                board.edit_note(id, |editor| editor.insert_text(&text))?;
            }
            println!("{id}");
        }
        Command::Note(NoteSubcommand::Format { id, action, value }) => {
            let command = NoteCommand {
                id: id.parse::<ShapeId>()?,
                action: action.parse::<NoteAction>()?,
                value,
            };
            let delivery = session.board_mut().dispatch(command)?;
            println!("{delivery:?}");
        }
        Command::Show => show(session),
        Command::Export { format, out } => {
            let dir = out.unwrap_or_else(|| settings.export_dir.clone());
            let path = if format.eq_ignore_ascii_case("project") {
                session.save_project_to_file(&dir).await?
            } else {
                let format = format.parse::<ExportFormat>()?;
                let mut rasterizer = SketchRasterizer::default();
                export::export_canvas(session.board_mut(), &mut rasterizer, format, &dir).await?
            };
            println!("{}", path.display());
        }
        Command::Import { file } => {
            if is_project_file(&file) {
                let meta = session.load_project_from_file(&file).await?;
                println!("Loaded {:?} ({})", meta.name, meta.date);
            } else {
                let id = assets::import_image(session.board_mut(), &file).await?;
                println!("{id}");
            }
        }
        Command::Reset => {}
    }
    session.autosave()?;
    Ok(())
}

fn projects(session: &mut Session<DirStorage>, cmd: ProjectsCommand) -> jiukisidian::Result<()> {
    match cmd {
        ProjectsCommand::List => {
            let active = session.active_project().id;
            for record in session.list_projects() {
                let marker = if record.id == active { '*' } else { ' ' };
                let modified = Utc
                    .timestamp_millis_opt(record.last_modified)
                    .single()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!("{marker} {}  {}  {modified}", record.id, record.name);
            }
        }
        ProjectsCommand::Create { name } => {
            let id = session.create_project(&name)?;
            println!("{id}");
        }
        ProjectsCommand::Delete { id } => session.delete_project(id.parse::<ProjectId>()?)?,
        ProjectsCommand::Switch { id } => session.switch_project(id.parse::<ProjectId>()?)?,
    }
    Ok(())
}

fn pages(session: &mut Session<DirStorage>, cmd: PagesCommand) -> jiukisidian::Result<()> {
    let board = session.board_mut();
    match cmd {
        PagesCommand::List => {
            let current = board.doc().current_page();
            for (i, page) in board.doc().pages().iter().enumerate() {
                let marker = if page.id == current { '*' } else { ' ' };
                println!("{marker} {} {}", i + 1, page.name);
            }
        }
        PagesCommand::Create { name } => {
            board.create_page(&name)?;
        }
        PagesCommand::Rename { page, name } => {
            let mut buffer = board.begin_rename(page_at(board, page)?)?;
            buffer.set_text(name);
            board.confirm_rename(buffer)?;
        }
        PagesCommand::Delete { page } => {
            let id = page_at(board, page)?;
            board.delete_page(id)?;
        }
        PagesCommand::Switch { page } => {
            let id = page_at(board, page)?;
            board.switch_page(id)?;
        }
    }
    Ok(())
}

fn page_at(board: &Board, index: usize) -> jiukisidian::Result<PageId> {
    index
        .checked_sub(1)
        .and_then(|i| board.doc().pages().get(i))
        .map(|p| p.id)
        .ok_or_else(|| BoardError::not_found("page", index))
}

fn show(session: &Session<DirStorage>) {
    let board = session.board();
    let doc = board.doc();
    let page = doc
        .pages()
        .iter()
        .find(|p| p.id == doc.current_page())
        .map(|p| p.name.as_str())
        .unwrap_or_default();
    println!("{} / {page}", session.active_project().name);
    for shape in doc.current_page_shapes() {
        let bounds = shape.bounds();
        print!(
            "{}  {:<10} {:>7.1},{:<7.1} {:.0}x{:.0}",
            shape.id,
            shape.type_tag(),
            bounds.x,
            bounds.y,
            bounds.w,
            bounds.h
        );
        match board.bridge(shape.id) {
            Some(bridge) => println!("  {}", bridge.editor().plain_text().replace('\n', " / ")),
            None => println!(),
        }
    }
}

fn is_project_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == FILE_EXTENSION || ext == "json")
}
