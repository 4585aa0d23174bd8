use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use outline::{Buffer, Cursor, Document, HeadingId, LineSequence, OutlineNode, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "outline",
    about = "Navigate the heading tree of an outline document",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the heading tree of a file.
    Tree(TreeArgs),

    /// Run one navigation query from a cursor line.
    Nav(NavArgs),

    /// Read or rewrite the tags of the heading containing a line.
    Tags(TagsArgs),

    /// Find the first active date literal in some text.
    Date(DateArgs),
}

#[derive(Debug, Args)]
struct TreeArgs {
    file: PathBuf,
    /// Emit JSON instead of an indented listing.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct NavArgs {
    file: PathBuf,
    /// Cursor line (1-based).
    #[arg(long)]
    line: usize,
    /// Relation to follow.
    #[arg(long, value_enum, default_value_t = Target::Current)]
    to: Target,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Target {
    Current,
    Next,
    Previous,
    Parent,
    NextSibling,
    PreviousSibling,
    FirstChild,
    LastChild,
    End,
}

#[derive(Debug, Args)]
struct TagsArgs {
    file: PathBuf,
    /// Cursor line (1-based).
    #[arg(long)]
    line: usize,
    /// Replace the tags (comma separated).
    #[arg(long, value_delimiter = ',')]
    set: Vec<String>,
    /// Remove all tags.
    #[arg(long, conflicts_with = "set")]
    clear: bool,
    /// Overwrite the file instead of printing to stdout.
    #[arg(long)]
    in_place: bool,
    /// JSON settings file.
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long)]
    tags_column: Option<usize>,
    #[arg(long)]
    tab_stop: Option<usize>,
}

#[derive(Debug, Args)]
struct DateArgs {
    #[arg(required = true)]
    text: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Tree(args) => handle_tree(args),
        Commands::Nav(args) => handle_nav(args),
        Commands::Tags(args) => handle_tags(args),
        Commands::Date(args) => handle_date(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_tree(args: TreeArgs) -> Result<()> {
    let TreeArgs { file, json } = args;
    let buffer = Buffer::read(&file)?;
    let mut doc = Document::new(buffer);
    let forest = outline::project(&mut doc);

    if json {
        println!("{}", serde_json::to_string_pretty(&forest)?);
        return Ok(());
    }

    let mut stack: Vec<(&OutlineNode, usize)> = forest.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        let tags = if node.tags.is_empty() {
            String::new()
        } else {
            format!(" :{}:", node.tags.join(":"))
        };
        println!(
            "{:indent$}{}{} [{}-{}]",
            "",
            node.title,
            tags,
            node.start + 1,
            node.subtree_end + 1,
            indent = depth * 2
        );
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    Ok(())
}

fn handle_nav(args: NavArgs) -> Result<()> {
    let NavArgs { file, line, to } = args;
    let buffer = Buffer::read(&file)?;
    let mut doc = Document::new(buffer);
    let cursor = Cursor::new(line);

    let found = match to {
        Target::Current => doc.current_heading(cursor),
        Target::Next => doc.next_heading(cursor),
        Target::Previous => doc.previous_heading(cursor),
        other => {
            let current = doc
                .current_heading(cursor)
                .with_context(|| format!("no heading at or above line {line}"))?;
            match other {
                Target::Parent => doc.parent(current),
                Target::NextSibling => doc.next_sibling(current),
                Target::PreviousSibling => doc.previous_sibling(current),
                Target::FirstChild => doc.first_child(current),
                Target::LastChild => doc.last_child(current),
                Target::End => {
                    println!("{}", doc.end_line_number(current));
                    return Ok(());
                }
                Target::Current | Target::Next | Target::Previous => Some(current),
            }
        }
    };

    match found {
        Some(id) => print_heading(&doc, id),
        None => println!("none"),
    }
    Ok(())
}

fn print_heading(doc: &Document<Buffer>, id: HeadingId) {
    let heading = doc.heading(id);
    let text = doc.lines().line(heading.start()).unwrap_or_default();
    println!("{}: {}", heading.start_line_number(), text);
}

fn handle_tags(args: TagsArgs) -> Result<()> {
    let TagsArgs {
        file,
        line,
        set,
        clear,
        in_place,
        settings,
        tags_column,
        tab_stop,
    } = args;

    let mut resolved = match &settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(column) = tags_column {
        resolved.tags_column = column;
    }
    if let Some(ts) = tab_stop {
        resolved.tab_stop = ts;
    }

    let buffer = Buffer::read(&file)?;
    let mut doc = Document::new(buffer).with_settings(resolved);
    let id = doc
        .current_heading(Cursor::new(line))
        .with_context(|| format!("no heading at or above line {line}"))?;

    if set.is_empty() && !clear {
        println!("{}", doc.tags(id).join(" "));
        return Ok(());
    }

    doc.set_tags(id, set.as_slice())
        .with_context(|| format!("writing tags on line {line}"))?;
    let buffer = doc.into_lines();
    if in_place {
        buffer.write(&file)?;
    } else {
        print!("{}", buffer.to_text());
    }
    Ok(())
}

fn handle_date(args: DateArgs) -> Result<()> {
    let text = args.text.join(" ");
    let date = outline::find_date(&text).context("no date literal found")?;
    println!("{date}");
    Ok(())
}
