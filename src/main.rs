use clap::{Args, Parser, Subcommand};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod assemble;
mod chat;
mod config;
mod error;
mod export;
mod llm;
mod ops;
mod pdf;
mod rag;
mod sections;

use assemble::{AssemblyOptions, SpecialSectionScope};
use error::InputError;
use pdf::PageRange;
use sections::submittals::CategoryOrder;

#[derive(Parser)]
#[command(name = "submittals")]
#[command(version)]
#[command(about = "Extract submittal requirements from construction specifications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct TocArgs {
    /// Specification PDF
    #[arg(long)]
    pdf: Option<PathBuf>,
    /// First table-of-contents page (1-based)
    #[arg(long, default_value_t = 1)]
    toc_start: usize,
    /// Last table-of-contents page (inclusive)
    #[arg(long, default_value_t = 1)]
    toc_end: usize,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// List the section numbers found on the table-of-contents pages
    Sections {
        #[command(flatten)]
        toc: TocArgs,
    },
    /// Extract submittal requirements and write xlsx, docx and pdf outputs
    Extract {
        #[command(flatten)]
        toc: TocArgs,
        /// Project name, used in the documents and the output file names
        #[arg(long, default_value = "")]
        project: String,
        /// Submittal procedures section, e.g. "01 33 00"
        #[arg(long, default_value = "")]
        special: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
        /// Order of submittal blocks inside a section
        #[arg(long, value_enum)]
        category_order: Option<CategoryOrder>,
        /// Keep the special section whole instead of only its submittal blocks
        #[arg(long)]
        whole_special_section: bool,
    },
    /// Chat with the hosted knowledge-base assistant
    Chat {
        /// Assistant id (defaults to the configured one)
        #[arg(long)]
        assistant: Option<String>,
        /// Continue an existing thread
        #[arg(long)]
        thread: Option<String>,
        /// Store the assistant id in the config file
        #[arg(long)]
        remember: bool,
    },
    /// Ask questions about a reference PDF
    Ask {
        #[arg(long)]
        doc: Option<PathBuf>,
        /// Chunks retrieved per question
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let app_dir = config::Config::get_app_data_dir();
    let file_appender = tracing_appender::rolling::never(app_dir, "debug.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("debug,hyper=info,reqwest=info")),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::new("warn")),
        )
        .init();

    let config = config::Config::load();

    match cli.command {
        Commands::Sections { toc } => list_sections(toc),
        Commands::Extract {
            toc,
            project,
            special,
            out_dir,
            yes,
            category_order,
            whole_special_section,
        } => {
            let inputs = ops::ExtractionInputs {
                pdf: toc.pdf,
                project_name: project,
                toc_start: toc.toc_start,
                toc_end: toc.toc_end,
                special_section: special,
                options: AssemblyOptions {
                    category_order: category_order.unwrap_or(config.category_order),
                    special_scope: if whole_special_section {
                        SpecialSectionScope::Whole
                    } else {
                        SpecialSectionScope::Submittals
                    },
                },
                out_dir,
            };
            extract(inputs, yes)
        }
        Commands::Chat { assistant, thread, remember } => {
            let Some(assistant_id) = assistant.or_else(|| config.assistant_id.clone()) else {
                println!(
                    "{} no assistant id; pass --assistant or set SUBMITTALS_ASSISTANT_ID",
                    style("Nothing to do:").yellow().bold()
                );
                return Ok(());
            };
            if remember {
                config::Config::save_assistant_id(&assistant_id)?;
            }
            chat::assistant_loop(&config, &assistant_id, thread).await
        }
        Commands::Ask { doc, top_k } => {
            let doc = match ops::validate_pdf(doc.as_deref()) {
                Ok(doc) => doc,
                Err(e) => return inert(e),
            };
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            chat::document_loop(&config, &doc, top_k).await
        }
    }
}

/// Missing input skips the action without failing the process.
fn inert(err: InputError) -> anyhow::Result<()> {
    tracing::warn!("Skipping action: {}", err);
    println!("{} {}", style("Nothing to do:").yellow().bold(), err);
    Ok(())
}

fn print_listing(listing: &ops::TocListing) {
    let numbers: Vec<&str> = listing.section_numbers().collect();
    let addenda: Vec<&str> = listing.addenda().collect();

    println!("{} ({})", style("Section numbers").cyan().bold(), numbers.len());
    for number in &numbers {
        println!("  {}", number);
    }
    println!("{} ({})", style("Addenda").cyan().bold(), addenda.len());
    for addendum in &addenda {
        println!("  {}", addendum);
    }
}

fn list_sections(toc: TocArgs) -> anyhow::Result<()> {
    let pdf = match ops::validate_pdf(toc.pdf.as_deref()) {
        Ok(pdf) => pdf,
        Err(e) => return inert(e),
    };
    let pages = match PageRange::new(toc.toc_start, toc.toc_end) {
        Ok(pages) => pages,
        Err(e) => return inert(e),
    };

    let bytes = ops::read_pdf(&pdf)?;
    let listing = ops::mine_toc(&bytes, pages)?;
    print_listing(&listing);
    Ok(())
}

fn extract(inputs: ops::ExtractionInputs, yes: bool) -> anyhow::Result<()> {
    let request = match inputs.validate() {
        Ok(request) => request,
        Err(e) => return inert(e),
    };

    let bytes = ops::read_pdf(&request.pdf)?;
    let listing = ops::mine_toc(&bytes, request.toc_pages)?;
    print_listing(&listing);
    if let Err(e) = listing.ensure_not_empty(request.toc_pages) {
        return inert(e);
    }

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Extract documents for {}?", request.project_name))
            .default(true)
            .interact()?;
        if !confirmed {
            println!("{}", style("Cancelled.").yellow());
            return Ok(());
        }
    }

    let outcome = ops::run_extraction(&bytes, &listing, &request)?;
    println!(
        "{} {} sections",
        style("Extracted").green().bold(),
        outcome.content.len()
    );
    for caption in outcome.content.table_of_contents() {
        println!("  {}", caption);
    }
    for path in outcome.paths.all() {
        println!("{} {}", style("Wrote").green(), path.display());
    }
    Ok(())
}
