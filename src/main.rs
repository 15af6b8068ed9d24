use clap::{Parser, Subcommand};
use guidepress::book::{self, BookContext, EpubPackager, PulldownRenderer, SyntectHighlighter};
use guidepress::capture::ChromeBackend;
use guidepress::config::{self, ProjectPaths, SiteConfig};
use guidepress::images::{self, ImageTargets};
use guidepress::imaging::RustBackend;
use guidepress::types::ContentItem;
use guidepress::{output, scan};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("GUIDEPRESS_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GUIDEPRESS_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "guidepress")]
#[command(about = "Ebooks and social images for Markdown guides")]
#[command(long_about = "\
Ebooks and social images for Markdown guides

Every post matched by the content glob becomes an EPUB and a set of card
images. Files whose path contains the exclude marker (default `_template`)
are skipped.

Project structure:

  guidepress.toml                  # Optional, sparse overrides of the defaults
  src/
  ├── posts/
  │   ├── rust/index.md            # Post: YAML front-matter + Markdown body
  │   └── _template/index.md       # Skipped
  ├── assets/
  │   ├── css/book.css             # Ebook stylesheet (required for `books`)
  │   └── img/
  │       ├── social/              # ← <slug>.png, <slug>-square.png
  │       └── books/               # ← <slug>.png, -thumb.png, -medium.png
  └── books/                       # ← <title>.epub

Front-matter:
  title, slug       required
  description       optional, shown on cards
  homeImage         optional, shown on cards

`images` needs the preview server running (default http://localhost:8080)
and a Chrome or Chromium install.

Run 'guidepress gen-config' to generate a documented guidepress.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: <root>/guidepress.toml, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export every post as an EPUB
    Books,
    /// Render social cards and book covers for every post
    Images,
    /// Render images, then export books (so covers are embedded)
    Build,
    /// Discover and validate posts without writing anything
    Check {
        /// Print discovered posts as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock guidepress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Books => {
            let project = Project::load(&cli)?;
            init_thread_pool(&project.config.processing);
            run_books(&project)?;
        }
        Command::Images => {
            let project = Project::load(&cli)?;
            init_thread_pool(&project.config.processing);
            run_images(&project)?;
        }
        Command::Build => {
            let project = Project::load(&cli)?;
            init_thread_pool(&project.config.processing);
            println!("==> Images");
            run_images(&project)?;
            println!("==> Books");
            run_books(&project)?;
            println!("==> Build complete");
        }
        Command::Check { json } => {
            let project = Project::load(&cli)?;
            book::check_output_names(&project.items)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&project.items)?);
            } else {
                println!("==> Checking {}", project.paths.root.display());
                output::print_scan_output(
                    &project.items,
                    &project.paths.root,
                    &project.paths.assets_dir,
                );
                println!("==> Content is valid");
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Resolved config plus the discovered posts.
struct Project {
    config: SiteConfig,
    paths: ProjectPaths,
    items: Vec<ContentItem>,
}

impl Project {
    fn load(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match &cli.config {
            Some(path) => config::load_explicit_config(path)?,
            None => config::load_config(&cli.root)?,
        };
        let paths = config.paths(&cli.root);
        let items = scan::scan(
            &paths.root,
            &config.content.posts,
            &config.content.exclude_marker,
        )?;
        Ok(Self {
            config,
            paths,
            items,
        })
    }
}

fn run_books(project: &Project) -> Result<(), Box<dyn std::error::Error>> {
    let Project {
        config: site_config,
        paths,
        items,
    } = project;
    let highlighter = SyntectHighlighter::new(&site_config.book.highlight_theme)?;
    let renderer = PulldownRenderer;
    let packager = EpubPackager::new();
    let ctx = BookContext::new(
        &site_config.book,
        &site_config.assets.url_prefix,
        paths,
        &renderer,
        &highlighter,
        &packager,
    )?;

    let (tx, rx) = std::sync::mpsc::channel();
    let printer_root = paths.root.clone();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_book_event(&event, &printer_root) {
                println!("{}", line);
            }
        }
    });
    let result = book::export_books(&ctx, items, Some(tx));
    printer.join().unwrap();

    output::print_books_summary(&result?);
    Ok(())
}

fn run_images(project: &Project) -> Result<(), Box<dyn std::error::Error>> {
    let Project {
        config: site_config,
        paths,
        items,
    } = project;
    let targets = ImageTargets::from_config(&site_config.images, paths);
    let browser = ChromeBackend::launch()?;
    let resizer = RustBackend::new();

    let (tx, rx) = std::sync::mpsc::channel();
    let printer_root = paths.root.clone();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_image_event(&event, &printer_root) {
                println!("{}", line);
            }
        }
    });
    let result = images::render_images(&targets, &browser, &resizer, items, Some(tx));
    printer.join().unwrap();

    output::print_images_summary(&result?);
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
