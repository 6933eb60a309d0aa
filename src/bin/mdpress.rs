//! CLI binary for mdpress.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConvertOptions` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdpress::{available_themes, convert, ConvertOptions, DocumentConfig};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes document.pdf next to the input)
  mdpress convert document.md

  # Convert to a specific path with a named theme
  mdpress convert document.md -o out/book.pdf -t academic

  # Keep the intermediate HTML for debugging
  mdpress convert document.md --html

  # Skip the title page even when the document requests one
  mdpress convert document.md --no-title-page

  # Scaffold a new project
  mdpress init my-docs

  # List themes available from the current directory
  mdpress themes

CONFIGURATION:
  A md2pdf.config.json (or .md2pdf.json) next to the input document sets
  the theme, the author record store location, and paged-media options.
  A malformed discovered config degrades to defaults with a warning; a
  config named with -c must parse.

AUTHORS:
  Declared authors ("Jane Doe <jane@example.com>") are resolved against
  YAML records in data/authors/. Missing records are stubbed out on the
  first run; fill in the bio before generating the final PDF.
"#;

/// Convert Markdown files to print-ready PDFs with themes and templates.
#[derive(Parser, Debug)]
#[command(
    name = "mdpress",
    version,
    about = "Convert Markdown files to print-ready PDFs with themes and templates",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MDPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MDPRESS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a Markdown file to PDF.
    Convert {
        /// The Markdown file to convert.
        file: PathBuf,

        /// Output PDF path. Defaults to the input path with `.pdf`.
        #[arg(short, long, env = "MDPRESS_OUTPUT")]
        output: Option<PathBuf>,

        /// Theme name; must exist when given.
        #[arg(short, long, env = "MDPRESS_THEME")]
        theme: Option<String>,

        /// Explicit configuration file; must parse when given.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also write the intermediate HTML next to the input.
        #[arg(long)]
        html: bool,

        /// Skip title page generation.
        #[arg(long = "no-title-page", action = clap::ArgAction::SetFalse)]
        title_page: bool,
    },

    /// Scaffold a new project directory.
    Init {
        /// Project directory name.
        #[arg(default_value = "my-docs")]
        name: String,

        /// Theme to preselect in the generated config.
        #[arg(short, long, default_value = "default")]
        theme: String,
    },

    /// List available themes.
    Themes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert {
            file,
            output,
            theme,
            config,
            html,
            title_page,
        } => {
            let options = ConvertOptions {
                output,
                keep_html: html,
                theme,
                config,
                title_page,
                transforms: Vec::new(),
            };
            match convert(&file, &options).await {
                Ok(result) => {
                    if !cli.quiet {
                        eprintln!(
                            "{} PDF generated: {}",
                            green("✔"),
                            bold(&result.pdf_path.display().to_string())
                        );
                        if let Some(html_path) = &result.html_path {
                            eprintln!(
                                "{} HTML also saved: {}",
                                cyan("◆"),
                                dim(&html_path.display().to_string())
                            );
                        }
                    }
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{} {e}", red("✗"));
                    std::process::exit(1);
                }
            }
        }

        Command::Init { name, theme } => {
            let project = init_project(&name, &theme)?;
            if !cli.quiet {
                eprintln!(
                    "{} Project initialized: {}",
                    green("✔"),
                    bold(&project.display().to_string())
                );
                eprintln!(
                    "{} Structure created with sample files and configuration",
                    cyan("◆")
                );
            }
            Ok(())
        }

        Command::Themes => {
            let cwd = std::env::current_dir().context("Cannot determine working directory")?;
            println!("{}", bold("Available themes:"));
            for name in available_themes(&cwd) {
                if name == "default" {
                    println!("  - {name} {}", dim("(built-in)"));
                } else {
                    println!("  - {name}");
                }
            }
            Ok(())
        }
    }
}

const SAMPLE_DOCUMENT: &str = r#"---
title: "Example: Getting Started"
version: v0.1.0
authors:
  - Jane Doe <jane.doe@example.com>
---

<!-- [[titlepage]] -->

# Example: Getting Started

<!-- [[toc]][2,3] -->

## Introduction

Edit this file, then run `mdpress convert docs/example.md`.

## Next steps

> [!TIP]
> Run with `--html` to inspect the intermediate document.

<!-- [[authors]] -->
"#;

const SAMPLE_AUTHOR: &str = r#"name: Jane Doe
email: jane.doe@example.com
bio: |
  Technical writer with a soft spot for reproducible document
  pipelines.
"#;

/// Scaffold a project directory with config, sample document, and author
/// store, mirroring the layout the converter expects.
fn init_project(name: &str, theme: &str) -> Result<PathBuf> {
    let project = Path::new(name).to_path_buf();
    for dir in ["docs", "data/authors/pictures", "themes"] {
        std::fs::create_dir_all(project.join(dir))
            .with_context(|| format!("Cannot create {}/{dir}", project.display()))?;
    }

    let mut config = DocumentConfig {
        theme: theme.to_string(),
        title_page: true,
        ..DocumentConfig::default()
    };
    // Config discovery happens next to the input document in docs/, so
    // the record store path points one level up.
    config.authors.directory = PathBuf::from("../data/authors");
    let config_path = project.join("docs/md2pdf.config.json");
    std::fs::write(
        &config_path,
        serde_json::to_string_pretty(&config).context("Cannot serialize config")?,
    )
    .with_context(|| format!("Cannot write {}", config_path.display()))?;

    std::fs::write(project.join("docs/example.md"), SAMPLE_DOCUMENT)
        .context("Cannot write sample document")?;
    std::fs::write(
        project.join("data/authors/jane_doe_example_com.yaml"),
        SAMPLE_AUTHOR,
    )
    .context("Cannot write sample author record")?;

    let readme = format!(
        "# {name}\n\n\
         This project was initialized with mdpress.\n\n\
         ## Getting Started\n\n\
         1. Edit your Markdown files in `docs/`\n\
         2. Configure authors in `data/authors/`\n\
         3. Adjust the theme in `docs/md2pdf.config.json`\n\n\
         ## Commands\n\n\
         ```bash\n\
         mdpress convert docs/example.md\n\
         mdpress convert docs/example.md -o out/book.pdf\n\
         mdpress convert docs/example.md --html\n\
         ```\n"
    );
    std::fs::write(project.join("README.md"), readme).context("Cannot write README")?;

    Ok(project)
}
