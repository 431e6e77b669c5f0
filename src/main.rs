use clap::{Parser, Subcommand};
use pagesmith::cache::FetchManifest;
use pagesmith::document::Document;
use pagesmith::fetch::FetchReport;
use pagesmith::fragment::FragmentRegistry;
use pagesmith::output::RunReport;
use pagesmith::patch::PatchReport;
use pagesmith::{assemble, config, edits, fetch, output, patch, skeleton};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that download assets.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the fetch cache and download every asset again
    #[arg(long)]
    no_cache: bool,
}

/// Inputs shared by `build` and `check`.
#[derive(clap::Args, Clone)]
struct PipelineArgs {
    /// Skeleton document containing {{NAME}} slots
    #[arg(long)]
    skeleton: PathBuf,

    /// Directory of fragment files
    #[arg(long)]
    fragments_dir: PathBuf,

    /// Ordered edits to apply after assembly (TOML)
    #[arg(long)]
    edits_file: Option<PathBuf>,

    /// Assets to download (TOML)
    #[arg(long)]
    assets_file: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "pagesmith")]
#[command(about = "Assemble and patch a static HTML page from named fragments")]
#[command(long_about = "\
Assemble and patch a static HTML page from named fragments

A skeleton declares slots, fragment files fill them, an edits file applies
ordered changes to the result, and an assets file lists images to download.
Every edit and every download is reported; the exit code is non-zero if any
required edit or any download failed.

Site structure:

  site/
  ├── pagesmith.toml            # Tool config (optional)
  ├── skeleton.html             # <body>{{HERO}}{{FEATURES}}{{FOOTER}}</body>
  ├── fragments/
  │   ├── fragments.toml        # Per-fragment anchors (optional)
  │   ├── 010-HERO.html         # Fragment HERO (numbered = ordered)
  │   ├── 020-FEATURES.md       # Markdown is rendered to HTML
  │   └── FOOTER.html           # Unnumbered fragments sort last
  ├── edits.toml                # [[edit]] anchor/slot, mode, content
  └── assets.toml               # dest_dir + [[asset]] name, url, dest

Edit modes: insert-before, insert-after, replace, delete.
Edit statuses: applied, anchor_not_found, ambiguous_anchor (first match used).

Run 'pagesmith gen-config' to generate a documented pagesmith.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./pagesmith.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: assemble → patch → write → fetch
    Build {
        #[command(flatten)]
        inputs: PipelineArgs,
        /// Output document
        #[arg(long)]
        out: PathBuf,
        /// Write a JSON run report
        #[arg(long)]
        report: Option<PathBuf>,
        /// Write the output even if required edits failed
        #[arg(long)]
        allow_partial: bool,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Fill a skeleton's slots and write the result
    Assemble {
        #[arg(long)]
        skeleton: PathBuf,
        #[arg(long)]
        fragments_dir: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Apply an edits file to an existing document
    Patch {
        /// Document to patch
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        edits_file: PathBuf,
        /// Fragments referenced by `fragment = "NAME"` edits
        #[arg(long)]
        fragments_dir: Option<PathBuf>,
        /// Output document (defaults to patching the input in place)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        allow_partial: bool,
    },
    /// Download the assets listed in an assets file
    Fetch {
        #[arg(long)]
        assets_file: PathBuf,
        #[arg(long)]
        report: Option<PathBuf>,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Validate inputs and preview edits without network or writes
    Check {
        #[command(flatten)]
        inputs: PipelineArgs,
    },
    /// Scaffold a skeleton with one slot per fragment
    Init {
        #[arg(long)]
        fragments_dir: PathBuf,
        /// Write the skeleton here instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a stock pagesmith.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    // gen-config must work even when the current config is broken.
    let load_config = || config::load_config(cli.config.as_deref(), Path::new("."));

    match cli.command {
        Command::Build {
            inputs,
            out,
            report,
            allow_partial,
            cache,
        } => {
            let cfg = load_config()?;
            let registry = load_fragments(&inputs.fragments_dir)?;

            println!("==> Assembling {}", inputs.skeleton.display());
            let skeleton = Document::read(&inputs.skeleton)?;
            let mut assembly =
                assemble::assemble(skeleton.as_str(), &registry.ordered(), &cfg.assemble)?;
            output::print_assembly(&assembly);
            let mut document = std::mem::take(&mut assembly.document);

            let edit_report = match &inputs.edits_file {
                Some(path) => {
                    let (patched, report) = run_edits(document, path, Some(&registry))?;
                    document = patched;
                    Some(report)
                }
                None => None,
            };

            let written = allow_partial || edit_report.as_ref().is_none_or(PatchReport::is_success);
            if written {
                document.write(&out)?;
            }

            let assets = match &inputs.assets_file {
                Some(path) => Some(run_fetch(path, &cfg.fetch, !cache.no_cache)?),
                None => None,
            };

            let mut run = RunReport::new(Some(assembly), edit_report, assets);
            run.written = written;
            finish(&run, Some(out.as_path()), report.as_deref())
        }
        Command::Assemble {
            skeleton,
            fragments_dir,
            out,
        } => {
            let cfg = load_config()?;
            let registry = load_fragments(&fragments_dir)?;
            println!("==> Assembling {}", skeleton.display());
            let skeleton = Document::read(&skeleton)?;
            let assembly = assemble::assemble(skeleton.as_str(), &registry.ordered(), &cfg.assemble)?;
            output::print_assembly(&assembly);
            assembly.document.write(&out)?;

            let mut run = RunReport::new(Some(assembly), None, None);
            run.written = true;
            finish(&run, Some(out.as_path()), None)
        }
        Command::Patch {
            input,
            edits_file,
            fragments_dir,
            out,
            report,
            allow_partial,
        } => {
            let registry = match &fragments_dir {
                Some(dir) => Some(load_fragments(dir)?),
                None => None,
            };
            let document = Document::read(&input)?;
            let (patched, edit_report) = run_edits(document, &edits_file, registry.as_ref())?;

            let out = out.unwrap_or(input);
            let written = allow_partial || edit_report.is_success();
            if written {
                patched.write(&out)?;
            }

            let mut run = RunReport::new(None, Some(edit_report), None);
            run.written = written;
            finish(&run, Some(out.as_path()), report.as_deref())
        }
        Command::Fetch {
            assets_file,
            report,
            cache,
        } => {
            let cfg = load_config()?;
            let assets = run_fetch(&assets_file, &cfg.fetch, !cache.no_cache)?;
            let run = RunReport::new(None, None, Some(assets));
            finish(&run, None, report.as_deref())
        }
        Command::Check { inputs } => {
            let cfg = load_config()?;
            let registry = load_fragments(&inputs.fragments_dir)?;

            println!("==> Assembling {}", inputs.skeleton.display());
            let skeleton = Document::read(&inputs.skeleton)?;
            let mut assembly =
                assemble::assemble(skeleton.as_str(), &registry.ordered(), &cfg.assemble)?;
            output::print_assembly(&assembly);
            let document = std::mem::take(&mut assembly.document);

            let edit_report = match &inputs.edits_file {
                Some(path) => Some(run_edits(document, path, Some(&registry))?.1),
                None => None,
            };

            if let Some(path) = &inputs.assets_file {
                let list = fetch::load_assets(path)?;
                let fresh = list.fresh_count(&FetchManifest::load(&list.dest_dir));
                println!(
                    "==> Assets: {} listed, {} up to date in {} (not fetched)",
                    list.assets.len(),
                    fresh,
                    list.dest_dir.display()
                );
            }

            let run = RunReport::new(Some(assembly), edit_report, None);
            finish(&run, None, None)
        }
        Command::Init { fragments_dir, out } => {
            let cfg = load_config()?;
            let registry = FragmentRegistry::load(&fragments_dir)?;
            let slots: Vec<&str> = registry
                .ordered()
                .into_iter()
                .map(|f| f.name.as_str())
                .collect();
            let markup = skeleton::render_skeleton(&cfg.skeleton, &slots, &cfg.assemble);
            let document = Document::new(markup.into_string() + "\n");
            match out {
                Some(path) => {
                    if path.exists() {
                        return Err(format!(
                            "{} already exists; remove it or choose another --out",
                            path.display()
                        )
                        .into());
                    }
                    document.write(&path)?;
                    println!("==> Wrote {} ({} slots)", path.display(), slots.len());
                }
                None => print!("{}", document),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Diagnostics go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_fragments(dir: &Path) -> Result<FragmentRegistry, Box<dyn std::error::Error>> {
    println!("==> Loading fragments from {}", dir.display());
    let registry = FragmentRegistry::load(dir)?;
    output::print_fragments(&registry);
    Ok(registry)
}

fn run_edits(
    document: Document,
    path: &Path,
    registry: Option<&FragmentRegistry>,
) -> Result<(Document, PatchReport), Box<dyn std::error::Error>> {
    println!("==> Applying edits from {}", path.display());
    let edits = edits::load_edits(path, registry)?;
    let (patched, report) = patch::apply_edits(document, &edits);
    output::print_patch_report(&report);
    Ok((patched, report))
}

fn run_fetch(
    path: &Path,
    fetch_config: &config::FetchConfig,
    use_cache: bool,
) -> Result<FetchReport, Box<dyn std::error::Error>> {
    let list = fetch::load_assets(path)?;
    println!(
        "==> Fetching {} assets into {}",
        list.assets.len(),
        list.dest_dir.display()
    );
    let source = fetch::HttpSource::new(fetch_config)?;
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_fetch_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = fetch::fetch_all(&source, &list, fetch_config, use_cache, Some(tx));
    printer
        .join()
        .map_err(|_| "fetch progress printer panicked")?;
    let report = result?;
    output::print_fetch_summary(&report);
    Ok(report)
}

/// Print the verdict, write the JSON report if asked, and map success to
/// the exit code.
fn finish(
    run: &RunReport,
    out: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    output::print_run_summary(run, out);
    if let Some(path) = report_path {
        run.write_json(path)?;
    }
    Ok(if run.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
