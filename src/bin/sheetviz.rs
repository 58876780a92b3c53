//! CLI for SheetViz - batch image generation from spreadsheet prompts.

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sheetviz::image::ImageProviderKind;
use sheetviz::rows::preview_text;
use sheetviz::{
    read_prompt_rows, run_batch, write_report, BatchConfig, ImageProvider, OutputDir, PromptRow,
    ReportContext,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheetviz")]
#[command(about = "Generate one image per spreadsheet row via Qwen, Wan or Seedream")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "SHEETVIZ_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image for every prompt row
    Run(RunArgs),

    /// Read and list prompt rows without calling any API
    Rows(SourceArgs),

    /// Generate a single image to check credentials and settings
    Smoke(SmokeArgs),

    /// List available providers
    Providers,
}

#[derive(Args)]
struct SourceArgs {
    /// Spreadsheet with one prompt per row
    #[arg(short, long)]
    input: PathBuf,

    /// 0-based column holding the prompts
    #[arg(long)]
    column: Option<usize>,

    /// Treat the first row as data, not a header
    #[arg(long)]
    no_header: bool,

    /// Worksheet name (first sheet by default)
    #[arg(long)]
    sheet: Option<String>,
}

#[derive(Args)]
struct GenerationArgs {
    /// Provider to use
    #[arg(short, long, value_enum)]
    provider: Option<ProviderArg>,

    /// Model id
    #[arg(short, long)]
    model: Option<String>,

    /// Vendor size string (e.g. 1328*1328, 2K)
    #[arg(long)]
    size: Option<String>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    generation: GenerationArgs,

    /// Seconds to wait between rows
    #[arg(long)]
    delay: Option<f64>,

    /// Attempts per row
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[derive(Args)]
struct SmokeArgs {
    /// Prompt to generate
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    prompt: Option<String>,

    /// Spreadsheet whose first prompt row is used
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// 0-based column holding the prompts
    #[arg(long)]
    column: Option<usize>,

    /// Treat the first row as data, not a header
    #[arg(long)]
    no_header: bool,

    #[command(flatten)]
    generation: GenerationArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Qwen,
    Wan,
    Seedream,
}

impl From<ProviderArg> for ImageProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Qwen => ImageProviderKind::Qwen,
            ProviderArg::Wan => ImageProviderKind::Wan,
            ProviderArg::Seedream => ImageProviderKind::Seedream,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so --json output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run(args, config, cli.json).await?,
        Commands::Rows(args) => list_rows(args, config, cli.json)?,
        Commands::Smoke(args) => smoke(args, config, cli.json).await?,
        Commands::Providers => list_providers(cli.json)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BatchConfig> {
    match path {
        Some(path) => Ok(BatchConfig::load(path)?),
        None => Ok(BatchConfig::default()),
    }
}

fn apply_source(config: &mut BatchConfig, column: Option<usize>, no_header: bool) {
    if let Some(column) = column {
        config.column_index = column;
    }
    if no_header {
        config.has_header = false;
    }
}

fn apply_generation(config: &mut BatchConfig, args: GenerationArgs) {
    if let Some(provider) = args.provider {
        config.provider = provider.into();
    }
    if let Some(model) = args.model {
        config.model = Some(model);
    }
    if let Some(size) = args.size {
        config.size = Some(size);
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
}

/// Reads rows, failing on an empty result.
fn read_rows(input: &Path, config: &BatchConfig) -> anyhow::Result<Vec<PromptRow>> {
    let rows = read_prompt_rows(input, &config.row_options())?;
    if rows.is_empty() {
        anyhow::bail!(
            "no prompts found in column {} of {}",
            config.column_index,
            input.display()
        );
    }
    Ok(rows)
}

async fn run(args: RunArgs, mut config: BatchConfig, json_output: bool) -> anyhow::Result<()> {
    apply_source(&mut config, args.source.column, args.source.no_header);
    if let Some(sheet) = args.source.sheet {
        config.sheet = Some(sheet);
    }
    apply_generation(&mut config, args.generation);
    if let Some(delay) = args.delay {
        config.delay_secs = delay;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    config.validate()?;

    // Everything that can reject the input happens before the first request.
    let rows = read_rows(&args.source.input, &config)?;
    let output = OutputDir::create(&config.output_dir).with_context(|| {
        format!("cannot create output directory {}", config.output_dir.display())
    })?;
    let provider = config.build_provider(config.dumper(output.path()))?;

    let report = run_batch(&rows, provider.as_ref(), &config.batch_options()?, &output).await;

    let ctx = ReportContext::new(provider.as_ref(), output.path())
        .with_source(&args.source.input)
        .with_size(config.size.clone());
    let report_path = output.report_path();
    write_report(&report_path, &report, &ctx)?;

    if json_output {
        let result = serde_json::json!({
            "provider": provider.kind().to_string(),
            "model": provider.model(),
            "output_dir": output.path().display().to_string(),
            "report": report_path.display().to_string(),
            "total": report.total,
            "success_count": report.success_count,
            "failed_count": report.failed_count,
            "success_rows": report.success_rows,
            "failed_rows": report.failed_rows,
            "outcomes": report.outcomes,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated {}/{} images via {}",
            report.success_count,
            report.total,
            provider.name()
        );
        println!("Output: {}", output.path().display());
        println!("Report: {}", report_path.display());
        if !report.failed_rows.is_empty() {
            let failed: Vec<String> = report.failed_rows.iter().map(u32::to_string).collect();
            println!("Failed rows: {}", failed.join(", "));
        }
    }

    Ok(())
}

fn list_rows(args: SourceArgs, mut config: BatchConfig, json_output: bool) -> anyhow::Result<()> {
    apply_source(&mut config, args.column, args.no_header);
    if let Some(sheet) = args.sheet {
        config.sheet = Some(sheet);
    }

    let rows = read_rows(&args.input, &config)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{} prompts in {}:\n", rows.len(), args.input.display());
        for row in &rows {
            println!("  row {:>4}: {}", row.row_number, preview_text(&row.text, 60));
        }
    }

    Ok(())
}

async fn smoke(args: SmokeArgs, mut config: BatchConfig, json_output: bool) -> anyhow::Result<()> {
    apply_source(&mut config, args.column, args.no_header);
    apply_generation(&mut config, args.generation);
    config.validate()?;

    let prompt = match (args.prompt, args.input) {
        (Some(prompt), _) => prompt,
        (None, Some(input)) => {
            let rows = read_rows(&input, &config)?;
            rows.into_iter()
                .next()
                .map(|row| row.text)
                .context("no prompts found")?
        }
        (None, None) => anyhow::bail!("either --prompt or --input is required"),
    };

    let output = OutputDir::create(&config.output_dir)?;
    let provider = config.build_provider(config.dumper(&output.path().join("smoke")))?;

    let mut request = config.request_template();
    request.prompt = prompt;

    tracing::info!(
        provider = provider.name(),
        prompt = %preview_text(&request.prompt, 50),
        "smoke test"
    );
    let image = provider.generate(&request).await?;
    let path = output.save_smoke_image(&image)?;

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": path.display().to_string(),
            "size_bytes": image.size(),
            "dimensions": [image.dimensions.0, image.dimensions.1],
            "format": image.format.extension(),
            "provider": image.provider.to_string(),
            "model": image.metadata.model,
            "task_id": image.metadata.task_id,
            "duration_ms": image.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({}x{}, {} bytes) via {}",
            path.display(),
            image.dimensions.0,
            image.dimensions.1,
            image.size(),
            provider.name()
        );
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        kind: String,
        mode: &'static str,
        default_model: &'static str,
        env_var: &'static str,
        enabled: bool,
    }

    let providers = vec![
        ProviderInfo {
            name: "Qwen Image (Alibaba DashScope)",
            kind: ImageProviderKind::Qwen.to_string(),
            mode: "sync",
            default_model: "qwen-image-plus",
            env_var: ImageProviderKind::Qwen.api_key_env_var(),
            enabled: cfg!(feature = "qwen-image"),
        },
        ProviderInfo {
            name: "Wan Text-to-Image (Alibaba DashScope)",
            kind: ImageProviderKind::Wan.to_string(),
            mode: "async",
            default_model: "wan2.5-t2i-preview",
            env_var: ImageProviderKind::Wan.api_key_env_var(),
            enabled: cfg!(feature = "wan-image"),
        },
        ProviderInfo {
            name: "Seedream (Volcengine Ark)",
            kind: ImageProviderKind::Seedream.to_string(),
            mode: "sync",
            default_model: "doubao-seedream-4-0-250828",
            env_var: ImageProviderKind::Seedream.api_key_env_var(),
            enabled: cfg!(feature = "seedream-image"),
        },
    ];

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            let status = if p.enabled { "✓" } else { "✗" };
            println!("  {} {} ({}, {})", status, p.name, p.kind, p.mode);
            println!("    Default model: {}", p.default_model);
            println!("    API key: {}", p.env_var);
        }
    }

    Ok(())
}
