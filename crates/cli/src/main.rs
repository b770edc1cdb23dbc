use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use photo_organiser_core::{
    app_paths, example_substitution, load_config, open_host_location, reset_config,
    sample_metadata, save_config, unknown_placeholders, validate_template, AppConfig,
    OrganiseOptions, Organiser, ProgressEvent, ProgressObserver, RelocationMode,
    RelocationStatus, Substitution,
};
use std::borrow::Cow;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "photo-organiser-cli")]
#[command(about = "写真をメタデータに基づいたフォルダ構成へ移動・コピーします")]
struct Cli {
    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,
    /// 警告以上のみ表示
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Organise(OrganiseArgs),
    Preview(PreviewArgs),
    Config(ConfigArgs),
    Reveal { path: PathBuf },
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Reset,
    AddDir { directory: String },
    RemoveDir { directory: String },
}

#[derive(Debug, Args)]
struct OrganiseArgs {
    #[arg(long = "from")]
    from: Vec<String>,
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    template: Option<String>,
    #[arg(long)]
    min_size: Option<u64>,
    #[arg(long)]
    min_width: Option<u32>,
    #[arg(long)]
    min_height: Option<u32>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// 走査結果を確認してから移動・コピーする
    #[arg(long, default_value_t = false)]
    verify: bool,
    /// 確認プロンプトを省略
    #[arg(long, default_value_t = false)]
    yes: bool,
    /// 保存済み設定を基にし、指定した引数で上書きする
    #[arg(long, default_value_t = false)]
    use_config: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct PreviewArgs {
    #[arg(long)]
    template: String,
    #[arg(long, default_value = "/photos")]
    to: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Move,
    Copy,
}

impl From<ModeArg> for RelocationMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Move => RelocationMode::Move,
            ModeArg::Copy => RelocationMode::Copy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Events,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Organise(args) => cmd_organise(args),
        Commands::Preview(args) => cmd_preview(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Reset => cmd_config_reset(),
            ConfigAction::AddDir { directory } => cmd_config_update(|c| {
                c.add_start_directory(&directory);
            }),
            ConfigAction::RemoveDir { directory } => cmd_config_update(|c| {
                c.remove_start_directory(&directory);
            }),
        },
        Commands::Reveal { path } => open_host_location(&path),
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn build_options(args: &OrganiseArgs) -> Result<OrganiseOptions> {
    let mut config = if args.use_config {
        load_config()?
    } else {
        AppConfig::default()
    };

    if !args.from.is_empty() {
        config.clear_start_directories();
        for dir in &args.from {
            config.add_start_directory(dir);
        }
    }
    if let Some(to) = &args.to {
        config.set_destination_directory(to);
    }
    if let Some(template) = &args.template {
        config.naming_convention = template.clone();
    }
    if let Some(min_size) = args.min_size {
        config.min_size = min_size;
    }
    if let Some(min_width) = args.min_width {
        config.min_width = min_width;
    }
    if let Some(min_height) = args.min_height {
        config.min_height = min_height;
    }
    if let Some(mode) = args.mode {
        config.move_or_copy = mode.into();
    }
    config.verify_results |= args.verify;

    if config.start_directories.is_empty() {
        anyhow::bail!("開始フォルダを --from で指定してください");
    }
    if config.destination_directory.is_empty() {
        anyhow::bail!("移動先フォルダを --to で指定してください");
    }

    validate_template(&config.naming_convention)?;
    for unknown in unknown_placeholders(&config.naming_convention) {
        warn!("未対応のプレースホルダはそのまま残ります: {unknown}");
    }

    Ok(config.to_options())
}

fn cmd_organise(args: OrganiseArgs) -> Result<()> {
    let options = build_options(&args)?;
    let mode = options.mode;
    let verify = options.verify_results;
    let mut organiser = Organiser::new(options);
    let mut observer = TerminalObserver::new(args.output);

    let report = organiser.process_images(&mut observer);
    for missing in &report.scan.missing_directories {
        eprintln!("開始フォルダが見つかりません: {}", missing.display());
    }

    if verify {
        print_plan(args.output, organiser.substitutions())?;
        if organiser.substitutions().is_empty() {
            eprintln!("対象ファイルがありません。");
            return Ok(());
        }
        if !args.yes && !confirm(mode, organiser.substitutions().len())? {
            eprintln!("確認モード: 実ファイルは変更していません。");
            return Ok(());
        }
        let relocation = organiser.verify_relocation(&mut observer);
        eprintln!(
            "完了: 成功 {}件 / 失敗 {}件",
            relocation.relocated, relocation.failed
        );
    } else if let Some(relocation) = report.relocation {
        print_plan(args.output, organiser.substitutions())?;
        eprintln!(
            "完了: 成功 {}件 / 失敗 {}件",
            relocation.relocated, relocation.failed
        );
    }

    Ok(())
}

fn print_plan(output: OutputFormat, substitutions: &[Substitution]) -> Result<()> {
    match output {
        OutputFormat::Table => print_table(substitutions),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(substitutions)?),
        OutputFormat::Events => {}
    }
    Ok(())
}

fn confirm(mode: RelocationMode, count: usize) -> Result<bool> {
    let verb = match mode {
        RelocationMode::Move => "移動",
        RelocationMode::Copy => "コピー",
    };
    eprint!("{count}件のファイルを{verb}しますか? [y/N] ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn cmd_preview(args: PreviewArgs) -> Result<()> {
    validate_template(&args.template)?;
    for unknown in unknown_placeholders(&args.template) {
        warn!("未対応のプレースホルダはそのまま残ります: {unknown}");
    }

    let root = args.to.trim_end_matches('/');
    for sample in sample_metadata(&args.to) {
        let example = example_substitution(&args.template, &sample.metadata, sample.description);
        println!("{}: {}/{}", example.description, root, example.path);
    }
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_reset() -> Result<()> {
    reset_config()?;
    info!("設定を初期化しました");
    Ok(())
}

fn cmd_config_update(update: impl FnOnce(&mut AppConfig)) -> Result<()> {
    let mut config = load_config()?;
    update(&mut config);
    save_config(&config)?;
    for dir in &config.start_directories {
        println!("{dir}");
    }
    Ok(())
}

fn print_table(substitutions: &[Substitution]) {
    println!("元ファイル -> 移動先 (状態)");
    for sub in substitutions {
        let state = if sub.relocated { "済" } else { "未" };
        println!("{} -> {} ({state})", sub.from, sub.destination());
    }
}

struct TerminalObserver {
    output: OutputFormat,
}

impl TerminalObserver {
    fn new(output: OutputFormat) -> Self {
        Self { output }
    }

    fn emit(&self, event: ProgressEvent<'_>) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!("イベントを出力できませんでした: {err}"),
        }
    }
}

impl ProgressObserver for TerminalObserver {
    fn on_file_found(&mut self, found: &[Substitution]) {
        if self.output == OutputFormat::Events {
            self.emit(ProgressEvent::FindingFiles {
                files: Cow::Borrowed(found),
            });
        } else if found.len() % 100 == 0 {
            eprintln!("走査中: {}件", found.len());
        }
    }

    fn on_scan_complete(&mut self, total: usize) {
        if self.output == OutputFormat::Events {
            self.emit(ProgressEvent::FindingComplete { total });
        } else {
            eprintln!("走査完了: {total}件");
        }
    }

    fn on_relocating(&mut self, status: &RelocationStatus<'_>) {
        if self.output == OutputFormat::Events {
            self.emit(ProgressEvent::RelocatingFiles(status.clone()));
        } else if status.total_relocated % 100 == 0 {
            eprintln!(
                "処理中: {}/{}",
                status.total_relocated, status.total_substitutions
            );
        }
    }

    fn on_relocation_complete(&mut self) {
        if self.output == OutputFormat::Events {
            self.emit(ProgressEvent::RelocatingComplete);
        }
    }
}
