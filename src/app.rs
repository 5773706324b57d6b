use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{info, warn, Level};
use serde_json::json;

use crate::cli::args::{
    BindOptions, CliArgs, Command, IngestArgs, InitConfigArgs, LoadArgs, PatchArgs, RenderArgs,
    RunArgs, ShowArgs,
};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::dataset::script::DEFAULT_GLOBAL_NAME;
use crate::dataset::source::load_source;
use crate::dataset::Dataset;
use crate::ingest::{self, IngestOptions};
use crate::loader::{CacheWrite, RefreshPolicy};
use crate::logging;
use crate::output::{self, OutputFormat};
use crate::page::HtmlPage;
use crate::publish::{self, DEFAULT_SCRIPT_NAME};
use crate::render::RenderOutcome;
use crate::runner::{self, Runner};
use crate::store::FileStore;

fn render_custom_help(cmd: &clap::Command, usage_name: &str) -> String {
    let mut out = String::new();

    if let Some(version) = cmd.get_version() {
        out.push_str(cmd.get_name());
        out.push(' ');
        out.push_str(version);
        out.push('\n');
    } else {
        out.push_str(usage_name);
        out.push('\n');
    }

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }

    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push('\n');
    out.push_str("Usage: ");
    out.push_str(usage_name);
    out.push_str(" [OPTIONS]");
    if cmd.has_subcommands() {
        out.push_str(" <COMMAND>");
    }
    out.push_str("\n\n");

    let subcommands: Vec<&clap::Command> = cmd
        .get_subcommands()
        .filter(|sub| !sub.is_hide_set() && sub.get_name() != "help")
        .collect();
    if !subcommands.is_empty() {
        let width = subcommands
            .iter()
            .map(|sub| sub.get_name().len())
            .max()
            .unwrap_or(0);
        out.push_str("Commands:\n");
        for sub in subcommands {
            let about = sub.get_about().map(|a| a.to_string()).unwrap_or_default();
            out.push_str(&format!("  {:<width$}  {}\n", sub.get_name(), about.trim()));
        }
        out.push('\n');
    }

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();

    for arg in cmd.get_arguments() {
        if arg.is_hide_set() {
            continue;
        }

        let heading = arg.get_help_heading().unwrap_or("Options").to_string();

        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                let i = sections.len() - 1;
                section_idx.insert(heading, i);
                i
            }
        };

        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");

        for arg in args {
            let mut parts: Vec<String> = Vec::new();

            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }

            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }

            if let Some(aliases) = arg.get_visible_aliases() {
                for alias in aliases {
                    let rendered = format!("--{alias}");
                    if !parts.iter().any(|p| p == &rendered) {
                        parts.push(rendered);
                    }
                }
            }

            let mut flags = parts.join(", ");

            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                let placeholder = format!("<{value_name}>");
                let min_values = arg.get_num_args().map(|r| r.min_values()).unwrap_or(1);

                if min_values == 0 {
                    flags.push_str(&format!(" [{placeholder}]"));
                } else {
                    flags.push(' ');
                    flags.push_str(&placeholder);
                }
            }

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');

            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }

            out.push('\n');
        }
    }

    out
}

/// Help for the subcommand named on the command line, or for the root.
fn help_for_invocation() -> String {
    let mut cmd = CliArgs::command();
    cmd.build();
    let name = cmd.get_name().to_string();
    let sub = std::env::args()
        .skip(1)
        .filter(|a| a != "help")
        .find_map(|a| cmd.find_subcommand(&a).cloned());
    match sub {
        Some(sub) => render_custom_help(&sub, &format!("{name} {}", sub.get_name())),
        None => render_custom_help(&cmd, &name),
    }
}

#[derive(Clone, Debug)]
struct Settings {
    store_path: Option<PathBuf>,
    output_format: OutputFormat,
    global_name: String,
    options: runner::Options,
}

fn build_settings(args: &CliArgs, cfg: &ConfigFile) -> Result<Settings, String> {
    validation::validate(args)?;

    let no_flags = BindOptions::default();
    let bind = args.command.bind_options().unwrap_or(&no_flags);

    let output_format_raw = args
        .output_format
        .clone()
        .or_else(|| cfg.output_format.clone())
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&output_format_raw).ok_or_else(|| {
        format!("invalid output_format '{output_format_raw}', expected text or json")
    })?;

    let store_path = match args.store.as_deref().or(cfg.store.as_deref()) {
        Some(path) => Some(config::expand_tilde(path)),
        None => config::default_store_path(),
    };

    let refresh = match bind.refresh.as_deref().or(cfg.refresh_policy.as_deref()) {
        Some(raw) => RefreshPolicy::parse(raw).ok_or_else(|| {
            format!("invalid refresh policy '{raw}', expected always, if-absent or if-stale")
        })?,
        None => RefreshPolicy::default(),
    };

    let defaults = runner::Options::default();
    let options = runner::Options {
        data_key: bind
            .data_key
            .clone()
            .or_else(|| cfg.data_key.clone())
            .unwrap_or(defaults.data_key),
        version_key: bind
            .version_key
            .clone()
            .or_else(|| cfg.version_key.clone())
            .unwrap_or(defaults.version_key),
        version: cfg.version.clone().unwrap_or(defaults.version),
        refresh,
        decimals: bind.decimals.or(cfg.decimals).unwrap_or(defaults.decimals),
        negative_class: bind
            .negative_class
            .clone()
            .or_else(|| cfg.negative_class.clone())
            .unwrap_or(defaults.negative_class),
        neutral_markers: cfg
            .neutral_markers
            .clone()
            .unwrap_or(defaults.neutral_markers),
        extra_bindings: cfg.extra_bindings()?,
    };

    let global_name = bind
        .global_name
        .clone()
        .or_else(|| cfg.global_name.clone())
        .unwrap_or_else(|| DEFAULT_GLOBAL_NAME.to_string());

    Ok(Settings {
        store_path,
        output_format,
        global_name,
        options,
    })
}

fn build_runner(settings: &Settings) -> Result<Runner, String> {
    Runner::new(settings.options.clone()).map_err(|e| format!("invalid settings: {e}"))
}

fn open_store(settings: &Settings) -> Result<FileStore, String> {
    let path = settings
        .store_path
        .as_ref()
        .ok_or_else(|| "could not determine home directory, pass --store".to_string())?;
    FileStore::open(path).map_err(|e| e.to_string())
}

fn emit(bytes: Vec<u8>) -> Result<(), String> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(&bytes)
        .and_then(|_| stdout.flush())
        .map_err(|e| format!("failed to write output: {e}"))
}

fn read_page(path: &Path) -> Result<HtmlPage, String> {
    std::fs::read_to_string(path)
        .map(HtmlPage::new)
        .map_err(|e| format!("failed to read page '{}': {e}", path.display()))
}

fn write_page(path: &Path, html: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                format!("failed to create directory '{}': {e}", parent.display())
            })?;
        }
    }
    std::fs::write(path, html).map_err(|e| format!("failed to write page '{}': {e}", path.display()))
}

/// Writes the page (in place only when something was bound) and prints
/// the report.
fn finish_page(
    page: HtmlPage,
    page_path: &Path,
    output: Option<&str>,
    cache: Option<CacheWrite>,
    outcome: &RenderOutcome,
    settings: &Settings,
) -> Result<(), String> {
    let target = output
        .map(config::expand_tilde)
        .unwrap_or_else(|| page_path.to_path_buf());
    if outcome.report().is_some() || target != page_path {
        write_page(&target, page.as_str())?;
    }
    let record = output::build_page_record(&target.display().to_string(), cache, outcome);
    emit(output::render_page(settings.output_format, &record))
}

fn cmd_load(args: &LoadArgs, settings: &Settings) -> Result<(), String> {
    let runner = build_runner(settings)?;
    let source = config::expand_tilde(&args.source);
    let dataset = load_source(&source, &settings.global_name).map_err(|e| e.to_string())?;
    let mut store = open_store(settings)?;
    let write = runner
        .loader()
        .refresh(&mut store, Some(&dataset))
        .map_err(|e| format!("failed to cache dataset: {e}"))?;
    let loader = runner.loader();
    emit(output::render_summary(
        settings.output_format,
        &[
            ("store", json!(store.path().display().to_string())),
            ("key", json!(loader.data_key)),
            ("version", json!(loader.version)),
            ("policy", json!(loader.policy.label())),
            ("cache", json!(write.label())),
        ],
    ))
}

fn cmd_render(args: &RenderArgs, settings: &Settings) -> Result<(), String> {
    let runner = build_runner(settings)?;
    let store = open_store(settings)?;
    let page_path = config::expand_tilde(&args.page);
    let mut page = read_page(&page_path)?;
    let outcome = runner.render_cached(&store, &mut page, None);
    finish_page(
        page,
        &page_path,
        args.output.as_deref(),
        None,
        &outcome,
        settings,
    )
}

/// A source path that does not exist is treated like a missing dataset
/// file: warn and fall back to the cache.
fn read_optional_source(path: Option<&str>, global_name: &str) -> Result<Option<Dataset>, String> {
    let Some(path) = path else {
        return Ok(None);
    };
    let path = config::expand_tilde(path);
    if !path.exists() {
        warn!("source '{}' not found", path.display());
        return Ok(None);
    }
    load_source(&path, global_name)
        .map(Some)
        .map_err(|e| e.to_string())
}

fn cmd_run(args: &RunArgs, settings: &Settings) -> Result<(), String> {
    let runner = build_runner(settings)?;
    let source = read_optional_source(args.source.as_deref(), &settings.global_name)?;
    let mut store = open_store(settings)?;
    let page_path = config::expand_tilde(&args.page);
    let mut page = read_page(&page_path)?;
    let report = runner.page_load(&mut store, source.as_ref(), &mut page, None);
    finish_page(
        page,
        &page_path,
        args.output.as_deref(),
        Some(report.cache),
        &report.outcome,
        settings,
    )
}

fn ingest_options(args: &IngestArgs, cfg: &ConfigFile) -> IngestOptions {
    let defaults = IngestOptions::default();
    IngestOptions {
        year_keyword: args
            .year_keyword
            .clone()
            .or_else(|| cfg.year_keyword.clone())
            .unwrap_or(defaults.year_keyword),
        period_term: args
            .period_term
            .clone()
            .or_else(|| cfg.period_term.clone())
            .unwrap_or(defaults.period_term),
        period_label: args
            .period_label
            .clone()
            .or_else(|| cfg.period_label.clone())
            .unwrap_or(defaults.period_label),
        default_headcount: args.default_headcount.or(cfg.default_headcount),
    }
}

fn cmd_ingest(args: &IngestArgs, cfg: &ConfigFile, settings: &Settings) -> Result<(), String> {
    let runner = build_runner(settings)?;
    let options = ingest_options(args, cfg);
    let files = ingest::list_sheet_files(&config::expand_tilde(&args.sheets))
        .map_err(|e| e.to_string())?;

    let pb = ProgressBar::new(files.len() as u64);
    if settings.output_format == OutputFormat::Json {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_draw_target(ProgressDrawTarget::stderr());
    }
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(":: Sheets: [{pos}/{len}] :: Duration: [{elapsed_precise}] :: {msg}")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?
            .progress_chars(r#"#>-"#),
    );

    let mut sheets = Vec::new();
    for file in files.iter() {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        pb.set_message(name);
        sheets.extend(ingest::read_sheet_file(file).map_err(|e| e.to_string())?);
        pb.inc(1);
    }

    let extraction = ingest::extract_dataset(&sheets, &options);
    for line in extraction.log.iter() {
        pb.println(format!("{} {line}", logging::level_tag(Level::Info)));
    }
    pb.finish_and_clear();

    let output_path = config::expand_tilde(args.output.as_deref().unwrap_or(DEFAULT_SCRIPT_NAME));
    publish::write_dataset(&output_path, &extraction.dataset, &settings.global_name)
        .map_err(|e| e.to_string())?;

    let cache = if args.cache {
        let mut store = open_store(settings)?;
        let write = runner
            .loader()
            .refresh(&mut store, Some(&extraction.dataset))
            .map_err(|e| format!("failed to cache dataset: {e}"))?;
        Some(write.label())
    } else {
        None
    };

    let revenue = extraction
        .dataset
        .summary()
        .ok()
        .and_then(|s| s.gross_revenue);
    emit(output::render_summary(
        settings.output_format,
        &[
            ("files", json!(files.len())),
            ("sheets", json!(sheets.len())),
            ("matched", json!(extraction.matched_sheets)),
            ("revenue", json!(runner.renderer().currency.money(revenue))),
            ("output", json!(output_path.display().to_string())),
            ("cache", json!(cache)),
        ],
    ))
}

fn cmd_patch(args: &PatchArgs, settings: &Settings) -> Result<(), String> {
    let root = config::expand_tilde(&args.dir);
    let scripts = if args.scripts.is_empty() {
        vec![DEFAULT_SCRIPT_NAME.to_string()]
    } else {
        args.scripts.clone()
    };
    let summary = publish::patch_pages(&root, &scripts).map_err(|e| e.to_string())?;
    let patched: Vec<String> = summary
        .patched
        .iter()
        .map(|p| {
            p.strip_prefix(&root)
                .unwrap_or(p.as_path())
                .display()
                .to_string()
        })
        .collect();
    if patched.is_empty() {
        info!("all {} pages already reference {}", summary.scanned, scripts.join(", "));
    }
    emit(output::render_summary(
        settings.output_format,
        &[
            ("root", json!(root.display().to_string())),
            ("scanned", json!(summary.scanned)),
            ("patched", json!(patched)),
        ],
    ))
}

fn cmd_show(_args: &ShowArgs, settings: &Settings) -> Result<(), String> {
    let runner = build_runner(settings)?;
    let store = open_store(settings)?;
    let loader = runner.loader();
    let dataset = loader.read_cached(&store).map_err(|e| e.to_string())?;
    let version = loader.cached_version(&store).map_err(|e| e.to_string())?;
    if dataset.is_none() {
        warn!("nothing cached under '{}'", loader.data_key);
    }
    let meta = dataset.as_ref().and_then(|d| d.meta_info.clone()).unwrap_or_default();
    let mut pairs = vec![
        ("store", json!(store.path().display().to_string())),
        ("key", json!(loader.data_key)),
        ("version", json!(version)),
        ("period", json!(meta.period)),
        ("updated", json!(meta.updated_at)),
    ];
    if settings.output_format == OutputFormat::Json {
        pairs.push(("dataset", json!(dataset.as_ref().map(Dataset::to_json_value))));
    } else if let Some(dataset) = dataset.as_ref() {
        let currency = &runner.renderer().currency;
        let summary = dataset.summary().ok();
        pairs.push((
            "revenue",
            json!(currency.money(summary.and_then(|s| s.gross_revenue))),
        ));
        pairs.push((
            "net",
            json!(currency.money(summary.and_then(|s| s.net_revenue_or_derived()))),
        ));
    }
    emit(output::render_summary(settings.output_format, &pairs))
}

fn cmd_init_config(args: &InitConfigArgs, cli: &CliArgs, settings: &Settings) -> Result<(), String> {
    let path = match cli.config.as_deref() {
        Some(path) => config::expand_tilde(path),
        None => config::default_config_path()
            .ok_or_else(|| "could not determine home directory, pass --config".to_string())?,
    };
    if args.force && path.exists() {
        std::fs::remove_file(&path)
            .map_err(|e| format!("failed to replace config '{}': {e}", path.display()))?;
    }
    let written = config::ensure_default_config_file(&path)?;
    if !written {
        warn!(
            "config already exists at '{}', use --force to overwrite",
            path.display()
        );
    }
    emit(output::render_summary(
        settings.output_format,
        &[
            ("config", json!(path.display().to_string())),
            ("written", json!(written)),
        ],
    ))
}

fn load_user_config(args: &CliArgs) -> Result<ConfigFile, String> {
    if matches!(args.command, Command::InitConfig(_)) {
        return Ok(ConfigFile::default());
    }
    match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false),
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true),
            None => Ok(ConfigFile::default()),
        },
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                print!("{}", help_for_invocation());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = load_user_config(&args)?;
    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };
    logging::init(args.verbose, no_color);

    let settings = build_settings(&args, &cfg)?;
    match &args.command {
        Command::Load(a) => cmd_load(a, &settings),
        Command::Render(a) => cmd_render(a, &settings),
        Command::Run(a) => cmd_run(a, &settings),
        Command::Ingest(a) => cmd_ingest(a, &cfg, &settings),
        Command::Patch(a) => cmd_patch(a, &settings),
        Command::Show(a) => cmd_show(a, &settings),
        Command::InitConfig(a) => cmd_init_config(a, &args, &settings),
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn flags_override_config() {
        let args = CliArgs::parse_from([
            "kpibind",
            "render",
            "--page",
            "index.html",
            "--decimals",
            "2",
            "--data-key",
            "cli_key",
        ]);
        let cfg = ConfigFile {
            data_key: Some("cfg_key".to_string()),
            version_key: Some("cfg_version".to_string()),
            decimals: Some(0),
            refresh_policy: Some("if-stale".to_string()),
            ..Default::default()
        };
        let settings = build_settings(&args, &cfg).unwrap();
        assert_eq!(settings.options.data_key, "cli_key");
        assert_eq!(settings.options.version_key, "cfg_version");
        assert_eq!(settings.options.decimals, 2);
        assert_eq!(settings.options.refresh, RefreshPolicy::IfStale);
        assert_eq!(settings.output_format, OutputFormat::Text);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = CliArgs::parse_from([
            "kpibind",
            "show",
            "--store",
            "/tmp/kv.json",
            "--output-format",
            "json",
        ]);
        let settings = build_settings(&args, &ConfigFile::default()).unwrap();
        assert_eq!(settings.store_path, Some(PathBuf::from("/tmp/kv.json")));
        assert_eq!(settings.output_format, OutputFormat::Json);
    }

    #[test]
    fn rejects_bad_values() {
        let args = CliArgs::parse_from(["kpibind", "run", "--page", "p.html", "--refresh", "weekly"]);
        assert!(build_settings(&args, &ConfigFile::default())
            .unwrap_err()
            .contains("invalid --refresh"));

        let args = CliArgs::parse_from(["kpibind", "show"]);
        let cfg = ConfigFile {
            output_format: Some("xml".to_string()),
            ..Default::default()
        };
        assert!(build_settings(&args, &cfg).is_err());
    }

    #[test]
    fn help_lists_subcommands() {
        let mut cmd = CliArgs::command();
        cmd.build();
        let help = render_custom_help(&cmd, "kpibind");
        assert!(help.contains("Usage: kpibind [OPTIONS] <COMMAND>"));
        assert!(help.contains("  init-config"));
        assert!(help.contains("--store"));
    }
}
