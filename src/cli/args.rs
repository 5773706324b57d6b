use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "kpibind",
    version,
    about = "financial KPI dashboard binder",
    long_about = "kpibind caches a KPI dataset in a key/value store and binds the cached values into dashboard pages by element id.\n\nExamples:\n  kpibind run --page index.html --source lidea_db.js\n  kpibind ingest --sheets ./planilhas --out lidea_db.js --cache\n  kpibind render --page index.html --out dist/index.html -A json\n\nTip: Use --config to persist keys and formatting and keep CLI invocations short."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'c',
        long = "clr",
        visible_alias = "color",
        global = true,
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Report format (text or json)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.kpibind/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 's',
        long = "st",
        visible_alias = "store",
        value_name = "FILE",
        global = true,
        help_heading = "Storage",
        help = "Key/value store file (defaults to ~/.kpibind/storage.json)."
    )]
    pub store: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Cache a source dataset in the store.
    Load(LoadArgs),
    /// Bind the cached dataset into a page.
    Render(RenderArgs),
    /// Cache the source (when given), then bind into the page.
    Run(RunArgs),
    /// Build a dataset from exported spreadsheets.
    Ingest(IngestArgs),
    /// Inject the database script into every page below a directory.
    Patch(PatchArgs),
    /// Print the cached snapshot.
    Show(ShowArgs),
    /// Write a commented default config file.
    InitConfig(InitConfigArgs),
}

impl Command {
    pub fn bind_options(&self) -> Option<&BindOptions> {
        match self {
            Self::Load(a) => Some(&a.bind),
            Self::Render(a) => Some(&a.bind),
            Self::Run(a) => Some(&a.bind),
            Self::Show(a) => Some(&a.bind),
            Self::Ingest(a) => Some(&a.bind),
            Self::Patch(_) | Self::InitConfig(_) => None,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct BindOptions {
    #[arg(
        long = "dk",
        visible_alias = "data-key",
        value_name = "KEY",
        help_heading = "Storage",
        help = "Store key holding the dataset snapshot."
    )]
    pub data_key: Option<String>,

    #[arg(
        long = "vk",
        visible_alias = "version-key",
        value_name = "KEY",
        help_heading = "Storage",
        help = "Store key holding the binding table version."
    )]
    pub version_key: Option<String>,

    #[arg(
        short = 'r',
        long = "rp",
        visible_alias = "refresh",
        value_name = "POLICY",
        help_heading = "Storage",
        help = "When the source overwrites the cache (always, if-absent, if-stale)."
    )]
    pub refresh: Option<String>,

    #[arg(
        short = 'd',
        long = "dec",
        visible_alias = "decimals",
        value_name = "N",
        help_heading = "Formatting",
        help = "Currency fraction digits (0 or 2)."
    )]
    pub decimals: Option<u8>,

    #[arg(
        long = "ncl",
        visible_alias = "negative-class",
        value_name = "CLASS",
        help_heading = "Formatting",
        help = "Class added to elements showing a negative value."
    )]
    pub negative_class: Option<String>,

    #[arg(
        short = 'g',
        long = "gn",
        visible_alias = "global-name",
        value_name = "NAME",
        help_heading = "Input",
        help = "Variable declared by database scripts (default LIDEA_DATA)."
    )]
    pub global_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    #[arg(
        short = 'i',
        long = "src",
        visible_alias = "source",
        value_name = "FILE",
        help_heading = "Input",
        help = "Source dataset (.json or database script)."
    )]
    pub source: String,

    #[command(flatten)]
    pub bind: BindOptions,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[arg(
        short = 'p',
        long = "pg",
        visible_alias = "page",
        value_name = "FILE",
        help_heading = "Input",
        help = "HTML page to bind into."
    )]
    pub page: String,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the bound page here instead of in place."
    )]
    pub output: Option<String>,

    #[command(flatten)]
    pub bind: BindOptions,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        short = 'p',
        long = "pg",
        visible_alias = "page",
        value_name = "FILE",
        help_heading = "Input",
        help = "HTML page to bind into."
    )]
    pub page: String,

    #[arg(
        short = 'i',
        long = "src",
        visible_alias = "source",
        value_name = "FILE",
        help_heading = "Input",
        help = "Source dataset; without it the cached snapshot is used."
    )]
    pub source: Option<String>,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the bound page here instead of in place."
    )]
    pub output: Option<String>,

    #[command(flatten)]
    pub bind: BindOptions,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(
        short = 'i',
        long = "sh",
        visible_alias = "sheets",
        value_name = "PATH",
        help_heading = "Input",
        help = "Directory of workbooks (.xlsx, .xls, .ods) or .csv exports, or a single file."
    )]
    pub sheets: String,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Dataset file to write (.js script or .json; default lidea_db.js)."
    )]
    pub output: Option<String>,

    #[arg(
        long = "cache",
        help_heading = "Storage",
        help = "Also cache the extracted dataset in the store."
    )]
    pub cache: bool,

    #[arg(
        short = 'y',
        long = "yk",
        visible_alias = "year-keyword",
        value_name = "TEXT",
        help_heading = "Ingest",
        help = "Header text marking the amount column (default 2025)."
    )]
    pub year_keyword: Option<String>,

    #[arg(
        long = "pt",
        visible_alias = "period-term",
        value_name = "TEXT",
        help_heading = "Ingest",
        help = "Row label of the monthly tax total (default 06-2025)."
    )]
    pub period_term: Option<String>,

    #[arg(
        long = "pl",
        visible_alias = "period-label",
        value_name = "TEXT",
        help_heading = "Ingest",
        help = "Period label stored in the dataset metadata."
    )]
    pub period_label: Option<String>,

    #[arg(
        long = "hc",
        visible_alias = "default-headcount",
        value_name = "N",
        help_heading = "Ingest",
        help = "Headcount used when no personnel sheet matches."
    )]
    pub default_headcount: Option<f64>,

    #[command(flatten)]
    pub bind: BindOptions,
}

#[derive(Args, Debug, Clone)]
pub struct PatchArgs {
    #[arg(
        short = 'D',
        long = "dir",
        visible_alias = "pages",
        value_name = "DIR",
        help_heading = "Input",
        help = "Root directory of the dashboard pages."
    )]
    pub dir: String,

    #[arg(
        short = 'j',
        long = "js",
        visible_alias = "script",
        value_name = "FILE",
        action = ArgAction::Append,
        help_heading = "Input",
        help = "Script to inject, relative to the root (repeatable; default lidea_db.js)."
    )]
    pub scripts: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub bind: BindOptions,
}

#[derive(Args, Debug, Clone)]
pub struct InitConfigArgs {
    #[arg(
        short = 'f',
        long = "force",
        help_heading = "Output",
        help = "Overwrite an existing config file."
    )]
    pub force: bool,
}
