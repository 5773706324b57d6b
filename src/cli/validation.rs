use crate::cli::args::{BindOptions, CliArgs, Command};
use crate::loader::RefreshPolicy;
use crate::output::OutputFormat;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.output_format.as_deref() {
        OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid --output-format '{raw}', expected text or json"))?;
    }
    if let Some(bind) = args.command.bind_options() {
        validate_bind(bind)?;
    }
    match &args.command {
        Command::Ingest(ingest) => {
            if let Some(headcount) = ingest.default_headcount {
                if !headcount.is_finite() || headcount < 0.0 {
                    return Err("invalid default-headcount, expected a non-negative number".to_string());
                }
            }
        }
        Command::Patch(patch) => {
            for script in patch.scripts.iter() {
                if script.trim().is_empty() || script.contains(char::is_whitespace) {
                    return Err(format!("invalid --script '{script}'"));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_bind(bind: &BindOptions) -> Result<(), String> {
    if let Some(raw) = bind.refresh.as_deref() {
        RefreshPolicy::parse(raw).ok_or_else(|| {
            format!("invalid --refresh '{raw}', expected always, if-absent or if-stale")
        })?;
    }
    if let Some(decimals) = bind.decimals {
        if decimals != 0 && decimals != 2 {
            return Err("invalid decimals, expected 0 or 2".to_string());
        }
    }
    for (flag, value) in [
        ("--data-key", bind.data_key.as_deref()),
        ("--version-key", bind.version_key.as_deref()),
        ("--global-name", bind.global_name.as_deref()),
    ] {
        if matches!(value, Some(v) if v.trim().is_empty()) {
            return Err(format!("invalid {flag}, expected a non-empty value"));
        }
    }
    Ok(())
}
