use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Args, Subcommand, ValueEnum};
use sprintlens_core::config::{
    EffectiveConfig, PROJECT_CONFIG_PATH, normalize_output_mode, user_config_path,
};
use sprintlens_core::metrics::BurndownMetric;
use sprintlens_core::model::StateBucket;
use std::path::{Path, PathBuf};
use toml::Value;

use crate::cmd::Context;
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show resolved or raw configuration
    Show(ShowArgs),
    /// Set a configuration key in project or user scope
    Set(SetArgs),
    /// Unset a configuration key in project or user scope
    Unset(UnsetArgs),
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Show raw project config only
    #[arg(long, conflicts_with = "user")]
    project: bool,

    /// Show raw user config only
    #[arg(long)]
    user: bool,
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Scope to mutate
    #[arg(long, default_value = "project")]
    scope: ConfigScope,

    /// Dot path key (e.g. burndown.metric, user.output)
    key: String,

    /// New value
    value: String,
}

#[derive(Args, Debug)]
struct UnsetArgs {
    /// Scope to mutate
    #[arg(long, default_value = "project")]
    scope: ConfigScope,

    /// Dot path key (e.g. burndown.metric, user.output)
    key: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum ConfigScope {
    Project,
    User,
}

impl ConfigArgs {
    /// Whether the subcommand works on raw config files only, so it must not
    /// depend on those files deserializing into a valid configuration.
    pub const fn works_on_raw_files(&self) -> bool {
        match &self.command {
            ConfigCommand::Show(show) => show.project || show.user,
            ConfigCommand::Set(_) | ConfigCommand::Unset(_) => true,
        }
    }
}

/// Execute `slens config` against the resolved configuration.
pub fn run_config(args: &ConfigArgs, ctx: &Context) -> Result<()> {
    match &args.command {
        ConfigCommand::Show(show) if !show.project && !show.user => {
            print_effective(&ctx.config, ctx.output)
        }
        _ => run_config_raw(args, &ctx.project_root, ctx.output),
    }
}

/// Execute the `slens config` subcommands that only touch raw files.
pub fn run_config_raw(args: &ConfigArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    match &args.command {
        ConfigCommand::Show(show) => run_show_raw(show, project_root, output),
        ConfigCommand::Set(set) => run_set(set, project_root, output),
        ConfigCommand::Unset(unset) => run_unset(unset, project_root, output),
    }
}

fn run_show_raw(args: &ShowArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let path = if args.user {
        require_user_config_path()?
    } else if args.project {
        project_config_path(project_root)
    } else {
        bail!("config show needs --project or --user to read a raw file");
    };
    let value = load_toml_table(&path)?;
    print_toml_or_json(&value, output)
}

fn run_set(args: &SetArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let path = scope_path(args.scope, project_root)?;
    let mut value = load_toml_table(&path)?;
    apply_set(&mut value, args.scope, &args.key, &args.value)?;
    write_toml_table(&path, &value)?;
    render_mutation(output, "set", scope_label(args.scope), &args.key)?;
    Ok(())
}

fn run_unset(args: &UnsetArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let path = scope_path(args.scope, project_root)?;
    let mut value = load_toml_table(&path)?;
    apply_unset(&mut value, args.scope, &args.key)?;
    write_toml_table(&path, &value)?;
    render_mutation(output, "unset", scope_label(args.scope), &args.key)?;
    Ok(())
}

fn scope_path(scope: ConfigScope, project_root: &Path) -> Result<PathBuf> {
    match scope {
        ConfigScope::Project => Ok(project_config_path(project_root)),
        ConfigScope::User => require_user_config_path(),
    }
}

fn apply_set(root: &mut Value, scope: ConfigScope, key: &str, raw: &str) -> Result<()> {
    let parsed = parse_value(scope, key, raw)?;
    let (section, leaf) = split_known_key(scope, key)?;

    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    // User settings live at the top level of the user file.
    if scope == ConfigScope::User {
        table.insert(leaf.to_string(), parsed);
        return Ok(());
    }

    let section_entry = table
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(toml::map::Map::new()));

    let section_table = section_entry
        .as_table_mut()
        .ok_or_else(|| anyhow!("Section {section} must be a TOML table"))?;

    section_table.insert(leaf.to_string(), parsed);
    Ok(())
}

fn apply_unset(root: &mut Value, scope: ConfigScope, key: &str) -> Result<()> {
    let (section, leaf) = split_known_key(scope, key)?;
    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    if scope == ConfigScope::User {
        table.remove(leaf);
        return Ok(());
    }

    if let Some(section_entry) = table.get_mut(section)
        && let Some(section_table) = section_entry.as_table_mut()
    {
        section_table.remove(leaf);
        if section_table.is_empty() {
            table.remove(section);
        }
    }

    Ok(())
}

fn split_known_key(scope: ConfigScope, key: &str) -> Result<(&str, &str)> {
    let (section, leaf) = key
        .split_once('.')
        .ok_or_else(|| anyhow!("Key must use section.key format"))?;

    let valid = match scope {
        ConfigScope::Project => matches!(
            (section, leaf),
            ("burndown", "metric")
                | ("calendar", "exclude_weekends")
                | ("calendar", "utc_offset_minutes")
                | ("classification", "fallback")
        ),
        ConfigScope::User => matches!((section, leaf), ("user", "output")),
    };

    if valid {
        Ok((section, leaf))
    } else {
        bail!("Unsupported key `{key}` for {} scope", scope_label(scope));
    }
}

fn parse_value(scope: ConfigScope, key: &str, raw: &str) -> Result<Value> {
    let (section, leaf) = split_known_key(scope, key)?;

    match (section, leaf) {
        ("user", "output") => {
            let mode = normalize_output_mode(raw)
                .ok_or_else(|| anyhow!("{key} expects pretty, text or json"))?;
            Ok(Value::String(mode.to_string()))
        }
        ("burndown", "metric") => {
            let metric: BurndownMetric = raw.parse()?;
            Ok(Value::String(metric.as_str().to_string()))
        }
        ("classification", "fallback") => {
            let bucket: StateBucket = raw.parse()?;
            Ok(Value::String(bucket.as_str().to_string()))
        }
        ("calendar", "utc_offset_minutes") => {
            let minutes: i64 = raw
                .parse()
                .with_context(|| format!("{key} expects a whole number of minutes"))?;
            if minutes.abs() >= 24 * 60 {
                bail!("{key} must be within one day of UTC");
            }
            Ok(Value::Integer(minutes))
        }
        _ => {
            let value: bool = raw
                .parse()
                .with_context(|| format!("{key} expects true or false"))?;
            Ok(Value::Boolean(value))
        }
    }
}

fn load_toml_table(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Table(toml::map::Map::new()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    if !value.is_table() {
        bail!("{} must contain a top-level TOML table", path.display());
    }

    Ok(value)
}

fn write_toml_table(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let serialized = toml::to_string_pretty(value)?;
    std::fs::write(path, serialized).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_toml_or_json(value: &Value, output: OutputMode) -> Result<()> {
    println!("{}", raw_config_text(value, output)?);
    Ok(())
}

fn raw_config_text(value: &Value, output: OutputMode) -> Result<String> {
    Ok(match output {
        OutputMode::Json => serde_json::to_string_pretty(value)?,
        OutputMode::Text | OutputMode::Pretty => toml::to_string_pretty(value)
            .context("Failed to render config as TOML")?
            .trim_end()
            .to_string(),
    })
}

fn print_effective(value: &EffectiveConfig, output: OutputMode) -> Result<()> {
    let metrics = &value.metrics;
    let source = value
        .source
        .as_ref()
        .map_or_else(|| "(defaults)".to_string(), |path| path.display().to_string());
    let holidays = metrics
        .calendar
        .holidays
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    match output {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputMode::Text => {
            println!("source={source}");
            println!("burndown.metric={}", metrics.burndown.metric);
            println!("cycle_time.start={}", metrics.cycle_time.start);
            println!("cycle_time.end={}", metrics.cycle_time.end);
            println!(
                "calendar.exclude_weekends={}",
                metrics.calendar.exclude_weekends
            );
            println!("calendar.holidays={holidays}");
            println!(
                "calendar.utc_offset_minutes={}",
                metrics.calendar.utc_offset_minutes
            );
            if let Some(fallback) = metrics.classification.fallback {
                println!("classification.fallback={fallback}");
            }
            for (status, bucket) in &metrics.classification.statuses {
                println!("classification.statuses.{status}={bucket}");
            }
            if let Some(out) = &value.user.output {
                println!("user.output={out}");
            }
        }
        OutputMode::Pretty => {
            println!("# source: {source}");
            println!();
            println!("{}", toml::to_string_pretty(metrics)?.trim_end());
            println!();
            println!("[user]");
            if let Some(out) = &value.user.output {
                println!("output = \"{out}\"");
            }
        }
    }

    Ok(())
}

fn render_mutation(output: OutputMode, action: &str, scope: &str, key: &str) -> Result<()> {
    match output {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "ok": true,
                    "action": action,
                    "scope": scope,
                    "key": key,
                }))?
            );
        }
        OutputMode::Text => {
            println!("ok=true action={action} scope={scope} key={key}");
        }
        OutputMode::Pretty => {
            println!("{} {} in {} config", action_to_title(action), key, scope);
        }
    }
    Ok(())
}

fn action_to_title(action: &str) -> &'static str {
    match action {
        "set" => "Set",
        "unset" => "Unset",
        _ => "Updated",
    }
}

fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_PATH)
}

fn require_user_config_path() -> Result<PathBuf> {
    user_config_path().ok_or_else(|| anyhow!("Unable to resolve user config directory"))
}

const fn scope_label(scope: ConfigScope) -> &'static str {
    match scope {
        ConfigScope::Project => "project",
        ConfigScope::User => "user",
    }
}
