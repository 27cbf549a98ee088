//! Command handlers
//!
//! Each handler works directly on the JSON record store under the
//! configured data directory. The daemon reads the same records, so edits
//! made here are picked up on its next tick.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use super::{
    Cli, Commands, ConfigAction, DaemonAction, FeatureAction, FeatureAddArgs, ForeignAction,
    LogAction, LogKindFilter, StateAction, StateAddArgs, StateEditArgs, ValidateArgs,
};
use crate::compliance::tag_matcher::validate_tags;
use crate::daemon::config::DaemonConfiguration;
use crate::models::{ComplianceFeature, ForeignResource, LogKind, TrackedState, ValidationLogEntry};
use crate::monitor::validation::validate_content;
use crate::output;
use crate::store::{JsonStore, RecordStore};
use crate::tooling::ToolInvoker;

/// Process exit code for a validation that ran but found failing features
pub const EXIT_COMPLIANCE_FAILED: i32 = 1;

struct CommandContext {
    config: DaemonConfiguration,
    config_path: Option<PathBuf>,
    json: bool,
}

impl CommandContext {
    fn store(&self) -> Result<JsonStore> {
        let data_dir = self
            .config
            .ensure_directories()
            .context("Failed to prepare the data directory")?;
        Ok(JsonStore::new(data_dir))
    }
}

/// Execute a parsed command line, returning the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    let config = DaemonConfiguration::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let ctx = CommandContext {
        config,
        config_path: cli.config,
        json: cli.json,
    };

    match cli.command {
        Commands::Daemon { action: DaemonAction::Run } => {
            crate::daemon::run_daemon(ctx.config.clone(), ctx.config_path.as_deref()).await?;
            Ok(0)
        }
        Commands::State { action } => state_command(&ctx, action).await.map(|_| 0),
        Commands::Feature { action } => feature_command(&ctx, action).await.map(|_| 0),
        Commands::Log { action } => log_command(&ctx, action).await.map(|_| 0),
        Commands::Foreign { action } => foreign_command(&ctx, action).await.map(|_| 0),
        Commands::Validate(args) => validate_command(&ctx, args).await,
        Commands::Config { action } => config_command(&ctx, action).map(|_| 0),
    }
}

async fn state_command(ctx: &CommandContext, action: StateAction) -> Result<()> {
    let store = ctx.store()?;

    match action {
        StateAction::Add(StateAddArgs { bucket, path, account, tags }) => {
            validate_tags(&tags)?;
            let state = TrackedState::new(&account, &bucket, &path, tags);
            store.save(&state).await?;
            print_created(ctx, &state.id, &state)?;
        }
        StateAction::List => {
            let states = store.load_all_lossy::<TrackedState>().await?;
            if ctx.json {
                output::print_json(&states)?;
            } else if states.is_empty() {
                println!("No tracked states.");
            } else {
                for state in &states {
                    println!("{}", output::format_state_line(state));
                }
            }
        }
        StateAction::Show { id } => {
            let state: TrackedState = store.require(&id).await?;
            if ctx.json {
                output::print_json(&state)?;
            } else {
                print!("{}", output::format_state_details(&state));
            }
        }
        StateAction::Edit(StateEditArgs { id, bucket, path, account, tags, clear_tags }) => {
            let mut state: TrackedState = store.require(&id).await?;
            let moved = bucket.is_some() || path.is_some();
            if let Some(bucket) = bucket {
                state.bucket = bucket;
            }
            if let Some(path) = path {
                state.path = path;
            }
            if let Some(account) = account {
                state.account = account;
            }
            if clear_tags {
                state.tags.clear();
            } else if !tags.is_empty() {
                validate_tags(&tags)?;
                state.tags = tags;
            }
            // A new location is a different object; fetch it unconditionally
            if moved {
                state.last_modification.clear();
                state.force_recheck = true;
            }
            store.save(&state).await?;
            print_updated(ctx, &state, output::format_state_line(&state))?;
        }
        StateAction::Remove { id } => {
            remove_record::<TrackedState>(ctx, &store, &id, "state").await?;
        }
        StateAction::Force { id } => {
            let mut state: TrackedState = store.require(&id).await?;
            state.force_recheck = true;
            store.save(&state).await?;
            print_updated(ctx, &state, format!("State {} will be rechecked on the next tick", state.location()))?;
        }
    }
    Ok(())
}

async fn feature_command(ctx: &CommandContext, action: FeatureAction) -> Result<()> {
    let store = ctx.store()?;

    match action {
        FeatureAction::Add(FeatureAddArgs { name, file, tags, replace }) => {
            if !ComplianceFeature::is_valid_name(&name) {
                bail!("Invalid feature name '{}': use letters, digits, '_', '-' and '.', not starting with '.'", name);
            }
            validate_tags(&tags)?;
            if !replace && store.load::<ComplianceFeature>(&name).await?.is_some() {
                bail!("Feature '{}' already exists (use --replace to overwrite)", name);
            }
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read feature file {}", file.display()))?;

            let feature = ComplianceFeature::new(&name, &source, tags);
            store.save(&feature).await?;
            print_created(ctx, &feature.id, &feature)?;
        }
        FeatureAction::List => {
            let features = store.load_all_lossy::<ComplianceFeature>().await?;
            if ctx.json {
                output::print_json(&features)?;
            } else if features.is_empty() {
                println!("No compliance features.");
            } else {
                for feature in &features {
                    println!("{}", output::format_feature_line(feature));
                }
            }
        }
        FeatureAction::Show { name } => {
            let feature: ComplianceFeature = store.require(&name).await?;
            if ctx.json {
                output::print_json(&feature)?;
            } else {
                print!("{}", output::format_feature_details(&feature));
            }
        }
        FeatureAction::Remove { name } => {
            remove_record::<ComplianceFeature>(ctx, &store, &name, "feature").await?;
        }
        FeatureAction::Enable { name } => set_feature_disabled(ctx, &store, &name, false).await?,
        FeatureAction::Disable { name } => set_feature_disabled(ctx, &store, &name, true).await?,
    }
    Ok(())
}

async fn set_feature_disabled(ctx: &CommandContext, store: &JsonStore, name: &str, disabled: bool) -> Result<()> {
    let mut feature: ComplianceFeature = store.require(name).await?;
    feature.disabled = disabled;
    store.save(&feature).await?;
    print_updated(ctx, &feature, output::format_feature_line(&feature))
}

async fn log_command(ctx: &CommandContext, action: LogAction) -> Result<()> {
    let store = ctx.store()?;

    match action {
        LogAction::List { kind, limit } => {
            let mut entries = store.load_all_lossy::<ValidationLogEntry>().await?;
            if let Some(kind) = kind {
                let wanted = match kind {
                    LogKindFilter::StateCheck => LogKind::StateCheck,
                    LogKindFilter::ManualValidation => LogKind::ManualValidation,
                };
                entries.retain(|entry| entry.kind == wanted);
            }
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if let Some(limit) = limit {
                entries.truncate(limit);
            }

            if ctx.json {
                let summaries: Vec<output::LogSummary> = entries.iter().map(output::LogSummary::from_entry).collect();
                output::print_json(&summaries)?;
            } else if entries.is_empty() {
                println!("No log entries.");
            } else {
                for entry in &entries {
                    println!("{}", output::format_log_line(entry));
                }
            }
        }
        LogAction::Show { id } => {
            let entry: ValidationLogEntry = store.require(&id).await?;
            if ctx.json {
                output::print_json(&entry)?;
            } else {
                print!("{}", output::format_log_details(&entry));
            }
        }
        LogAction::Remove { id } => {
            remove_record::<ValidationLogEntry>(ctx, &store, &id, "log entry").await?;
        }
    }
    Ok(())
}

async fn foreign_command(ctx: &CommandContext, action: ForeignAction) -> Result<()> {
    let store = ctx.store()?;

    match action {
        ForeignAction::List { hide_exceptions } => {
            let mut resources = store.load_all_lossy::<ForeignResource>().await?;
            if hide_exceptions {
                resources.retain(|resource| !resource.is_exception);
            }
            resources.sort_by(|a, b| a.discovered_at.cmp(&b.discovered_at));

            if ctx.json {
                output::print_json(&resources)?;
            } else if resources.is_empty() {
                println!("No foreign resources.");
            } else {
                for resource in &resources {
                    println!("{}", output::format_foreign_line(resource));
                }
            }
        }
        ForeignAction::Show { id } => {
            let resource: ForeignResource = store.require(&id).await?;
            if ctx.json {
                output::print_json(&resource)?;
            } else {
                print!("{}", output::format_foreign_details(&resource));
            }
        }
        ForeignAction::Except { id, unset } => {
            let mut resource: ForeignResource = store.require(&id).await?;
            resource.is_exception = !unset;
            store.save(&resource).await?;
            print_updated(ctx, &resource, output::format_foreign_line(&resource))?;
        }
        ForeignAction::Remove { id } => {
            remove_record::<ForeignResource>(ctx, &store, &id, "foreign resource").await?;
        }
    }
    Ok(())
}

async fn validate_command(ctx: &CommandContext, args: ValidateArgs) -> Result<i32> {
    validate_tags(&args.tags)?;
    let content = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let store = ctx.store()?;
    let tools = ToolInvoker::new(ctx.config.tool_settings());
    let entry = validate_content(&store, &tools, &content, &args.tags, ctx.config.empty_run_policy())
        .await
        .with_context(|| format!("Validation of {} failed", args.file.display()))?;

    if ctx.json {
        output::print_json(&entry)?;
    } else {
        print!("{}", output::format_result(&entry.result));
        println!("Registered in log {}", entry.id);
    }

    Ok(if entry.result.error_count() > 0 {
        EXIT_COMPLIANCE_FAILED
    } else {
        0
    })
}

fn config_command(ctx: &CommandContext, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => {
            ctx.config.validate()?;
            if ctx.json {
                output::print_json(&ctx.config)?;
            } else {
                let source = ctx
                    .config_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "built-in defaults or default path".to_string());
                println!("Configuration OK ({})", source);
                print!("{}", toml::to_string_pretty(&ctx.config)?);
            }
        }
        ConfigAction::Path => {
            let path = DaemonConfiguration::default_config_path()?;
            print_path(ctx, &path)?;
        }
    }
    Ok(())
}

fn print_path(ctx: &CommandContext, path: &Path) -> Result<()> {
    if ctx.json {
        output::print_json(&serde_json::json!({ "path": path }))
    } else {
        println!("{}", path.display());
        Ok(())
    }
}

fn print_created<T: serde::Serialize>(ctx: &CommandContext, id: &str, record: &T) -> Result<()> {
    if ctx.json {
        output::print_json(record)
    } else {
        println!("Created {}", id);
        Ok(())
    }
}

fn print_updated<T: serde::Serialize>(ctx: &CommandContext, record: &T, line: String) -> Result<()> {
    if ctx.json {
        output::print_json(record)
    } else {
        println!("{}", line);
        Ok(())
    }
}

async fn remove_record<T: crate::store::Record>(
    ctx: &CommandContext,
    store: &JsonStore,
    id: &str,
    what: &str,
) -> Result<()> {
    if !store.remove::<T>(id).await? {
        bail!("No {} with id '{}'", what, id);
    }
    if ctx.json {
        output::print_json(&serde_json::json!({ "removed": id }))
    } else {
        println!("Removed {} {}", what, id);
        Ok(())
    }
}
