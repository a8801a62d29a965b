//! riskwise - AI-assisted field suggestions for risk and control registers
//!
//! Loads a form document, asks for suggestions for one field, lets the user
//! pick in the terminal and writes the result back to the document.

mod terminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use riskwise_adapters::config::{self, Config};
use riskwise_adapters::{
    JsonFileStore, OpenRouterGateway, StoredEntities, TemplateLibrary, WorkspaceQuota,
};
use riskwise_core::apply::{ApplyHooks, ApplyTarget, ListAppender, PersistenceHook};
use riskwise_core::form::MemoryForm;
use riskwise_core::suggest::{value_as_text, SelectionMode};
use riskwise_core::{EntityType, FieldShape, FieldType, Notifier, QuotaGuard, Storage};
use riskwise_engine::context::{default_field_id, hidden_field_id, relation_key};
use riskwise_engine::{
    ContextExtractor, FallbackResolver, GenerationSettings, RequestOutcome, SuggestionPipeline,
    SuggestionRequest, WorkspaceProfile,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use terminal::{TerminalNotifier, TerminalView};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "riskwise",
    about = "AI-assisted suggestions for risk and control records",
    version
)]
struct Args {
    /// Workspace root holding .riskwise/ (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Suggest a value for one field of a form document
    Suggest {
        /// Form document (JSON)
        form: PathBuf,

        /// Field to suggest for, e.g. title, category, residual-likelihood
        #[arg(long)]
        field: FieldType,

        /// Record type; defaults to the field's own entity
        #[arg(long)]
        entity: Option<EntityType>,

        /// Form field id to write to
        #[arg(long)]
        target: Option<String>,

        /// Hidden id field for category targets
        #[arg(long)]
        hidden: Option<String>,

        /// List type for list targets
        #[arg(long)]
        list: Option<String>,

        /// Allow picking several items (list targets only)
        #[arg(long)]
        multi: bool,
    },
    /// Show this month's AI usage
    Quota,
    /// Store the AI provider API key
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    match args.command {
        Command::Setup => setup_api_key(),
        Command::Quota => show_quota(&args.workspace),
        Command::Suggest {
            form,
            field,
            entity,
            target,
            hidden,
            list,
            multi,
        } => {
            let options = TargetOptions {
                field,
                entity,
                target,
                hidden,
                list,
                multi,
            };
            suggest(&args.workspace, &form, options).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn setup_api_key() -> Result<()> {
    config::setup_api_key_interactive().map_err(|e| anyhow::anyhow!("{}", e))?;
    let config = Config::load();
    if config.has_api_key() {
        eprintln!("  + API key verified and ready to use");
    } else {
        eprintln!("  ! API key was saved but cannot be read back.");
        eprintln!("  ! Workaround: set the RISKWISE_API_KEY environment variable.");
    }
    Ok(())
}

fn show_quota(workspace: &Path) -> Result<()> {
    let config = Config::load();
    let storage: Arc<dyn Storage> = Arc::new(JsonFileStore::new(workspace));
    let quota = WorkspaceQuota::new(storage, Arc::new(TerminalNotifier), config.monthly_call_limit);
    let state = quota.state();
    println!(
        "{}: {} of {} AI suggestion calls used ({} remaining)",
        state.period,
        state.used,
        state.limit,
        state.remaining()
    );
    if !config.has_api_key() {
        println!("No API key configured; suggestions come from built-in templates.");
    }
    Ok(())
}

struct TargetOptions {
    field: FieldType,
    entity: Option<EntityType>,
    target: Option<String>,
    hidden: Option<String>,
    list: Option<String>,
    multi: bool,
}

/// Items the list appender collected during apply
type Appended = Arc<Mutex<Vec<String>>>;

fn build_target(options: &TargetOptions, appended: &Appended) -> Result<ApplyTarget> {
    let field = options.field;
    let field_id = options
        .target
        .clone()
        .unwrap_or_else(|| default_field_id(field).to_string());

    let target = match field.shape() {
        FieldShape::Text => ApplyTarget::Text {
            field_id,
            emit_change: true,
        },
        FieldShape::Numeric => ApplyTarget::numeric(field_id),
        FieldShape::Date => ApplyTarget::date(field_id),
        FieldShape::Category => {
            let hidden = options
                .hidden
                .clone()
                .or_else(|| hidden_field_id(field).map(str::to_string))
                .with_context(|| format!("--hidden is required for {}", field))?;
            ApplyTarget::category(field_id, hidden)
        }
        FieldShape::List => {
            let list_type = options.list.clone().unwrap_or(field_id);
            let sink = appended.clone();
            let appender: ListAppender = Arc::new(move |_: &str, value: &Value| {
                let Some(text) = value_as_text(value) else {
                    return false;
                };
                match sink.lock() {
                    Ok(mut items) => {
                        items.push(text);
                        true
                    }
                    Err(_) => false,
                }
            });
            ApplyTarget::list(list_type, appender)
        }
    };
    Ok(target)
}

/// Move appended items into the form's list, or its relation for link lists
fn merge_appended(form: &mut MemoryForm, list_type: &str, entity: EntityType, items: Vec<String>) {
    if list_type == relation_key(entity) {
        let links = form.links.entry(list_type.to_string()).or_default();
        for item in items {
            if !links.contains(&item) {
                links.push(item);
            }
        }
        form.revision += 1;
    } else {
        for item in items {
            form.push_list_item(list_type, &item);
        }
    }
}

fn load_form(path: &Path) -> Result<MemoryForm> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid form document {}", path.display()))
}

fn save_form(path: &Path, form: &MemoryForm) -> Result<()> {
    let content = serde_json::to_string_pretty(form)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn build_pipeline(
    workspace: &Path,
    config: &Config,
    gateway: Option<OpenRouterGateway>,
    notifier: Arc<dyn Notifier>,
) -> Result<SuggestionPipeline> {
    let storage: Arc<dyn Storage> = Arc::new(JsonFileStore::new(workspace));
    let profile = WorkspaceProfile {
        industry: Some(config.industry.clone()),
        register_type: Some(config.register_type.clone()),
    };
    let extractor = ContextExtractor::new(
        Arc::new(StoredEntities::new(storage.clone())),
        storage.clone(),
        profile,
    );
    let quota = Arc::new(WorkspaceQuota::new(
        storage,
        notifier.clone(),
        config.monthly_call_limit,
    ));
    let templates = Arc::new(TemplateLibrary::for_workspace(workspace)?);
    let settings = GenerationSettings {
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        timeout: config.timeout(),
    };

    let mut pipeline = SuggestionPipeline::new(
        extractor,
        quota,
        FallbackResolver::new(templates),
        notifier,
    )
    .with_settings(settings);

    match gateway {
        Some(gateway) => {
            debug!(model = %config.model, "AI gateway configured");
            pipeline = pipeline.with_gateway(Arc::new(gateway));
        }
        None => info!("no API key configured; using template suggestions"),
    }
    Ok(pipeline)
}

async fn suggest(workspace: &Path, form_path: &Path, options: TargetOptions) -> Result<()> {
    let config = Config::load();
    let mut form = load_form(form_path)?;
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier);
    let gateway = OpenRouterGateway::from_config(&config)?;
    let pipeline = build_pipeline(workspace, &config, gateway, notifier)?;

    let appended: Appended = Arc::new(Mutex::new(Vec::new()));
    let target = build_target(&options, &appended)?;
    let list_key = target.key().to_string();
    let is_list = target.is_list();

    let dirty = Arc::new(AtomicBool::new(false));
    let mark_dirty = dirty.clone();
    let persistence: PersistenceHook = Arc::new(move |field_id: &str| {
        debug!(field_id, "queued autosave");
        mark_dirty.store(true, Ordering::SeqCst);
    });

    let mut request = SuggestionRequest::new(options.field, target).with_hooks(ApplyHooks {
        persistence: Some(persistence),
        on_applied: None,
    });
    if let Some(entity) = options.entity {
        request.entity = entity;
    }
    if is_list && !options.multi {
        request = request.with_mode(SelectionMode::Single);
    }

    let mut view = TerminalView::stdin();
    let outcome = pipeline
        .request_suggestions(&request, &mut form, &mut view)
        .await;

    if is_list {
        let items = match appended.lock() {
            Ok(mut items) => std::mem::take(&mut *items),
            Err(_) => Vec::new(),
        };
        if !items.is_empty() {
            merge_appended(&mut form, &list_key, request.entity, items);
        }
    }

    if dirty.load(Ordering::SeqCst) {
        save_form(form_path, &form)?;
        info!(path = %form_path.display(), "form saved");
    }

    match outcome {
        RequestOutcome::Applied { count, source } => {
            println!("Applied {} {} suggestion(s) to {}", count, source.label(), list_key);
        }
        RequestOutcome::Dismissed => println!("No changes made"),
        RequestOutcome::NoSuggestions => println!("No suggestions available"),
        RequestOutcome::QuotaBlocked => println!("AI suggestion limit reached for this month"),
        RequestOutcome::StaleContext => println!("Form changed; run the request again"),
        RequestOutcome::ApplyFailed => {
            anyhow::bail!("Could not apply the suggestion to '{}'", list_key)
        }
    }
    Ok(())
}
