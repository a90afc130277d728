use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ctrlq::analyzer::{self, TreeDetail, TreeOptions};
use ctrlq::config::{
    normalize_virtual_proxy, ConnectionConfig, Credentials, DEFAULT_ENGINE_PORT, DEFAULT_QRS_PORT,
    DEFAULT_REQUEST_TIMEOUT,
};
use ctrlq::errors::ConfigError;
use ctrlq::export::{self, TableDetail};
use ctrlq::importer::{ImportOptions, ImportSummary, TaskImporter, UpdateMode};
use ctrlq::model::{FilterSpec, TaskGraph};
use ctrlq::parser::columns::ColRefBy;
use ctrlq::parser::source::{read_delimited, read_sheet, SourceTable};
use ctrlq::parser::{parse_apps, parse_tasks, ParseOptions};
use ctrlq::qrs::{DryRunRepository, QrsClient, Repository, RepositoryCaches};
use ctrlq::server;
use ctrlq::session::{CancelFlag, RestClient};

#[derive(Parser)]
#[clap(author, version, about = "Task lifecycle operations for QSEoW")]
struct Cli {
    /// Log verbosity: trace, debug, info, warn or error
    #[clap(long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ConnectionArgs {
    /// QSEoW host name or IP
    #[clap(long, env = "CTRLQ_HOST")]
    host: String,
    /// Repository (QRS) port
    #[clap(long, env = "CTRLQ_QRS_PORT", default_value_t = DEFAULT_QRS_PORT)]
    qrs_port: u16,
    /// Engine websocket port
    #[clap(long, env = "CTRLQ_ENGINE_PORT", default_value_t = DEFAULT_ENGINE_PORT)]
    engine_port: u16,
    /// Virtual proxy prefix
    #[clap(long, env = "CTRLQ_VIRTUAL_PROXY", default_value = "")]
    virtual_proxy: String,
    /// Verify the server certificate; false disables verification
    #[clap(long, env = "CTRLQ_SECURE", default_value_t = true, action = clap::ArgAction::Set)]
    secure: bool,
    /// Engine API schema version
    #[clap(long, env = "CTRLQ_SCHEMA_VERSION", default_value = "12.612.0")]
    schema_version: String,
    /// Client certificate file (PEM)
    #[clap(long, env = "CTRLQ_CLIENT_CERT")]
    auth_cert_file: Option<PathBuf>,
    /// Client certificate key file (PEM)
    #[clap(long, env = "CTRLQ_CLIENT_CERT_KEY")]
    auth_cert_key_file: Option<PathBuf>,
    /// Sense CA root certificate file (PEM)
    #[clap(long, env = "CTRLQ_CLIENT_CERT_CA")]
    auth_root_cert_file: Option<PathBuf>,
    /// API key for bearer authentication through a virtual proxy
    #[clap(long, env = "CTRLQ_API_KEY")]
    api_key: Option<String>,
}

impl ConnectionArgs {
    fn into_config(self) -> Result<ConnectionConfig, ConfigError> {
        let has_cert = self.auth_cert_file.is_some()
            || self.auth_cert_key_file.is_some()
            || self.auth_root_cert_file.is_some();

        let credentials = match (&self.api_key, has_cert) {
            (Some(_), true) => return Err(ConfigError::ConflictingCredentials),
            (Some(key), false) => Credentials::Bearer(key.clone()),
            (None, true) => {
                match (
                    self.auth_cert_file,
                    self.auth_cert_key_file,
                    self.auth_root_cert_file,
                ) {
                    (Some(cert), Some(key), Some(root)) => {
                        Credentials::Certificate { cert, key, root }
                    }
                    _ => return Err(ConfigError::MissingCredentials),
                }
            }
            (None, false) => return Err(ConfigError::MissingCredentials),
        };

        let config = ConnectionConfig {
            host: self.host,
            qrs_port: self.qrs_port,
            engine_port: self.engine_port,
            virtual_proxy: normalize_virtual_proxy(&self.virtual_proxy),
            secure: self.secure,
            schema_version: self.schema_version,
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OutputFormat {
    #[default]
    Tree,
    Table,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OutputDest {
    #[default]
    Screen,
    File,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OutputFileFormat {
    #[default]
    Csv,
    Excel,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FileType {
    #[default]
    Excel,
    Csv,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ColRefMode {
    #[default]
    Name,
    Position,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum CustomPropertyMode {
    Append,
    Replace,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the task graph and render it as a tree or table
    TaskGet {
        #[clap(flatten)]
        connection: ConnectionArgs,
        #[clap(long, value_enum, default_value_t)]
        output_format: OutputFormat,
        #[clap(long, value_enum, default_value_t)]
        output_dest: OutputDest,
        #[clap(long)]
        output_file_name: Option<PathBuf>,
        #[clap(long, value_enum, default_value_t)]
        output_file_format: OutputFileFormat,
        /// Overwrite the output file without asking
        #[clap(long)]
        output_file_overwrite: bool,
        /// Restrict table output to these task ids
        #[clap(long = "task-id")]
        task_ids: Vec<Uuid>,
        /// Restrict table output to tasks carrying these tags
        #[clap(long = "task-tag")]
        task_tags: Vec<String>,
        /// Column blocks: common, lastexecution, tag, customproperty,
        /// schematrigger, compositetrigger
        #[clap(long = "table-details")]
        table_details: Vec<String>,
        /// Node decorations: taskid, laststatus, lastexecution,
        /// nextexecution, appname, tags
        #[clap(long = "tree-details")]
        tree_details: Vec<String>,
    },
    /// Create tasks, triggers and optionally apps from a source file
    TaskImport {
        #[clap(flatten)]
        connection: ConnectionArgs,
        #[clap(long, value_enum, default_value_t)]
        file_type: FileType,
        #[clap(long)]
        file_name: PathBuf,
        /// Sheet holding task definitions (excel sources)
        #[clap(long)]
        sheet_name: Option<String>,
        /// Also upload apps listed on the app sheet
        #[clap(long)]
        import_app: bool,
        /// Sheet holding app definitions (excel sources)
        #[clap(long)]
        import_app_sheet_name: Option<String>,
        /// Retain only rows with Task counter <= N; 0 means no limit
        #[clap(long, default_value_t = 0)]
        limit_import_count: u32,
        /// Pause between app uploads, in milliseconds
        #[clap(long, default_value_t = 1000)]
        sleep_app_upload: u64,
        /// Only 'create' is supported
        #[clap(long, default_value = "create")]
        update_mode: String,
        /// Resolve every reference but create nothing
        #[clap(long)]
        dry_run: bool,
        #[clap(long, value_enum, default_value_t)]
        col_ref_by: ColRefMode,
    },
    /// Set a custom property on existing tasks
    TaskCustomPropertySet {
        #[clap(flatten)]
        connection: ConnectionArgs,
        #[clap(long = "task-id")]
        task_ids: Vec<Uuid>,
        #[clap(long = "task-tag")]
        task_tags: Vec<String>,
        #[clap(long)]
        custom_property_name: String,
        #[clap(long = "custom-property-value", required = true)]
        custom_property_values: Vec<String>,
        #[clap(long, value_enum)]
        update_mode: CustomPropertyMode,
        /// Skip the confirmation prompt in replace mode
        #[clap(long)]
        force: bool,
    },
    /// Serve the task network for the visualization front-end
    TaskViz {
        #[clap(flatten)]
        connection: ConnectionArgs,
        #[clap(long, default_value_t = 3000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Cancellation requested; finishing current work item");
                cancel.cancel();
            }
        });
    }

    match args.command {
        Commands::TaskGet {
            connection,
            output_format,
            output_dest,
            output_file_name,
            output_file_format,
            output_file_overwrite,
            task_ids,
            task_tags,
            table_details,
            tree_details,
        } => {
            let qrs = connect(connection, cancel)?;
            let (graph, _caches) = fetch_graph(&qrs).await?;
            report_graph_warnings(&graph);

            let filter = FilterSpec {
                task_ids,
                task_tags,
                ..Default::default()
            };

            match output_format {
                OutputFormat::Tree => {
                    let details = parse_tree_details(&tree_details)?;
                    let roots = if filter.is_empty() {
                        None
                    } else {
                        Some(graph.root_nodes_from_filter(&filter))
                    };
                    let tree =
                        analyzer::build_task_tree(&graph, roots, &TreeOptions { details });
                    match output_dest {
                        OutputDest::Screen => print!("{}", export::to_tree::render(&tree)),
                        OutputDest::File => {
                            let path = output_file_name
                                .ok_or_else(|| anyhow!("--output-file-name is required"))?;
                            let json = serde_json::to_string_pretty(&tree)?;
                            write_output(&path, json.as_bytes(), output_file_overwrite)?;
                        }
                    }
                }
                OutputFormat::Table => {
                    let details = parse_table_details(&table_details)?;
                    let table = export::build_task_table(&graph, &filter, &details);
                    match output_dest {
                        OutputDest::Screen => print!("{}", export::render_text_table(&table)),
                        OutputDest::File => {
                            let path = output_file_name
                                .ok_or_else(|| anyhow!("--output-file-name is required"))?;
                            let bytes = match output_file_format {
                                OutputFileFormat::Csv => {
                                    export::to_csv::render(&table)?.into_bytes()
                                }
                                OutputFileFormat::Json => {
                                    serde_json::to_string_pretty(&export::to_json::render(
                                        &table,
                                    ))?
                                    .into_bytes()
                                }
                                OutputFileFormat::Excel => {
                                    export::to_excel::render(&table, "Tasks")?
                                }
                            };
                            write_output(&path, &bytes, output_file_overwrite)?;
                        }
                    }
                }
            }
        }
        Commands::TaskImport {
            connection,
            file_type,
            file_name,
            sheet_name,
            import_app,
            import_app_sheet_name,
            limit_import_count,
            sleep_app_upload,
            update_mode,
            dry_run,
            col_ref_by,
        } => {
            // Only create-only imports exist; fail before any network I/O.
            let _mode: UpdateMode = update_mode.parse()?;

            let parse_options = ParseOptions {
                col_ref_by: match col_ref_by {
                    ColRefMode::Name => ColRefBy::Name,
                    ColRefMode::Position => ColRefBy::Position,
                },
                limit_import_count,
            };

            let task_table = read_source(file_type, &file_name, sheet_name.as_deref())?;
            let task_records = match parse_tasks(&task_table, &parse_options) {
                Ok(records) => records,
                Err(errors) => {
                    for error in &errors {
                        eprintln!("{}", error);
                    }
                    return Err(ctrlq::errors::ImportError::Validation(errors).into());
                }
            };

            let app_records = if import_app {
                if file_type != FileType::Excel {
                    bail!("--import-app requires an excel source");
                }
                let sheet = import_app_sheet_name
                    .as_deref()
                    .ok_or(ConfigError::MissingSheetName)?;
                let app_table = read_sheet(&file_name, sheet)?;
                match parse_apps(&app_table, &parse_options) {
                    Ok(records) => records,
                    Err(errors) => {
                        for error in &errors {
                            eprintln!("{}", error);
                        }
                        return Err(ctrlq::errors::ImportError::Validation(errors).into());
                    }
                }
            } else {
                Vec::new()
            };

            info!(
                "Importing {} task(s) and {} app(s){}",
                task_records.len(),
                app_records.len(),
                if dry_run { " (dry run)" } else { "" }
            );

            let qrs = connect(connection, cancel.clone())?;
            let (graph, caches) = fetch_graph(&qrs).await?;

            let options = ImportOptions {
                sleep_app_upload: Duration::from_millis(sleep_app_upload),
            };
            let dry_repo = DryRunRepository;
            let repo: &dyn Repository = if dry_run { &dry_repo } else { &qrs };
            let importer = TaskImporter::new(repo, &graph, options, cancel);

            let summary = match importer.run(&caches, &task_records, &app_records).await {
                Ok(summary) => summary,
                Err(errors) => {
                    for error in &errors {
                        eprintln!("{}", error);
                    }
                    bail!("Reference validation failed with {} error(s)", errors.len());
                }
            };

            print_summary(&summary);
            if !summary.is_clean() {
                process::exit(1);
            }
        }
        Commands::TaskCustomPropertySet {
            connection,
            task_ids,
            task_tags,
            custom_property_name,
            custom_property_values,
            update_mode,
            force,
        } => {
            let qrs = connect(connection, cancel)?;
            let (graph, caches) = fetch_graph(&qrs).await?;

            set_custom_property(
                &qrs,
                &graph,
                &caches,
                &FilterSpec {
                    task_ids,
                    task_tags,
                    ..Default::default()
                },
                &custom_property_name,
                &custom_property_values,
                update_mode,
                force,
            )
            .await?;
        }
        Commands::TaskViz { connection, port } => {
            let qrs = connect(connection, cancel)?;
            let (graph, _caches) = fetch_graph(&qrs).await?;
            report_graph_warnings(&graph);
            let tree = analyzer::build_task_tree(
                &graph,
                None,
                &TreeOptions {
                    details: vec![TreeDetail::TaskId],
                },
            );
            server::start_server(port, tree).await?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .without_time()
        .init();
}

fn connect(connection: ConnectionArgs, cancel: CancelFlag) -> Result<QrsClient> {
    let config = connection.into_config()?;
    let rest = RestClient::new(config, cancel)?;
    Ok(QrsClient::new(rest))
}

/// Fetch the full task population. Listings are independent reads and run
/// concurrently; the graph is assembled under a single writer.
async fn fetch_graph(qrs: &QrsClient) -> Result<(TaskGraph, RepositoryCaches)> {
    let caches = qrs.warm_caches().await?;
    let (reload, external, schema, composite) = tokio::try_join!(
        qrs.list_reload_tasks(None),
        qrs.list_external_program_tasks(None),
        qrs.list_schema_events(),
        qrs.list_composite_events(),
    )?;
    info!(
        "Fetched {} reload task(s), {} external program task(s)",
        reload.len(),
        external.len()
    );
    let graph = TaskGraph::from_repository(reload, external, schema, composite, &caches.apps);
    Ok((graph, caches))
}

/// Cycles and duplicate edges are reported as warnings and never abort
fn report_graph_warnings(graph: &TaskGraph) {
    for chain in analyzer::find_circular_chains(graph) {
        warn!(
            "Circular dependency between '{}' and '{}'",
            chain.from_name.as_deref().unwrap_or("?"),
            chain.to_name.as_deref().unwrap_or("?")
        );
    }
    for dup in analyzer::find_duplicate_edges(graph) {
        warn!(
            "Duplicate trigger edge {} -> {} ({:?}) appears {} times",
            dup.upstream_name.as_deref().unwrap_or("?"),
            dup.downstream_name.as_deref().unwrap_or("?"),
            dup.state,
            dup.count
        );
    }
    let tombstones: Vec<Uuid> = graph.tombstones().collect();
    if !tombstones.is_empty() {
        warn!(
            "{} composite rule(s) reference unknown tasks: {:?}",
            tombstones.len(),
            tombstones
        );
    }
}

fn parse_tree_details(raw: &[String]) -> Result<Vec<TreeDetail>> {
    raw.iter()
        .map(|value| {
            TreeDetail::from_cli(value)
                .ok_or_else(|| anyhow!("Unknown tree detail '{}'", value))
        })
        .collect()
}

fn parse_table_details(raw: &[String]) -> Result<Vec<TableDetail>> {
    if raw.is_empty() {
        return Ok(TableDetail::all());
    }
    raw.iter()
        .map(|value| {
            TableDetail::from_cli(value)
                .ok_or_else(|| anyhow!("Unknown table detail '{}'", value))
        })
        .collect()
}

fn read_source(
    file_type: FileType,
    file_name: &Path,
    sheet_name: Option<&str>,
) -> Result<SourceTable> {
    match file_type {
        FileType::Csv => Ok(read_delimited(file_name, b',')?),
        FileType::Excel => {
            let sheet = sheet_name.ok_or(ConfigError::MissingSheetName)?;
            Ok(read_sheet(file_name, sheet)?)
        }
    }
}

/// Write an output file, prompting before clobbering an existing one
fn write_output(path: &Path, bytes: &[u8], overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite && !confirm(&format!("File {} exists. Overwrite?", path.display()))? {
        return Err(ConfigError::OverwriteDeclined(path.to_path_buf()).into());
    }
    std::fs::write(path, bytes)
        .with_context(|| format!("Cannot write output file {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "Created {} object(s), {} failure(s){}",
        summary.created_count(),
        summary.failure_count(),
        if summary.canceled { ", run canceled" } else { "" }
    );
    for outcome in summary
        .apps
        .iter()
        .chain(&summary.tasks)
        .chain(&summary.events)
    {
        if let Err(error) = &outcome.result {
            match outcome.event_counter {
                Some(event) => eprintln!(
                    "Task counter {}, event counter {} ('{}'): {}",
                    outcome.counter, event, outcome.name, error
                ),
                None => eprintln!(
                    "Counter {} ('{}'): {}",
                    outcome.counter, outcome.name, error
                ),
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn set_custom_property(
    qrs: &QrsClient,
    graph: &TaskGraph,
    caches: &RepositoryCaches,
    filter: &FilterSpec,
    name: &str,
    values: &[String],
    mode: CustomPropertyMode,
    force: bool,
) -> Result<()> {
    let definition = caches
        .custom_properties
        .iter()
        .find(|def| def.name == name)
        .ok_or_else(|| anyhow!("Custom property '{}' does not exist on server", name))?;
    for value in values {
        if !definition.choice_values.iter().any(|choice| choice == value) {
            bail!(
                "'{}' is not a declared value of custom property '{}'",
                value,
                name
            );
        }
    }

    let targets = graph.matching_tasks(filter);
    if targets.is_empty() {
        warn!("No tasks match the given filters; nothing to do");
        return Ok(());
    }
    if mode == CustomPropertyMode::Replace
        && !force
        && !confirm(&format!(
            "Replace values of '{}' on {} task(s)?",
            name,
            targets.len()
        ))?
    {
        bail!("Aborted by user");
    }

    for task in targets {
        let mut raw = qrs.get_task_raw(task.kind, task.id).await?;
        let properties = raw["customProperties"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut kept: Vec<serde_json::Value> = match mode {
            CustomPropertyMode::Append => properties,
            CustomPropertyMode::Replace => properties
                .into_iter()
                .filter(|cp| cp["definition"]["name"].as_str() != Some(name))
                .collect(),
        };
        for value in values {
            let exists = kept.iter().any(|cp| {
                cp["definition"]["name"].as_str() == Some(name)
                    && cp["value"].as_str() == Some(value)
            });
            if !exists {
                kept.push(serde_json::json!({
                    "value": value,
                    "definition": { "id": definition.id, "name": definition.name },
                }));
            }
        }
        raw["customProperties"] = serde_json::Value::Array(kept);
        qrs.put_task_raw(task.kind, task.id, &raw).await?;
        info!("Updated custom properties on task '{}'", task.name);
    }
    Ok(())
}
