//! Palmtrack - admin console for a palm-fruit trading business
//!
//! Loads ledger rows from a PostgREST backend, aggregates them into
//! dashboard figures and printable agent statements, and records new
//! advances, collections, expenses, orders and payments.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (backend, config, I/O)
//!   2 - Input rejected by validation

mod amount;
mod analysis;
mod backend;
mod cli;
mod config;
mod dashboard;
mod error;
mod format;
mod models;
mod notify;
mod records;
mod report;
mod session;

use analysis::AggregateOptions;
use anyhow::{Context, Result};
use backend::{DataFetcher, RestClient, RowStore};
use chrono::{Local, NaiveDate};
use cli::{
    AdvanceCommand, AgentCommand, Args, CollectionCommand, Command, DashboardArgs, DeleteArgs,
    ExpenseCommand, OrderCommand, OutputFormat, PaymentCommand, ReportArgs, WatchArgs,
};
use config::Config;
use dashboard::{DashboardController, DashboardState, DashboardView, Route};
use error::RecordError;
use models::DateRange;
use notify::{ConsoleNotifier, Level, Notifier};
use records::{
    AdvanceDraft, AgentDraft, CollectionDraft, Confirmation, DeleteOutcome, ExpenseDraft,
    OrderDraft, PaymentDraft, RecordService,
};
use report::AgentStatement;
use session::{ActivityEvent, IdleTimer, Session};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Palmtrack v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            if let Some(RecordError::Validation(reason)) = e.downcast_ref::<RecordError>() {
                eprintln!("\n⛔ Rejected: {}", reason);
                std::process::exit(2);
            }
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .palmtrack.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Set [backend] url and api_key, or PALMTRACK_BACKEND_URL / PALMTRACK_API_KEY.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration, connect, and dispatch. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let notifier = ConsoleNotifier { quiet: args.quiet };
    let client = RestClient::new(&config.backend).context("Backend is not configured")?;

    match args.command.clone() {
        Command::Dashboard(cmd) => handle_dashboard(cmd, &config, client, &notifier, args.quiet).await,
        Command::Report(cmd) => handle_report(cmd, &config, client, &notifier).await,
        Command::Watch(cmd) => {
            let session = Session::new(args.user.clone(), args.role.clone());
            handle_watch(cmd, &config, client, &notifier, session).await
        }
        Command::Delete(cmd) => handle_delete(cmd, &client, &notifier).await,
        command => handle_record(command, &client, &notifier).await,
    }
}

/// Today's date from the wall clock. Read on every use.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn aggregate_options(config: &Config, top: Option<usize>) -> AggregateOptions {
    let mut options = AggregateOptions::from(&config.dashboard);
    if let Some(top) = top {
        options.top_agents = top;
    }
    options
}

async fn handle_dashboard(
    cmd: DashboardArgs,
    config: &Config,
    client: RestClient,
    notifier: &dyn Notifier,
    quiet: bool,
) -> Result<i32> {
    let today = today();
    let range = cmd.range.resolve(config.dashboard.default_range, today);
    let fetcher = DataFetcher::new(client, config.backend.use_summary_rpc);
    let show_progress = !quiet && cmd.format == OutputFormat::Text;
    let mut controller =
        DashboardController::new(fetcher, aggregate_options(config, cmd.top), show_progress);

    let DashboardState::Ready(snapshot) = controller.load(range, today, notifier).await.clone()
    else {
        return Ok(1);
    };

    let view = DashboardView::new(
        &snapshot,
        &config.report.currency_symbol,
        &config.report.business_name,
    );
    match cmd.format {
        OutputFormat::Json => println!("{}", view.render_json()?),
        OutputFormat::Text => print!("{}", view.render_text()),
    }

    if let Some(row) = cmd.select {
        let mut route: Option<Route> = None;
        if view.select_row(row, &mut route).is_none() {
            notifier.error(&format!(
                "Row {} is not in the outstanding table ({} rows)",
                row,
                snapshot.outstanding.len()
            ));
            return Ok(1);
        }
        if let Some(route) = route {
            follow_route(route, config, controller.fetcher(), notifier, cmd.open).await?;
        }
    }

    Ok(0)
}

async fn handle_report(
    cmd: ReportArgs,
    config: &Config,
    client: RestClient,
    notifier: &dyn Notifier,
) -> Result<i32> {
    let today = today();
    let range = cmd.range.resolve(config.dashboard.default_range, today);
    let fetcher = DataFetcher::new(client, false);

    let path = print_statement(
        &fetcher,
        config,
        &cmd.agent,
        range,
        cmd.output.as_deref(),
        notifier,
    )
    .await?;
    if cmd.open {
        open_in_browser(&path, notifier);
    }
    Ok(0)
}

/// Act on a navigation request coming from a view.
async fn follow_route<S: RowStore>(
    route: Route,
    config: &Config,
    fetcher: &DataFetcher<S>,
    notifier: &dyn Notifier,
    open: bool,
) -> Result<()> {
    match route {
        Route::AgentStatement { agent_id, range } => {
            let path = print_statement(fetcher, config, &agent_id, range, None, notifier).await?;
            if open {
                open_in_browser(&path, notifier);
            }
        }
        other => debug!("Nothing to do for {}", other.path()),
    }
    Ok(())
}

/// Load one agent's rows, render the statement and write it out.
async fn print_statement<S: RowStore>(
    fetcher: &DataFetcher<S>,
    config: &Config,
    agent_id: &str,
    range: DateRange,
    output: Option<&Path>,
    notifier: &dyn Notifier,
) -> Result<std::path::PathBuf> {
    let rows = fetcher
        .load_agent(agent_id, range)
        .await
        .context("Failed to load statement")?;
    let statement = AgentStatement::build(&rows, today());
    if statement.is_empty() {
        let period = if range.is_all_time() {
            "on record".to_string()
        } else {
            format!("for {}", range)
        };
        notifier.notify(
            Level::Info,
            &format!("{} has no activity {}", statement.agent.name, period),
        );
    }

    let path = report::write_statement(&statement, &config.report, output)?;
    notifier.success(&format!(
        "Statement for {} saved to {} ({})",
        statement.agent.name,
        path.display(),
        statement.balance_state.label()
    ));
    Ok(path)
}

fn open_in_browser(path: &Path, notifier: &dyn Notifier) {
    if let Err(e) = open::that(path) {
        notifier.notify(
            Level::Warning,
            &format!("Could not open {}: {}", path.display(), e),
        );
    }
}

/// Keep the dashboard on screen until quit, Ctrl-C or idle sign-out.
async fn handle_watch(
    cmd: WatchArgs,
    config: &Config,
    client: RestClient,
    notifier: &dyn Notifier,
    mut session: Session,
) -> Result<i32> {
    let fetcher = DataFetcher::new(client, config.backend.use_summary_rpc);
    let mut controller =
        DashboardController::new(fetcher, aggregate_options(config, cmd.top), false);
    let liveness = controller.liveness();

    // Ctrl-C during a refresh must also drop the pending result
    let interrupt = {
        let liveness = controller.liveness();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                liveness.teardown();
            }
        })
    };

    let route = Route::Dashboard;
    let mut idle = IdleTimer::arm(&session, &route.path(), &config.session);

    let mut ticker = tokio::time::interval(Duration::from_secs(cmd.interval));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("👀 Watching dashboard. Enter refreshes, a row number prints a statement, q quits.");

    let exit_code = loop {
        if !liveness.is_alive() {
            break 0;
        }
        tokio::select! {
            _ = ticker.tick() => {
                refresh_watch(&mut controller, &cmd, config, notifier).await;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break 0,
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        break 1;
                    }
                };
                if let Some(ref timer) = idle {
                    timer.touch(ActivityEvent::KeyPress);
                }

                let input = line.trim();
                if input.eq_ignore_ascii_case("q") {
                    break 0;
                } else if let Some(role) = input.strip_prefix(":role ") {
                    session = Session::new(session.user.clone(), role.trim());
                    idle = match idle.take() {
                        Some(timer) => timer.rearm(&session, &route.path(), &config.session),
                        None => IdleTimer::arm(&session, &route.path(), &config.session),
                    };
                    notifier.notify(Level::Info, &format!("Role changed to {}", session.role));
                } else if let Ok(row) = input.parse::<usize>() {
                    select_watch_row(row, &controller, config, notifier).await;
                } else {
                    refresh_watch(&mut controller, &cmd, config, notifier).await;
                }
            }
            _ = idle_expired(&mut idle) => {
                notifier.notify(Level::Warning, "Signed out after inactivity. Sign in again to continue.");
                debug!("Navigating to {}", Route::Login.path());
                break 0;
            }
            _ = tokio::signal::ctrl_c() => {
                break 0;
            }
        }
    };

    liveness.teardown();
    interrupt.abort();
    drop(idle);
    if session.is_signed_in() {
        info!("Watch ended for {}", session.user);
    } else {
        info!("Watch ended; {} was signed out", session.user);
    }
    Ok(exit_code)
}

async fn refresh_watch<S: RowStore>(
    controller: &mut DashboardController<S>,
    cmd: &WatchArgs,
    config: &Config,
    notifier: &dyn Notifier,
) {
    let today = today();
    let range = cmd.range.resolve(config.dashboard.default_range, today);
    if let DashboardState::Ready(snapshot) = controller.load(range, today, notifier).await {
        let view = DashboardView::new(
            snapshot,
            &config.report.currency_symbol,
            &config.report.business_name,
        );
        print!("\x1B[2J\x1B[H{}", view.render_text());
    }
}

async fn select_watch_row<S: RowStore>(
    row: usize,
    controller: &DashboardController<S>,
    config: &Config,
    notifier: &dyn Notifier,
) {
    let DashboardState::Ready(snapshot) = controller.state() else {
        notifier.notify(Level::Warning, "Dashboard is not loaded yet");
        return;
    };
    let view = DashboardView::new(
        snapshot,
        &config.report.currency_symbol,
        &config.report.business_name,
    );

    let mut route: Option<Route> = None;
    if view.select_row(row, &mut route).is_none() {
        notifier.notify(Level::Warning, &format!("No row {}", row));
        return;
    }
    if let Some(route) = route {
        if let Err(e) = follow_route(route, config, controller.fetcher(), notifier, false).await {
            notifier.error(&format!("{:#}", e));
        }
    }
}

async fn idle_expired(timer: &mut Option<IdleTimer>) {
    match timer {
        Some(timer) => timer.expired().await,
        None => std::future::pending().await,
    }
}

/// Create/edit commands.
async fn handle_record<S: RowStore>(
    command: Command,
    store: &S,
    notifier: &dyn Notifier,
) -> Result<i32> {
    let service = RecordService::new(store);
    let today = today();
    let symbol_free = |amount: rust_decimal::Decimal| format::money(amount, "");

    match command {
        Command::Agent {
            action: AgentCommand::Add { name, phone },
        } => {
            let agent = service.create_agent(&AgentDraft { name, phone }).await?;
            notifier.success(&format!("Agent {} created (ID {})", agent.name, agent.id));
        }
        Command::Advance {
            action:
                AdvanceCommand::Add {
                    agent,
                    amount,
                    date,
                    method,
                    signer,
                },
        } => {
            let advance = service
                .create_advance(&AdvanceDraft {
                    agent_id: agent,
                    date: date.unwrap_or(today),
                    amount,
                    payment_method: method,
                    signer,
                })
                .await?;
            notifier.success(&format!(
                "Advance of {} recorded (ID {})",
                symbol_free(advance.amount),
                advance.id
            ));
        }
        Command::Expense {
            action:
                ExpenseCommand::Add {
                    agent,
                    expense_type,
                    amount,
                    date,
                    note,
                },
        } => {
            let expense = service
                .create_expense(&ExpenseDraft {
                    agent_id: agent,
                    date: date.unwrap_or(today),
                    expense_type,
                    amount,
                    note,
                })
                .await?;
            notifier.success(&format!(
                "{} expense of {} recorded (ID {})",
                expense.expense_type,
                symbol_free(expense.amount),
                expense.id
            ));
        }
        Command::Collection {
            action:
                CollectionCommand::Add {
                    agent,
                    date,
                    driver,
                    items,
                    total,
                },
        } => {
            let collection = service
                .create_collection(&CollectionDraft {
                    agent_id: agent,
                    date: date.unwrap_or(today),
                    driver,
                    items,
                    total_spend: total,
                })
                .await?;
            notifier.success(&format!(
                "Collection recorded (ID {}): {}, spend {}",
                collection.id,
                format::weight(collection.total_weight()),
                symbol_free(analysis::effective_spend(&collection))
            ));
        }
        Command::Payment {
            action:
                PaymentCommand::Add {
                    order,
                    amount,
                    date,
                    method,
                },
        } => {
            let (payment, order) = service
                .record_payment(&PaymentDraft {
                    order_id: order,
                    date: date.unwrap_or(today),
                    amount,
                    method,
                })
                .await?;
            notifier.success(&format!(
                "Payment of {} recorded on order {}; balance due {}",
                symbol_free(payment.amount),
                order.id,
                symbol_free(order.balance_due)
            ));
        }
        Command::Order {
            action:
                OrderCommand::Add {
                    customer,
                    customer_id,
                    category,
                    items,
                    discount,
                    date,
                },
        } => {
            let order = service
                .create_order(&OrderDraft {
                    customer_id,
                    customer_name: customer,
                    category,
                    items,
                    discount,
                    order_date: date.unwrap_or(today),
                })
                .await?;
            notifier.success(&format!(
                "{} order {} created, total {}",
                order.category,
                order.id,
                symbol_free(order.total)
            ));
        }
        Command::Order {
            action: OrderCommand::Status { id, status },
        } => {
            let order = service.set_status(&id, status).await?;
            notifier.success(&format!("Order {} is now {}", order.id, order.delivery_status));
        }
        other => {
            warn!("Unhandled command {:?}", other);
            return Ok(1);
        }
    }

    Ok(0)
}

async fn handle_delete<S: RowStore>(
    cmd: DeleteArgs,
    store: &S,
    notifier: &dyn Notifier,
) -> Result<i32> {
    let entity = cmd.kind.entity();

    let confirmation = if cmd.yes {
        Some(Confirmation::assume_yes(entity, &cmd.id))
    } else {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        Confirmation::prompt(entity, &cmd.id, &mut input, &mut output)
            .context("Failed to read confirmation")?
    };

    let Some(confirmation) = confirmation else {
        notifier.notify(Level::Info, "Nothing deleted.");
        return Ok(0);
    };

    match RecordService::new(store).delete(confirmation).await? {
        DeleteOutcome::Deleted => notifier.success(&format!("Deleted {} {}", entity, cmd.id)),
        DeleteOutcome::Deactivated => {
            notifier.success(&format!("Agent {} marked inactive", cmd.id))
        }
        DeleteOutcome::PaymentReversed(order) => notifier.success(&format!(
            "Payment {} deleted; order {} balance due is now {}",
            cmd.id,
            order.id,
            format::money(order.balance_due, "")
        )),
    }
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
