//! CLI module for the invoice portal client.
//!
//! Provides subcommands for working against the portal backend:
//! - `login`, `logout`, `whoami` - Manage the saved session
//! - `upload <xml>` - Submit an invoice and print its receipt
//! - `invoices`, `invoice <id>` - Supplier invoice listing and detail
//! - `dashboard`, `suppliers`, `all-invoices` - Admin views
//! - `set-status`, `create-supplier`, `export-csv` - Admin actions
//! - `call <action> key=value...` - Invoke any action in the action table
//! - `config check` - Validate configuration file

pub mod format;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use serde_json::Value;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::gateway::{ApiClient, Params};
use crate::portal::{
    Attachment, InvoiceCriteria, InvoiceFilter, InvoiceStatus, InvoiceSummary, InvoiceUpload,
    NewSupplier, Portal, PortalError, StatusChange,
};
use crate::session::{FileStorage, SessionStore};
use format::{format_date_time, format_money, or_dash, receipt_text, truncate, CSV_BOM};

/// Shown instead of the raw error when the backend could not be reached.
const CONNECTIVITY_MESSAGE: &str =
    "Could not reach the portal backend. Check your connection and the configured endpoint.";

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "invoice-portal")]
#[command(author, version, about = "Command-line client for the supplier invoice portal", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "portal.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Backend endpoint (overrides api.endpoint)
    #[arg(long, env = "PORTAL_API_URL")]
    pub endpoint: Option<String>,

    /// Session file (overrides session.path)
    #[arg(long, env = "PORTAL_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and save the session
    Login {
        /// Account email
        email: String,
        /// Password (prompted without echo when omitted)
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the saved session
    Logout,

    /// Show who is logged in
    Whoami,

    /// Upload a CFDI invoice
    Upload {
        /// XML invoice file
        xml: PathBuf,
        /// Optional PDF rendering
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Notes for the reviewer
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List the logged-in supplier's invoices
    Invoices,

    /// Show one invoice in full
    Invoice {
        /// Invoice ID
        id: String,
    },

    /// Show admin dashboard counters
    Dashboard,

    /// List registered suppliers
    Suppliers,

    /// List invoices across all suppliers
    AllInvoices {
        /// Only this supplier
        #[arg(long)]
        supplier: Option<String>,
        /// Only this status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Issued on or after (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Issued on or before (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Only invoices due for payment this week
        #[arg(long, conflicts_with_all = ["supplier", "status", "from", "to", "overdue"])]
        due_this_week: bool,
        /// Only invoices past their scheduled payment date
        #[arg(long, conflicts_with_all = ["supplier", "status", "from", "to"])]
        overdue: bool,
    },

    /// Change an invoice's status
    SetStatus {
        /// Invoice ID
        id: String,
        #[arg(value_enum)]
        status: StatusArg,
        /// Reason (required when rejecting)
        #[arg(long, default_value = "")]
        reason: String,
        /// Actual payment date (YYYY-MM-DD)
        #[arg(long)]
        paid_on: Option<String>,
        /// Payment reference, e.g. a transfer ID
        #[arg(long, default_value = "")]
        reference: String,
    },

    /// Download all invoices as CSV
    ExportCsv {
        /// Output file (default: name suggested by the backend)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Register a new supplier account
    CreateSupplier {
        #[arg(long)]
        name: String,
        #[arg(long)]
        rfc: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        /// Initial password for the supplier
        #[arg(long, env = "PORTAL_SUPPLIER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Invoke a backend action directly and print the raw envelope
    Call {
        /// Action name
        action: String,
        /// Parameters as key=value
        params: Vec<String>,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    Scheduled,
    Paid,
    Rejected,
    InReview,
}

impl From<StatusArg> for InvoiceStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Scheduled => InvoiceStatus::Scheduled,
            StatusArg::Paid => InvoiceStatus::Paid,
            StatusArg::Rejected => InvoiceStatus::Rejected,
            StatusArg::InReview => InvoiceStatus::InReview,
        }
    }
}

impl Cli {
    /// Apply command-line and environment overrides on top of the file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.api.endpoint = Some(endpoint.clone());
        }
        if let Some(path) = &self.session_file {
            config.session.path = path.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

fn open_session(config: &Config) -> Arc<SessionStore> {
    Arc::new(SessionStore::open(FileStorage::new(&config.session.path)))
}

fn open_portal(config: &Config) -> Result<Portal> {
    let client = ApiClient::from_config(config, open_session(config))?;
    Ok(Portal::new(client))
}

/// Turn a portal error into the message the user sees.
fn report(err: PortalError) -> anyhow::Error {
    if err.is_transport() {
        tracing::debug!(error = %err, "Backend unreachable");
        anyhow::Error::new(err).context(CONNECTIVITY_MESSAGE)
    } else {
        anyhow::Error::new(err)
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Login { email, password } => cmd_login(config, email, password.as_deref()).await,
        Commands::Logout => cmd_logout(config),
        Commands::Whoami => cmd_whoami(config),
        Commands::Upload { xml, pdf, notes } => {
            cmd_upload(config, xml, pdf.as_deref(), notes).await
        }
        Commands::Invoices => cmd_invoices(config).await,
        Commands::Invoice { id } => cmd_invoice(config, id).await,
        Commands::Dashboard => cmd_dashboard(config).await,
        Commands::Suppliers => cmd_suppliers(config).await,
        Commands::AllInvoices {
            supplier,
            status,
            from,
            to,
            due_this_week,
            overdue,
        } => {
            let filter = if *due_this_week {
                InvoiceFilter::DueThisWeek
            } else if *overdue {
                InvoiceFilter::Overdue
            } else {
                InvoiceFilter::Criteria(InvoiceCriteria {
                    supplier_id: supplier.clone(),
                    status: status.map(InvoiceStatus::from),
                    from: from.clone(),
                    to: to.clone(),
                })
            };
            cmd_all_invoices(config, &filter).await
        }
        Commands::SetStatus {
            id,
            status,
            reason,
            paid_on,
            reference,
        } => {
            let change = StatusChange {
                invoice_id: id.clone(),
                status: (*status).into(),
                reason: reason.clone(),
                paid_on: paid_on.clone(),
                payment_reference: reference.clone(),
            };
            cmd_set_status(config, &change).await
        }
        Commands::ExportCsv { output } => cmd_export_csv(config, output.as_deref()).await,
        Commands::CreateSupplier {
            name,
            rfc,
            email,
            phone,
            password,
        } => {
            let supplier = NewSupplier {
                name: name.clone(),
                rfc: rfc.clone(),
                email: email.clone(),
                phone: phone.clone(),
                password: password.clone(),
            };
            cmd_create_supplier(config, &supplier).await
        }
        Commands::Call { action, params } => cmd_call(config, action, params).await,
        Commands::Config(ConfigCommands::Check) => cmd_config_check(cli, config),
    }
}

/// Apply one key press to the password buffer. Returns true on Enter.
fn password_key(buffer: &mut String, key: KeyEvent) -> Result<bool> {
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }
    match key.code {
        KeyCode::Enter => return Ok(true),
        KeyCode::Esc => bail!("Password entry cancelled"),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            bail!("Password entry cancelled")
        }
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Char(c) => buffer.push(c),
        _ => {}
    }
    Ok(false)
}

fn read_password_keys() -> Result<String> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read().context("Failed to read password")? {
            if password_key(&mut password, key)? {
                return Ok(password);
            }
        }
    }
}

/// Read a password from the terminal without echoing it. Piped stdin is
/// read as a plain line.
fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush().context("Failed to write prompt")?;

    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password")?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    terminal::enable_raw_mode().context("Failed to disable terminal echo")?;
    let password = read_password_keys();
    terminal::disable_raw_mode().context("Failed to restore terminal")?;
    println!();
    password
}

async fn cmd_login(config: &Config, email: &str, password: Option<&str>) -> Result<()> {
    let portal = open_portal(config)?;
    let password = match password {
        Some(p) => p.to_string(),
        None => prompt_password()?,
    };

    let session = portal.login(email, &password).await.map_err(report)?;
    println!(
        "[OK] Logged in as {} ({})",
        session.user.label(),
        session.user.role
    );
    Ok(())
}

fn cmd_logout(config: &Config) -> Result<()> {
    let session = open_session(config);
    let was_logged_in = session.is_logged_in();
    session.clear().context("Failed to clear saved session")?;

    if was_logged_in {
        println!("Logged out.");
    } else {
        println!("No saved session.");
    }
    Ok(())
}

fn cmd_whoami(config: &Config) -> Result<()> {
    let session = open_session(config);
    match session.user() {
        Some(user) => {
            println!("Name:   {}", user.label());
            println!("Email:  {}", user.email);
            println!("Role:   {}", user.role);
        }
        None => println!("Not logged in. Run 'invoice-portal login <email>'."),
    }
    Ok(())
}

async fn cmd_upload(config: &Config, xml: &Path, pdf: Option<&Path>, notes: &str) -> Result<()> {
    let portal = open_portal(config)?;

    let xml = Attachment::from_path(xml)
        .with_context(|| format!("Failed to read {}", xml.display()))?;
    let pdf = pdf
        .map(|p| Attachment::from_path(p).with_context(|| format!("Failed to read {}", p.display())))
        .transpose()?;

    let upload = InvoiceUpload {
        xml,
        pdf,
        notes: notes.to_string(),
    };
    let outcome = portal.upload_invoice(&upload).await.map_err(report)?;

    if !outcome.message.is_empty() {
        println!("[OK] {}", outcome.message);
    }
    println!();
    print!("{}", receipt_text(&outcome.receipt, &Local));
    println!();
    Ok(())
}

fn print_invoice_table(invoices: &[InvoiceSummary], with_supplier: bool) {
    if invoices.is_empty() {
        println!("No invoices found.");
        return;
    }

    println!();
    if with_supplier {
        println!(
            "{:<12}  {:<14}  {:<24}  {:<10}  {:>14}  {:<10}  {:<12}",
            "ID", "FOLIO", "SUPPLIER", "ISSUED", "TOTAL", "PAYMENT", "STATUS"
        );
        println!("{}", "-".repeat(110));
    } else {
        println!(
            "{:<12}  {:<14}  {:<10}  {:>14}  {:<10}  {:<12}",
            "ID", "FOLIO", "ISSUED", "TOTAL", "PAYMENT", "STATUS"
        );
        println!("{}", "-".repeat(84));
    }

    for invoice in invoices {
        let total = format_money(invoice.total);
        if with_supplier {
            println!(
                "{:<12}  {:<14}  {:<24}  {:<10}  {:>14}  {:<10}  {:<12}",
                truncate(&invoice.invoice_id, 12),
                truncate(or_dash(&invoice.folio_interno), 14),
                truncate(or_dash(&invoice.supplier_name), 24),
                or_dash(&invoice.fecha_emision),
                total,
                or_dash(&invoice.fecha_pago_programada),
                invoice.estatus
            );
        } else {
            println!(
                "{:<12}  {:<14}  {:<10}  {:>14}  {:<10}  {:<12}",
                truncate(&invoice.invoice_id, 12),
                truncate(or_dash(&invoice.folio_interno), 14),
                or_dash(&invoice.fecha_emision),
                total,
                or_dash(&invoice.fecha_pago_programada),
                invoice.estatus
            );
        }
    }

    println!();
}

async fn cmd_invoices(config: &Config) -> Result<()> {
    let portal = open_portal(config)?;
    let invoices = portal.my_invoices().await.map_err(report)?;
    print_invoice_table(&invoices, false);
    Ok(())
}

async fn cmd_invoice(config: &Config, id: &str) -> Result<()> {
    let portal = open_portal(config)?;
    let invoice = portal.invoice_detail(id).await.map_err(report)?;

    println!();
    println!("=== Invoice: {} ===", invoice.invoice_id);
    println!();
    println!("Folio:            {}", or_dash(&invoice.folio_interno));
    println!("UUID:             {}", or_dash(&invoice.uuid));
    println!("Issuer RFC:       {}", or_dash(&invoice.rfc_emisor));
    println!("Issuer name:      {}", or_dash(&invoice.nombre_emisor));
    println!("Issued:           {}", or_dash(&invoice.fecha_emision));
    println!(
        "Total:            ${} {}",
        format_money(invoice.total),
        invoice.moneda
    );
    println!(
        "Received:         {}",
        format_date_time(&invoice.fecha_recepcion, &Local)
    );
    println!(
        "Scheduled pay:    {}",
        or_dash(&invoice.fecha_pago_programada)
    );
    println!("Status:           {}", invoice.estatus);

    if !invoice.fecha_pago_real.is_empty() {
        println!("Paid on:          {}", invoice.fecha_pago_real);
    }
    if !invoice.referencia_pago.is_empty() {
        println!("Payment ref:      {}", invoice.referencia_pago);
    }
    if !invoice.rechazo_motivo.is_empty() {
        println!("Rejection reason: {}", invoice.rechazo_motivo);
    }
    if !invoice.observaciones.is_empty() {
        println!("Notes:            {}", invoice.observaciones);
    }
    if let Some(url) = &invoice.xml_download_url {
        println!("XML:              {}", url);
    }
    if let Some(url) = &invoice.pdf_download_url {
        println!("PDF:              {}", url);
    }
    println!();

    Ok(())
}

async fn cmd_dashboard(config: &Config) -> Result<()> {
    let portal = open_portal(config)?;
    let stats = portal.dashboard_stats().await.map_err(report)?;

    println!();
    println!("=== Dashboard ===");
    println!();
    println!("Invoices:          {}", stats.total);
    println!("  Scheduled:       {}", stats.programadas);
    println!("  Paid:            {}", stats.pagadas);
    println!("  In review:       {}", stats.en_revision);
    println!("  Overdue:         {}", stats.vencidas);
    println!("  Due this week:   {}", stats.por_pagar_esta_semana);
    println!("Pending amount:    ${}", format_money(stats.monto_pendiente));
    println!();

    Ok(())
}

async fn cmd_suppliers(config: &Config) -> Result<()> {
    let portal = open_portal(config)?;
    let suppliers = portal.suppliers().await.map_err(report)?;

    if suppliers.is_empty() {
        println!("No suppliers found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<10}  {:<30}  {:<13}  {:<30}  {:<8}",
        "ID", "NAME", "RFC", "EMAIL", "STATE"
    );
    println!("{}", "-".repeat(99));

    for supplier in suppliers {
        let state = if supplier.is_active() {
            "active"
        } else {
            or_dash(&supplier.estado)
        };
        println!(
            "{:<10}  {:<30}  {:<13}  {:<30}  {:<8}",
            truncate(&supplier.supplier_id, 10),
            truncate(or_dash(&supplier.nombre), 30),
            or_dash(&supplier.rfc),
            truncate(or_dash(&supplier.correo), 30),
            state
        );
    }

    println!();
    Ok(())
}

async fn cmd_all_invoices(config: &Config, filter: &InvoiceFilter) -> Result<()> {
    let portal = open_portal(config)?;
    let invoices = portal.all_invoices(filter).await.map_err(report)?;
    print_invoice_table(&invoices, true);
    Ok(())
}

async fn cmd_set_status(config: &Config, change: &StatusChange) -> Result<()> {
    let portal = open_portal(config)?;
    let message = portal.update_invoice_status(change).await.map_err(report)?;

    if message.is_empty() {
        println!(
            "[OK] Invoice {} is now {}",
            change.invoice_id, change.status
        );
    } else {
        println!("[OK] {}", message);
    }
    Ok(())
}

/// Keep only the final path component of a backend-suggested file name.
fn export_file_name(suggested: &str) -> PathBuf {
    Path::new(suggested)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("invoices.csv"))
}

async fn cmd_export_csv(config: &Config, output: Option<&Path>) -> Result<()> {
    let portal = open_portal(config)?;
    let export = portal.export_csv().await.map_err(report)?;

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => export_file_name(&export.filename),
    };
    std::fs::write(&path, format!("{}{}", CSV_BOM, export.csv))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("[OK] Exported to {}", path.display());
    Ok(())
}

async fn cmd_create_supplier(config: &Config, supplier: &NewSupplier) -> Result<()> {
    let portal = open_portal(config)?;
    let message = portal.create_supplier(supplier).await.map_err(report)?;

    if message.is_empty() {
        println!("[OK] Supplier {} created", supplier.name.trim());
    } else {
        println!("[OK] {}", message);
    }
    Ok(())
}

/// Parse `key=value` arguments. Values are sent as strings.
fn parse_params(args: &[String]) -> Result<Params> {
    let mut params = Params::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("Invalid parameter '{}': expected key=value", arg);
        };
        if key.is_empty() {
            bail!("Invalid parameter '{}': empty key", arg);
        }
        if params
            .insert(key.to_string(), Value::String(value.to_string()))
            .is_some()
        {
            bail!("Parameter '{}' given more than once", key);
        }
    }
    Ok(params)
}

async fn cmd_call(config: &Config, action: &str, args: &[String]) -> Result<()> {
    let params = parse_params(args)?;
    let portal = open_portal(config)?;

    let envelope = portal
        .client()
        .call(action, params)
        .await
        .map_err(|e| report(e.into()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&envelope.to_json()).context("Failed to render response")?
    );
    if let Some(error) = envelope.error() {
        bail!("{}", error);
    }
    Ok(())
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli, config: &Config) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!("Defaults plus command-line overrides will be used.");
        println!();
    }

    match config.validate() {
        Ok(()) => println!("[OK] Configuration is valid!"),
        Err(e) => {
            println!("[!!] Configuration is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            bail!("Invalid configuration");
        }
    }

    println!();
    println!("=== Configuration Summary ===");
    println!();
    println!("API:");
    println!(
        "  Endpoint:     {}",
        config.api.endpoint.as_deref().unwrap_or("-")
    );
    println!("  Timeout:      {}s", config.api.timeout_secs);
    println!("  Write type:   {}", config.api.write_content_type);
    println!();
    println!("Session:");
    println!("  File:         {}", config.session.path.display());
    println!();
    println!("Logging:");
    println!("  Level:        {}", config.logging.level);
    println!();

    let actions = config.action_table()?;
    println!("Actions:");
    for (name, spec) in actions.iter() {
        println!(
            "  {:<22} {:<5} {}",
            name,
            spec.method.as_str(),
            if spec.requires_token {
                "token"
            } else {
                "anonymous"
            }
        );
    }
    println!();

    Ok(())
}
