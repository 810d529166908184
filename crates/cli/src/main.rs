use anyhow::Context;
use api_shared::config::core_config_from_env;
use api_shared::{authenticate, parse_id, status_message, HealthService};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use raccord_core::records::Caller;
use raccord_core::repositories::requests::RequestInput;
use raccord_core::repositories::visits::VisitInput;
use raccord_core::{
    DossierService, DossierStore, FileStore, RequestService, RequestType, VisitService, VisitType,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "raccord")]
#[command(about = "Raccord connection-permit dossier CLI")]
struct Cli {
    /// Acting user id (UUID)
    #[arg(long, global = true)]
    user: Option<String>,
    /// Acting user role (CLIENT, RESP_AEP, RESP_ASSEU, DIRECTEUR)
    #[arg(long, global = true)]
    role: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the CLI can reach its configuration
    Health,
    /// File a request as a client
    FileRequest {
        /// AEP, ASSEU or LES_DEUX
        request_type: String,
        title: String,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List requests for a network
    Requests {
        /// AEP, ASSEU or LES_DEUX
        request_type: String,
    },
    /// List study dossiers for a network
    Studies {
        request_type: String,
    },
    /// List execution dossiers for a network
    Executions {
        request_type: String,
    },
    /// Set a study dossier's status
    StudyStatus {
        dossier_id: String,
        /// EN_COURS, ACCEPTEE or A_CORRIGER
        status: String,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// Set an execution dossier's status
    ExecutionStatus {
        dossier_id: String,
        /// EN_COURS, ACCEPTEE or A_CORRIGER
        status: String,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// Log a site visit on an execution dossier
    LogVisit {
        execution_dossier_id: String,
        /// Visit date (RFC 3339); defaults to now
        #[arg(long)]
        date: Option<String>,
        /// AEP or ASSEU
        #[arg(long = "type")]
        visit_type: Option<String>,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// List visits on dossiers of a network, most recent first
    Visits {
        request_type: String,
    },
}

impl Cli {
    fn caller(&self) -> anyhow::Result<Caller> {
        authenticate(None, None, self.user.as_deref(), self.role.as_deref())
            .context("pass --user <UUID> and --role <ROLE>")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("raccord_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let Some(command) = &cli.command else {
        println!("Use 'raccord --help' for commands");
        return Ok(());
    };

    let cfg = core_config_from_env()?;
    let file_store = FileStore::open(cfg.data_dir(), cfg.lock_wait())?;
    tracing::debug!("records under {}", file_store.data_dir().display());
    let store: Arc<dyn DossierStore> = Arc::new(file_store);

    let requests = RequestService::new(Arc::clone(&store));
    let dossiers = DossierService::new(Arc::clone(&store), cfg.retry());
    let visits = VisitService::new(store);

    match command {
        Commands::Health => {
            println!("{}", HealthService::check_health().message);
        }
        Commands::FileRequest {
            request_type,
            title,
            city,
            address,
            description,
        } => {
            let request_type: RequestType = request_type.parse()?;
            let input = RequestInput {
                title: title.clone(),
                city: city.clone(),
                address: address.clone(),
                description: description.clone(),
                ..Default::default()
            };
            let created = requests.create(&cli.caller()?, request_type, input).await?;
            println!(
                "Filed request {} ({}), study dossier {}",
                created.request.id, created.request.request_type, created.study_dossier.id
            );
        }
        Commands::Requests { request_type } => {
            let listed = requests
                .list_by_type(&cli.caller()?, request_type.parse()?)
                .await?;
            if listed.is_empty() {
                println!("No requests found.");
            }
            for detail in listed {
                let r = detail.request;
                println!(
                    "ID: {}, Type: {}, Title: {}, Documents: {}, Created: {}",
                    r.id,
                    r.request_type,
                    r.title.as_str(),
                    detail.documents.len(),
                    r.created_at
                );
            }
        }
        Commands::Studies { request_type } => {
            for detail in dossiers.study_by_type(request_type.parse()?).await? {
                println!(
                    "ID: {}, Request: {} ({}), Status: {}",
                    detail.dossier.id,
                    detail.request.id,
                    detail.request.request_type,
                    detail.dossier.status
                );
            }
        }
        Commands::Executions { request_type } => {
            for detail in dossiers.execution_by_type(request_type.parse()?).await? {
                println!(
                    "ID: {}, Request: {} ({}), Status: {}",
                    detail.dossier.id,
                    detail.request.id,
                    detail.request.request_type,
                    detail.dossier.status
                );
            }
        }
        Commands::StudyStatus {
            dossier_id,
            status,
            remarks,
        } => {
            let reconciled = dossiers
                .update_study_status(&cli.caller()?, parse_id(dossier_id)?, status, remarks.clone())
                .await?;
            println!("{} -> {}", reconciled.outcome, reconciled.status);
            println!("{}", status_message(reconciled.outcome));
            if reconciled.execution_created {
                println!("Execution dossier opened.");
            }
        }
        Commands::ExecutionStatus {
            dossier_id,
            status,
            remarks,
        } => {
            let reconciled = dossiers
                .update_execution_status(
                    &cli.caller()?,
                    parse_id(dossier_id)?,
                    status,
                    remarks.clone(),
                )
                .await?;
            println!("{} -> {}", reconciled.outcome, reconciled.status);
            println!("{}", status_message(reconciled.outcome));
        }
        Commands::LogVisit {
            execution_dossier_id,
            date,
            visit_type,
            remarks,
        } => {
            let date = match date {
                Some(raw) => DateTime::parse_from_rfc3339(raw)
                    .with_context(|| format!("invalid date '{raw}'"))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let visit_type = visit_type
                .as_deref()
                .map(str::parse::<VisitType>)
                .transpose()?;
            let visit = visits
                .create(
                    &cli.caller()?,
                    VisitInput {
                        execution_dossier_id: parse_id(execution_dossier_id)?,
                        responsible_id: None,
                        date,
                        remarks: remarks.clone(),
                        visit_type,
                        file: None,
                    },
                )
                .await?;
            println!("Logged visit {} on {}", visit.id, visit.date);
        }
        Commands::Visits { request_type } => {
            for visit in visits.by_type(request_type.parse()?).await? {
                println!(
                    "ID: {}, Dossier: {}, Date: {}, Type: {}",
                    visit.id,
                    visit.execution_dossier_id,
                    visit.date,
                    visit.visit_type.map_or("-", |t| t.as_str())
                );
            }
        }
    }

    Ok(())
}
