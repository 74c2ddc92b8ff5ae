//! FHIR study summarization command-line interface

mod config;
mod report;
mod study;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use octofhir_summary_client::{RestClient, StoreLoader};
use octofhir_summary_model::RunContext;

use crate::config::{DatasetConfig, HostEntry};
use crate::study::DomainSelection;

/// Generate FHIR summary results for the specified research studies
#[derive(Parser)]
#[command(name = "fhir-summary")]
#[command(author, version, about = "Generate FHIR summary resources for a research study")]
#[command(
    after_help = "By default, all summaries are active; if any of the patient, \
condition or source flags are given, only the selected summaries are performed."
)]
struct Cli {
    /// Dataset YAML files with the details required to run a summarization
    config: Vec<PathBuf>,

    /// Host entry from the hosts file used to access the FHIR server
    #[arg(long)]
    host: Option<String>,

    /// Environment shortcut resolved through each dataset config; useful when
    /// the same command runs against differently-targeted configs
    #[arg(short, long, value_enum)]
    env: Option<Environment>,

    /// Short study tag captured in the meta property of each resource
    #[arg(short = 't', long, default_value = "")]
    meta_tag: String,

    /// Hosts file mapping host names to FHIR endpoints
    #[arg(long, default_value = "fhir_hosts.yaml")]
    hosts: PathBuf,

    /// Directory the report files are written into
    #[arg(long, default_value = "output/summaries")]
    out_dir: PathBuf,

    /// Summarize demographics
    #[arg(short, long)]
    patient: bool,

    /// Summarize conditions
    #[arg(short, long)]
    condition: bool,

    /// Summarize source tables
    #[arg(short, long)]
    source: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Environment {
    Local,
    Dev,
    Qa,
    Prod,
}

impl Environment {
    fn key(self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Qa => "qa",
            Environment::Prod => "prod",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    human_panic::setup_panic!();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.config.is_empty() {
        bail!("no dataset config files given");
    }
    if cli.host.is_some() && cli.env.is_some() {
        bail!("specifying both a host and an environment doesn't make sense, use only --env or --host");
    }

    let hosts = config::load_hosts(&cli.hosts)?;
    let selection = DomainSelection::from_flags(cli.patient, cli.condition, cli.source);

    for config_path in &cli.config {
        let dataset = DatasetConfig::load(config_path)?;

        let host_name = match (&cli.host, cli.env) {
            (Some(host), None) => host.clone(),
            (None, env) => {
                let env = env.unwrap_or_else(|| {
                    info!("defaulting to the local environment");
                    Environment::Local
                });
                match dataset.env.get(env.key()) {
                    Some(host) => host.clone(),
                    None => bail!(
                        "the environment '{}' is not configured in {}",
                        env.key(),
                        config_path.display()
                    ),
                }
            }
            (Some(_), Some(_)) => unreachable!("rejected above"),
        };
        let Some(entry) = hosts.get(&host_name) else {
            bail!("host '{host_name}' is not present in {}", cli.hosts.display());
        };

        let tag = if cli.meta_tag.is_empty() {
            dataset.study_id.clone().unwrap_or_default()
        } else {
            cli.meta_tag.clone()
        };
        if tag.is_empty() {
            bail!(
                "no study tag: pass --meta-tag or set study_id in {}",
                config_path.display()
            );
        }

        run(build_context(entry), &tag, selection, &cli.out_dir).await?;
    }

    Ok(())
}

/// One REST client serves as source, terminology service and destination;
/// a differently-targeted output server would swap only the store here
fn build_context(entry: &HostEntry) -> RunContext {
    let mut client = RestClient::new(&entry.url);
    if let Some(token) = &entry.auth_token {
        client = client.with_auth_token(token);
    }
    let client = Arc::new(client);

    RunContext::new()
        .with_input(client.clone())
        .with_terminology(client.clone())
        .with_output(client)
}

async fn run(
    context: RunContext,
    tag: &str,
    selection: DomainSelection,
    out_dir: &Path,
) -> anyhow::Result<()> {
    for mut study in study::load_studies(&context, tag).await? {
        study.summarize(selection).await?;

        report::write_text_reports(out_dir, &study.populations)?;

        let records = study.build_records()?;
        report::write_record_dump(out_dir, &study.tag, &records)?;

        info!(study = %study.id, count = records.len(), "loading summaries to server");
        let loader = StoreLoader::new(study.context().output()?.clone());
        loader.load(&records).await;
    }
    Ok(())
}
