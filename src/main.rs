use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use k8s_headroom::report::write_report;
use k8s_headroom::{analyze, ConnectionConfig, KubeLoader, OutputFormat, Snapshot};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "k8s-headroom",
    about = "Show CPU, memory and pod headroom left on each node after scheduled limits"
)]
struct Cli {
    /// Path to a kubeconfig file
    #[arg(long, env = "KUBECONFIG_PATH", conflicts_with = "in_cluster")]
    kubeconfig: Option<PathBuf>,

    /// Context to use from the kubeconfig
    #[arg(long, requires = "kubeconfig")]
    context: Option<String>,

    /// Use the pod's service-account credentials
    #[arg(long)]
    in_cluster: bool,

    /// Only account pods in these namespaces (repeatable)
    #[arg(short = 'n', long = "namespace")]
    namespaces: Vec<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

impl Cli {
    fn connection(&self) -> ConnectionConfig {
        match (&self.kubeconfig, self.in_cluster) {
            (Some(path), _) => ConnectionConfig::kubeconfig(path, self.context.clone()),
            (None, true) => ConnectionConfig::InCluster,
            (None, false) => ConnectionConfig::Inferred,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let loader = KubeLoader::connect(&cli.connection())
        .await
        .context("cannot connect to kubernetes")?;
    let snapshot = Snapshot::load(&loader, &cli.namespaces)
        .await
        .context("cannot load cluster topology")?;
    let analysis = analyze(snapshot);

    let mut stdout = std::io::stdout().lock();
    write_report(&mut stdout, &analysis, cli.output)?;

    Ok(())
}
