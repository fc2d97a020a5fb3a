use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[clap(
    name = "jcode-trace",
    about = "eBPF process telemetry agent for student containers"
)]
pub struct Args {
    #[clap(long, help = "Configuration file path (YAML or JSON)")]
    pub config: Option<PathBuf>,

    #[clap(long, help = "Base URL of the log backend")]
    pub api_url: Option<String>,

    #[clap(long, help = "Path to the compiled eBPF object")]
    pub bpf_object: Option<PathBuf>,

    #[clap(long, help = "Capacity of the collector to event loop queue")]
    pub queue_capacity: Option<usize>,

    #[clap(short, long, help = "Duration to run the agent in seconds")]
    pub duration: Option<u64>,

    #[clap(short, long, help = "Show debug output")]
    pub verbose: bool,
}
