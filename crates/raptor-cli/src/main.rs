use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "raptor",
    about = "Raptor: dependency-aware service deployment onto spawnpoints",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a descriptor and tail the launched services' logs.
    ///
    /// With --compiler, the input is first compiled to a binary descriptor
    /// by running `<compiler> <input> <output>`. Otherwise the input is read
    /// directly (`.json` as JSON, anything else as the binary encoding).
    Submit {
        /// Deployment descriptor (or compiler input)
        #[arg(short, long)]
        input: String,
        /// Entity used for services that name none
        #[arg(short, long, env = "RAPTOR_DEFAULT_ENTITY")]
        entity: String,
        /// Path to raptor.toml (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<String>,
        /// Descriptor compiler to run on the input first
        #[arg(long)]
        compiler: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("raptor=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            input,
            entity,
            config,
            compiler,
        } => {
            commands::submit::submit(commands::submit::SubmitArgs {
                input,
                entity,
                config,
                compiler,
            })
            .await
        }
    }
}
