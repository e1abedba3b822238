// Entrypoint: parse arguments, wire the gateway and state store into the
// client, dispatch. Exit-code policy lives in `cli::run`.

use std::process::ExitCode;

use clap::Parser;

use manai::cli::{self, Cli};
use manai::client::Manai;
use manai::gateway::HttpGateway;
use manai::store::StateStore;

fn main() -> ExitCode {
    env_logger::init();
    let args = Cli::parse();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> anyhow::Result<ExitCode> {
    let gateway = HttpGateway::new(args.url.clone(), args.key.clone())?;
    let client = Manai::new(gateway, StateStore::open());
    cli::run(args, &client)
}
