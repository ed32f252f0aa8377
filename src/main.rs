use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use facesort::cli::SubCommandExtend;
use facesort::config::{Opts, SubCommand};

fn main() -> Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Validate(cmd) => cmd.run(&opts),
        SubCommand::Export(cmd) => cmd.run(&opts),
        SubCommand::Recognise(cmd) => cmd.run(&opts),
        SubCommand::AddNone(cmd) => cmd.run(&opts),
        SubCommand::Clean(cmd) => cmd.run(&opts),
    }
}
