use std::error::Error;

use clap::Parser;
use contentfetch::{
    cli::{
        args::{CliArgs, Command},
        command_handlers::{build_specification, do_detect, do_fetch},
    },
    Contentfetch,
};

fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();

    let mut builder = Contentfetch::builder();
    if let Some(config) = &cli_args.config {
        builder = builder.config_file(config);
    }

    match cli_args.cmd {
        Command::Detect { source, reference } => {
            let contentfetch = builder.try_build()?;
            do_detect(&contentfetch, &source, reference.as_deref())
        }
        Command::Fetch {
            source,
            output_dir,
            reference,
            spec,
            raw,
        } => {
            if raw {
                builder = builder.yield_output(true);
            }
            let contentfetch = builder.try_build()?;
            let specification = build_specification(spec.as_deref(), source, reference)?;
            do_fetch(&contentfetch, &specification, &output_dir)
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
