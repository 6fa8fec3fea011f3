use std::process::ExitCode;

use clap::Parser;
use twi_temp::{config::Cli, delay::StdDelay, format_reading, lock::BusLock, mem::MemDevice, measure, Error};

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_module("twi_temp", cli.log_level())
        .filter_module("lm73", cli.log_level())
        .init();

    match run(&cli) {
        Ok(celsius) => {
            println!("{}", format_reading(celsius));
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<f32, Error> {
    // held until every controller access below is finished
    let _lock = BusLock::acquire(&cli.lock_file).map_err(Error::Lock)?;

    let device = MemDevice::open(&cli.mem_device)?;
    let window = device.map(cli.base)?;

    measure(window, &mut StdDelay, &cli.options())
}
