use std::{fmt::Display, sync::Arc};

use clap::{Parser, Subcommand};
use log::LevelFilter;

use sinklog::{
    config::LocalConfigManager,
    logging::{Builder, LogBridge},
};

mod emit;
mod info;

#[derive(Subcommand, Debug)]
pub enum SinklogCmd {
    Emit(emit::Cmd),

    Info(info::Cmd),
}

impl Display for SinklogCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinklogCmd::Emit(cmd) => write!(f, "emit {}", cmd.level),
            SinklogCmd::Info(_cmd) => write!(f, "info"),
        }
    }
}

#[derive(Parser)]
#[command(version, long_version = "")]
#[command(about = "Emit leveled log events to files, streams and database tables.", long_about = None, disable_help_subcommand = true)]
pub struct Sinklog {
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Write verbose messages to stderr for debugging.",
        display_order = 999
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: SinklogCmd,
}

impl Sinklog {
    fn log_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Off,
            1 => LevelFilter::Error,
            2 => LevelFilter::Warn,
            3 => LevelFilter::Info,
            4 => LevelFilter::Debug,
            5_u8..=u8::MAX => LevelFilter::Trace,
        }
    }

    fn setup_logging(&self) -> eyre::Result<()> {
        let filter = self.log_filter();
        if filter == LevelFilter::Off {
            return Ok(());
        }

        let logger = Builder::new()
            .with_debug(filter >= LevelFilter::Debug)
            .with_stderr_sink()
            .build()?;

        LogBridge::new(Arc::new(logger), filter).init()
    }

    pub fn run(self) -> eyre::Result<()> {
        self.setup_logging()?;

        let config = LocalConfigManager::new();
        log::info!(target: "sinklog", "running command {}", &self.cmd);

        let result = match &self.cmd {
            SinklogCmd::Emit(emit) => emit.run(&config),
            SinklogCmd::Info(info) => info.run(&config),
        };

        if let Err(msg) = &result {
            log::error!(target: "sinklog", "failed running command {}, error={} cause={}", &self.cmd, msg, msg.root_cause());
        }

        result
    }
}
