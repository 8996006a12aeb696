use clap::{Args, CommandFactory};

use sinklog::config::ConfigManager;

use crate::commands::Sinklog;

#[derive(Args, Debug)]
pub struct Cmd {}

impl Cmd {
    pub fn run(&self, config: &impl ConfigManager) -> eyre::Result<()> {
        println!(
            "Version:        {}",
            Sinklog::command().get_version().unwrap_or("")
        );
        println!(
            "Default log:    {}",
            config.get_log_path().unwrap_or("".to_string())
        );
        Ok(())
    }
}
