use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::simulation::errors::SimulationError;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineArgs {
    #[arg(long, short)]
    pub config: String,
}

impl CommandLineArgs {
    pub fn new_with_path(path: impl ToString) -> Self {
        CommandLineArgs {
            config: path.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub simulation: Simulation,
    #[serde(default)]
    pub partitioning: Partitioning,
    #[serde(default)]
    pub output: Output,
}

impl Config {
    pub fn from_file(path: &Path) -> Self {
        let file = File::open(path)
            .unwrap_or_else(|e| panic!("Failed to open config at {path:?}. Original error: {e}"));
        serde_yaml::from_reader(BufReader::new(file))
            .unwrap_or_else(|e| panic!("Failed to parse config at {path:?}. Original error: {e}"))
    }

    /// Rejects configurations the engine cannot run on. Called once before partitioning;
    /// the tick loop itself assumes a valid config.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let sim = &self.simulation;
        if sim.time_step == 0 {
            return Err(SimulationError::ConfigurationError(String::from(
                "time_step must be positive",
            )));
        }
        if sim.end_time < sim.start_time {
            return Err(SimulationError::ConfigurationError(format!(
                "end_time {} lies before start_time {}",
                sim.end_time, sim.start_time
            )));
        }
        if !(sim.sample_size > 0.0) {
            return Err(SimulationError::ConfigurationError(format!(
                "sample_size must be positive, was {}",
                sim.sample_size
            )));
        }
        if self.partitioning.num_parts == 0 {
            return Err(SimulationError::ConfigurationError(String::from(
                "num_parts must be at least 1",
            )));
        }
        Ok(())
    }
}

impl From<CommandLineArgs> for Config {
    fn from(args: CommandLineArgs) -> Self {
        Config::from_file(&PathBuf::from(args.config))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Simulation {
    pub start_time: u32,
    pub end_time: u32,
    /// Length of one tick in seconds.
    pub time_step: u32,
    /// Scale factor applied to flow and storage capacities, i.e. the share of the real
    /// demand this scenario represents.
    pub sample_size: f32,
    /// Seconds a blocked vehicle may sit at the head of a link before it is pushed
    /// downstream regardless of storage. `u32::MAX` disables the push.
    pub stuck_threshold: u32,
    /// Modes simulated on the network. Legs of any other mode are teleported.
    pub main_modes: Vec<String>,
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation {
            start_time: 0,
            end_time: 86400,
            time_step: 1,
            sample_size: 1.0,
            stuck_threshold: u32::MAX,
            main_modes: vec![String::from("car")],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Partitioning {
    pub num_parts: u32,
}

impl Default for Partitioning {
    fn default() -> Self {
        Partitioning { num_parts: 1 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Output {
    pub output_dir: PathBuf,
    pub logging: Logging,
    pub write_events: WriteEvents,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            output_dir: PathBuf::from("./"),
            logging: Logging::Console,
            write_events: WriteEvents::None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logging {
    Console,
    File,
    None,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEvents {
    None,
    Text,
    TextGz,
}
