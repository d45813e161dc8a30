use std::path::PathBuf;

use anyhow::Result;
use clap::{
  ArgAction,
  Parser,
  Subcommand,
};

#[derive(Clone, Debug)]
pub struct CliOptions {
  pub verbosity:   u8,
  pub log_file:    Option<PathBuf>,
  pub config_file: Option<PathBuf>,
  pub command:     Command,
}

#[derive(Clone, Debug)]
pub enum Command {
  Replay {
    file:    Option<PathBuf>,
    journal: PathBuf,
    output:  Option<PathBuf>,
    record:  Option<PathBuf>,
  },
  Dump {
    journal: PathBuf,
  },
}

impl CliOptions {
  pub fn parse() -> Result<Self> {
    let raw = RawCli::parse();
    raw.try_into()
  }
}

#[derive(Parser, Debug)]
#[command(name = "the-editor", about, long_about = None, version)]
struct RawCli {
  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count, global = true)]
  verbosity: u8,

  /// Save logs to a specific file instead of stderr
  #[arg(long = "log", value_name = "FILE", global = true)]
  log_file: Option<PathBuf>,

  /// Load configuration from a specific file
  #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
  config_file: Option<PathBuf>,

  #[command(subcommand)]
  command: RawCommand,
}

#[derive(Subcommand, Debug)]
enum RawCommand {
  /// Load a file, apply a journal to it and write the result
  Replay {
    /// Base document; the journal is applied to an empty document if omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Journal to apply
    #[arg(short = 'j', long = "journal", value_name = "LOG")]
    journal: PathBuf,

    /// Where to write the resulting document (stdout if omitted)
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Re-record the applied entries into a new journal using the configured
    /// journal version
    #[arg(long = "record", value_name = "LOG")]
    record: Option<PathBuf>,
  },
  /// Print the entries of a journal in the text format
  Dump {
    #[arg(value_name = "LOG")]
    journal: PathBuf,
  },
}

impl TryFrom<RawCli> for CliOptions {
  type Error = anyhow::Error;

  fn try_from(raw: RawCli) -> Result<Self> {
    let command = match raw.command {
      RawCommand::Replay {
        file,
        journal,
        output,
        record,
      } => {
        if record.is_some() && record == output {
          anyhow::bail!("--record and --output must name different files");
        }
        Command::Replay {
          file,
          journal,
          output,
          record,
        }
      },
      RawCommand::Dump { journal } => Command::Dump { journal },
    };

    Ok(Self {
      verbosity: raw.verbosity,
      log_file: raw.log_file,
      config_file: raw.config_file,
      command,
    })
  }
}
