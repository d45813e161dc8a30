use std::{
  fs::File,
  io::{
    self,
    BufReader,
    BufWriter,
    Write,
  },
  path::{
    Path,
    PathBuf,
  },
};

use anyhow::{
  Context,
  Result,
};
use the_lib::{
  config::Config,
  editor::DocumentEditor,
  journal::{
    self,
    JournalReader,
    JournalTask,
    JournalWriter,
    TEXT_VERSION,
  },
};
use the_stdx::source::MmapSource;
use tokio_util::sync::CancellationToken;

use crate::cli::{
  CliOptions,
  Command,
};

mod cli;

fn main() -> Result<()> {
  let exit_code = main_impl()?;
  std::process::exit(exit_code);
}

fn main_impl() -> Result<i32> {
  let options = CliOptions::parse()?;
  setup_logging(options.verbosity, options.log_file.as_deref())
    .context("failed to initialize logging")?;

  let config = match &options.config_file {
    Some(path) => {
      Config::load(path).with_context(|| format!("failed to load config {}", path.display()))?
    },
    None => Config::default(),
  };
  config.validate()?;

  match options.command {
    Command::Replay {
      file,
      journal,
      output,
      record,
    } => replay(config, file, &journal, output, record)?,
    Command::Dump { journal } => dump(&journal)?,
  }
  Ok(0)
}

fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
  let mut base_config = fern::Dispatch::new();

  base_config = match verbosity {
    0 => base_config.level(log::LevelFilter::Warn),
    1 => base_config.level(log::LevelFilter::Info),
    2 => base_config.level(log::LevelFilter::Debug),
    _3_or_more => base_config.level(log::LevelFilter::Trace),
  };

  let format = fern::Dispatch::new().format(|out, message, record| {
    out.finish(format_args!(
      "{} {} [{}] {}",
      chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
      record.target(),
      record.level(),
      message
    ))
  });
  let output = match log_file {
    Some(path) => format.chain(fern::log_file(path)?),
    None => format.chain(io::stderr()),
  };

  base_config.chain(output).apply()?;
  Ok(())
}

fn replay(
  config: Config,
  file: Option<PathBuf>,
  journal_path: &Path,
  output: Option<PathBuf>,
  record: Option<PathBuf>,
) -> Result<()> {
  let journal_version = config.journal_version;
  // Nothing renders here, so the render queue is dropped right away.
  let (editor, _) = DocumentEditor::<()>::new(config)?;

  if let Some(file) = &file {
    let source = MmapSource::open(file)
      .with_context(|| format!("failed to open {}", file.display()))?
      .into_shared();
    let summary = editor.load(CancellationToken::new(), source)?.wait()?;
    log::info!("loaded {} lines from {}", summary.lines, file.display());
  }

  let recorder = match &record {
    Some(path) => {
      let out = BufWriter::new(File::create(path)?);
      let task = JournalTask::spawn(JournalWriter::open(out, journal_version)?)?;
      editor.subscribe(task.subscriber());
      Some(task)
    },
    None => None,
  };

  let input = File::open(journal_path)
    .with_context(|| format!("failed to open journal {}", journal_path.display()))?;
  let applied = journal::replay(&editor, JournalReader::new(BufReader::new(input)))?;
  log::info!("applied {applied} entries from {}", journal_path.display());

  if let Some(task) = recorder {
    task.finish()?.into_inner().flush()?;
  }

  match output {
    Some(path) => editor.save(&path)?,
    None => {
      let mut stdout = io::stdout().lock();
      editor.text().write_to(&mut stdout)?;
      stdout.flush()?;
    },
  }
  Ok(())
}

fn dump(journal_path: &Path) -> Result<()> {
  let input = File::open(journal_path)
    .with_context(|| format!("failed to open journal {}", journal_path.display()))?;
  let text = journal::serializer_for(TEXT_VERSION)?;
  let mut stdout = io::stdout().lock();
  let mut buf = Vec::new();
  for entry in JournalReader::new(BufReader::new(input)) {
    buf.clear();
    text.encode(&entry?, &mut buf)?;
    stdout.write_all(&buf)?;
  }
  stdout.flush()?;
  Ok(())
}
