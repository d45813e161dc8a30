use std::{
  io::{
    self,
    Write,
  },
  sync::{
    Arc,
    Mutex,
    atomic::{
      AtomicUsize,
      Ordering,
    },
  },
};

use quickcheck::{
  Arbitrary,
  Gen,
};
use the_lib::{
  config::Config,
  editor::{
    DocumentEditor,
    EditorError,
  },
  journal::{
    self,
    JournalReader,
    JournalTask,
    JournalWriter,
    LogEntry,
  },
  text::Text,
  view::Cursor,
};
use the_stdx::source::{
  ByteSource,
  MemorySource,
  MmapSource,
  SharedSource,
};
use tokio_util::sync::CancellationToken;

fn editor_with(config: Config) -> DocumentEditor {
  let (editor, _) = DocumentEditor::new(config).unwrap();
  editor
}

fn load(content: &str, config: Config) -> DocumentEditor {
  let editor = editor_with(config);
  let source = MemorySource::from(content).into_shared();
  let summary = editor
    .load(CancellationToken::new(), source)
    .unwrap()
    .wait()
    .unwrap();
  assert!(!summary.cancelled);
  editor
}

fn strings(editor: &DocumentEditor) -> Vec<String> {
  editor.text().to_strings().unwrap()
}

fn assert_cursor_invariant(editor: &DocumentEditor) {
  let text = editor.text();
  let cursor = editor.cursor();
  if text.is_empty() {
    assert_eq!(cursor, Cursor::new(0, 0));
  } else {
    assert!(cursor.row < text.len(), "{cursor:?} in {} lines", text.len());
    assert!(cursor.col <= text.line_len(cursor.row).unwrap());
  }
}

/// Cancels `cancel` once `after` chunks have been read.
struct CancelAfter {
  inner:  MemorySource,
  cancel: CancellationToken,
  reads:  AtomicUsize,
  after:  usize,
}

impl ByteSource for CancelAfter {
  fn len(&self) -> u64 {
    self.inner.len()
  }

  fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    if self.reads.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
      self.cancel.cancel();
    }
    self.inner.read_at(buf, offset)
  }
}

#[test]
fn three_lines_without_trailing_newline() {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  file.write_all(b"one\ntwo\nthree").unwrap();
  file.flush().unwrap();

  let editor = editor_with(Config::default());
  let source = MmapSource::open(file.path()).unwrap().into_shared();
  let summary = editor
    .load(CancellationToken::new(), source)
    .unwrap()
    .wait()
    .unwrap();
  assert_eq!(summary.lines, 3);
  assert_eq!(summary.bytes, 13);

  let text = editor.text();
  assert_eq!(text.len(), 3);
  assert_eq!(text.get_string(2).unwrap(), "three");
  assert!(text.line(2).unwrap().is_lazy());
}

#[test]
fn load_round_trips_lines() {
  let cases: &[&[&str]] = &[&[], &[""], &["a"], &["a", "", "b"], &["héllo", "wörld", "\t"]];
  for lines in cases {
    for trailing in [false, true] {
      let mut content = lines.join("\n");
      if trailing && !lines.is_empty() {
        content.push('\n');
      }
      let config = Config {
        scan_chunk_size: 3,
        ..Config::default()
      };
      let editor = load(&content, config);
      let expected: Vec<String> = if content.is_empty() {
        Vec::new()
      } else {
        lines.iter().map(|line| line.to_string()).collect()
      };
      assert_eq!(strings(&editor), expected, "{content:?}");
    }
  }
}

#[test]
fn load_status_and_guard() {
  let editor = load("a\r\nb\r\n", Config::default());
  assert_eq!(strings(&editor), vec!["a", "b"]);
  let status = editor.status();
  assert_eq!(status.progress, None);
  assert_eq!(status.message.as_deref(), Some("loaded 2 lines"));
  assert!(!status.modified);
  assert!(!editor.can_undo());

  let again = editor.load(CancellationToken::new(), MemorySource::from("c").into_shared());
  assert!(matches!(again, Err(EditorError::AlreadyLoaded)));
  assert_eq!(strings(&editor), vec!["a", "b"]);
}

#[test]
fn cancelled_load_keeps_prefix() {
  let content = "x\n".repeat(10);
  let cancel = CancellationToken::new();
  let source: SharedSource = Arc::new(CancelAfter {
    inner:  MemorySource::from(content),
    cancel: cancel.clone(),
    reads:  AtomicUsize::new(0),
    after:  4,
  });
  let config = Config {
    scan_chunk_size: 2,
    ..Config::default()
  };
  let editor = editor_with(config);
  let summary = editor.load(cancel, source).unwrap().wait().unwrap();
  assert!(summary.cancelled);
  assert_eq!(summary.lines, 4);
  assert_eq!(editor.text().len(), 4);
  assert!(editor.status().message.unwrap().contains("cancelled"));
}

#[test]
fn cancel_before_start_yields_empty_document() {
  let cancel = CancellationToken::new();
  cancel.cancel();
  let editor = editor_with(Config::default());
  let summary = editor
    .load(cancel, MemorySource::from("a\nb\n").into_shared())
    .unwrap()
    .wait()
    .unwrap();
  assert!(summary.cancelled);
  assert_eq!(summary.lines, 0);
  assert!(editor.text().is_empty());
}

#[tokio::test]
async fn completion_can_be_awaited() {
  let editor = editor_with(Config::default());
  let completion = editor
    .load(CancellationToken::new(), MemorySource::from("a\nb\nc").into_shared())
    .unwrap();
  let summary = completion.await.unwrap();
  assert_eq!(summary.lines, 3);
  assert_eq!(editor.text().len(), 3);
}

#[test]
fn editing_during_load_never_loses_lines() {
  let lines: Vec<String> = (0..2_000).map(|i| format!("line {i}")).collect();
  let content = lines.join("\n");
  let config = Config {
    scan_chunk_size: 16,
    ..Config::default()
  };
  let editor = editor_with(config);
  let completion = editor
    .load(CancellationToken::new(), MemorySource::from(content).into_shared())
    .unwrap();

  for _ in 0..5 {
    editor.type_char('z').unwrap();
  }
  for _ in 0..5 {
    editor.undo().unwrap();
  }
  completion.wait().unwrap();

  assert_eq!(strings(&editor), lines);
  assert_cursor_invariant(&editor);
}

#[test]
fn save_copies_lazy_lines() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("saved.txt");
  let editor = load("first\r\nsecond", Config::default());
  editor.goto(1, 0).unwrap();
  editor.type_char('>').unwrap();
  editor.save(&path).unwrap();
  assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\n>second\n");
  assert!(!editor.status().modified);
}

#[test]
fn paste_between_loaded_documents() {
  let target = load("AAAA\n", Config::default());
  let clipboard = load("BBBB\nCC\n", Config::default());
  target.insert_lines(&clipboard.text()).unwrap();
  assert_eq!(strings(&target), vec!["BBBB", "CC", "AAAA"]);
  assert_eq!(target.cursor(), Cursor::new(2, 0));

  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("pasted.txt");
  target.save(&path).unwrap();
  assert_eq!(std::fs::read_to_string(&path).unwrap(), "BBBB\nCC\nAAAA\n");
}

#[test]
fn journal_round_trip_through_writer_thread() {
  for version in [journal::TEXT_VERSION, journal::BINARY_VERSION] {
    let live = load("alpha\nbeta\n", Config::default());
    let task = JournalTask::spawn(JournalWriter::open(Vec::new(), version).unwrap()).unwrap();
    live.subscribe(task.subscriber());

    live.goto(0, 5).unwrap();
    live.enter().unwrap();
    for ch in "gamma".chars() {
      live.type_char(ch).unwrap();
    }
    live.goto(2, 0).unwrap();
    live.backspace().unwrap();
    live.insert_lines(&Text::from_lines(["pasted line"])).unwrap();
    live.undo().unwrap();
    live.redo().unwrap();
    live.goto(0, 0).unwrap();
    live.delete_lines(1).unwrap();

    let bytes = task.finish().unwrap().into_inner();
    let replayed = load("alpha\nbeta\n", Config::default());
    let applied = journal::replay(&replayed, JournalReader::new(bytes.as_slice())).unwrap();
    assert_eq!(applied, 11);
    assert_eq!(strings(&replayed), strings(&live));
    assert_eq!(strings(&live), vec!["pasted line", "gammabeta"]);
  }
}

#[test]
fn journal_starts_with_version_record() {
  let live = editor_with(Config::default());
  let task = JournalTask::spawn(JournalWriter::open(Vec::new(), 1).unwrap()).unwrap();
  live.subscribe(task.subscriber());
  live.type_char('x').unwrap();
  live.undo().unwrap();
  let bytes = task.finish().unwrap().into_inner();

  let entries: Vec<LogEntry> = JournalReader::new(bytes.as_slice())
    .collect::<Result<_, _>>()
    .unwrap();
  assert_eq!(entries, vec![
    LogEntry::SetVersion(1),
    LogEntry::Type {
      row: 0,
      col: 0,
      ch:  'x',
    },
    LogEntry::Undo,
  ]);
  assert!(live.text().is_empty());

  let replayed = editor_with(Config::default());
  journal::replay(&replayed, JournalReader::new(bytes.as_slice())).unwrap();
  assert!(replayed.text().is_empty());
}

#[derive(Debug, Clone)]
enum Op {
  Type(char),
  Enter,
  Backspace,
  Delete,
  Undo,
  Redo,
  Insert(u8),
  DeleteLines(u8),
  Move(i8, i8),
  Goto(u8, u8),
}

impl Arbitrary for Op {
  fn arbitrary(g: &mut Gen) -> Self {
    match u8::arbitrary(g) % 10 {
      0 => Op::Type(*g.choose(&['a', 'b', '\t', 'é']).unwrap_or(&'a')),
      1 => Op::Enter,
      2 => Op::Backspace,
      3 => Op::Delete,
      4 => Op::Undo,
      5 => Op::Redo,
      6 => Op::Insert(u8::arbitrary(g) % 4),
      7 => Op::DeleteLines(u8::arbitrary(g) % 4),
      8 => Op::Move(i8::arbitrary(g) % 4, i8::arbitrary(g) % 6),
      _ => Op::Goto(u8::arbitrary(g) % 8, u8::arbitrary(g) % 8),
    }
  }
}

fn perform(editor: &DocumentEditor, op: &Op) {
  match op {
    Op::Type(ch) => editor.type_char(*ch),
    Op::Enter => editor.enter(),
    Op::Backspace => editor.backspace(),
    Op::Delete => editor.delete(),
    Op::Undo => editor.undo(),
    Op::Redo => editor.redo(),
    Op::Insert(count) => {
      let lines = Text::from_lines((0..*count).map(|i| format!("ins {i}")));
      editor.insert_lines(&lines)
    },
    Op::DeleteLines(count) => editor.delete_lines(*count as usize),
    Op::Move(rows, cols) => editor.move_by(*rows as isize, *cols as isize),
    Op::Goto(row, col) => editor.goto(*row as usize, *col as usize),
  }
  .unwrap();
}

quickcheck::quickcheck! {
  fn replay_reproduces_live_edits(base: Vec<String>, ops: Vec<Op>) -> bool {
    let seed = Text::from_lines(
      base
        .into_iter()
        .take(6)
        .map(|line| line.replace(['\n', '\r'], "")),
    );

    let config = Config {
      history_depth: 8,
      ..Config::default()
    };
    let live = editor_with(config.clone());
    live.insert_lines(&seed).unwrap();
    let entries = Arc::new(Mutex::new(Vec::new()));
    let sink = entries.clone();
    live.subscribe(move |entry| sink.lock().unwrap().push(entry.clone()));

    for op in &ops {
      perform(&live, op);
      assert_cursor_invariant(&live);
    }

    let replayed = editor_with(config);
    replayed.insert_lines(&seed).unwrap();
    for entry in entries.lock().unwrap().iter() {
      replayed.apply(entry).unwrap();
      assert_cursor_invariant(&replayed);
    }
    strings(&replayed) == strings(&live)
  }
}
