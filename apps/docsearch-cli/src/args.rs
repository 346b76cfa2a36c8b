use std::path::PathBuf;

use docsearch_core::types::SortOrder;

pub const USAGE: &str = "\
Usage: docsearch <command> [args...]

Commands:
  ingest --title T --body B [--tag X]...
  ingest-audio <file> [--language L] [--title T] [--tag X]...
  ingest-dir <dir> [--limit N]
  list [--limit N] [--oldest-first]
  search <query>
  semantic <query> [--limit N] [--strict|--fallback]
  chat <question> [--docs N] [--system PROMPT] [--timeout SECS]
  health
  build-index";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct UsageError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ingest { title: String, body: String, tags: Vec<String> },
    IngestAudio { file: PathBuf, language: Option<String>, title: Option<String>, tags: Vec<String> },
    IngestDir { dir: PathBuf, limit: Option<usize> },
    List { limit: Option<usize>, order: SortOrder },
    Search { query: String },
    Semantic { query: String, limit: Option<usize>, strict: Option<bool> },
    Chat { question: String, docs: Option<usize>, system: Option<String>, timeout_secs: Option<u64> },
    Health,
    BuildIndex,
}

struct Cursor<'a> {
    args: &'a [String],
    i: usize,
}

impl<'a> Cursor<'a> {
    fn value(&mut self, flag: &str) -> Result<&'a str, UsageError> {
        self.i += 1;
        self.args.get(self.i).map(String::as_str).ok_or_else(|| UsageError(format!("{flag} requires a value")))
    }

    fn number<T: std::str::FromStr>(&mut self, flag: &str) -> Result<T, UsageError> {
        let v = self.value(flag)?;
        v.parse().map_err(|_| UsageError(format!("{flag} requires a number, got '{v}'")))
    }
}

/// Parses everything after the program name.
pub fn parse(args: &[String]) -> Result<Command, UsageError> {
    let Some((cmd, rest)) = args.split_first() else {
        return Err(UsageError("missing command".into()));
    };
    let mut c = Cursor { args: rest, i: 0 };
    let mut positional: Vec<&str> = Vec::new();
    let mut title = None;
    let mut body = None;
    let mut tags = Vec::new();
    let mut language = None;
    let mut limit = None;
    let mut oldest_first = false;
    let mut strict = None;
    let mut docs = None;
    let mut system = None;
    let mut timeout_secs = None;

    while c.i < rest.len() {
        match rest[c.i].as_str() {
            "--title" => title = Some(c.value("--title")?.to_string()),
            "--body" => body = Some(c.value("--body")?.to_string()),
            "--tag" => tags.push(c.value("--tag")?.to_string()),
            "--language" => language = Some(c.value("--language")?.to_string()),
            "--limit" => limit = Some(c.number::<usize>("--limit")?),
            "--oldest-first" => oldest_first = true,
            "--strict" => strict = Some(true),
            "--fallback" => strict = Some(false),
            "--docs" => docs = Some(c.number::<usize>("--docs")?),
            "--system" => system = Some(c.value("--system")?.to_string()),
            "--timeout" => timeout_secs = Some(c.number::<u64>("--timeout")?),
            flag if flag.starts_with("--") => return Err(UsageError(format!("unknown flag {flag}"))),
            word => positional.push(word),
        }
        c.i += 1;
    }

    let text = |what: &str| -> Result<String, UsageError> {
        if positional.is_empty() { Err(UsageError(format!("{cmd} requires a {what}"))) } else { Ok(positional.join(" ")) }
    };
    let single_path = |what: &str| -> Result<PathBuf, UsageError> {
        match positional.as_slice() {
            [p] => Ok(PathBuf::from(p)),
            _ => Err(UsageError(format!("{cmd} requires exactly one {what}"))),
        }
    };

    match cmd.as_str() {
        "ingest" => Ok(Command::Ingest {
            title: title.ok_or_else(|| UsageError("ingest requires --title".into()))?,
            body: body.ok_or_else(|| UsageError("ingest requires --body".into()))?,
            tags,
        }),
        "ingest-audio" => Ok(Command::IngestAudio { file: single_path("audio file")?, language, title, tags }),
        "ingest-dir" => Ok(Command::IngestDir { dir: single_path("directory")?, limit }),
        "list" => Ok(Command::List { limit, order: if oldest_first { SortOrder::OldestFirst } else { SortOrder::NewestFirst } }),
        "search" => Ok(Command::Search { query: text("query")? }),
        "semantic" => Ok(Command::Semantic { query: text("query")?, limit, strict }),
        "chat" => Ok(Command::Chat { question: text("question")?, docs, system, timeout_secs }),
        "health" => Ok(Command::Health),
        "build-index" => Ok(Command::BuildIndex),
        other => Err(UsageError(format!("unknown command '{other}'"))),
    }
}
