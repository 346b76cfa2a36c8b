use std::path::Path;
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::query::{EmptyQuery, QueryParser, QueryParserError};
use tantivy::schema::{Field, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError};

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Debug, thiserror::Error)]
pub enum TextIndexError {
	#[error("malformed query: {0}")]
	MalformedQuery(#[from] QueryParserError),
	#[error(transparent)]
	Tantivy(#[from] TantivyError),
	#[error("index writer lock poisoned")]
	Poisoned,
}

/// One full-text match. `score` is BM25, higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct TextHit {
	pub id: String,
	pub score: f32,
}

/// Fields of one document as indexed for full-text search.
#[derive(Debug, Clone, Copy)]
pub struct TextEntry<'a> {
	pub id: &'a str,
	pub title: &'a str,
	pub body: &'a str,
	pub tags: &'a [String],
}

pub struct TantivyIndex {
	index: Index,
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
	id_field: Field,
	title_field: Field,
	body_field: Field,
	tags_field: Field,
}

impl TantivyIndex {
	/// Opens the index in `index_dir`, creating it (and the directory) on first use.
	pub fn open_or_create(index_dir: &Path) -> Result<Self, anyhow::Error> {
		let index = if index_dir.join("meta.json").exists() {
			Index::open_in_dir(index_dir)?
		} else {
			std::fs::create_dir_all(index_dir)?;
			tracing::info!(dir = %index_dir.display(), "creating full-text index");
			Index::create_in_dir(index_dir, build_schema())?
		};
		Self::from_index(index)
	}

	pub fn in_memory() -> Result<Self, anyhow::Error> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self, anyhow::Error> {
		register_tokenizer(&index);
		let schema = index.schema();
		let id_field = schema.get_field("id")?;
		let title_field = schema.get_field("title")?;
		let body_field = schema.get_field("body")?;
		let tags_field = schema.get_field("tags")?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		let writer = index.writer(WRITER_HEAP_BYTES)?;
		Ok(Self { index, reader, writer: Mutex::new(writer), id_field, title_field, body_field, tags_field })
	}

	/// Adds documents and commits once. Searchers see them as soon as this returns.
	pub fn add(&self, entries: &[TextEntry<'_>]) -> Result<(), TextIndexError> {
		if entries.is_empty() { return Ok(()); }
		self.write(false, entries)?;
		tracing::debug!(added = entries.len(), "full-text index committed");
		Ok(())
	}

	/// Replaces the whole index content with `entries` in a single commit.
	pub fn rebuild(&self, entries: &[TextEntry<'_>]) -> Result<(), TextIndexError> {
		self.write(true, entries)?;
		tracing::info!(documents = entries.len(), "full-text index rebuilt");
		Ok(())
	}

	fn write(&self, clear: bool, entries: &[TextEntry<'_>]) -> Result<(), TextIndexError> {
		let mut writer = self.writer.lock().map_err(|_| TextIndexError::Poisoned)?;
		if clear {
			writer.delete_all_documents()?;
		}
		for e in entries {
			let mut doc = TantivyDocument::default();
			doc.add_text(self.id_field, e.id);
			doc.add_text(self.title_field, e.title);
			doc.add_text(self.body_field, e.body);
			for tag in e.tags { doc.add_text(self.tags_field, tag); }
			writer.add_document(doc)?;
		}
		writer.commit()?;
		self.reader.reload()?;
		Ok(())
	}

	pub fn search(&self, query: &str, limit: usize) -> Result<Vec<TextHit>, TextIndexError> {
		let searcher = self.reader.searcher();
		let mut qp = QueryParser::for_index(&self.index, vec![self.title_field, self.body_field, self.tags_field]);
		qp.set_field_boost(self.title_field, 2.0);
		// Free text rarely follows the query grammar; unusable clauses are dropped.
		let (q, mut errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() {
			if q.is::<EmptyQuery>() {
				return Err(TextIndexError::MalformedQuery(errors.swap_remove(0)));
			}
			tracing::debug!(query, errors = ?errors, "ignored unparsable query clauses");
		}
		let top_docs = searcher.search(&q, &TopDocs::with_limit(limit.max(1)))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) else { continue };
			hits.push(TextHit { id: id.to_string(), score });
		}
		Ok(hits)
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}
}
