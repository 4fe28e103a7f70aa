//! Append-only log of the committed transactions.
//!
//! The file starts with a 3 bytes magic number and a format version byte.
//! It is followed by one record per committed transaction: a big-endian `u32` payload length
//! then the payload (snapshot id, operation count and operations).

use crate::error::{CorruptionError, StorageError};
use fs2::FileExt;
use oxterm::{BlankNode, GraphName, Literal, NamedNode, NamedOrBlankNode, Quad, Term};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const LOG_FILE_NAME: &str = "quads.log";
const COMPACTION_FILE_NAME: &str = "quads.log.tmp";
const LOCK_FILE_NAME: &str = "LOCK";
const MAGIC: [u8; 3] = *b"oxq";
const LOG_VERSION: u8 = 1;
const HEADER_LEN: u64 = 4;

const TYPE_DEFAULT_GRAPH: u8 = 0;
const TYPE_NAMED_NODE: u8 = 1;
const TYPE_BLANK_NODE: u8 = 8;
const TYPE_STRING_LITERAL: u8 = 16;
const TYPE_LANG_STRING_LITERAL: u8 = 20;
const TYPE_TYPED_LITERAL: u8 = 24;

const OP_INSERT: u8 = 1;
const OP_REMOVE: u8 = 2;
const OP_SET_NAMESPACE: u8 = 3;
const OP_REMOVE_NAMESPACE: u8 = 4;
const OP_CLEAR_NAMESPACES: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogOperation {
    Insert { quad: Quad, explicit: bool },
    Remove { quad: Quad, explicit: bool },
    SetNamespace { prefix: String, namespace: String },
    RemoveNamespace { prefix: String },
    ClearNamespaces,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogRecord {
    pub snapshot: u64,
    pub operations: Vec<LogOperation>,
}

impl LogRecord {
    fn encode(&self) -> Result<Vec<u8>, StorageError> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&self.snapshot.to_be_bytes());
        write_len(&mut buffer, self.operations.len())?;
        for operation in &self.operations {
            match operation {
                LogOperation::Insert { quad, explicit } | LogOperation::Remove { quad, explicit } => {
                    buffer.push(if matches!(operation, LogOperation::Insert { .. }) {
                        OP_INSERT
                    } else {
                        OP_REMOVE
                    });
                    buffer.push(u8::from(*explicit));
                    write_quad(&mut buffer, quad)?;
                }
                LogOperation::SetNamespace { prefix, namespace } => {
                    buffer.push(OP_SET_NAMESPACE);
                    write_str(&mut buffer, prefix)?;
                    write_str(&mut buffer, namespace)?;
                }
                LogOperation::RemoveNamespace { prefix } => {
                    buffer.push(OP_REMOVE_NAMESPACE);
                    write_str(&mut buffer, prefix)?;
                }
                LogOperation::ClearNamespaces => buffer.push(OP_CLEAR_NAMESPACES),
            }
        }
        Ok(buffer)
    }

    fn decode(mut buffer: &[u8]) -> Result<Self, CorruptionError> {
        let snapshot = buffer.read_u64()?;
        let count = buffer.read_u32()?;
        let mut operations = Vec::new();
        for _ in 0..count {
            operations.push(match buffer.read_u8()? {
                OP_INSERT => LogOperation::Insert {
                    explicit: buffer.read_bool()?,
                    quad: buffer.read_quad()?,
                },
                OP_REMOVE => LogOperation::Remove {
                    explicit: buffer.read_bool()?,
                    quad: buffer.read_quad()?,
                },
                OP_SET_NAMESPACE => LogOperation::SetNamespace {
                    prefix: buffer.read_str()?,
                    namespace: buffer.read_str()?,
                },
                OP_REMOVE_NAMESPACE => LogOperation::RemoveNamespace {
                    prefix: buffer.read_str()?,
                },
                OP_CLEAR_NAMESPACES => LogOperation::ClearNamespaces,
                op => {
                    return Err(CorruptionError::msg(format!(
                        "Unknown log operation {op}"
                    )));
                }
            });
        }
        if !buffer.is_empty() {
            return Err(CorruptionError::msg(format!(
                "{} unexpected bytes at the end of a log record",
                buffer.len()
            )));
        }
        Ok(Self {
            snapshot,
            operations,
        })
    }
}

/// The on-disk log of a persistent store.
pub(crate) struct RecordLog {
    directory: PathBuf,
    /// Exclusively locked while the log is open.
    lock: File,
    file: File,
    len: u64,
    sync_on_commit: bool,
}

impl RecordLog {
    /// Opens or creates the log in `directory` and returns the records it contains.
    ///
    /// A truncated trailing record is dropped and the file truncated to the last complete record.
    pub fn open(
        directory: &Path,
        sync_on_commit: bool,
    ) -> Result<(Self, Vec<LogRecord>), StorageError> {
        fs::create_dir_all(directory)?;
        let lock = lock_directory(directory)?;
        let path = directory.join(LOG_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        if content.is_empty() {
            file.write_all(&header())?;
            if sync_on_commit {
                file.sync_data()?;
            }
            return Ok((
                Self {
                    directory: directory.to_owned(),
                    lock,
                    file,
                    len: HEADER_LEN,
                    sync_on_commit,
                },
                Vec::new(),
            ));
        }
        check_header(&content)?;
        let mut records = Vec::new();
        let mut offset = 4;
        while offset < content.len() {
            let Some((len, payload)) = content
                .get(offset..offset + 4)
                .and_then(|len| {
                    let len = usize::try_from(u32::from_be_bytes(len.try_into().ok()?)).ok()?;
                    Some((len, content.get(offset + 4..offset + 4 + len)?))
                })
            else {
                warn!(
                    path = %path.display(),
                    offset,
                    dropped_bytes = content.len() - offset,
                    "truncated record at the end of the log, dropping it"
                );
                file.set_len(u64::try_from(offset).map_err(CorruptionError::new)?)?;
                file.sync_data()?;
                break;
            };
            records.push(LogRecord::decode(payload)?);
            offset += 4 + len;
        }
        let len = u64::try_from(offset).map_err(CorruptionError::new)?;
        Ok((
            Self {
                directory: directory.to_owned(),
                lock,
                file,
                len,
                sync_on_commit,
            },
            records,
        ))
    }

    /// Appends a record. On failure the file is truncated back to its previous length.
    pub fn append(&mut self, record: &LogRecord) -> Result<(), StorageError> {
        let buffer = framed(record)?;
        if let Err(e) = self.write_at_end(&buffer) {
            if let Err(truncation_error) = self.file.set_len(self.len) {
                warn!(
                    error = %truncation_error,
                    len = self.len,
                    "failed to truncate a partially written log record, it will be dropped on the next open"
                );
            }
            return Err(e.into());
        }
        self.len += buffer.len() as u64;
        Ok(())
    }

    fn write_at_end(&mut self, buffer: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(self.len))?;
        self.file.write_all(buffer)?;
        if self.sync_on_commit {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Atomically replaces the whole log by a single record.
    pub fn rewrite(&mut self, record: &LogRecord) -> Result<(), StorageError> {
        let path = self.directory.join(LOG_FILE_NAME);
        let temp_path = self.directory.join(COMPACTION_FILE_NAME);
        let mut buffer = header().to_vec();
        buffer.extend_from_slice(&framed(record)?);
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(&buffer)?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;
        self.file = OpenOptions::new().read(true).write(true).open(&path)?;
        self.len = buffer.len() as u64;
        info!(
            path = %path.display(),
            size = self.len,
            operations = record.operations.len(),
            "compacted the log"
        );
        Ok(())
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(LOG_FILE_NAME)
    }
}

impl Drop for RecordLog {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.lock) {
            warn!(error = %e, "failed to unlock the store directory");
        }
    }
}

/// Takes the exclusive lock of a store directory, fails if another store holds it.
fn lock_directory(directory: &Path) -> Result<File, StorageError> {
    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(directory.join(LOCK_FILE_NAME))?;
    if let Err(e) = lock.try_lock_exclusive() {
        if e.kind() == fs2::lock_contended_error().kind() {
            return Err(StorageError::Locked(directory.to_owned()));
        }
        return Err(e.into());
    }
    Ok(lock)
}

fn header() -> [u8; 4] {
    [MAGIC[0], MAGIC[1], MAGIC[2], LOG_VERSION]
}

fn check_header(content: &[u8]) -> Result<(), CorruptionError> {
    if content.len() < 4 || content[..3] != MAGIC {
        return Err(CorruptionError::msg("The file is not an oxstore log"));
    }
    match content[3] {
        LOG_VERSION => Ok(()),
        version if version > LOG_VERSION => Err(CorruptionError::msg(format!(
            "The log format version {version} is not supported, the latest supported version is {LOG_VERSION}"
        ))),
        version => Err(CorruptionError::msg(format!(
            "Invalid log format version {version}"
        ))),
    }
}

fn framed(record: &LogRecord) -> Result<Vec<u8>, StorageError> {
    let payload = record.encode()?;
    let mut buffer = Vec::with_capacity(payload.len() + 4);
    write_len(&mut buffer, payload.len())?;
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

fn write_len(buffer: &mut Vec<u8>, len: usize) -> Result<(), StorageError> {
    let len = u32::try_from(len).map_err(|e| StorageError::Other(Box::new(e)))?;
    buffer.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_str(buffer: &mut Vec<u8>, value: &str) -> Result<(), StorageError> {
    write_len(buffer, value.len())?;
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}

fn write_term(buffer: &mut Vec<u8>, term: &Term) -> Result<(), StorageError> {
    match term {
        Term::NamedNode(node) => {
            buffer.push(TYPE_NAMED_NODE);
            write_str(buffer, node.as_str())
        }
        Term::BlankNode(node) => {
            buffer.push(TYPE_BLANK_NODE);
            write_str(buffer, node.as_str())
        }
        Term::Literal(literal) => {
            if let Some(language) = literal.language() {
                buffer.push(TYPE_LANG_STRING_LITERAL);
                write_str(buffer, literal.value())?;
                write_str(buffer, language)
            } else if literal.is_plain() {
                buffer.push(TYPE_STRING_LITERAL);
                write_str(buffer, literal.value())
            } else {
                buffer.push(TYPE_TYPED_LITERAL);
                write_str(buffer, literal.value())?;
                write_str(buffer, literal.datatype())
            }
        }
    }
}

fn write_quad(buffer: &mut Vec<u8>, quad: &Quad) -> Result<(), StorageError> {
    write_term(buffer, &quad.subject.clone().into())?;
    write_term(buffer, &quad.predicate.clone().into())?;
    write_term(buffer, &quad.object)?;
    match &quad.graph_name {
        GraphName::NamedNode(node) => write_term(buffer, &node.clone().into()),
        GraphName::BlankNode(node) => write_term(buffer, &node.clone().into()),
        GraphName::DefaultGraph => {
            buffer.push(TYPE_DEFAULT_GRAPH);
            Ok(())
        }
    }
}

trait TermReader {
    fn read_bytes(&mut self, len: usize) -> Result<&[u8], CorruptionError>;

    fn read_u8(&mut self) -> Result<u8, CorruptionError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_bool(&mut self) -> Result<bool, CorruptionError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(CorruptionError::msg(format!("Invalid boolean byte {v}"))),
        }
    }

    fn read_u32(&mut self) -> Result<u32, CorruptionError> {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(self.read_bytes(4)?);
        Ok(u32::from_be_bytes(bytes))
    }

    fn read_u64(&mut self) -> Result<u64, CorruptionError> {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_be_bytes(bytes))
    }

    fn read_str(&mut self) -> Result<String, CorruptionError> {
        let len = usize::try_from(self.read_u32()?).map_err(CorruptionError::new)?;
        String::from_utf8(self.read_bytes(len)?.to_vec()).map_err(CorruptionError::new)
    }

    /// Reads a term, `None` being the default graph.
    fn read_term(&mut self) -> Result<Option<Term>, CorruptionError> {
        Ok(Some(match self.read_u8()? {
            TYPE_DEFAULT_GRAPH => return Ok(None),
            TYPE_NAMED_NODE => NamedNode::new_unchecked(self.read_str()?).into(),
            TYPE_BLANK_NODE => BlankNode::new_unchecked(self.read_str()?).into(),
            TYPE_STRING_LITERAL => Literal::new_simple_literal(self.read_str()?).into(),
            TYPE_LANG_STRING_LITERAL => {
                let value = self.read_str()?;
                Literal::new_language_tagged_literal_unchecked(value, self.read_str()?).into()
            }
            TYPE_TYPED_LITERAL => {
                let value = self.read_str()?;
                Literal::new_typed_literal(value, NamedNode::new_unchecked(self.read_str()?))
                    .into()
            }
            t => return Err(CorruptionError::msg(format!("Unknown term type {t}"))),
        }))
    }

    fn read_quad(&mut self) -> Result<Quad, CorruptionError> {
        let subject = NamedOrBlankNode::try_from(self.read_non_default_term()?)
            .map_err(CorruptionError::new)?;
        let predicate =
            NamedNode::try_from(self.read_non_default_term()?).map_err(CorruptionError::new)?;
        let object = self.read_non_default_term()?;
        let graph_name = match self.read_term()? {
            None => GraphName::DefaultGraph,
            Some(term) => NamedOrBlankNode::try_from(term)
                .map_err(CorruptionError::new)?
                .into(),
        };
        Ok(Quad::new(subject, predicate, object, graph_name))
    }

    fn read_non_default_term(&mut self) -> Result<Term, CorruptionError> {
        self.read_term()?
            .ok_or_else(|| CorruptionError::msg("Unexpected default graph in a quad term"))
    }
}

impl<'a> TermReader for &'a [u8] {
    fn read_bytes(&mut self, len: usize) -> Result<&[u8], CorruptionError> {
        let buffer: &'a [u8] = *self;
        let (bytes, rest) = buffer
            .split_at_checked(len)
            .ok_or_else(|| CorruptionError::msg("Unexpected end of a log record"))?;
        *self = rest;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use tempfile::TempDir;

    fn record(snapshot: u64) -> LogRecord {
        let s = NamedNode::new_unchecked("http://example.com/s");
        let p = NamedNode::new_unchecked("http://example.com/p");
        LogRecord {
            snapshot,
            operations: vec![
                LogOperation::Insert {
                    quad: Quad::new(s.clone(), p.clone(), Literal::from(1), GraphName::DefaultGraph),
                    explicit: true,
                },
                LogOperation::Remove {
                    quad: Quad::new(
                        BlankNode::new_unchecked("b"),
                        p,
                        Literal::new_language_tagged_literal_unchecked("chat", "fr"),
                        s,
                    ),
                    explicit: false,
                },
                LogOperation::SetNamespace {
                    prefix: "ex".into(),
                    namespace: "http://example.com/".into(),
                },
                LogOperation::RemoveNamespace { prefix: "foo".into() },
                LogOperation::ClearNamespaces,
            ],
        }
    }

    #[test]
    fn records_are_replayed() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        {
            let (mut log, records) = RecordLog::open(dir.path(), false)?;
            assert!(records.is_empty());
            log.append(&record(1))?;
            log.append(&record(2))?;
        }
        let (_, records) = RecordLog::open(dir.path(), false)?;
        assert_eq!(records, [record(1), record(2)]);
        Ok(())
    }

    #[test]
    fn truncated_record_is_dropped() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let path = {
            let (mut log, _) = RecordLog::open(dir.path(), false)?;
            log.append(&record(1))?;
            log.path()
        };
        let complete_len = fs::metadata(&path)?.len();
        let mut file = OpenOptions::new().append(true).open(&path)?;
        file.write_all(&[0, 0, 1, 0, 42, 42])?;
        drop(file);
        let (mut log, records) = RecordLog::open(dir.path(), false)?;
        assert_eq!(records, [record(1)]);
        assert_eq!(fs::metadata(&path)?.len(), complete_len);
        log.append(&record(2))?;
        drop(log);
        let (_, records) = RecordLog::open(dir.path(), false)?;
        assert_eq!(records, [record(1), record(2)]);
        Ok(())
    }

    #[test]
    fn rewrite_replaces_content() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        {
            let (mut log, _) = RecordLog::open(dir.path(), true)?;
            log.append(&record(1))?;
            log.append(&record(2))?;
            log.rewrite(&record(3))?;
            log.append(&record(4))?;
        }
        let (_, records) = RecordLog::open(dir.path(), false)?;
        assert_eq!(records, [record(3), record(4)]);
        Ok(())
    }

    #[test]
    fn bad_header_is_rejected() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join(LOG_FILE_NAME), b"nope")?;
        assert!(matches!(
            RecordLog::open(dir.path(), false),
            Err(StorageError::Corruption(_))
        ));
        fs::write(dir.path().join(LOG_FILE_NAME), [b'o', b'x', b'q', 9])?;
        assert!(matches!(
            RecordLog::open(dir.path(), false),
            Err(StorageError::Corruption(_))
        ));
        Ok(())
    }

    #[test]
    fn second_open_is_refused() -> Result<(), Box<dyn Error>> {
        let dir = TempDir::new()?;
        let (mut log, _) = RecordLog::open(dir.path(), false)?;
        assert!(matches!(
            RecordLog::open(dir.path(), false),
            Err(StorageError::Locked(_))
        ));
        log.append(&record(1))?;
        drop(log);
        let (_log, records) = RecordLog::open(dir.path(), false)?;
        assert_eq!(records, [record(1)]);
        Ok(())
    }
}
