#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod binding;
mod connection;
mod cursor;
mod error;
mod eval;
mod options;
mod storage;
pub mod store;

pub use crate::binding::{BindingIndex, BindingSet, BindingSetBuilder, Iter};
pub use crate::connection::Connection;
pub use crate::cursor::{
    Cursor, CursorIter, EmptyCursor, FilterCursor, IterCursor, MapCursor, SliceCursor,
};
pub use crate::error::{CorruptionError, EvaluationError, StorageError, TransactionError};
pub use crate::eval::{BindingCursor, QueryDataset, QueryEvaluator};
pub use crate::options::StoreOptions;
pub use crate::storage::{InternedTerm, TermId, TypedValue};
pub use crate::store::{QuadCursor, Snapshot, Store, Transaction};
