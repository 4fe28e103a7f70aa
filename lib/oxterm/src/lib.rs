#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod blank_node;
mod literal;
mod named_node;
mod triple;
mod variable;
pub mod vocab;

pub use crate::blank_node::{BlankNode, BlankNodeIdParseError};
pub use crate::literal::{Literal, print_quoted_str};
pub use crate::named_node::NamedNode;
pub use crate::triple::{GraphName, NamedOrBlankNode, Quad, Term, TryFromTermError};
pub use crate::variable::{Variable, VariableNameParseError};
pub use oxilangtag::LanguageTagParseError;
pub use oxiri::IriParseError;
