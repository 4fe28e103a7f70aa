#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod algebra;
pub mod term;

pub use crate::algebra::{Expression, Function, GraphPattern, OrderExpression};
pub use crate::term::{GraphNamePattern, NamedNodePattern, QuadPattern, TermPattern};
