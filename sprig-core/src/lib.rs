//! Sprig Core - handle-indexed XML trees
//!
//! This library builds, queries, mutates and serializes XML-like documents
//! through opaque integer handles instead of direct node references.

pub mod config;
pub mod element;
pub mod error;
pub mod handle;
pub mod manipulator;
pub mod parse;
pub mod serial;

pub use config::{Config, MatchPolicy, RemovalPolicy};
pub use element::{Attributes, Element};
pub use error::SprigError;
pub use handle::{Allocation, Handle, HandleRegistry};
pub use manipulator::{Children, ElementRef, ElementUpdate, Infos, Manipulator, Match, Search};
pub use serial::{prettify, serialize, Indent, PrettifySource, SerializeOptions, XmlNode};

/// Result type alias for sprig operations
pub type Result<T> = std::result::Result<T, SprigError>;
