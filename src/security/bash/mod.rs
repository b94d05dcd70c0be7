//! Shell command parsing and allow-list safety analysis.

mod analyzer;
mod parser;
mod split;

pub use analyzer::{ALLOWED_FILE_DESCRIPTORS, NULL_DEVICE, ShellSafetyAnalyzer, UnsafeConstruct};
pub use parser::{
    AstNode, DOUBLE_QUOTE_MARKER, OperatorKind, ParseError, SINGLE_QUOTE_MARKER, mark_quotes,
    parse, restore_quotes, unquote,
};
pub use split::split_command;
