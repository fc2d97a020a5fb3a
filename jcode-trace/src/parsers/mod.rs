//! Leaf parsers used by the labeling pipeline.

pub mod file_parser;
pub mod path_parser;
pub mod student_parser;

pub use file_parser::FileParser;
pub use path_parser::PathParser;
pub use student_parser::StudentParser;
