//! Command stream handling: parser, path model, and seek index.

pub mod model;
pub mod parser;
pub mod seek;

pub use model::{PathModel, Segment};
pub use parser::{parse_commands, parse_commands_sync};
pub use seek::{find_segment_index_by_distance, find_start_by_percent, ResumePoint};
