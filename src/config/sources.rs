//! Configuration sources, lowest precedence first: global file, project
//! files, explicit file, environment.

pub mod environment;
pub mod explicit_file;
pub mod global_file;
pub mod project_file;
