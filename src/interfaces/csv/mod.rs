pub mod event_reader;
pub mod project_writer;
