pub mod external_tools;
pub(crate) mod progress_bar_builder;
pub mod reader;
