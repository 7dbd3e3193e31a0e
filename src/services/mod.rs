pub mod append_pipeline;
pub mod object_table;
pub(crate) mod session_table;
pub mod upload_store;
