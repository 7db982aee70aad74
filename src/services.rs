pub(crate) mod alias;
pub(crate) mod content_generation;
pub(crate) mod errors;
pub(crate) mod exercises;
pub(crate) mod prompts;
pub(crate) mod record_store;
pub(crate) mod status_cache;
