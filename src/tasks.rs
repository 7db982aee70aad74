pub(crate) mod evaluation;
pub(crate) mod generation;
pub(crate) mod maintenance;
pub(crate) mod runner;
pub(crate) mod scheduler;
