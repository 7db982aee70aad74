pub(crate) mod auth;
pub(crate) mod errors;
pub(crate) mod generation;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod solve;
pub(crate) mod status;
pub(crate) mod tasks;
pub(crate) mod validation;
