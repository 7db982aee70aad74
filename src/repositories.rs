pub(crate) mod aliases;
pub(crate) mod health;
pub(crate) mod languages;
pub(crate) mod refresh_tokens;
pub(crate) mod submissions;
pub(crate) mod tasks;
pub(crate) mod users;
