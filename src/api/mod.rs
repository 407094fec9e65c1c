pub(crate) mod classifications;
pub(crate) mod courses;
pub(crate) mod errors;
pub(crate) mod handlers;
pub(crate) mod router;
