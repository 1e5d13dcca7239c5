/// Git-derived version, falling back to the crate version outside a
/// checkout.
pub const GIT_VERSION: &str = env!("GIT_VERSION");

/// Short git commit hash
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Version string for --version (compile-time)
pub const VERSION: &str = concat!(env!("GIT_VERSION"), " (", env!("GIT_HASH"), ")");
