pub mod deploy;
pub mod roles;
pub mod workspace;
