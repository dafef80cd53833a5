pub mod cooldown;
pub mod fs;
pub mod host;
pub mod idle;
pub mod paths;
pub mod silent;
