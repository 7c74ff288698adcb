pub mod collaborators;
pub mod domain;
pub mod error;
pub mod logger;
pub mod redact;
pub mod ring;
pub mod time;
