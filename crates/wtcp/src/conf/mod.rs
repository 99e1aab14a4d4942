mod persistent;

pub use persistent::{ClientOpt, PersistentConfig, ServerOpt};
