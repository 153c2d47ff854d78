mod persister;

pub use persister::Persister;
