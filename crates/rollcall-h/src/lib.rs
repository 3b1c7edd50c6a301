pub mod backend;
pub mod cdp;
pub mod storage;

pub use backend::HeadlessSession;
