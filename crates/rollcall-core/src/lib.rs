pub mod automation;
pub mod config;
pub mod error;
pub mod poster;
pub mod runner;
pub mod schedule;
pub mod session;

pub use automation::{AutomationError, AutomationSession, NavigationResult};
pub use config::{ConfigError, ConfigLoader, RollcallConfig};
pub use error::{RunError, Stage};
pub use poster::{PollPoster, PollReceipt, PosterConfig};
pub use runner::RunOutcome;
pub use schedule::{PracticeEvent, Resolution};
pub use session::{SessionSnapshot, SessionStore, SnapshotCookie};
