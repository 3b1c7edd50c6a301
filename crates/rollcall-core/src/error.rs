use crate::automation::AutomationError;
use crate::schedule::ScheduleError;
use crate::session::SessionError;
use std::fmt;
use thiserror::Error;

/// Step of a poll run, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SessionReplay,
    OpenChat,
    OpenMenu,
    ChoosePoll,
    Question,
    Options,
    Submit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SessionReplay => "session replay",
            Stage::OpenChat => "open chat",
            Stage::OpenMenu => "open menu",
            Stage::ChoosePoll => "choose poll",
            Stage::Question => "poll question",
            Stage::Options => "poll options",
            Stage::Submit => "submit poll",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Practice data error: {0}")]
    Data(#[from] ScheduleError),

    #[error("Login failed: {0}")]
    Auth(String),

    #[error("UI interaction failed during {stage}: {source}")]
    Interaction {
        stage: Stage,
        #[source]
        source: AutomationError,
    },

    #[error("Resource error: {0}")]
    Resource(String),
}

impl RunError {
    pub fn interaction(stage: Stage) -> impl FnOnce(AutomationError) -> RunError {
        move |source| RunError::Interaction { stage, source }
    }

    pub fn auth(source: AutomationError) -> RunError {
        RunError::Auth(source.to_string())
    }
}

impl From<SessionError> for RunError {
    fn from(e: SessionError) -> Self {
        RunError::Resource(e.to_string())
    }
}
