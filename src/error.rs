use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WmError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("window manager was not initialized")]
    NotInitialized,
    #[error("window manager loop is already running")]
    AlreadyRunning,
    #[error("window manager loop is not running")]
    NotRunning,
    #[error("{0} cannot be called from the window manager loop thread")]
    OnLoopThread(&'static str),
    #[error("window manager loop thread panicked")]
    LoopPanicked,
    #[error("modal window closed without an answer")]
    ModalClosed,
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type WmResult<T> = Result<T, WmError>;
