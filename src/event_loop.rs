use std::io;
use std::time::Duration;

use crossterm::event::Event;

use crate::drivers::InputDriver;

pub enum ControlFlow {
    Continue,
    Quit,
}

/// Message pump for the window manager's loop thread.
///
/// Every iteration hands the handler at most one input event. `None` means
/// the poll interval elapsed without input. The first call gets `None`
/// before anything is polled, so the handler can paint the initial frame.
pub struct EventLoop<D> {
    driver: D,
    poll_interval: Duration,
}

impl<D: InputDriver> EventLoop<D> {
    pub fn new(driver: D, poll_interval: Duration) -> Self {
        Self {
            driver,
            poll_interval,
        }
    }

    pub fn poll(&mut self) -> io::Result<Option<Event>> {
        if self.driver.poll(self.poll_interval)? {
            Ok(Some(self.driver.read()?))
        } else {
            Ok(None)
        }
    }

    /// Runs until the handler returns [`ControlFlow::Quit`] or the driver
    /// fails.
    pub fn run<F>(&mut self, mut handler: F) -> io::Result<()>
    where
        F: FnMut(Option<Event>) -> io::Result<ControlFlow>,
    {
        let mut event = None;
        loop {
            if let ControlFlow::Quit = handler(event.take())? {
                return Ok(());
            }
            event = self.poll()?;
        }
    }
}
