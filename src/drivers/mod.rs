pub mod console;
pub mod headless;
pub mod keyboard;

use ::crossterm::event::Event;
use std::io;
use std::time::Duration;

use crate::ui::UiFrame;

pub trait InputDriver: Send {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;
    fn read(&mut self) -> io::Result<Event>;
}

impl<T: InputDriver + ?Sized> InputDriver for Box<T> {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).poll(timeout)
    }

    fn read(&mut self) -> io::Result<Event> {
        (**self).read()
    }
}

/// Terminal side of the window manager. Object safe so the loop thread can
/// own a boxed driver.
pub trait OutputDriver: Send {
    fn enter(&mut self) -> io::Result<()>;
    fn exit(&mut self) -> io::Result<()>;
    /// Current terminal size as `(width, height)`.
    fn size(&self) -> io::Result<(u16, u16)>;
    /// Wipe the screen so the next draw repaints every cell.
    fn clear(&mut self) -> io::Result<()>;
    fn draw(&mut self, paint: &mut dyn FnMut(&mut UiFrame<'_>)) -> io::Result<()>;
}

impl<T: OutputDriver + ?Sized> OutputDriver for Box<T> {
    fn enter(&mut self) -> io::Result<()> {
        (**self).enter()
    }

    fn exit(&mut self) -> io::Result<()> {
        (**self).exit()
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        (**self).size()
    }

    fn clear(&mut self) -> io::Result<()> {
        (**self).clear()
    }

    fn draw(&mut self, paint: &mut dyn FnMut(&mut UiFrame<'_>)) -> io::Result<()> {
        (**self).draw(paint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    struct Dummy;
    impl InputDriver for Dummy {
        fn poll(&mut self, _timeout: Duration) -> io::Result<bool> {
            Ok(true)
        }

        fn read(&mut self) -> io::Result<Event> {
            Ok(Event::Key(KeyEvent::new(
                KeyCode::Char('x'),
                KeyModifiers::NONE,
            )))
        }
    }

    #[test]
    fn boxed_driver_delegates() {
        let mut d: Box<dyn InputDriver> = Box::new(Dummy);
        assert!(d.poll(Duration::from_millis(0)).unwrap());
        let ev = d.read().unwrap();
        if let Event::Key(k) = ev {
            assert_eq!(k.code, KeyCode::Char('x'));
        } else {
            panic!("expected key");
        }
    }
}
