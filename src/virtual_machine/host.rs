//! Side-effect boundary between the VM and the outside world.
//!
//! The VM never touches process streams or the clock directly. Every PRINT,
//! LOG, PAINT and SLEEP goes through a [`Host`]. [`StdHost`] is the one the
//! `lhvm` binary runs with.

use crate::virtual_machine::display::{Screen, TerminalScreen};
use crate::virtual_machine::isa::Word;
use std::io::{self, Write};
use std::time::Duration;

/// Devices driven by a running program.
pub trait Host {
    /// Writes a value printed by PRINT.
    fn print(&mut self, value: Word) -> io::Result<()>;
    /// Writes one diagnostic line produced by LOG.
    fn log(&mut self, line: &str) -> io::Result<()>;
    /// Screen that PAINT draws to.
    fn screen(&mut self) -> &mut dyn Screen;
    /// Blocks for SLEEP.
    fn sleep(&mut self, duration: Duration);
}

/// Host writing to stdout, a log sink, and the terminal.
pub struct StdHost {
    stdout: io::Stdout,
    log: Box<dyn Write>,
    screen: TerminalScreen,
}

impl StdHost {
    /// Creates a host whose log lines are discarded.
    pub fn new() -> Self {
        Self::with_log(Box::new(io::sink()))
    }

    /// Creates a host that sends LOG dumps to `log`.
    pub fn with_log(log: Box<dyn Write>) -> Self {
        Self {
            stdout: io::stdout(),
            log,
            screen: TerminalScreen::stdout(),
        }
    }
}

impl Default for StdHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for StdHost {
    fn print(&mut self, value: Word) -> io::Result<()> {
        let mut out = self.stdout.lock();
        writeln!(out, "{value}")?;
        out.flush()
    }

    fn log(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.log, "{line}")?;
        self.log.flush()
    }

    fn screen(&mut self) -> &mut dyn Screen {
        &mut self.screen
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::virtual_machine::display::FrameBuffer;

    /// Host that records everything instead of performing it.
    #[derive(Default)]
    pub struct TestHost {
        pub printed: Vec<Word>,
        pub logs: Vec<String>,
        pub screen: FrameBuffer,
        pub sleeps: Vec<Duration>,
    }

    impl TestHost {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Host for TestHost {
        fn print(&mut self, value: Word) -> io::Result<()> {
            self.printed.push(value);
            Ok(())
        }

        fn log(&mut self, line: &str) -> io::Result<()> {
            self.logs.push(line.to_string());
            Ok(())
        }

        fn screen(&mut self) -> &mut dyn Screen {
            &mut self.screen
        }

        fn sleep(&mut self, duration: Duration) {
            self.sleeps.push(duration);
        }
    }

    #[test]
    fn test_host_records() {
        let mut host = TestHost::new();
        host.print(7).unwrap();
        host.log("[]int{1, 2}").unwrap();
        host.sleep(Duration::from_millis(5));
        assert_eq!(host.printed, vec![7]);
        assert_eq!(host.logs, vec!["[]int{1, 2}".to_string()]);
        assert_eq!(host.sleeps, vec![Duration::from_millis(5)]);
    }

    #[test]
    fn std_host_log_goes_to_sink() {
        struct Shared(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buf = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut host = StdHost::with_log(Box::new(Shared(buf.clone())));
        host.log("[]int{3}").unwrap();
        assert_eq!(buf.borrow().as_slice(), b"[]int{3}\n");
    }
}
