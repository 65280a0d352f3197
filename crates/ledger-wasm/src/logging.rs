//! Routes the core's `tracing` events to the browser console.

use std::io;

use tracing::Level;

/// Writer that collects one formatted event and logs it on drop.
#[derive(Debug, Default)]
struct ConsoleWriter {
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if let Some(line) = console_line(&self.buf) {
            web_sys::console::log_1(&line.into());
        }
    }
}

/// The text to log for a buffered event, without the trailing newline.
fn console_line(buf: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(buf);
    let line = text.trim_end();
    (!line.is_empty()).then(|| line.to_string())
}

/// Install a console subscriber at `level`. Later calls are no-ops.
pub fn try_init(level: Level) {
    // wasm32 has no system clock, so events carry no timestamp
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .without_time()
        .with_writer(ConsoleWriter::default)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
