use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::counters::CounterHandle;
use crate::error::{Error, Result};

/// Field separator of continuous-print lines.
pub const SEPARATOR: char = ',';

/// Default bound on one continuous-print line, separators included.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;

/// What every tick does with the configured counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Fold each reading into the counter's running total; no output.
    #[default]
    Accumulate,
    /// Print one comma-separated line of current readings per tick.
    ContinuousPrint,
}

/// Tick function bound at construction.
pub(crate) enum Tick {
    Accumulate,
    Print(LinePrinter),
}

impl Tick {
    pub(crate) fn run(&mut self, counters: &[CounterHandle]) {
        match self {
            Tick::Accumulate => {
                for counter in counters {
                    counter.accumulate();
                }
            }
            Tick::Print(printer) => printer.print(counters),
        }
    }
}

/// Formats readings into a line buffer sized once, at construction, for the
/// worst case of every counter, and reused across ticks.
pub(crate) struct LinePrinter {
    line: String,
    limit: usize,
    sink: Box<dyn Write + Send>,
}

impl LinePrinter {
    pub(crate) fn new(
        counters: &[CounterHandle],
        limit: usize,
        sink: Box<dyn Write + Send>,
    ) -> Result<Self> {
        let required = worst_case_line(counters);
        if required > limit {
            return Err(Error::LineTooWide { required, limit });
        }
        Ok(Self {
            line: String::with_capacity(required),
            limit,
            sink,
        })
    }

    fn print(&mut self, counters: &[CounterHandle]) {
        self.line.clear();
        for (i, counter) in counters.iter().enumerate() {
            if i > 0 {
                self.line.push(SEPARATOR);
            }
            let written = counter.read_string(&mut self.line);
            if written > counter.max_string_len() {
                tracing::warn!(
                    counter = counter.name(),
                    written,
                    declared = counter.max_string_len(),
                    "reading wider than declared"
                );
            }
        }
        if self.line.len() >= self.limit {
            let mut cut = self.limit - 1;
            while !self.line.is_char_boundary(cut) {
                cut -= 1;
            }
            self.line.truncate(cut);
        }
        self.line.push('\n');

        if let Err(e) = self
            .sink
            .write_all(self.line.as_bytes())
            .and_then(|()| self.sink.flush())
        {
            tracing::warn!(error = %e, "failed to write sample line");
        }
    }
}

/// Bytes needed for one line: every counter's widest reading, the
/// separators between them and the trailing newline.
pub(crate) fn worst_case_line(counters: &[CounterHandle]) -> usize {
    let fields: usize = counters.iter().map(|c| c.max_string_len()).sum();
    fields + counters.len().saturating_sub(1) + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{FixedSource, MeasurementSource};
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn counters(texts: &[&str]) -> Vec<CounterHandle> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                Arc::new(FixedSource::new(format!("c{i}"), 1.0, *text)) as CounterHandle
            })
            .collect()
    }

    #[test]
    fn accumulate_touches_every_counter() {
        let fixed: Vec<Arc<FixedSource>> = (0..3)
            .map(|i| Arc::new(FixedSource::new(format!("c{i}"), 2.0, "")))
            .collect();
        let handles: Vec<CounterHandle> = fixed.iter().map(|f| f.clone() as CounterHandle).collect();

        let mut tick = Tick::Accumulate;
        tick.run(&handles);
        tick.run(&handles);
        for f in &fixed {
            assert_eq!(f.accumulator(), 4.0);
        }
    }

    #[test]
    fn prints_fields_without_trailing_separator() {
        let sink = SharedSink::default();
        let counters = counters(&["aa", "b", "ccc"]);
        let mut tick = Tick::Print(LinePrinter::new(&counters, 64, Box::new(sink.clone())).unwrap());

        tick.run(&counters);
        tick.run(&counters);

        let out = String::from_utf8(sink.0.lock().clone()).unwrap();
        assert_eq!(out, "aa,b,ccc\naa,b,ccc\n");
    }

    #[test]
    fn worst_case_counts_separators_and_newline() {
        assert_eq!(worst_case_line(&counters(&["aa", "b", "ccc"])), 9);
        assert_eq!(worst_case_line(&counters(&["x"])), 2);
    }

    #[test]
    fn rejects_line_wider_than_limit() {
        let counters = counters(&["aaaa", "bbbb"]);
        match LinePrinter::new(&counters, 9, Box::new(io::sink())) {
            Err(Error::LineTooWide { required, limit }) => {
                assert_eq!(required, 10);
                assert_eq!(limit, 9);
            }
            _ => panic!("expected LineTooWide"),
        }
        assert!(LinePrinter::new(&counters, 10, Box::new(io::sink())).is_ok());
    }
}
