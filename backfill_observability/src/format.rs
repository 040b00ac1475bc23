//! Compact, colored log line format used when logs go to a terminal.
//!
//! A line looks like `[INFO] [10-18|12:00:01.250] import created import_id=01J... site=blog`.

use std::fmt::{self, Write as _};
use std::io;

use nu_ansi_term::Color;
use tracing::{Event, Level, Subscriber, field};
use tracing_subscriber::field::{RecordFields, VisitFmt, VisitOutput};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

pub struct BackfillFormat {
    time_format: time::format_description::OwnedFormatItem,
}

impl Default for BackfillFormat {
    fn default() -> Self {
        let time_format = time::format_description::parse_owned::<2>(
            r#"\[[month]-[day]|[hour]:[minute]:[second].[subsecond digits:3]\]"#,
        )
        .expect("static time format is valid");

        Self { time_format }
    }
}

impl BackfillFormat {
    fn format_time(&self, writer: &mut Writer<'_>) -> fmt::Result {
        let now = time::OffsetDateTime::from(std::time::SystemTime::now());
        let mut w = WriteAdaptor { fmt_writer: writer };
        now.format_into(&mut w, &self.time_format)
            .map_err(|_| fmt::Error)?;
        Ok(())
    }
}

impl<S, N> FormatEvent<S, N> for BackfillFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = event.metadata().level();
        write_level(&mut writer, level)?;
        writer.write_char(' ')?;
        if self.format_time(&mut writer).is_err() {
            write!(writer, "[<unknown-timestamp>]")?;
        }
        writer.write_char(' ')?;

        ctx.format_fields(writer.by_ref(), event)?;

        // Append the fields of the enclosing spans, innermost last.
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, " {}", fields)?;
                    }
                }
            }
        }

        writeln!(writer)
    }
}

impl<'w> FormatFields<'w> for BackfillFormat {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'w>, fields: R) -> fmt::Result {
        let mut visitor = FieldVisitor::new(writer);
        fields.record(&mut visitor);
        visitor.finish()
    }
}

fn write_level(writer: &mut Writer<'_>, level: &Level) -> fmt::Result {
    let (label, color) = match *level {
        Level::TRACE => ("TRACE", Color::Purple),
        Level::DEBUG => ("DEBUG", Color::Blue),
        Level::INFO => ("INFO", Color::Green),
        Level::WARN => ("WARN", Color::Yellow),
        Level::ERROR => ("ERROR", Color::Red),
    };

    if writer.has_ansi_escapes() {
        write!(writer, "[{}]", color.paint(label))
    } else {
        write!(writer, "[{}]", label)
    }
}

struct FieldVisitor<'a> {
    writer: Writer<'a>,
    is_empty: bool,
    result: fmt::Result,
}

impl<'a> FieldVisitor<'a> {
    fn new(writer: Writer<'a>) -> Self {
        Self {
            writer,
            is_empty: true,
            result: Ok(()),
        }
    }

    fn separator(&mut self) -> &'static str {
        if self.is_empty {
            self.is_empty = false;
            ""
        } else {
            " "
        }
    }
}

impl field::Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.record_debug(field, &format_args!("{}", value))
        } else {
            self.record_debug(field, &value)
        }
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        if self.result.is_err() {
            return;
        }

        let separator = self.separator();
        self.result = match field.name() {
            "message" => write!(self.writer, "{}{:<40?}", separator, value),
            name if self.writer.has_ansi_escapes() => {
                let color = if name == "error" || name == "err" {
                    Color::Red
                } else {
                    Color::Blue
                };
                write!(
                    self.writer,
                    "{}{}={}",
                    separator,
                    name,
                    color.paint(format!("{:?}", value))
                )
            }
            name => write!(self.writer, "{}{}={:?}", separator, name, value),
        };
    }
}

impl VisitOutput<fmt::Result> for FieldVisitor<'_> {
    fn finish(self) -> fmt::Result {
        self.result
    }
}

impl VisitFmt for FieldVisitor<'_> {
    fn writer(&mut self) -> &mut dyn fmt::Write {
        &mut self.writer
    }
}

struct WriteAdaptor<'a, 'w> {
    fmt_writer: &'a mut Writer<'w>,
}

impl io::Write for WriteAdaptor<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = std::str::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.fmt_writer.write_str(s).map_err(io::Error::other)?;

        Ok(s.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
