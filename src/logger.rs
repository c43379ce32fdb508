use std::{
    collections::HashMap,
    fmt::{self, Write as _},
    fs::OpenOptions,
    path::PathBuf,
};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use tracing::{field::{Field, Visit}, Level};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
};

use crate::{args::{Args, ColorMode}, prelude::*};


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is chosen.
    /// If no such entry exists, the log is not emitted. Otherwise, that
    /// entry's level is used to check whether the log message should be
    /// emitted.
    ///
    /// Example: only allow ≥"info" logs from wpgate generally, but ≥"trace"
    /// from the `db` module, and show ≥"debug" logs of the HTTP library.
    ///
    ///    [log]
    ///    filters.wpgate = "info"
    ///    filters."wpgate::db" = "trace"
    ///    filters.hyper = "debug"
    #[config(default = { "wpgate": "debug" })]
    pub(crate) filters: Filters,

    /// If this is set, log messages are also written to this file. The string
    /// `${cmd}` in this value is replaced by the subcommand name of the
    /// process, `serve` or `other`. Example: "/var/log/wpgate-${cmd}.log".
    pub(crate) file: Option<PathBuf>,

    /// If this is set to `false`, log messages are not written to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| Ok((target_prefix, parse_level_filter(&level)?)))
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl Filters {
    /// Whether an event with `target` and `level` passes this filter. The
    /// entry with the longest matching prefix decides.
    fn allows(&self, target: &str, level: &Level) -> bool {
        self.0.iter()
            .filter(|(prefix, _)| target.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, filter)| level <= filter)
            .unwrap_or(false)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

/// Installs our own logger globally. Must only be called once!
pub(crate) fn init(config: &LogConfig, args: &Args) -> Result<()> {
    let filter = {
        let filters = Filters(config.filters.0.clone());
        let max_level = filters.0.values().max().copied().unwrap_or(LevelFilter::OFF);
        FilterFn::new(move |metadata| filters.allows(metadata.target(), metadata.level()))
            .with_max_level_hint(max_level)
    };

    let stdout_output = config.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(EventFormatter(args.color))
            .with_writer(std::io::stdout)
    });

    let file_output = config.file.as_ref()
        .map(|path| -> Result<std::fs::File> {
            use std::io::Write;

            let path = path.to_str()
                .ok_or_else(|| anyhow!("log file path is not valid UTF-8"))?
                .replace("${cmd}", args.cmd_name());

            let mut file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .with_context(|| format!("failed to open/create log file '{path}'"))?;

            // Empty line to make process restarts easier to spot.
            file.write_all(b"\n").context("could not write to log file")?;

            Ok(file)
        })
        .transpose()?
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .event_format(EventFormatter(args.color))
                .with_writer(file)
                .with_ansi(args.color == ColorMode::Always)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stdout_output)
        .init();

    Ok(())
}


/// Prints events as `<time> <level> <target> >  <message> ~~ <fields>`.
#[derive(Clone, Copy)]
struct EventFormatter(ColorMode);

impl<S, N> FormatEvent<S, N> for EventFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let use_ansi = self.0 == ColorMode::Always
            || (writer.has_ansi_escapes() && self.0 != ColorMode::Never);
        let paint = |style: Style| if use_ansi { style } else { Style::new() };

        // Events coming from the `log` crate carry their real metadata in
        // fields.
        let normalized_metadata = event.normalized_metadata();
        let metadata = normalized_metadata.as_ref().unwrap_or(event.metadata());

        let dim = paint(Style::new().dimmed());
        let (level_style, body_style) = match *metadata.level() {
            Level::ERROR => (Style::new().fg(Color::Red).bold(), Style::new().fg(Color::Red)),
            Level::WARN => (Style::new().fg(Color::Yellow).bold(), Style::new().fg(Color::Yellow)),
            Level::INFO => (Style::new().fg(Color::Green), Style::new()),
            Level::DEBUG => (Style::new().fg(Color::Blue), Style::new().dimmed()),
            Level::TRACE => (Style::new().fg(Color::Magenta), Style::new().fg(Color::DarkGray)),
        };
        let (level_style, body_style) = (paint(level_style), paint(body_style));

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        write!(
            writer,
            "{} {} {}  ",
            dim.paint(chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f").to_string()),
            level_style.paint(format!("{:5}", metadata.level())),
            dim.paint(format!("{} >", metadata.target())),
        )?;

        // Continuation lines of multi-line messages are aligned with the
        // first line.
        let indent = format!(
            "\n{:width$}{}  ",
            "",
            dim.paint(">"),
            width = "2021-05-04 19:40:18.270 DEBUG ".len() + metadata.target().len() + 1,
        );
        let mut lines = fields.message.lines();
        write!(writer, "{}", body_style.paint(lines.next().unwrap_or("")))?;
        for line in lines {
            write!(writer, "{indent}{}", body_style.paint(line))?;
        }

        if !fields.rest.is_empty() {
            if !fields.message.is_empty() {
                write!(writer, "{}", level_style.paint(" ~~"))?;
            }
            for (name, value) in &fields.rest {
                write!(writer, " {}{}", body_style.italic().paint(*name), body_style.paint("="))?;
                write!(writer, "{}", body_style.paint(value))?;
            }
        }

        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    rest: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => {
                let _ = write!(self.message, "{value:?}");
            }
            name if name.starts_with("log.") => {}
            name => self.rest.push((name, format!("{value:?}"))),
        }
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tracing::Level;

    use super::Filters;

    fn filters(entries: &[(&str, &str)]) -> Filters {
        let map: HashMap<String, String> = entries.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Filters::try_from(map).unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let f = filters(&[("wpgate", "info"), ("wpgate::db", "trace"), ("wpgate::http", "off")]);
        assert!(f.allows("wpgate::users", &Level::INFO));
        assert!(!f.allows("wpgate::users", &Level::DEBUG));
        assert!(f.allows("wpgate::db", &Level::TRACE));
        assert!(!f.allows("wpgate::http::log", &Level::ERROR));
    }

    #[test]
    fn unknown_targets_are_dropped() {
        let f = filters(&[("wpgate", "trace")]);
        assert!(!f.allows("hyper::proto", &Level::ERROR));
    }

    #[test]
    fn invalid_level() {
        let map = HashMap::from([("wpgate".to_string(), "verbose".to_string())]);
        assert!(Filters::try_from(map).is_err());
    }
}
