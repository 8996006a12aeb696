use super::{Event, LogFormatter};

#[derive(Debug, Clone)]
pub struct Config {
    pub datetime_format: String,
}

impl Config {
    pub fn new() -> Self {
        Self {
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders `<time>  <LEVEL>\t<message> <fields>\n`.
pub struct DefaultFormatter {
    config: Config,
}

impl DefaultFormatter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn format_fields(&self, event: &Event<'_>) -> Option<String> {
        let fields = event.fields?;
        if fields.is_empty() {
            return None;
        }

        match serde_json::to_string(fields) {
            Ok(json) if json != "null" => Some(json),
            _ => None,
        }
    }
}

impl LogFormatter for DefaultFormatter {
    fn format(&self, event: &Event<'_>) -> String {
        let mut line = format!(
            "{}  {}\t",
            event.timestamp.format(&self.config.datetime_format),
            event.level
        );

        if !event.message.is_empty() {
            line.push_str(event.message);
            line.push(' ');
        }

        if let Some(json) = self.format_fields(event) {
            line.push_str(&json);
        }

        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};
    use serde_json::json;

    use super::*;
    use crate::logging::{Fields, Level};

    fn event<'a>(level: Level, message: &'a str, fields: Option<&'a Fields>) -> Event<'a> {
        Event {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap(),
            level,
            message,
            fields,
        }
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn formats_message_with_fields() {
        let formatter = DefaultFormatter::new(Config::new());
        let vars = fields(json!({"a": 1}));

        let line = formatter.format(&event(Level::Info, "hello", Some(&vars)));

        assert_eq!(line, "2024-03-09 07:05:01  INFO\thello {\"a\":1}\n");
    }

    #[test]
    fn omits_empty_and_absent_fields() {
        let formatter = DefaultFormatter::new(Config::new());
        let empty = Fields::new();

        let absent = formatter.format(&event(Level::Error, "boom", None));
        let blank = formatter.format(&event(Level::Error, "boom", Some(&empty)));

        assert_eq!(absent, "2024-03-09 07:05:01  ERROR\tboom \n");
        assert_eq!(absent, blank);
        assert!(!absent.contains("null"));
        assert!(!absent.contains("{}"));
    }

    #[test]
    fn omits_empty_message() {
        let formatter = DefaultFormatter::new(Config::new());
        let vars = fields(json!({"user": "bob"}));

        let line = formatter.format(&event(Level::Debug, "", Some(&vars)));

        assert_eq!(line, "2024-03-09 07:05:01  DEBUG\t{\"user\":\"bob\"}\n");
    }

    #[test]
    fn honours_custom_datetime_format() {
        let formatter = DefaultFormatter::new(Config {
            datetime_format: "%H:%M".to_string(),
        });

        let line = formatter.format(&event(Level::Info, "m", None));

        assert_eq!(line, "07:05  INFO\tm \n");
    }

    #[test]
    fn does_not_escape_embedded_newlines() {
        let formatter = DefaultFormatter::new(Config::new());

        let line = formatter.format(&event(Level::Info, "a\nb", None));

        assert_eq!(line.matches('\n').count(), 2);
    }
}
