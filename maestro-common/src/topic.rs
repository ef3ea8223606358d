//! Topic builders and matchers shared by both bus backends.
//!
//! Topics are `/`-separated levels on MQTT and on Zenoh alike. Only the
//! wildcard syntax differs: MQTT uses `+` and `#`, Zenoh uses `*` and `**`.

/// Separator between topic levels.
pub const LEVEL_SEPARATOR: char = '/';

/// Suffix under which a bridge publishes its own lifecycle status.
pub const STATUS_SUFFIX: &str = "@/status";

/// Wildcard syntax of a bus backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardStyle {
    /// MQTT filters: `+` for one level, `#` for any number of trailing levels.
    Mqtt,
    /// Zenoh key expressions: `*` for one chunk, `**` for any number of chunks.
    Zenoh,
}

impl WildcardStyle {
    /// Token matching every remaining level.
    pub fn multi_level(&self) -> &'static str {
        match self {
            WildcardStyle::Mqtt => "#",
            WildcardStyle::Zenoh => "**",
        }
    }
}

/// Join a prefix and a suffix with a single separator.
///
/// # Example
/// ```
/// use maestro_common::topic::join;
///
/// assert_eq!(join("PUBmcz", "Ambient_Temperature"), "PUBmcz/Ambient_Temperature");
/// assert_eq!(join("PUBmcz/", "Status"), "PUBmcz/Status");
/// assert_eq!(join("PUBmcz", ""), "PUBmcz");
/// ```
pub fn join(prefix: &str, suffix: &str) -> String {
    let prefix = prefix.trim_end_matches(LEVEL_SEPARATOR);
    let suffix = suffix.trim_start_matches(LEVEL_SEPARATOR);

    if suffix.is_empty() {
        prefix.to_string()
    } else if prefix.is_empty() {
        suffix.to_string()
    } else {
        format!("{}{}{}", prefix, LEVEL_SEPARATOR, suffix)
    }
}

/// Build a filter matching every topic below `prefix`.
///
/// # Example
/// ```
/// use maestro_common::topic::{WildcardStyle, descendants};
///
/// assert_eq!(descendants("SUBmcz", WildcardStyle::Mqtt), "SUBmcz/#");
/// assert_eq!(descendants("SUBmcz", WildcardStyle::Zenoh), "SUBmcz/**");
/// ```
pub fn descendants(prefix: &str, style: WildcardStyle) -> String {
    join(prefix, style.multi_level())
}

/// Last level of a topic (the whole topic when it has a single level).
pub fn last_level(topic: &str) -> &str {
    match topic.rfind(LEVEL_SEPARATOR) {
        Some(idx) => &topic[idx + 1..],
        None => topic,
    }
}

/// Whether a topic contains wildcard characters of either backend.
pub fn has_wildcards(topic: &str) -> bool {
    topic.contains(['#', '+', '*', '?', '$'])
}

/// Check whether `topic` is matched by the MQTT filter `filter`.
///
/// Implements the MQTT 3.1.1 rules: `+` matches exactly one level and `#`
/// (only valid as the last level) matches the parent level and everything
/// below it.
pub fn mqtt_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split(LEVEL_SEPARATOR);
    let mut topic_levels = topic.split(LEVEL_SEPARATOR);

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("PUBmcz", "Status"), "PUBmcz/Status");
        assert_eq!(join("PUBmcz/", "/Status"), "PUBmcz/Status");
        assert_eq!(join("", "Status"), "Status");
        assert_eq!(join("PUBmcz", STATUS_SUFFIX), "PUBmcz/@/status");
    }

    #[test]
    fn test_last_level() {
        assert_eq!(last_level("SUBmcz/Power"), "Power");
        assert_eq!(last_level("a/b/Power_Level"), "Power_Level");
        assert_eq!(last_level("Power"), "Power");
        assert_eq!(last_level("SUBmcz/"), "");
    }

    #[test]
    fn test_has_wildcards() {
        assert!(has_wildcards("SUBmcz/#"));
        assert!(has_wildcards("SUBmcz/+/x"));
        assert!(has_wildcards("SUBmcz/**"));
        assert!(!has_wildcards("SUBmcz/Power"));
    }

    #[test]
    fn test_mqtt_multi_level() {
        assert!(mqtt_matches("SUBmcz/#", "SUBmcz/Power"));
        assert!(mqtt_matches("SUBmcz/#", "SUBmcz/a/b"));
        assert!(mqtt_matches("SUBmcz/#", "SUBmcz"));
        assert!(!mqtt_matches("SUBmcz/#", "PUBmcz/Power"));
        assert!(!mqtt_matches("SUBmcz/#/x", "SUBmcz/a/x"));
    }

    #[test]
    fn test_mqtt_single_level() {
        assert!(mqtt_matches("SUBmcz/+", "SUBmcz/Power"));
        assert!(!mqtt_matches("SUBmcz/+", "SUBmcz/a/b"));
        assert!(!mqtt_matches("SUBmcz/+", "SUBmcz"));
    }

    #[test]
    fn test_mqtt_exact() {
        assert!(mqtt_matches("SUBmcz", "SUBmcz"));
        assert!(!mqtt_matches("SUBmcz", "SUBmcz/Power"));
        assert!(!mqtt_matches("SUBmcz/Power", "SUBmcz"));
    }
}
