/// `%q%` for an ILIKE substring search, with LIKE metacharacters in `q`
/// escaped so they match literally.
pub fn like_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// An empty `q` is the same as no `q`.
pub fn search_term(q: Option<&str>) -> Option<&str> {
    q.filter(|s| !s.is_empty())
}

/// Wall-clock times as `HH:MM` or `HH:MM:SS` (the console's time inputs send
/// the short form).
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer};

    const FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(raw.trim(), f).ok())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid time of day: {raw}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("ngu"), "%ngu%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn empty_search_is_no_search() {
        assert_eq!(search_term(None), None);
        assert_eq!(search_term(Some("")), None);
        assert_eq!(search_term(Some("tran")), Some("tran"));
    }

    #[test]
    fn clock_time_parses_both_forms() {
        assert_eq!(clock_time::parse("13:05"), NaiveTime::from_hms_opt(13, 5, 0));
        assert_eq!(clock_time::parse("13:05:30"), NaiveTime::from_hms_opt(13, 5, 30));
        assert_eq!(clock_time::parse("1pm"), None);
    }
}
