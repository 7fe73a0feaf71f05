//! Version ordering for unversioned lookups.

use std::cmp::Ordering;

/// Compares two version strings segment by segment.
///
/// Segments are split on `.`. Two numeric segments compare as numbers;
/// anything else compares as text. A version that is a prefix of another
/// sorts first (`1.0` < `1.0.1`).
pub(crate) fn compare(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            },
        }
    }
}

/// The highest of `versions`, if any.
pub(crate) fn latest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions.into_iter().max_by(|a, b| compare(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_compare_as_numbers() {
        assert_eq!(compare("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare("2", "10"), Ordering::Less);
        assert_eq!(compare("1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn shorter_prefix_sorts_first() {
        assert_eq!(compare("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn non_numeric_segments_fall_back_to_text() {
        assert_eq!(compare("1.0-beta", "1.0-alpha"), Ordering::Greater);
        assert_eq!(compare("1.a", "1.b"), Ordering::Less);
    }

    #[test]
    fn latest_picks_highest() {
        assert_eq!(latest(["1.2.0", "1.10.0", "1.9.9"]), Some("1.10.0"));
        assert_eq!(latest(Vec::<&str>::new()), None);
    }
}
