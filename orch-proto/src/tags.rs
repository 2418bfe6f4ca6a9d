//! Tag normalisation: ordered, deduplicated, case-insensitive.

/// Normalise a raw tag list into the stored form: trimmed, lowercased,
/// empties dropped, insertion order preserved, duplicates removed.
///
/// Feeding the same raw tags twice must yield the same stored list —
/// this function has no hidden state, so that idempotence falls out
/// for free.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in raw {
        let tag = tag.as_ref().trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    out
}

/// Number of tags two normalised tag lists have in common.
pub fn tag_overlap(a: &[String], b: &[String]) -> usize {
    let a_set: std::collections::HashSet<&str> = a.iter().map(String::as_str).collect();
    b.iter().filter(|t| a_set.contains(t.as_str())).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_dedups_and_trims() {
        let tags = normalize_tags(["Aurora", " aurora ", "Database", ""]);
        assert_eq!(tags, vec!["aurora".to_string(), "database".to_string()]);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_tags(["Aurora", "DB", "aurora"]);
        let twice = normalize_tags(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn overlap_counts_shared_tags() {
        let a = normalize_tags(["aurora", "database"]);
        let b = normalize_tags(["database", "rds"]);
        assert_eq!(tag_overlap(&a, &b), 1);
    }
}
