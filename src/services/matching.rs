use crate::models::MenuOption;

/// Outcome of resolving a raw answer against a menu.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    None,
    One(MenuOption),
    Many,
}

/// Lowercases and folds Spanish accents so "Cardiología" and "CARDIOLOGIA"
/// compare equal.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase().chars().map(fold_accent).collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        _ => c,
    }
}

/// Resolves `raw` against the live option set: exact ordinal first, then
/// normalized substring over labels, then a bounded edit-distance fallback
/// for near-misses. A purely numeric answer only ever matches an ordinal —
/// a stale numeral must fail instead of substring-matching some label.
pub fn resolve(raw: &str, options: &[MenuOption]) -> Resolution {
    let trimmed = raw.trim();

    if let Ok(ordinal) = trimmed.parse::<i64>() {
        return match options.iter().find(|o| o.ordinal == ordinal) {
            Some(option) => Resolution::One(option.clone()),
            None => Resolution::None,
        };
    }

    let needle = normalize(trimmed);
    if needle.is_empty() {
        return Resolution::None;
    }

    let substring: Vec<&MenuOption> = options
        .iter()
        .filter(|o| normalize(&o.label).contains(&needle))
        .collect();
    match substring.len() {
        1 => return Resolution::One(substring[0].clone()),
        n if n > 1 => return Resolution::Many,
        _ => {}
    }

    // Edit-distance fallback for typos ("cardilogia"). Short answers get a
    // tight bound so they cannot drift onto unrelated labels.
    let max_distance = if needle.chars().count() <= 5 { 1 } else { 2 };
    let fuzzy: Vec<&MenuOption> = options
        .iter()
        .filter(|o| {
            let label = normalize(&o.label);
            levenshtein(&needle, &label) <= max_distance
                || label
                    .split_whitespace()
                    .any(|word| levenshtein(&needle, word) <= max_distance)
        })
        .collect();
    match fuzzy.len() {
        0 => Resolution::None,
        1 => Resolution::One(fuzzy[0].clone()),
        _ => Resolution::Many,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(ordinal: i64, label: &str) -> MenuOption {
        MenuOption {
            session_id: "s1".to_string(),
            step: 2,
            ordinal,
            entity_id: format!("e{ordinal}"),
            label: label.to_string(),
        }
    }

    fn menu() -> Vec<MenuOption> {
        vec![
            option(1, "MEDICINA GENERAL"),
            option(2, "CARDIOLOGÍA"),
            option(3, "PEDIATRÍA"),
        ]
    }

    #[test]
    fn test_ordinal_match() {
        match resolve("2", &menu()) {
            Resolution::One(o) => assert_eq!(o.label, "CARDIOLOGÍA"),
            other => panic!("expected one match, got {other:?}"),
        }
    }

    #[test]
    fn test_stale_ordinal_is_not_found() {
        assert_eq!(resolve("7", &menu()), Resolution::None);
    }

    #[test]
    fn test_substring_accent_and_case_insensitive() {
        match resolve("cardiologia", &menu()) {
            Resolution::One(o) => assert_eq!(o.ordinal, 2),
            other => panic!("expected one match, got {other:?}"),
        }
        match resolve("PEDIATRÍA", &menu()) {
            Resolution::One(o) => assert_eq!(o.ordinal, 3),
            other => panic!("expected one match, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_substring() {
        match resolve("medicina", &menu()) {
            Resolution::One(o) => assert_eq!(o.ordinal, 1),
            other => panic!("expected one match, got {other:?}"),
        }
    }

    #[test]
    fn test_ambiguous_substring() {
        let options = vec![option(1, "DRA. MARIA TORRES"), option(2, "DR. MARIO TORRES")];
        assert_eq!(resolve("torres", &options), Resolution::Many);
    }

    #[test]
    fn test_levenshtein_fallback_catches_typo() {
        match resolve("cardilogia", &menu()) {
            Resolution::One(o) => assert_eq!(o.ordinal, 2),
            other => panic!("expected one match, got {other:?}"),
        }
    }

    #[test]
    fn test_no_match() {
        assert_eq!(resolve("odontologia", &menu()), Resolution::None);
        assert_eq!(resolve("", &menu()), Resolution::None);
    }

    #[test]
    fn test_levenshtein_distances() {
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("abc", "abd"), 1);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }
}
