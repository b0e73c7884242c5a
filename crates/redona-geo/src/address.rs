/// Postal address as stored on donations and NGOs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressQuery {
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
}

impl AddressQuery {
    /// True when there is nothing to look up.
    pub fn is_empty(&self) -> bool {
        [&self.address, &self.city, &self.province, &self.postal_code]
            .iter()
            .all(|part| part.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

/// Join the non-empty parts with ", ".
pub fn format_address(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .filter_map(|part| part.map(str::trim))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("c/", "Calle "),
    ("avda.", "Avenida "),
    ("av.", "Avenida "),
    ("pza.", "Plaza "),
    ("pº", "Paseo "),
];

/// Trim, collapse runs of whitespace and expand common street abbreviations
/// (`C/ Mayor` becomes `Calle Mayor`).
pub fn normalize(input: &str) -> String {
    let mut words = Vec::new();
    for word in input.split_whitespace() {
        let lower = word.to_lowercase();
        let expanded = ABBREVIATIONS.iter().find_map(|(abbr, full)| {
            lower
                .starts_with(abbr)
                .then(|| format!("{}{}", full, &word[abbr.len()..]))
        });
        match expanded {
            Some(expanded) => words.extend(expanded.split_whitespace().map(str::to_string)),
            None => words.push(word.to_string()),
        }
    }
    words.join(" ")
}

/// Ordered, de-duplicated query variants from most to least specific.
pub fn query_variants(query: &AddressQuery, country: Option<&str>) -> Vec<String> {
    let clean = |part: &Option<String>| {
        part.as_deref()
            .map(normalize)
            .filter(|s| !s.is_empty())
    };
    let address = clean(&query.address);
    let city = clean(&query.city);
    let province = clean(&query.province);
    let postal_code = clean(&query.postal_code);
    let country = country.map(str::trim).filter(|c| !c.is_empty());

    let candidates = [
        vec![&address, &postal_code, &city, &province],
        vec![&address, &city, &province],
        vec![&postal_code, &city, &province],
        vec![&city, &province],
    ];

    let mut variants: Vec<String> = Vec::new();
    for parts in candidates {
        if parts.iter().all(|p| p.is_none()) {
            continue;
        }
        let mut joined: Vec<&str> = parts.iter().filter_map(|p| p.as_deref()).collect();
        if let Some(country) = country {
            joined.push(country);
        }
        let variant = joined.join(", ");
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(address: Option<&str>, city: Option<&str>, province: Option<&str>, cp: Option<&str>) -> AddressQuery {
        AddressQuery {
            address: address.map(String::from),
            city: city.map(String::from),
            province: province.map(String::from),
            postal_code: cp.map(String::from),
        }
    }

    #[test]
    fn format_skips_empty_parts() {
        let formatted = format_address(&[Some("Calle Mayor 1"), None, Some("  "), Some("Madrid")]);
        assert_eq!(formatted, "Calle Mayor 1, Madrid");
        assert_eq!(format_address(&[None, Some("")]), "");
    }

    #[test]
    fn normalize_expands_abbreviations() {
        assert_eq!(normalize("  C/ Mayor   12 "), "Calle Mayor 12");
        assert_eq!(normalize("c/Alcalá 5"), "Calle Alcalá 5");
        assert_eq!(normalize("Avda. de la Constitución"), "Avenida de la Constitución");
        assert_eq!(normalize("Calle Ancha"), "Calle Ancha");
    }

    #[test]
    fn variants_go_from_specific_to_broad() {
        let q = query(Some("C/ Mayor 1"), Some("Madrid"), Some("Madrid"), Some("28013"));
        let variants = query_variants(&q, Some("Spain"));
        assert_eq!(
            variants,
            vec![
                "Calle Mayor 1, 28013, Madrid, Madrid, Spain",
                "Calle Mayor 1, Madrid, Madrid, Spain",
                "28013, Madrid, Madrid, Spain",
                "Madrid, Madrid, Spain",
            ]
        );
    }

    #[test]
    fn variants_are_deduplicated() {
        let q = query(None, Some("Soria"), None, None);
        assert_eq!(query_variants(&q, None), vec!["Soria"]);
        assert!(query_variants(&AddressQuery::default(), Some("Spain")).is_empty());
    }
}
