use serde::Deserialize;
use std::collections::BTreeMap;

/// Free-text area name → canonical area name, matched exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AreaAliases(BTreeMap<String, String>);

impl AreaAliases {
    /// Substitute `area` when it has an alias, otherwise hand it back unchanged.
    pub fn apply<'a>(&'a self, area: &'a str) -> &'a str {
        self.0.get(area).map(String::as_str).unwrap_or(area)
    }

    /// First alias whose target is itself remapped to something else, as
    /// `(key, target, next)`. A map without chains is idempotent under [`apply`].
    ///
    /// [`apply`]: AreaAliases::apply
    pub fn find_chain(&self) -> Option<(&str, &str, &str)> {
        self.0.iter().find_map(|(key, target)| {
            self.0
                .get(target)
                .filter(|next| *next != target)
                .map(|next| (key.as_str(), target.as_str(), next.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AreaAliases {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> AreaAliases {
        [
            ("N. Pasture", "North Pasture"),
            ("North Pastur", "North Pasture"),
            ("Creek Fld", "Creek Field"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn apply_substitutes_exact_matches_only() {
        let a = aliases();
        assert_eq!(a.apply("N. Pasture"), "North Pasture");
        assert_eq!(a.apply("n. pasture"), "n. pasture");
        assert_eq!(a.apply("South Pasture"), "South Pasture");
    }

    #[test]
    fn apply_is_idempotent_without_chains() {
        let a = aliases();
        assert!(a.find_chain().is_none());
        for area in ["N. Pasture", "North Pastur", "North Pasture", "Creek Fld", "Elsewhere"] {
            let once = a.apply(area);
            assert_eq!(a.apply(once), once, "alias of {area:?} is not stable");
        }
    }

    #[test]
    fn find_chain_reports_remapped_targets() {
        let chained: AreaAliases = [("A", "B"), ("B", "C")].into_iter().collect();
        assert_eq!(chained.find_chain(), Some(("A", "B", "C")));

        let self_mapped: AreaAliases = [("A", "B"), ("B", "B")].into_iter().collect();
        assert!(self_mapped.find_chain().is_none());
    }

    #[test]
    fn deserializes_from_yaml_mapping() {
        let a: AreaAliases = serde_yaml::from_str("\"N. Pasture\": North Pasture\n").unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.apply("N. Pasture"), "North Pasture");
    }
}
