use crate::error::ExportError;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Which pairs of a conversation to export, as 1-based positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PairSelection {
    #[default]
    All,
    /// Inclusive `(start, end)` ranges; a single index is `(n, n)`.
    Ranges(Vec<(usize, usize)>),
}

impl PairSelection {
    /// Zero-based indices in document order, validated against `count`.
    /// Ranges are checked before they are expanded, so the work is bounded
    /// by `count` whatever the user typed.
    pub fn resolve(&self, count: usize) -> Result<Vec<usize>, ExportError> {
        let ranges = match self {
            PairSelection::All => return Ok((0..count).collect()),
            PairSelection::Ranges(ranges) => ranges,
        };

        let mut indices = BTreeSet::new();
        for &(start, end) in ranges {
            if start == 0 {
                return Err(ExportError::SelectionOutOfRange { index: 0, count });
            }
            if end > count {
                return Err(ExportError::SelectionOutOfRange { index: end, count });
            }
            indices.extend(start - 1..end);
        }
        Ok(indices.into_iter().collect())
    }

    /// Keeps the selected items, in their original order.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, ExportError> {
        Ok(self
            .resolve(items.len())?
            .into_iter()
            .map(|index| items[index].clone())
            .collect())
    }
}

impl FromStr for PairSelection {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        if spec.eq_ignore_ascii_case("all") {
            return Ok(PairSelection::All);
        }

        let invalid = || ExportError::InvalidSelection(s.to_string());
        let parse_index = |text: &str| text.trim().parse::<usize>().map_err(|_| invalid());

        let mut ranges = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid());
            }
            let range = match part.split_once('-') {
                Some((start, end)) => (parse_index(start)?, parse_index(end)?),
                None => {
                    let index = parse_index(part)?;
                    (index, index)
                }
            };
            if range.0 > range.1 {
                return Err(invalid());
            }
            ranges.push(range);
        }
        Ok(PairSelection::Ranges(ranges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranges_and_duplicates() {
        let selection: PairSelection = "3-5, 1,4".parse().unwrap();
        assert_eq!(selection.resolve(5).unwrap(), vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_all_selects_everything() {
        let selection: PairSelection = "ALL".parse().unwrap();
        assert_eq!(selection.apply(&["a", "b"]).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let selection: PairSelection = "2,7".parse().unwrap();
        assert!(matches!(
            selection.resolve(3),
            Err(ExportError::SelectionOutOfRange { index: 7, count: 3 })
        ));
        let zero: PairSelection = "0".parse().unwrap();
        assert!(zero.resolve(3).is_err());
    }

    #[test]
    fn test_huge_range_is_rejected_without_expanding() {
        let selection: PairSelection = "1-4000000000".parse().unwrap();
        assert_eq!(selection, PairSelection::Ranges(vec![(1, 4_000_000_000)]));
        assert!(matches!(
            selection.apply(&["a", "b"]),
            Err(ExportError::SelectionOutOfRange {
                index: 4_000_000_000,
                count: 2
            })
        ));
    }

    #[test]
    fn test_malformed_specs_are_invalid() {
        for spec in ["", "1,,2", "a", "5-2", "1-"] {
            assert!(
                matches!(spec.parse::<PairSelection>(), Err(ExportError::InvalidSelection(_))),
                "{spec} should be invalid"
            );
        }
    }
}
