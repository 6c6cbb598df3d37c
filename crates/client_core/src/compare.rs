//! Display-ordering comparator over schema-less records.
//!
//! Ordering policy: records missing the sort key never force a position
//! (they compare equal), strings compare case-insensitively, and mismatched
//! value types compare equal rather than erroring.

use std::cmp::Ordering;

use shared::protocol::{AlbumRecord, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Dynamic field access for sortable records.
pub trait Record {
    fn field(&self, key: &str) -> Option<Scalar>;
}

impl Record for AlbumRecord {
    fn field(&self, key: &str) -> Option<Scalar> {
        match key {
            "id" => Some(Scalar::Str(self.id.0.clone())),
            "name" => Some(Scalar::Str(self.name.clone())),
            "year" => self.year.clone(),
            "owner" => self.owner.clone().map(Scalar::Str),
            _ => None,
        }
    }
}

fn compare_scalars(a: &Scalar, b: &Scalar) -> Ordering {
    match (a, b) {
        (Scalar::Str(a), Scalar::Str(b)) => a.to_uppercase().cmp(&b.to_uppercase()),
        (Scalar::Num(a), Scalar::Num(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        // Mismatched types are neither less nor greater.
        _ => Ordering::Equal,
    }
}

/// Builds a comparator from a key accessor. Suitable for any standard sort:
/// total, consistent, and it never panics.
pub fn compare_by<T, F>(accessor: F, order: SortOrder) -> impl Fn(&T, &T) -> Ordering
where
    F: Fn(&T) -> Option<Scalar>,
{
    move |a, b| {
        let ordering = match (accessor(a), accessor(b)) {
            (Some(a), Some(b)) => compare_scalars(&a, &b),
            _ => Ordering::Equal,
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Field-name form of [`compare_by`] for any [`Record`].
pub fn make_comparator<T: Record>(key: &str, order: SortOrder) -> impl Fn(&T, &T) -> Ordering {
    let key = key.to_string();
    compare_by(move |record: &T| record.field(&key), order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::AlbumId;

    fn album(id: &str, name: &str, year: Option<Scalar>) -> AlbumRecord {
        AlbumRecord {
            id: AlbumId::new(id),
            name: name.to_string(),
            year,
            owner: None,
            created_at: None,
        }
    }

    #[test]
    fn desc_inverts_asc_unless_equal() {
        let a = album("1", "Autumn", None);
        let b = album("2", "Winter", None);
        let asc = make_comparator::<AlbumRecord>("name", SortOrder::Asc);
        let desc = make_comparator::<AlbumRecord>("name", SortOrder::Desc);

        assert_eq!(asc(&a, &b), desc(&a, &b).reverse());
        assert_eq!(asc(&a, &a), Ordering::Equal);
        assert_eq!(desc(&a, &a), Ordering::Equal);
    }

    #[test]
    fn missing_key_on_either_side_compares_equal() {
        let with_year = album("1", "a", Some(Scalar::Num(2019.0)));
        let without_year = album("2", "b", None);
        let asc = make_comparator::<AlbumRecord>("year", SortOrder::Asc);
        let desc = make_comparator::<AlbumRecord>("year", SortOrder::Desc);

        assert_eq!(asc(&with_year, &without_year), Ordering::Equal);
        assert_eq!(asc(&without_year, &with_year), Ordering::Equal);
        assert_eq!(desc(&with_year, &without_year), Ordering::Equal);
    }

    #[test]
    fn unknown_key_compares_equal() {
        let a = album("1", "a", None);
        let b = album("2", "b", None);
        let cmp = make_comparator::<AlbumRecord>("photos", SortOrder::Asc);
        assert_eq!(cmp(&a, &b), Ordering::Equal);
    }

    #[test]
    fn string_comparison_is_case_insensitive() {
        let cmp = make_comparator::<AlbumRecord>("name", SortOrder::Asc);
        let lower_a = album("1", "a", None);
        let upper_b = album("2", "B", None);
        let upper_a = album("3", "A", None);
        let lower_b = album("4", "b", None);

        assert_eq!(cmp(&lower_a, &upper_b), cmp(&upper_a, &lower_b));
        assert_eq!(cmp(&lower_a, &upper_a), Ordering::Equal);
    }

    #[test]
    fn mismatched_types_compare_equal() {
        let string_year = album("1", "a", Some(Scalar::Str("2019".to_string())));
        let numeric_year = album("2", "b", Some(Scalar::Num(2020.0)));
        let cmp = make_comparator::<AlbumRecord>("year", SortOrder::Asc);

        assert_eq!(cmp(&string_year, &numeric_year), Ordering::Equal);
        assert_eq!(cmp(&numeric_year, &string_year), Ordering::Equal);
    }

    #[test]
    fn numeric_fields_compare_numerically() {
        let older = album("1", "a", Some(Scalar::Num(1999.0)));
        let newer = album("2", "b", Some(Scalar::Num(2020.0)));
        let cmp = make_comparator::<AlbumRecord>("year", SortOrder::Asc);

        assert_eq!(cmp(&older, &newer), Ordering::Less);
        assert_eq!(cmp(&newer, &older), Ordering::Greater);
    }

    #[test]
    fn sorting_twice_is_idempotent() {
        let mut albums = vec![
            album("1", "Zoo", None),
            album("2", "apple", None),
            album("3", "Mango", None),
            album("4", "APPLE", None),
        ];
        let cmp = make_comparator::<AlbumRecord>("name", SortOrder::Asc);

        albums.sort_by(&cmp);
        let once = albums.clone();
        albums.sort_by(&cmp);
        assert_eq!(albums, once);
    }

    #[test]
    fn case_insensitive_sort_places_apple_before_zoo() {
        let mut albums = vec![album("1", "Zoo", None), album("2", "apple", None)];
        albums.sort_by(make_comparator::<AlbumRecord>("name", SortOrder::Asc));

        let names: Vec<&str> = albums.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["apple", "Zoo"]);
    }

    #[test]
    fn accessor_form_sorts_without_field_names() {
        let mut albums = vec![
            album("1", "b", Some(Scalar::Num(2021.0))),
            album("2", "a", Some(Scalar::Num(2019.0))),
        ];
        albums.sort_by(compare_by(|a: &AlbumRecord| a.year.clone(), SortOrder::Desc));

        assert_eq!(albums[0].year, Some(Scalar::Num(2021.0)));
    }
}
