//! Port of `persister.py`'s `_null_preserving_update` (§4.9, I6).

use pe_core::model::Confidence;

/// A NULL destination column is always filled; a non-null one is only
/// overwritten when the new value's confidence is at least as high as
/// what's already on file. `existing_confidence` is `None` for tables that
/// carry no confidence column of their own (e.g. `pe_deals`), in which case
/// every non-null field is treated as confidently placed and is only
/// filled, never overwritten.
pub fn should_overwrite(
    existing_is_null: bool,
    new_confidence: Confidence,
    existing_confidence: Option<Confidence>,
) -> bool {
    if existing_is_null {
        return true;
    }
    match existing_confidence {
        Some(existing) => new_confidence >= existing,
        None => false,
    }
}

/// Returns `Some(value)` when the merge rule says the field should be
/// written, `None` when it should be left untouched — directly usable as
/// an `AsChangeset` patch field either way.
pub fn merge_field<T: Clone>(
    new_value: Option<&T>,
    existing_value: &Option<T>,
    new_confidence: Confidence,
    existing_confidence: Option<Confidence>,
) -> Option<T> {
    let value = new_value?;
    if should_overwrite(existing_value.is_none(), new_confidence, existing_confidence) {
        Some(value.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_destination_always_fills() {
        assert!(should_overwrite(true, Confidence::Low, Some(Confidence::High)));
    }

    #[test]
    fn lower_confidence_never_overwrites_populated_field() {
        assert!(!should_overwrite(false, Confidence::Low, Some(Confidence::High)));
    }

    #[test]
    fn equal_or_higher_confidence_overwrites() {
        assert!(should_overwrite(false, Confidence::High, Some(Confidence::High)));
        assert!(should_overwrite(false, Confidence::High, Some(Confidence::Medium)));
    }

    #[test]
    fn tables_without_a_confidence_column_only_fill_nulls() {
        assert!(!should_overwrite(false, Confidence::High, None));
        assert!(should_overwrite(true, Confidence::Low, None));
    }

    #[test]
    fn merge_field_returns_none_when_new_value_absent() {
        let existing: Option<String> = Some("on file".to_string());
        assert_eq!(
            merge_field(None, &existing, Confidence::High, Some(Confidence::Low)),
            None
        );
    }
}
