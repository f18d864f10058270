//! Weight slab lookup and range validation.
//!
//! Slab ranges are lower-inclusive and upper-exclusive, so a weight sitting on
//! a shared edge belongs to the heavier slab.

use crate::models::WeightSlab;
use crate::services::error::BillingError;

/// First active slab containing `weight_grams`, scanning by `min_grams`.
pub fn find_weight_slab(slabs: &[WeightSlab], weight_grams: i32) -> Result<&WeightSlab, BillingError> {
    let mut active: Vec<&WeightSlab> = slabs.iter().filter(|s| s.active).collect();
    active.sort_by_key(|s| (s.min_grams, s.weight_slab_id));

    active
        .into_iter()
        .find(|s| s.contains(weight_grams))
        .ok_or(BillingError::NoMatchingWeightSlab { weight_grams })
}

/// Check a proposed range against the other active slabs.
///
/// `exclude_id` skips the slab being edited.
pub fn validate_weight_range(
    slabs: &[WeightSlab],
    min_grams: i32,
    max_grams: i32,
    exclude_id: Option<i32>,
) -> Result<(), BillingError> {
    if min_grams < 0 {
        return Err(BillingError::Validation(
            "min_grams must not be negative".to_string(),
        ));
    }
    if min_grams >= max_grams {
        return Err(BillingError::Validation(format!(
            "min_grams ({}) must be less than max_grams ({})",
            min_grams, max_grams
        )));
    }

    if let Some(clash) = slabs
        .iter()
        .filter(|s| s.active && Some(s.weight_slab_id) != exclude_id)
        .find(|s| s.overlaps(min_grams, max_grams))
    {
        return Err(BillingError::Conflict(format!(
            "Range [{}, {}) overlaps weight slab '{}' [{}, {})",
            min_grams, max_grams, clash.label, clash.min_grams, clash.max_grams
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn slab(id: i32, label: &str, min: i32, max: i32, active: bool) -> WeightSlab {
        WeightSlab {
            weight_slab_id: id,
            label: label.to_string(),
            min_grams: min,
            max_grams: max,
            active,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn seeded() -> Vec<WeightSlab> {
        vec![
            slab(2, "100-250g", 100, 250, true),
            slab(1, "0-100g", 0, 100, true),
            slab(3, "250-500g", 250, 500, true),
        ]
    }

    #[test]
    fn finds_slab_inside_range() {
        let slabs = seeded();
        assert_eq!(find_weight_slab(&slabs, 150).unwrap().label, "100-250g");
    }

    #[test]
    fn shared_edge_belongs_to_upper_slab() {
        let slabs = seeded();
        assert_eq!(find_weight_slab(&slabs, 100).unwrap().label, "100-250g");
        assert_eq!(find_weight_slab(&slabs, 99).unwrap().label, "0-100g");
        assert_eq!(find_weight_slab(&slabs, 0).unwrap().label, "0-100g");
    }

    #[test]
    fn no_nearest_slab_fallback() {
        let slabs = seeded();
        match find_weight_slab(&slabs, 500) {
            Err(BillingError::NoMatchingWeightSlab { weight_grams }) => assert_eq!(weight_grams, 500),
            other => panic!("unexpected result: {:?}", other.map(|s| s.label.clone())),
        }
    }

    #[test]
    fn inactive_slabs_are_ignored() {
        let mut slabs = seeded();
        slabs[0].active = false;
        assert!(find_weight_slab(&slabs, 150).is_err());
    }

    #[test]
    fn rejects_inverted_and_overlapping_ranges() {
        let slabs = seeded();
        assert!(matches!(
            validate_weight_range(&slabs, 600, 600, None),
            Err(BillingError::Validation(_))
        ));
        assert!(matches!(
            validate_weight_range(&slabs, 400, 700, None),
            Err(BillingError::Conflict(_))
        ));
        assert!(validate_weight_range(&slabs, 500, 1000, None).is_ok());
    }

    #[test]
    fn editing_a_slab_ignores_its_own_range() {
        let slabs = seeded();
        assert!(validate_weight_range(&slabs, 100, 300, Some(2)).is_err());
        assert!(validate_weight_range(&slabs, 120, 250, Some(2)).is_ok());
    }
}
