//! "Completed item" heuristic and build-order extraction
//!
//! An item counts as completed when its id is >= 2000 and it is not in
//! `EXCLUDED_ITEMS`. The heuristic is approximate (some legendary items sit
//! below 2000, some components above it) and is kept exactly as-is so that
//! statistics stay comparable across runs.

use crate::api_core::PurchaseEvent;

pub const COMPLETED_ITEM_MIN_ID: u32 = 2000;

/// Ids >= 2000 that are not finished items, plus the basic components
/// listed explicitly for readability (they fail the id floor anyway).
pub const EXCLUDED_ITEMS: &[u32] = &[
    // Basic components
    1001, 1004, 1006, 1011, 1018, 1026, 1027, 1028, 1029, 1031, 1033, 1036, 1037, 1038, 1042,
    1043, 1052, 1053, 1054, 1055, 1056, 1057, 1058, 1082, 1083,
    // Potions, elixirs and consumables
    2003, 2009, 2010, 2031, 2033, 2052, 2055, 2138, 2139, 2140, 2150, 2151, 2152,
    // Stopwatch family and sigils
    2019, 2420, 2421, 2422, 2423, 2424,
    // Boots
    3005, 3006, 3009, 3010, 3013, 3020, 3047, 3111, 3117, 3158,
    // Trinkets and wards
    3330, 3340, 3348, 3363, 3364, 3513,
    // Support quest stages
    3850, 3851, 3853, 3854, 3855, 3857, 3858, 3859, 3860, 3862, 3863, 3864, 3865, 3866, 3867,
    // Epic components
    3024, 3035, 3044, 3051, 3057, 3066, 3067, 3070, 3076, 3077, 3082, 3086, 3108, 3113, 3114,
    3123, 3133, 3134, 3140, 3145, 3155, 3177, 3211, 3801, 3802, 3803, 3916, 4630, 4632, 4635,
    4638, 4642, 6660, 6670, 6690,
];

pub fn is_completed_item(item_id: u32) -> bool {
    item_id >= COMPLETED_ITEM_MIN_ID && !EXCLUDED_ITEMS.contains(&item_id)
}

/// Reduce a purchase sequence to completed items, first occurrence only
pub fn build_order<I>(purchases: I) -> Vec<u32>
where
    I: IntoIterator<Item = u32>,
{
    let mut order = Vec::new();
    for item_id in purchases {
        if is_completed_item(item_id) && !order.contains(&item_id) {
            order.push(item_id);
        }
    }
    order
}

/// Build order for one participant out of a whole-match purchase list
pub fn participant_build_order(purchases: &[PurchaseEvent], participant_id: u32) -> Vec<u32> {
    build_order(
        purchases
            .iter()
            .filter(|p| p.participant_id == participant_id)
            .map(|p| p.item_id),
    )
}
