use std::collections::BTreeMap;

use crate::geometry::normalize_degrees;

/// Present house cusps as (house number, normalized cusp), in house order.
///
/// Labels other than "House1".."House12" and null cusps are ignored.
pub fn house_cusps(houses: &BTreeMap<String, Option<f64>>) -> Vec<(u8, f64)> {
    (1..=12u8)
        .filter_map(|num| {
            houses
                .get(&format!("House{}", num))
                .copied()
                .flatten()
                .map(|cusp| (num, normalize_degrees(cusp)))
        })
        .collect()
}

/// Get the house (1-12) containing a longitude.
///
/// Each house owns `[cusp, next cusp)`, so a longitude exactly on a cusp
/// belongs to the house starting there. With no cusps every longitude falls
/// in house 1.
pub fn resolve_house(longitude: f64, houses: &BTreeMap<String, Option<f64>>) -> u8 {
    resolve_house_from_cusps(longitude, &house_cusps(houses))
}

/// Same as [`resolve_house`] for already collected cusps.
pub fn resolve_house_from_cusps(longitude: f64, cusps: &[(u8, f64)]) -> u8 {
    let lon = normalize_degrees(longitude);

    let mut sorted: Vec<(u8, f64)> = cusps
        .iter()
        .map(|(num, cusp)| (*num, normalize_degrees(*cusp)))
        .collect();
    if sorted.is_empty() {
        return 1;
    }
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    // Close the circle with the first house one turn later
    let (first_house, first_cusp) = sorted[0];
    sorted.push((first_house, first_cusp + 360.0));

    let last = sorted.len() - 2;
    for (i, pair) in sorted.windows(2).enumerate() {
        let (house, start) = pair[0];
        let end = pair[1].1;
        if start <= lon && lon < end {
            return house;
        }
        // Longitudes below the lowest cusp sit in the wrap interval
        if i == last && start <= lon + 360.0 && lon + 360.0 < end {
            return house;
        }
    }

    log::debug!("no house interval matched longitude {}, defaulting to 1", lon);
    1
}
