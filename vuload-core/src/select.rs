use rand::Rng;
use rand::seq::SliceRandom;

/// Picks one item with probability proportional to `weight(item)`.
///
/// Negative weights count as zero. When no item carries positive weight the choice is uniform.
/// Returns `None` only for an empty slice.
pub fn weighted_choice<'a, T, R>(
    items: &'a [T],
    weight: impl Fn(&T) -> f64,
    rng: &mut R,
) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    let clamped = |item: &T| {
        let w = weight(item);
        if w.is_finite() { w.max(0.0) } else { 0.0 }
    };

    let total: f64 = items.iter().map(clamped).sum();
    if total <= 0.0 {
        return items.choose(rng);
    }

    let point = rng.gen_range(0.0..=total);
    let mut cumulative = 0.0;
    for item in items {
        cumulative += clamped(item);
        if point <= cumulative {
            return Some(item);
        }
    }

    // Floating point drift can leave `point` just above the final cumulative sum.
    items.last()
}
