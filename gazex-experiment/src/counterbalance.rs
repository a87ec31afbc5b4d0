//! Latin-square counterbalancing of difficulty order across participants.

/// Cyclic Latin square of order `levels.len()`: row `i` is `levels`
/// rotated left by `i`.
pub fn latin_square<T: Clone>(levels: &[T]) -> Vec<Vec<T>> {
    (0..levels.len())
        .map(|row| {
            let mut rotated = levels.to_vec();
            rotated.rotate_left(row);
            rotated
        })
        .collect()
}

/// Difficulty order for a participant: row `participant_id mod N`.
///
/// Any `N` consecutive ids cover every row once, so each level sits in each
/// block position exactly once across them. Returns an empty order for an
/// empty level list; manifest validation rules that out for real sessions.
pub fn assign<T: Clone>(participant_id: u32, levels: &[T]) -> Vec<T> {
    if levels.is_empty() {
        return Vec::new();
    }
    let row = participant_id as usize % levels.len();
    let mut order = levels.to_vec();
    order.rotate_left(row);
    order
}
