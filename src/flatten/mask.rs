//! Categorical set to bitmap conversion.

use crate::core::error::{ForestError, Result};

/// Converts a list of category codes into a bitmap of `vocabulary_size` bits.
///
/// Fails if a code is outside `[0, vocabulary_size)`.
pub fn categorical_list_to_bitmap(
    items: &[i64],
    vocabulary_size: usize,
    column: &str,
) -> Result<Vec<bool>> {
    let mut bitmap = vec![false; vocabulary_size];
    for &item in items {
        if item < 0 || item as u64 >= vocabulary_size as u64 {
            return Err(ForestError::InvalidCategoricalValue {
                item,
                column: column.to_string(),
                vocabulary_size,
            });
        }
        bitmap[item as usize] = true;
    }
    Ok(bitmap)
}
