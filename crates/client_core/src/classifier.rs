use shared::domain::BinStatus;

/// Fill levels strictly above this are full.
pub const FULL_ABOVE: u8 = 80;
/// Lowest fill level that counts as partial.
pub const PARTIAL_FROM: u8 = 51;

/// Maps a fill percentage to its status. Inputs are expected to be within
/// `0..=100`; range enforcement happens where bins are ingested.
pub fn classify(fill_percentage: u8) -> BinStatus {
    if fill_percentage > FULL_ABOVE {
        BinStatus::Full
    } else if fill_percentage >= PARTIAL_FROM {
        BinStatus::Partial
    } else {
        BinStatus::Empty
    }
}
