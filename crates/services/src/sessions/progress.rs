/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub question_index: usize,
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub time_left_secs: u32,
}
