//! Fitting one or two token sequences into the length budget left after boundary markers.

/// Markers reserved around a single segment: `[CLS] A [SEP]`.
pub const SINGLE_OVERHEAD: usize = 2;
/// Markers reserved around a pair: `[CLS] A [SEP] B [SEP]`.
pub const PAIR_OVERHEAD: usize = 3;

/// Truncates a sequence pair in place until `a.len() + b.len() <= budget`.
///
/// Each step pops the last token of the currently longer sequence, so a short
/// counterpart keeps as much of its content as possible. Ties pop from `a`.
pub fn truncate_seq_pair<T>(a: &mut Vec<T>, b: &mut Vec<T>, budget: usize) {
    while a.len() + b.len() > budget {
        if a.len() >= b.len() {
            a.pop();
        } else {
            b.pop();
        }
    }
}

/// Keeps at most the first `budget` tokens of a single sequence.
pub fn truncate_single<T>(a: &mut Vec<T>, budget: usize) {
    a.truncate(budget);
}
