//! Splitting a plan into ordered batches.

use std::ops::Range;

use robovox_core::skill::SkillCall;

/// A run of calls that may be in flight together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Positions of the calls in the plan.
    pub range: Range<usize>,
    /// An exclusive batch always holds exactly one call.
    pub exclusive: bool,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Partition calls into maximal batches.
pub fn partition(calls: &[SkillCall]) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut start = 0;

    for (i, call) in calls.iter().enumerate() {
        if call.is_exclusive() {
            if start < i {
                batches.push(Batch {
                    range: start..i,
                    exclusive: false,
                });
            }
            batches.push(Batch {
                range: i..i + 1,
                exclusive: true,
            });
            start = i + 1;
        }
    }
    if start < calls.len() {
        batches.push(Batch {
            range: start..calls.len(),
            exclusive: false,
        });
    }
    batches
}
