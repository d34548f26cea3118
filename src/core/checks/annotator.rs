use crate::domain::model::{Flag, FlagSet};

/// Collects index-keyed rule outputs into one ordered flag set per record.
/// Marking order is irrelevant: `FlagSet` keeps flags in their fixed output
/// order and drops duplicates.
#[derive(Debug)]
pub struct Annotator {
    flags: Vec<FlagSet>,
}

impl Annotator {
    pub fn new(len: usize) -> Self {
        Self {
            flags: vec![FlagSet::new(); len],
        }
    }

    pub fn mark(&mut self, flag: Flag, indices: impl IntoIterator<Item = usize>) {
        let mut marked = 0usize;
        for index in indices {
            if let Some(set) = self.flags.get_mut(index) {
                set.insert(flag);
                marked += 1;
            }
        }
        if marked > 0 {
            tracing::debug!("{}: {} record(s)", flag, marked);
        }
    }

    pub fn into_flags(self) -> Vec<FlagSet> {
        self.flags
    }
}
