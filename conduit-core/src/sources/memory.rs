use std::collections::VecDeque;

use crate::source::FillUnit;
use crate::status::ReadStatus;
use crate::unit::{UnitBuffer, UnitMeta};

/// Fill-style capability replaying a fixed list of units, then EOF
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    units: VecDeque<UnitBuffer>,
    delivered: u64,
}

impl MemorySource {
    pub fn new(units: impl IntoIterator<Item = UnitBuffer>) -> Self {
        Self {
            units: units.into_iter().collect(),
            delivered: 0,
        }
    }

    /// One unit per payload, stamped with consecutive pts
    pub fn from_payloads<I, P>(payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        Self::new(payloads.into_iter().enumerate().map(|(i, payload)| {
            let mut unit = UnitBuffer::from_slice(payload.as_ref());
            unit.set_meta(UnitMeta {
                pts: Some(i as i64),
                ..UnitMeta::default()
            });
            unit
        }))
    }

    /// Queue another unit at the end
    pub fn push(&mut self, unit: UnitBuffer) {
        self.units.push_back(unit);
    }

    /// Units not yet read
    pub fn remaining(&self) -> usize {
        self.units.len()
    }

    /// Units read so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl FillUnit for MemorySource {
    fn fill(&mut self, unit: &mut UnitBuffer) -> ReadStatus {
        match self.units.pop_front() {
            Some(next) => {
                unit.copy_from(&next);
                self.delivered += 1;
                ReadStatus::Ok
            }
            None => ReadStatus::Eof,
        }
    }
}
