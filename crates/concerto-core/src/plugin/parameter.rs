//! Lock-free parameter storage shared between control and audio threads.

use super::descriptor::ParameterInfo;
use crate::lockfree::{AtomicDouble, AtomicFlag};

struct ParamCell {
    info: ParameterInfo,
    value: AtomicDouble,
    dirty: AtomicFlag,
}

/// Current parameter values of one plugin instance.
///
/// Control threads write through [`set`](Self::set); the audio thread pulls
/// changed values with [`flush`](Self::flush) before each process call.
/// Neither side locks or allocates.
pub struct ParameterBank {
    cells: Box<[ParamCell]>,
}

impl ParameterBank {
    pub fn new(parameters: &[ParameterInfo]) -> Self {
        let cells = parameters
            .iter()
            .map(|info| ParamCell {
                info: info.clone(),
                value: AtomicDouble::new(info.default),
                dirty: AtomicFlag::new(true),
            })
            .collect();
        Self { cells }
    }

    #[inline]
    fn cell(&self, id: u32) -> Option<&ParamCell> {
        self.cells.iter().find(|c| c.info.id == id)
    }

    /// Stores `value` clamped to the parameter range. Returns the stored
    /// value, or `None` for an unknown id.
    pub fn set(&self, id: u32, value: f64) -> Option<f64> {
        let cell = self.cell(id)?;
        let clamped = cell.info.clamp(value);
        cell.value.set(clamped);
        cell.dirty.set(true);
        Some(clamped)
    }

    pub fn get(&self, id: u32) -> Option<f64> {
        self.cell(id).map(|c| c.value.get())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Calls `apply` for every value changed since the last flush.
    #[inline]
    pub fn flush(&self, mut apply: impl FnMut(u32, f64)) {
        for cell in self.cells.iter() {
            if cell.dirty.swap(false) {
                apply(cell.info.id, cell.value.get());
            }
        }
    }

    /// Marks every parameter dirty so the next flush re-sends all values.
    pub fn mark_all_dirty(&self) {
        for cell in self.cells.iter() {
            cell.dirty.set(true);
        }
    }

    pub fn values(&self) -> Vec<(u32, f64)> {
        self.cells
            .iter()
            .map(|c| (c.info.id, c.value.get()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> ParameterBank {
        ParameterBank::new(&[
            ParameterInfo::new(0, "gain", 0.0, 2.0, 1.0),
            ParameterInfo::new(1, "pan", -1.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn test_defaults_flush_once() {
        let bank = bank();
        let mut seen = Vec::new();
        bank.flush(|id, v| seen.push((id, v)));
        assert_eq!(seen, vec![(0, 1.0), (1, 0.0)]);

        seen.clear();
        bank.flush(|id, v| seen.push((id, v)));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_set_clamps_and_marks_dirty() {
        let bank = bank();
        bank.flush(|_, _| {});

        assert_eq!(bank.set(0, 5.0), Some(2.0));
        assert_eq!(bank.get(0), Some(2.0));
        assert_eq!(bank.set(9, 1.0), None);

        let mut seen = Vec::new();
        bank.flush(|id, v| seen.push((id, v)));
        assert_eq!(seen, vec![(0, 2.0)]);
    }
}
