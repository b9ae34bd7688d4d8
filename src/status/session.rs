//! Fit sessions and parameter slots.

use std::collections::HashMap;

/// Handle of a parameter slot inside a [`FitSession`].
///
/// Handles are only meaningful for the session generation that issued them;
/// a reset starts a new generation, so handles from earlier fits never compare
/// equal to new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotHandle {
    generation: u64,
    index: usize,
}

impl SlotHandle {
    /// Position of the slot in the session's arena.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A parameter the fitter will vary.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParameterSlot {
    /// Starting value, `None` lets the fitter choose.
    pub initial: Option<f64>,
}

/// What the fitter should do for one parameter of one peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AllocationRequest {
    /// Vary the parameter in this slot. Peaks that share a parameter receive
    /// the same handle.
    Slot(SlotHandle),
    /// Keep the parameter constant. `None` means the fitter's own default.
    Fixed(Option<f64>),
    /// Leave the term out of the model.
    Disabled,
    /// Derive the value after the fit from other parameters.
    Computed,
}

impl AllocationRequest {
    /// The slot handle, for requests that vary a parameter.
    pub fn slot(&self) -> Option<SlotHandle> {
        match self {
            AllocationRequest::Slot(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// Parameter slots of one fit, together with the table of shared slots.
///
/// A session is created (or reset) at the start of every fit. Shared
/// parameters are registered lazily the first time a peak resolves them and
/// are forgotten by [`reset_global_parameters`](Self::reset_global_parameters).
/// The table is keyed by peak shape and parameter name, so models of
/// different shapes resolved through one session never share a slot.
#[derive(Debug, Clone, Default)]
pub struct FitSession {
    generation: u64,
    slots: Vec<ParameterSlot>,
    globals: HashMap<(String, String), SlotHandle>,
}

impl FitSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new independent slot.
    pub fn alloc_param(&mut self, initial: Option<f64>) -> SlotHandle {
        let handle = SlotHandle {
            generation: self.generation,
            index: self.slots.len(),
        };
        self.slots.push(ParameterSlot { initial });
        handle
    }

    /// The slot behind `handle`; `None` for handles of an earlier fit.
    pub fn slot(&self, handle: SlotHandle) -> Option<&ParameterSlot> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.get(handle.index)
    }

    pub fn slots(&self) -> &[ParameterSlot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The shared slot registered for `name` of `shape`, if any.
    pub fn global(&self, shape: &str, name: &str) -> Option<SlotHandle> {
        self.globals
            .get(&(shape.to_string(), name.to_string()))
            .copied()
    }

    /// The shared slot for `name` of `shape`, allocated with `initial` on
    /// first use.
    pub fn global_or_alloc(&mut self, shape: &str, name: &str, initial: Option<f64>) -> SlotHandle {
        if let Some(handle) = self.global(shape, name) {
            return handle;
        }
        let handle = self.alloc_param(initial);
        log::debug!(
            "registered shared parameter '{}.{}' as slot {}",
            shape,
            name,
            handle.index
        );
        self.globals.insert((shape.to_string(), name.to_string()), handle);
        handle
    }

    /// Start a new fit: forget all slots and all shared parameters.
    pub fn reset_global_parameters(&mut self) {
        self.globals.clear();
        self.slots.clear();
        self.generation += 1;
    }
}
