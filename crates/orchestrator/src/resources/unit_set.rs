//! Owned collection of prepared effect units.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{EffectUnit, UnitKind};

/// Every unit that survived setup.
///
/// Disposal happens once, either explicitly through [`UnitSet::dispose_all`]
/// or on drop, so an early return or panic in the sequence still releases
/// GPU and audio resources.
#[derive(Default)]
pub struct UnitSet {
    units: Vec<Arc<dyn EffectUnit>>,
    disposed: bool,
}

impl UnitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: Arc<dyn EffectUnit>) {
        self.units.push(unit);
    }

    pub fn units(&self) -> &[Arc<dyn EffectUnit>] {
        &self.units
    }

    pub fn kinds(&self) -> Vec<UnitKind> {
        self.units.iter().map(|unit| unit.kind()).collect()
    }

    /// At least one unit draws something.
    pub fn has_visual(&self) -> bool {
        self.units.iter().any(|unit| unit.kind().is_visual())
    }

    pub fn cancel_all(&self) {
        for unit in &self.units {
            unit.cancel();
        }
    }

    /// Dispose in reverse setup order. Later calls are no-ops.
    pub fn dispose_all(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for unit in self.units.iter().rev() {
            debug!(unit = %unit.kind(), "Disposing unit");
            unit.dispose();
        }
    }
}

impl Drop for UnitSet {
    fn drop(&mut self) {
        if !self.disposed && !self.units.is_empty() {
            warn!(
                units = self.units.len(),
                "Unit set dropped without disposal - releasing resources"
            );
            self.dispose_all();
        }
    }
}

impl std::fmt::Debug for UnitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitSet")
            .field("units", &self.kinds())
            .field("disposed", &self.disposed)
            .finish()
    }
}
