use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

use super::types::{Bus, Equipment, EquipmentId, Line, LineId, Load};

/// Collections of network entities, resolved by id.
///
/// Lookups are linear scans; networks handled here are small. Resolution
/// never changes the collections themselves, only the returned entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkDirectory {
    pub buses: Vec<Bus>,
    pub lines: Vec<Line>,
    pub loads: Vec<Load>,
    pub equipment: Vec<Equipment>,
}

impl NetworkDirectory {
    /// Creates a directory from lines and equipment only.
    pub fn new(lines: Vec<Line>, equipment: Vec<Equipment>) -> Self {
        Self {
            lines,
            equipment,
            ..Self::default()
        }
    }

    /// Looks up a line by id.
    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// Looks up equipment by id.
    pub fn equipment(&self, id: EquipmentId) -> Option<&Equipment> {
        self.equipment.iter().find(|e| e.id == id)
    }

    /// Resolves a line for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::LineNotFound`] if no line has this id.
    pub fn resolve_line(&mut self, id: LineId) -> Result<&mut Line, DispatchError> {
        self.lines
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(DispatchError::LineNotFound(id))
    }

    /// Resolves equipment for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EquipmentNotFound`] if no equipment has this id.
    pub fn resolve_equipment(&mut self, id: EquipmentId) -> Result<&mut Equipment, DispatchError> {
        self.equipment
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(DispatchError::EquipmentNotFound(id))
    }

    /// Equipment of the given kind, in directory order.
    pub fn equipment_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Equipment> {
        self.equipment.iter().filter(move |e| e.kind == kind)
    }

    /// Number of lines currently out of service.
    pub fn lines_out_of_service(&self) -> usize {
        self.lines.iter().filter(|l| l.out_of_service).count()
    }
}

/// Directory shared between the run that mutates it and external readers.
///
/// Readers should [`snapshot`](SharedNetwork::snapshot) rather than hold the
/// read guard; every mutation goes through event dispatch.
#[derive(Debug, Clone, Default)]
pub struct SharedNetwork(Arc<RwLock<NetworkDirectory>>);

impl SharedNetwork {
    pub fn new(directory: NetworkDirectory) -> Self {
        Self(Arc::new(RwLock::new(directory)))
    }

    /// Clones the current directory contents.
    pub fn snapshot(&self) -> NetworkDirectory {
        self.read().clone()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, NetworkDirectory> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, NetworkDirectory> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<NetworkDirectory> for SharedNetwork {
    fn from(directory: NetworkDirectory) -> Self {
        Self::new(directory)
    }
}
