//! Host call bridge.
//!
//! `host #module` looks up a vector by module id and the function id in the
//! low 16 bits of `r0`. Vectors read and write the register file directly;
//! the bridge never interprets arguments.

pub mod mem;

use crate::machine::Machine;

pub type HostVector = fn(&mut Machine);

#[derive(Clone, Debug)]
pub struct HostModule {
    id: u8,
    name: &'static str,
    vectors: Vec<Option<HostVector>>,
}

impl HostModule {
    pub fn new(id: u8, name: &'static str) -> Self {
        Self {
            id,
            name,
            vectors: Vec::new(),
        }
    }

    pub fn with(mut self, function: u16, vector: HostVector) -> Self {
        let index = function as usize;
        if self.vectors.len() <= index {
            self.vectors.resize(index + 1, None);
        }
        self.vectors[index] = Some(vector);
        self
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn vector(&self, function: u16) -> Option<HostVector> {
        self.vectors.get(function as usize).copied().flatten()
    }

    pub fn functions(&self) -> impl Iterator<Item = u16> + '_ {
        self.vectors
            .iter()
            .enumerate()
            .filter(|(_, vector)| vector.is_some())
            .map(|(index, _)| index as u16)
    }
}

#[derive(Clone, Debug, Default)]
pub struct HostTable {
    modules: Vec<Option<HostModule>>,
}

impl HostTable {
    pub fn register(&mut self, module: HostModule) -> Option<HostModule> {
        let index = module.id as usize;
        if self.modules.len() <= index {
            self.modules.resize_with(index + 1, || None);
        }
        self.modules[index].replace(module)
    }

    pub fn module(&self, id: u8) -> Option<&HostModule> {
        self.modules.get(id as usize)?.as_ref()
    }

    #[inline(always)]
    pub fn lookup(&self, module: u8, function: u16) -> Option<HostVector> {
        self.module(module)?.vector(function)
    }

    pub fn modules(&self) -> impl Iterator<Item = &HostModule> {
        self.modules.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(machine: &mut Machine) {
        machine.gpr_mut(1).set_u64(1);
    }

    #[test]
    fn lookup_requires_module_and_function() {
        let mut table = HostTable::default();
        assert!(table.register(HostModule::new(3, "math").with(2, touch)).is_none());
        assert!(table.lookup(3, 2).is_some());
        assert!(table.lookup(3, 1).is_none());
        assert!(table.lookup(3, 200).is_none());
        assert!(table.lookup(4, 2).is_none());
        assert_eq!(table.module(3).map(|m| m.functions().collect::<Vec<_>>()), Some(vec![2]));
    }

    #[test]
    fn register_replaces_existing_module() {
        let mut table = HostTable::default();
        table.register(HostModule::new(1, "io").with(0, touch));
        let old = table.register(HostModule::new(1, "io2"));
        assert_eq!(old.map(|m| m.name()), Some("io"));
        assert!(table.lookup(1, 0).is_none());
    }
}
