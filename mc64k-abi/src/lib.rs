#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbiFunction {
    pub module: u8,
    pub index: u16,
    pub name: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbiModule {
    pub id: u8,
    pub name: &'static str,
}

pub const ABI_VERSION: u16 = 1;

// Register roles. `r0` carries the function selector into a host call and the
// error code back out of it.
pub const REG_FUNCTION: usize = 0;
pub const REG_INT_0: usize = 0;
pub const REG_INT_1: usize = 1;
pub const REG_INT_2: usize = 2;
pub const REG_PTR_0: usize = 8;
pub const REG_PTR_1: usize = 9;
pub const REG_STACK: usize = 15;
pub const REG_FLOAT_0: usize = 0;

pub const ERR_NONE: u64 = 0;
pub const ERR_NULL_PTR: u64 = 1;
pub const ERR_BAD_SIZE: u64 = 2;
pub const ERR_OUT_OF_MEMORY: u64 = 3;
pub const ERR_INVALID_HANDLE: u64 = 4;
pub const ERR_BUFFER_FULL: u64 = 5;
pub const ERR_INVALID_SLOT: u64 = 6;

pub const MODULE_EXEC: u8 = 0;
pub const MODULE_IO: u8 = 1;
pub const MODULE_MEM: u8 = 2;
pub const MODULE_MATH: u8 = 3;
pub const MODULE_DISPLAY: u8 = 4;
pub const MODULE_AUDIO: u8 = 5;

pub const MODULES: [AbiModule; 6] = [
    AbiModule {
        id: MODULE_EXEC,
        name: "exec",
    },
    AbiModule {
        id: MODULE_IO,
        name: "io",
    },
    AbiModule {
        id: MODULE_MEM,
        name: "mem",
    },
    AbiModule {
        id: MODULE_MATH,
        name: "math",
    },
    AbiModule {
        id: MODULE_DISPLAY,
        name: "display",
    },
    AbiModule {
        id: MODULE_AUDIO,
        name: "audio",
    },
];

pub const FN_MEM_ELEMENT_BUFFER_ALLOC: u16 = 0;
pub const FN_MEM_ELEMENT_BUFFER_FREE: u16 = 1;
pub const FN_MEM_ELEMENT_ALLOC_SLOT: u16 = 2;
pub const FN_MEM_ELEMENT_FREE_SLOT: u16 = 3;
pub const FN_MEM_ELEMENT_BUFFER_INFO: u16 = 4;

pub const FUNCTIONS: [AbiFunction; 5] = [
    AbiFunction {
        module: MODULE_MEM,
        index: FN_MEM_ELEMENT_BUFFER_ALLOC,
        name: "mem::element_buffer_alloc",
    },
    AbiFunction {
        module: MODULE_MEM,
        index: FN_MEM_ELEMENT_BUFFER_FREE,
        name: "mem::element_buffer_free",
    },
    AbiFunction {
        module: MODULE_MEM,
        index: FN_MEM_ELEMENT_ALLOC_SLOT,
        name: "mem::element_alloc_slot",
    },
    AbiFunction {
        module: MODULE_MEM,
        index: FN_MEM_ELEMENT_FREE_SLOT,
        name: "mem::element_free_slot",
    },
    AbiFunction {
        module: MODULE_MEM,
        index: FN_MEM_ELEMENT_BUFFER_INFO,
        name: "mem::element_buffer_info",
    },
];

pub const HOST_FUNCTION_COUNT: u16 = FUNCTIONS.len() as u16;

fn functions_by_name() -> &'static std::collections::HashMap<&'static str, &'static AbiFunction> {
    static LOOKUP: std::sync::OnceLock<
        std::collections::HashMap<&'static str, &'static AbiFunction>,
    > = std::sync::OnceLock::new();
    LOOKUP.get_or_init(|| {
        let mut map = std::collections::HashMap::with_capacity(FUNCTIONS.len());
        for function in FUNCTIONS.iter() {
            map.insert(function.name, function);
        }
        map
    })
}

pub fn module_by_id(id: u8) -> Option<&'static AbiModule> {
    MODULES.iter().find(|module| module.id == id)
}

pub fn module_by_name(name: &str) -> Option<&'static AbiModule> {
    MODULES.iter().find(|module| module.name == name)
}

pub fn function_by_index(module: u8, index: u16) -> Option<&'static AbiFunction> {
    FUNCTIONS
        .iter()
        .find(|function| function.module == module && function.index == index)
}

pub fn function_by_name(name: &str) -> Option<&'static AbiFunction> {
    functions_by_name().get(name).copied()
}

pub fn abi_json() -> &'static str {
    include_str!("../abi.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modules_are_dense_and_ordered() {
        for (position, module) in MODULES.iter().enumerate() {
            assert_eq!(module.id as usize, position);
        }
    }

    #[test]
    fn functions_are_dense_per_module() {
        for module in MODULES {
            let mut expected = 0u16;
            for function in FUNCTIONS.iter().filter(|f| f.module == module.id) {
                assert_eq!(function.index, expected);
                assert!(function.name.starts_with(&format!("{}::", module.name)));
                expected += 1;
            }
        }
        assert_eq!(HOST_FUNCTION_COUNT as usize, FUNCTIONS.len());
    }

    #[test]
    fn lookups_agree() {
        let alloc = function_by_name("mem::element_buffer_alloc").expect("alloc should exist");
        assert_eq!(
            function_by_index(MODULE_MEM, FN_MEM_ELEMENT_BUFFER_ALLOC),
            Some(alloc)
        );
        assert_eq!(module_by_name("mem").map(|m| m.id), Some(MODULE_MEM));
        assert!(module_by_id(42).is_none());
        assert!(function_by_index(MODULE_AUDIO, 0).is_none());
    }

    #[test]
    fn abi_json_contains_declared_functions() {
        let manifest = abi_json();
        assert!(manifest.contains("\"abi_version\": 1"));
        for module in MODULES {
            assert!(manifest.contains(&format!("\"{}\"", module.name)));
        }
        for function in FUNCTIONS {
            assert!(manifest.contains(function.name));
        }
    }
}
