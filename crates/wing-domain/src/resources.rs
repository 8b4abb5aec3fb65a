use serde::{Deserialize, Serialize};

/// Recursos pedidos al scheduler. Sólo parametrizan la plantilla de envío.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub np: u32,
    pub mem_gb: u32,
    pub walltime_hours: u32,
}

impl ResourceRequest {
    pub fn new(np: u32, mem_gb: u32, walltime_hours: u32) -> Self {
        Self { np,
               mem_gb,
               walltime_hours }
    }
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self::new(48, 64, 8)
    }
}
