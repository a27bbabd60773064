//! Operations monitor (C8): a thin wrapper over `rayon`'s global thread
//! pool, per §4.8. The only contract is that a submitted task eventually
//! runs exactly once, that exclusive tasks in the same domain never
//! overlap, and that the pool's starting concurrency matches
//! `hardware_concurrency` — all three of which `rayon`'s global pool
//! already gives us.

use std::sync::Mutex;

use pie4k_types::PieResult;
use rayon::prelude::*;

/// Where a task's work happens. Only `Cpu` is exercised by the current
/// codec set; `Accelerator` exists so a future GPU-backed upscaler has
/// somewhere to declare its exclusivity requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDomain {
    Cpu,
    Accelerator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAccess {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy)]
pub struct TaskRequirements {
    pub domain: ResourceDomain,
    pub access: ResourceAccess,
}

impl TaskRequirements {
    /// The requirements every per-phase resource task runs under (§4.7
    /// step 6): CPU domain, shared access.
    pub fn shared_cpu() -> TaskRequirements {
        TaskRequirements { domain: ResourceDomain::Cpu, access: ResourceAccess::Shared }
    }
}

/// Serializes `EXCLUSIVE` tasks within each domain; `SHARED` tasks never
/// touch these locks and run fully concurrently on rayon's pool.
pub struct OperationsMonitor {
    cpu_exclusive: Mutex<()>,
    accelerator_exclusive: Mutex<()>,
}

impl Default for OperationsMonitor {
    fn default() -> OperationsMonitor {
        OperationsMonitor::new()
    }
}

impl OperationsMonitor {
    pub fn new() -> OperationsMonitor {
        OperationsMonitor { cpu_exclusive: Mutex::new(()), accelerator_exclusive: Mutex::new(()) }
    }

    fn exclusive_lock(&self, domain: ResourceDomain) -> &Mutex<()> {
        match domain {
            ResourceDomain::Cpu => &self.cpu_exclusive,
            ResourceDomain::Accelerator => &self.accelerator_exclusive,
        }
    }

    /// Run `task` for every item in `items` on rayon's global pool,
    /// honoring `requirements.access`. A task's `Err` becomes that item's
    /// result rather than aborting the batch (§5 "an error from a task...
    /// continues the rest of the batch").
    pub fn run_batch<T, F>(&self, items: Vec<T>, requirements: TaskRequirements, task: F) -> Vec<PieResult<()>>
    where
        T: Send,
        F: Fn(T) -> PieResult<()> + Sync,
    {
        match requirements.access {
            ResourceAccess::Shared => items.into_par_iter().map(task).collect(),
            ResourceAccess::Exclusive => {
                let guard = self.exclusive_lock(requirements.domain).lock().expect("exclusive lock poisoned");
                let results = items.into_iter().map(task).collect();
                drop(guard);
                results
            }
        }
    }
}
