//! Per-run compile state shared by every stage.
//!
//! Components are compiled at most once per run, even when parallel page compiles reach the
//! same one: the first caller claims it, later callers wait for the result.

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::cache::AssetWriter;
use crate::codegen::{CodegenOptions, SlotFill};
use crate::component::CompiledComponent;
use crate::config::{BuildMode, CompilerConfig};
use crate::include::IncludeResolver;

enum Slot {
    Compiling(ThreadId),
    Ready(Arc<CompiledComponent>),
}

#[derive(Default)]
struct ComponentTable {
    slots: HashMap<String, Slot>,
    /// Thread → component it is blocked on.
    waiting: HashMap<ThreadId, String>,
}

impl ComponentTable {
    /// Would `me` waiting on a compile owned by `owner` close a wait-for cycle?
    fn closes_cycle(&self, mut owner: ThreadId, me: ThreadId) -> bool {
        let mut visited = HashSet::new();
        while visited.insert(owner) {
            if owner == me {
                return true;
            }
            let Some(name) = self.waiting.get(&owner) else {
                return false;
            };
            match self.slots.get(name) {
                Some(Slot::Compiling(next)) => owner = *next,
                _ => return false,
            }
        }
        false
    }
}

/// Result of claiming a component for compilation.
pub enum Claim {
    Ready(Arc<CompiledComponent>),
    /// The caller compiles it and must follow up with `finish_component` or
    /// `abandon_component`.
    Owned,
    /// Waiting would deadlock on a component cycle.
    Cycle,
}

pub struct CompileContext {
    pub mode: BuildMode,
    pub config: CompilerConfig,
    pub writer: AssetWriter,
    pub includes: IncludeResolver,
    /// Components of this run, keyed by exported identifier.
    components: Mutex<ComponentTable>,
    settled: Condvar,
}

impl CompileContext {
    pub fn new(config: CompilerConfig, mode: BuildMode) -> Self {
        let writer = AssetWriter::new(config.output_path());
        let includes = IncludeResolver::new(config.root.clone());
        Self {
            mode,
            config,
            writer,
            includes,
            components: Mutex::new(ComponentTable::default()),
            settled: Condvar::new(),
        }
    }

    pub fn codegen_options<'a>(&'a self, slot: SlotFill<'a>) -> CodegenOptions<'a> {
        CodegenOptions {
            factory: &self.config.factory,
            fragment: &self.config.fragment,
            slot,
        }
    }

    /// Finished component, if any. Never waits.
    pub fn component(&self, pascal_name: &str) -> Option<Arc<CompiledComponent>> {
        match self.components.lock().slots.get(pascal_name) {
            Some(Slot::Ready(component)) => Some(component.clone()),
            _ => None,
        }
    }

    /// Claim `pascal_name` for compilation, or wait for the thread that already has.
    pub fn claim_component(&self, pascal_name: &str) -> Claim {
        let me = thread::current().id();
        let mut table = self.components.lock();

        loop {
            let owner = match table.slots.get(pascal_name) {
                None => None,
                Some(Slot::Ready(component)) => return Claim::Ready(component.clone()),
                Some(Slot::Compiling(owner)) => Some(*owner),
            };
            let Some(owner) = owner else {
                table
                    .slots
                    .insert(pascal_name.to_string(), Slot::Compiling(me));
                return Claim::Owned;
            };

            if table.closes_cycle(owner, me) {
                return Claim::Cycle;
            }
            table.waiting.insert(me, pascal_name.to_string());
            self.settled.wait(&mut table);
            table.waiting.remove(&me);
        }
    }

    pub fn finish_component(&self, component: CompiledComponent) -> Arc<CompiledComponent> {
        let component = Arc::new(component);
        self.components
            .lock()
            .slots
            .insert(component.pascal_name.clone(), Slot::Ready(component.clone()));
        self.settled.notify_all();
        component
    }

    /// Release a claim after a failed compile so a waiter can retry.
    pub fn abandon_component(&self, pascal_name: &str) {
        let me = thread::current().id();
        let mut table = self.components.lock();
        if matches!(table.slots.get(pascal_name), Some(Slot::Compiling(owner)) if *owner == me) {
            table.slots.remove(pascal_name);
        }
        drop(table);
        self.settled.notify_all();
    }

    pub fn compiled_component_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .components
            .lock()
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn ctx() -> CompileContext {
        CompileContext::new(CompilerConfig::with_root("tpl"), BuildMode::default())
    }

    fn component(pascal_name: &str) -> CompiledComponent {
        CompiledComponent {
            name: pascal_name.to_lowercase(),
            pascal_name: pascal_name.to_string(),
            key: format!("component_{}", pascal_name.to_lowercase()),
            source_path: PathBuf::from("components/x.html"),
            module: String::new(),
            references: Vec::new(),
        }
    }

    fn wait_until_blocked(ctx: &CompileContext) {
        while ctx.components.lock().waiting.is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_second_claim_waits_for_first_compile() {
        let ctx = ctx();
        assert!(matches!(ctx.claim_component("Simple"), Claim::Owned));
        assert!(ctx.component("Simple").is_none());

        thread::scope(|s| {
            let waiter = s.spawn(|| match ctx.claim_component("Simple") {
                Claim::Ready(c) => c,
                _ => panic!("expected the finished component"),
            });
            wait_until_blocked(&ctx);
            let finished = ctx.finish_component(component("Simple"));
            assert!(Arc::ptr_eq(&finished, &waiter.join().unwrap()));
        });

        assert_eq!(ctx.compiled_component_names(), vec!["Simple".to_string()]);
    }

    #[test]
    fn test_abandoned_claim_can_be_retaken() {
        let ctx = ctx();
        assert!(matches!(ctx.claim_component("Card"), Claim::Owned));
        ctx.abandon_component("Card");
        assert!(matches!(ctx.claim_component("Card"), Claim::Owned));
        assert!(ctx.compiled_component_names().is_empty());
    }

    #[test]
    fn test_cross_thread_cycle_detected() {
        let ctx = ctx();
        assert!(matches!(ctx.claim_component("A"), Claim::Owned));

        thread::scope(|s| {
            let other = s.spawn(|| {
                assert!(matches!(ctx.claim_component("B"), Claim::Owned));
                // Blocks on A, owned by the main thread.
                let retaken = matches!(ctx.claim_component("A"), Claim::Owned);
                ctx.abandon_component("A");
                ctx.abandon_component("B");
                retaken
            });

            wait_until_blocked(&ctx);
            assert!(matches!(ctx.claim_component("B"), Claim::Cycle));
            ctx.abandon_component("A");
            assert!(other.join().unwrap());
        });
    }

    #[test]
    fn test_same_thread_reclaim_is_a_cycle() {
        let ctx = ctx();
        assert!(matches!(ctx.claim_component("Loop"), Claim::Owned));
        assert!(matches!(ctx.claim_component("Loop"), Claim::Cycle));
    }
}
