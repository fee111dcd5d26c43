//! Key identity registry
//!
//! Maps visible button contexts to the logical controls they are bound to,
//! and each logical control back to every context showing it. A control can
//! be visible on several devices at once.

use std::collections::{BTreeSet, HashMap};

use super::types::{ButtonMode, CommandBinding, ContextId, DeviceId, LogicalControl, StateSource};

/// One visible command button instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonContext {
    pub context_id: ContextId,
    pub device_id: DeviceId,
    pub control: LogicalControl,
    pub mode: ButtonMode,
    /// Local UI state, possibly optimistic
    pub active: bool,
    /// Writer of the current `active` value
    pub source: StateSource,
}

/// A context removed from the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovedContext {
    Command(ButtonContext),
    Articulation(DeviceId),
}

impl RemovedContext {
    pub fn device_id(&self) -> &str {
        match self {
            RemovedContext::Command(ctx) => &ctx.device_id,
            RemovedContext::Articulation(device_id) => device_id,
        }
    }
}

#[derive(Debug, Default)]
pub struct KeyRegistry {
    commands: HashMap<ContextId, ButtonContext>,
    by_control: HashMap<LogicalControl, BTreeSet<ContextId>>,
    articulations: HashMap<ContextId, DeviceId>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command context; any previous registration under the same id is returned
    pub fn insert_command(
        &mut self,
        device_id: DeviceId,
        context_id: ContextId,
        binding: CommandBinding,
    ) -> Option<RemovedContext> {
        let previous = self.remove(&context_id);

        self.by_control
            .entry(binding.control)
            .or_default()
            .insert(context_id.clone());
        self.commands.insert(
            context_id.clone(),
            ButtonContext {
                context_id,
                device_id,
                control: binding.control,
                mode: binding.mode,
                active: false,
                source: StateSource::Initial,
            },
        );

        previous
    }

    /// Register an articulation context; any previous registration under the same id is returned
    pub fn insert_articulation(
        &mut self,
        device_id: DeviceId,
        context_id: ContextId,
    ) -> Option<RemovedContext> {
        let previous = self.remove(&context_id);
        self.articulations.insert(context_id, device_id);
        previous
    }

    pub fn remove(&mut self, context_id: &str) -> Option<RemovedContext> {
        if let Some(ctx) = self.commands.remove(context_id) {
            if let Some(ids) = self.by_control.get_mut(&ctx.control) {
                ids.remove(context_id);
                if ids.is_empty() {
                    self.by_control.remove(&ctx.control);
                }
            }
            return Some(RemovedContext::Command(ctx));
        }

        self.articulations
            .remove(context_id)
            .map(RemovedContext::Articulation)
    }

    /// Drop every context registered for a device
    pub fn remove_device(&mut self, device_id: &str) -> Vec<RemovedContext> {
        let ids: Vec<ContextId> = self
            .commands
            .values()
            .filter(|ctx| ctx.device_id == device_id)
            .map(|ctx| ctx.context_id.clone())
            .chain(
                self.articulations
                    .iter()
                    .filter(|(_, dev)| dev.as_str() == device_id)
                    .map(|(id, _)| id.clone()),
            )
            .collect();

        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn get(&self, context_id: &str) -> Option<&ButtonContext> {
        self.commands.get(context_id)
    }

    pub fn get_mut(&mut self, context_id: &str) -> Option<&mut ButtonContext> {
        self.commands.get_mut(context_id)
    }

    pub fn is_articulation(&self, context_id: &str) -> bool {
        self.articulations.contains_key(context_id)
    }

    /// Context ids bound to a control, in stable order
    pub fn contexts_for(&self, control: &LogicalControl) -> Vec<ContextId> {
        self.by_control
            .get(control)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_bound(&self, control: &LogicalControl) -> bool {
        self.by_control.contains_key(control)
    }

    /// Command context ids on a device, in stable order
    pub fn command_contexts_on(&self, device_id: &str) -> Vec<ContextId> {
        let mut ids: Vec<ContextId> = self
            .commands
            .values()
            .filter(|ctx| ctx.device_id == device_id)
            .map(|ctx| ctx.context_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn command_contexts(&self) -> impl Iterator<Item = &ButtonContext> {
        self.commands.values()
    }
}
