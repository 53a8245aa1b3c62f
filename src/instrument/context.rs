//! Per-method registration state shared by the enumerator and the noise filters.
//!
//! The enumerator registers one entry per line marker, conditional jump and switch it meets.
//! Filters observing the same pass may retract entries they recognize as compiler noise.
//! Retraction only flips a flag, so undoing an entry twice is harmless; it reports `false`
//! the second time and changes nothing.
//!
//! Entries are addressed by small handles ([`MarkerId`], [`JumpId`], [`SwitchId`]). Most
//! filters retract the entry registered last; filters whose pattern spans other
//! registrations remember the handle when they see the entry appear.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use crate::class::{ClassInfo, MethodInfo};

/// The method being scanned, with its class.
#[derive(Debug, Clone, Copy)]
pub struct MethodScope<'a> {
    /// Declaring class
    pub class: &'a ClassInfo,
    /// The method
    pub method: &'a MethodInfo,
}

impl<'a> MethodScope<'a> {
    /// Creates a scope.
    #[must_use]
    pub fn new(class: &'a ClassInfo, method: &'a MethodInfo) -> Self {
        MethodScope { class, method }
    }

    /// Returns `true` when scanning the class initializer.
    #[must_use]
    pub fn is_static_initializer(&self) -> bool {
        self.method.is_static_initializer()
    }

    /// Returns `true` if the method's code calls `owner.name`.
    #[must_use]
    pub fn calls(&self, owner: &str, name: &str) -> bool {
        self.method.body.as_ref().is_some_and(|body| {
            body.instructions
                .iter()
                .any(|insn| insn.is_call_to(owner, name))
        })
    }
}

/// Handle of a registered line marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub usize);

/// Handle of a registered conditional jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JumpId(pub usize);

/// Handle of a registered switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwitchId(pub usize);

/// A line marker met during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMarker {
    /// Position in the original instruction stream
    pub index: usize,
    /// Line number
    pub line: u32,
    /// Retracted by a filter
    pub retracted: bool,
}

/// A conditional jump met during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpSite {
    /// Position in the original instruction stream
    pub index: usize,
    /// Line the jump belongs to
    pub line: u32,
    /// Retracted by a filter
    pub retracted: bool,
}

/// A switch met during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchSite {
    /// Position in the original instruction stream
    pub index: usize,
    /// Line the switch belongs to
    pub line: u32,
    /// Case keys in target order, ranges expanded
    pub keys: Vec<i32>,
    /// Retracted by a filter
    pub retracted: bool,
    /// Default outcome retracted by a filter
    pub default_retracted: bool,
}

/// Mutable registration state of one method scan.
#[derive(Debug)]
pub struct MethodContext<'a> {
    scope: MethodScope<'a>,
    markers: Vec<LineMarker>,
    jumps: Vec<JumpSite>,
    switches: Vec<SwitchSite>,
    current_line: Option<u32>,
    instruction_counts: BTreeMap<u32, u32>,
    position: usize,
}

impl<'a> MethodContext<'a> {
    /// Creates an empty context.
    #[must_use]
    pub fn new(scope: MethodScope<'a>) -> Self {
        MethodContext {
            scope,
            markers: Vec::new(),
            jumps: Vec::new(),
            switches: Vec::new(),
            current_line: None,
            instruction_counts: BTreeMap::new(),
            position: 0,
        }
    }

    /// Moves to the instruction at `index`; called before any observer sees it.
    pub fn advance(&mut self, index: usize) {
        self.position = index;
    }

    /// Index of the instruction being observed.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The method being scanned.
    #[must_use]
    pub fn scope(&self) -> &MethodScope<'a> {
        &self.scope
    }

    /// Line of the most recent marker, `None` before the first one.
    #[must_use]
    pub fn current_line(&self) -> Option<u32> {
        self.current_line
    }

    /// Registers a line marker and makes its line current.
    pub fn register_line(&mut self, index: usize, line: u32) -> MarkerId {
        self.current_line = Some(line);
        self.markers.push(LineMarker {
            index,
            line,
            retracted: false,
        });
        MarkerId(self.markers.len() - 1)
    }

    /// Registers a conditional jump on the current line.
    ///
    /// Returns `None` before the first line marker.
    pub fn register_jump(&mut self, index: usize) -> Option<JumpId> {
        let line = self.current_line?;
        self.jumps.push(JumpSite {
            index,
            line,
            retracted: false,
        });
        Some(JumpId(self.jumps.len() - 1))
    }

    /// Registers a switch on the current line.
    ///
    /// Returns `None` before the first line marker.
    pub fn register_switch(&mut self, index: usize, keys: Vec<i32>) -> Option<SwitchId> {
        let line = self.current_line?;
        self.switches.push(SwitchSite {
            index,
            line,
            keys,
            retracted: false,
            default_retracted: false,
        });
        Some(SwitchId(self.switches.len() - 1))
    }

    /// Attributes one executable instruction to the current line.
    pub fn count_instruction(&mut self) {
        if let Some(line) = self.current_line {
            *self.instruction_counts.entry(line).or_insert(0) += 1;
        }
    }

    /// Handle of the most recently registered marker, retracted or not.
    #[must_use]
    pub fn last_line(&self) -> Option<MarkerId> {
        self.markers.len().checked_sub(1).map(MarkerId)
    }

    /// Handle of the most recently registered jump, retracted or not.
    #[must_use]
    pub fn last_jump(&self) -> Option<JumpId> {
        self.jumps.len().checked_sub(1).map(JumpId)
    }

    /// Handle of the most recently registered switch, retracted or not.
    #[must_use]
    pub fn last_switch(&self) -> Option<SwitchId> {
        self.switches.len().checked_sub(1).map(SwitchId)
    }

    /// The marker registered for the instruction being observed.
    #[must_use]
    pub fn line_here(&self) -> Option<MarkerId> {
        self.last_line()
            .filter(|id| self.markers[id.0].index == self.position)
    }

    /// The jump registered for the instruction being observed.
    ///
    /// `None` when the enumerator skipped the jump, e.g. before the first line marker.
    #[must_use]
    pub fn jump_here(&self) -> Option<JumpId> {
        self.last_jump()
            .filter(|id| self.jumps[id.0].index == self.position)
    }

    /// The switch registered for the instruction being observed.
    #[must_use]
    pub fn switch_here(&self) -> Option<SwitchId> {
        self.last_switch()
            .filter(|id| self.switches[id.0].index == self.position)
    }

    /// Looks up a marker.
    #[must_use]
    pub fn marker(&self, id: MarkerId) -> Option<&LineMarker> {
        self.markers.get(id.0)
    }

    /// Looks up a jump.
    #[must_use]
    pub fn jump(&self, id: JumpId) -> Option<&JumpSite> {
        self.jumps.get(id.0)
    }

    /// Looks up a switch.
    #[must_use]
    pub fn switch(&self, id: SwitchId) -> Option<&SwitchSite> {
        self.switches.get(id.0)
    }

    /// Retracts a line marker. Returns `false` if it was already retracted or does not exist.
    pub fn remove_line(&mut self, id: MarkerId) -> bool {
        match self.markers.get_mut(id.0) {
            Some(marker) if !marker.retracted => {
                marker.retracted = true;
                trace!(
                    "{}: retracted line {} at {}",
                    self.scope.method.signature(),
                    marker.line,
                    marker.index
                );
                true
            }
            _ => false,
        }
    }

    /// Retracts a jump. Returns `false` if it was already retracted or does not exist.
    pub fn remove_jump(&mut self, id: JumpId) -> bool {
        match self.jumps.get_mut(id.0) {
            Some(jump) if !jump.retracted => {
                jump.retracted = true;
                trace!(
                    "{}: retracted jump at {}",
                    self.scope.method.signature(),
                    jump.index
                );
                true
            }
            _ => false,
        }
    }

    /// Retracts a switch. Returns `false` if it was already retracted or does not exist.
    pub fn remove_switch(&mut self, id: SwitchId) -> bool {
        match self.switches.get_mut(id.0) {
            Some(switch) if !switch.retracted => {
                switch.retracted = true;
                trace!(
                    "{}: retracted switch at {}",
                    self.scope.method.signature(),
                    switch.index
                );
                true
            }
            _ => false,
        }
    }

    /// Retracts only the default outcome of a switch.
    pub fn remove_switch_default(&mut self, id: SwitchId) -> bool {
        match self.switches.get_mut(id.0) {
            Some(switch) if !switch.retracted && !switch.default_retracted => {
                switch.default_retracted = true;
                trace!(
                    "{}: retracted default of switch at {}",
                    self.scope.method.signature(),
                    switch.index
                );
                true
            }
            _ => false,
        }
    }

    /// Retracts the most recently registered marker.
    pub fn remove_last_line(&mut self) -> bool {
        self.last_line().is_some_and(|id| self.remove_line(id))
    }

    /// Retracts the most recently registered jump.
    pub fn remove_last_jump(&mut self) -> bool {
        self.last_jump().is_some_and(|id| self.remove_jump(id))
    }

    /// Retracts the most recently registered switch.
    pub fn remove_last_switch(&mut self) -> bool {
        self.last_switch().is_some_and(|id| self.remove_switch(id))
    }

    /// Retracts the default outcome of the most recently registered switch.
    pub fn remove_last_switch_default(&mut self) -> bool {
        self.last_switch()
            .is_some_and(|id| self.remove_switch_default(id))
    }

    /// Distinct line numbers with at least one marker, retracted ones included.
    #[must_use]
    pub fn distinct_lines(&self) -> BTreeSet<u32> {
        self.markers.iter().map(|marker| marker.line).collect()
    }

    /// Distinct line numbers with at least one marker that was not retracted.
    #[must_use]
    pub fn surviving_lines(&self) -> BTreeSet<u32> {
        surviving_lines(&self.markers)
    }

    /// Ends the scan.
    #[must_use]
    pub fn into_scan(self) -> MethodScan {
        MethodScan {
            markers: self.markers,
            jumps: self.jumps,
            switches: self.switches,
            instruction_counts: self.instruction_counts,
        }
    }
}

fn surviving_lines(markers: &[LineMarker]) -> BTreeSet<u32> {
    markers
        .iter()
        .filter(|marker| !marker.retracted)
        .map(|marker| marker.line)
        .collect()
}

/// Result of scanning one method.
///
/// Jumps and switches survive only together with their line: a branch on a line whose
/// markers were all retracted would have outcome counts but no line count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodScan {
    /// Line markers in stream order
    pub markers: Vec<LineMarker>,
    /// Conditional jumps in stream order
    pub jumps: Vec<JumpSite>,
    /// Switches in stream order
    pub switches: Vec<SwitchSite>,
    /// Executable instructions per line
    pub instruction_counts: BTreeMap<u32, u32>,
}

impl MethodScan {
    /// Distinct lines that keep a record.
    #[must_use]
    pub fn surviving_lines(&self) -> BTreeSet<u32> {
        surviving_lines(&self.markers)
    }

    /// Returns `true` if no line survived; such methods are not rewritten.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.iter().all(|marker| marker.retracted)
    }

    /// Jumps that keep a record, with their position in [`MethodScan::jumps`].
    #[must_use]
    pub fn surviving_jumps(&self) -> Vec<usize> {
        let lines = self.surviving_lines();
        self.jumps
            .iter()
            .enumerate()
            .filter(|(_, jump)| !jump.retracted && lines.contains(&jump.line))
            .map(|(position, _)| position)
            .collect()
    }

    /// Switches that keep a record, with their position in [`MethodScan::switches`].
    #[must_use]
    pub fn surviving_switches(&self) -> Vec<usize> {
        let lines = self.surviving_lines();
        self.switches
            .iter()
            .enumerate()
            .filter(|(_, switch)| !switch.retracted && lines.contains(&switch.line))
            .map(|(position, _)| position)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::MethodBody,
        class::{AccessFlags, MethodInfo},
    };

    fn with_context<F: FnOnce(&mut MethodContext<'_>)>(f: F) {
        let class = ClassInfo::new("A", 52);
        let method = MethodInfo::new("run", "()V", AccessFlags::PUBLIC, MethodBody::default());
        let mut ctx = MethodContext::new(MethodScope::new(&class, &method));
        f(&mut ctx);
    }

    #[test]
    fn jumps_need_a_line() {
        with_context(|ctx| {
            assert!(ctx.register_jump(0).is_none());
            assert!(ctx.register_switch(0, vec![1]).is_none());
            ctx.register_line(1, 10);
            ctx.advance(2);
            assert_eq!(ctx.register_jump(2), Some(JumpId(0)));
            assert_eq!(ctx.jump_here(), Some(JumpId(0)));
            ctx.advance(3);
            assert_eq!(ctx.jump_here(), None);
            assert_eq!(ctx.jump(JumpId(0)).unwrap().line, 10);
        });
    }

    #[test]
    fn retraction_is_idempotent() {
        with_context(|ctx| {
            ctx.register_line(0, 3);
            ctx.register_jump(1);
            assert!(ctx.remove_last_jump());
            assert!(!ctx.remove_last_jump());
            assert!(ctx.remove_last_line());
            assert!(!ctx.remove_line(MarkerId(0)));
            assert!(!ctx.remove_line(MarkerId(7)));
            assert!(!ctx.remove_last_switch());
            assert!(ctx.surviving_lines().is_empty());
            assert_eq!(ctx.distinct_lines().len(), 1);
        });
    }

    #[test]
    fn default_retraction() {
        with_context(|ctx| {
            ctx.register_line(0, 3);
            ctx.register_switch(1, vec![0, 1]);
            assert!(ctx.remove_last_switch_default());
            assert!(!ctx.remove_last_switch_default());
            assert!(ctx.remove_last_switch());
            assert!(!ctx.remove_switch_default(SwitchId(0)));
        });
    }

    #[test]
    fn branches_die_with_their_line() {
        with_context(|ctx| {
            ctx.register_line(0, 3);
            ctx.register_jump(1);
            ctx.register_line(2, 4);
            ctx.register_jump(3);
            ctx.remove_line(MarkerId(0));
            ctx.count_instruction();
            let scope = *ctx.scope();
            let scan = std::mem::replace(ctx, MethodContext::new(scope)).into_scan();
            assert_eq!(scan.surviving_jumps(), vec![1]);
            assert_eq!(scan.instruction_counts.get(&4), Some(&1));
            assert!(!scan.is_empty());
        });
    }
}
