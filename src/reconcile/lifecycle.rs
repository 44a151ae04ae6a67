//! Component lifecycle management.
//!
//! Mounting resolves the reference through the registry, runs the right
//! hooks and records retained state in the mount arena. Updating runs the
//! update path exactly once per compatible pass. Hook failures are contained:
//! the position becomes (or stays) a dead mount and is retried when a later
//! snapshot reaches it, while siblings proceed untouched.

use smallvec::SmallVec;

use super::{ComponentState, Ctx, MountId, Mounted, SyncReport, Synchronizer};
use crate::adapter::HostAdapter;
use crate::component::{Component, ExternalMount, StateCx, StateMap};
use crate::diagnostics::Phase;
use crate::error::SyncError;
use crate::vnode::{ComponentData, VNode};

impl<A: HostAdapter> Synchronizer<A> {
    // =========================================================================
    // Mount
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn mount_component<'a>(
        &mut self,
        node: &'a VNode,
        data: &'a ComponentData,
        parent: &A::Handle,
        before: Option<&A::Handle>,
        ctx: Ctx<'a>,
        position: usize,
        at_attachment: bool,
        report: &mut SyncReport,
    ) -> Result<MountId, SyncError<A::Error>> {
        let Some(resolved) = self.registry.resolve(&data.reference) else {
            self.diag(
                Phase::Insert,
                node,
                position,
                format!("unknown component reference {:?}", data.reference),
            );
            return Ok(self.dead_mount());
        };

        match resolved {
            Component::Context(component) => {
                let mut state = StateMap::new();
                let template = {
                    let mut cx = StateCx::new(&mut state);
                    component.render(&data.props, &mut cx)
                };
                match template {
                    Ok(template) => {
                        report.components_mounted += 1;
                        let inner = self.insert_node(
                            &template,
                            parent,
                            before,
                            ctx,
                            position,
                            at_attachment,
                            report,
                        )?;
                        let handle = self.handle_of(inner);
                        Ok(self.mounts.insert(Mounted {
                            handle,
                            children: SmallVec::new(),
                            component: Some(ComponentState::Context {
                                component,
                                state,
                                rendered: Some(template),
                                inner: Some(inner),
                            }),
                        }))
                    }
                    Err(e) => {
                        self.diag(Phase::Insert, node, position, format!("render failed: {e}"));
                        // State survives so the retry starts where this
                        // render left off.
                        Ok(self.mounts.insert(Mounted {
                            handle: None,
                            children: SmallVec::new(),
                            component: Some(ComponentState::Context {
                                component,
                                state,
                                rendered: None,
                                inner: None,
                            }),
                        }))
                    }
                }
            }
            Component::External(component) => {
                let ExternalMount { handle, instance } =
                    match component.mount(&mut self.adapter, &data.props) {
                        Ok(m) => m,
                        Err(e) => {
                            self.diag(
                                Phase::Insert,
                                node,
                                position,
                                format!("mount hook failed: {e}"),
                            );
                            return Ok(self.dead_mount());
                        }
                    };
                report.components_mounted += 1;

                match self.attach_handle(&handle, parent, before, node, position, at_attachment) {
                    Ok(true) => {}
                    Ok(false) => {
                        report.components_unmounted += 1;
                        if let Err(e) = component.unmount(&mut self.adapter, instance) {
                            self.diag(
                                Phase::Insert,
                                node,
                                position,
                                format!("unmount hook failed: {e}"),
                            );
                        }
                        return Ok(self.dead_mount());
                    }
                    Err(fatal) => {
                        let _ = component.unmount(&mut self.adapter, instance);
                        return Err(fatal);
                    }
                }

                let owns_children = component.owns_children();
                let children = if owns_children {
                    SmallVec::new()
                } else {
                    self.insert_children(&data.children, &handle, ctx, report)?
                };
                Ok(self.mounts.insert(Mounted {
                    handle: Some(handle),
                    children,
                    component: Some(ComponentState::External {
                        component,
                        instance: Some(instance),
                        owns_children,
                    }),
                }))
            }
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update_component<'a>(
        &mut self,
        prev_data: &ComponentData,
        next: &'a VNode,
        next_data: &'a ComponentData,
        id: MountId,
        parent: &A::Handle,
        before: Option<&A::Handle>,
        ctx: Ctx<'a>,
        position: usize,
        report: &mut SyncReport,
    ) -> Result<MountId, SyncError<A::Error>> {
        // Ownership of the lifecycle state moves out of the arena for the
        // duration of the hooks, so recursion below can use the arena freely.
        let Some(state) = self.mounts.get_mut(id).and_then(|m| m.component.take()) else {
            // The retained slot carries no lifecycle state; rebuild.
            self.free_mount(id);
            return self.insert_node(next, parent, before, ctx, position, false, report);
        };

        match state {
            ComponentState::Context {
                component,
                mut state,
                rendered,
                inner,
            } => {
                let template = {
                    let mut cx = StateCx::new(&mut state);
                    component.render(&next_data.props, &mut cx)
                };
                match template {
                    Ok(template) => {
                        // A vacant slot coming back to life is a remount,
                        // not an update.
                        if inner.is_some() {
                            report.components_updated += 1;
                        } else {
                            report.components_mounted += 1;
                        }
                        let outcome = self.reconcile_node(
                            rendered.as_ref(),
                            inner,
                            Some(&template),
                            parent,
                            before,
                            ctx,
                            position,
                            false,
                            report,
                        )?;
                        let handle = outcome.and_then(|i| self.handle_of(i));
                        if let Some(entry) = self.mounts.get_mut(id) {
                            entry.handle = handle;
                            entry.component = Some(ComponentState::Context {
                                component,
                                state,
                                rendered: Some(template),
                                inner: outcome,
                            });
                        }
                        Ok(id)
                    }
                    Err(e) => {
                        self.diag(Phase::Update, next, position, format!("render failed: {e}"));
                        // The old output can no longer be trusted to match
                        // anything; tear it down and retry later.
                        if let Some(inner) = inner {
                            report.components_unmounted += 1;
                            self.remove_mount(inner, rendered.as_ref(), position, report);
                        }
                        if let Some(entry) = self.mounts.get_mut(id) {
                            entry.handle = None;
                            entry.component = Some(ComponentState::Context {
                                component,
                                state,
                                rendered: None,
                                inner: None,
                            });
                        }
                        Ok(id)
                    }
                }
            }
            ComponentState::External {
                component,
                instance,
                owns_children,
            } => {
                let Some(mut instance) = instance else {
                    self.free_mount(id);
                    return self.insert_node(next, parent, before, ctx, position, false, report);
                };
                match component.update(
                    &mut self.adapter,
                    &mut instance,
                    &prev_data.props,
                    &next_data.props,
                ) {
                    Ok(()) => {
                        report.components_updated += 1;
                        if !owns_children {
                            if let Some(handle) = self.handle_of(id) {
                                self.reconcile_children(
                                    &prev_data.children,
                                    &next_data.children,
                                    id,
                                    &handle,
                                    ctx,
                                    report,
                                )?;
                            }
                        }
                        if let Some(entry) = self.mounts.get_mut(id) {
                            entry.component = Some(ComponentState::External {
                                component,
                                instance: Some(instance),
                                owns_children,
                            });
                        }
                        Ok(id)
                    }
                    Err(e) => {
                        self.diag(
                            Phase::Update,
                            next,
                            position,
                            format!("update hook failed: {e}"),
                        );
                        report.components_unmounted += 1;
                        if let Err(e) = component.unmount(&mut self.adapter, instance) {
                            self.diag(
                                Phase::Update,
                                next,
                                position,
                                format!("unmount hook failed: {e}"),
                            );
                        }
                        let children: SmallVec<[MountId; 8]> = self
                            .mounts
                            .get_mut(id)
                            .map(|m| std::mem::take(&mut m.children))
                            .unwrap_or_default();
                        for child in children {
                            self.free_mount(child);
                        }
                        if let Some(handle) = self.handle_of(id) {
                            if let Err(e) = self.adapter.remove_node(&handle) {
                                self.diag(
                                    Phase::Update,
                                    next,
                                    position,
                                    format!("failed to remove node: {e}"),
                                );
                            }
                            report.nodes_removed += 1;
                        }
                        if let Some(entry) = self.mounts.get_mut(id) {
                            entry.handle = None;
                        }
                        Ok(id)
                    }
                }
            }
        }
    }
}
