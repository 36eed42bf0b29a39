use crate::component::Component;
use crate::container::ComponentContainer;
use crate::container::ContainerBase;
use crate::container::Row;
use crate::core_result::ContainerError;
use crate::core_result::CoreResult;
use crate::registry::type_id_of;
use crate::registry::ComponentType;
use crate::system::System;
use crate::walk;
use log::error;
use log::trace;
use std::any::Any;
use std::collections::BTreeMap;

/// Owns one erased container per component type, keyed by type id.
///
/// Containers come into existence on demand (first add, or first walk of a
/// system naming the type) and live until the map is dropped. The map is the
/// single point for broadcasting `renormalize` and entity removal across
/// every container.
pub struct ContainerMap {
    containers: BTreeMap<ComponentType, Box<dyn ContainerBase>>,
    normalize_passes: u64,
}

impl Default for ContainerMap {
    fn default() -> Self {
        ContainerMap::new()
    }
}

impl ContainerMap {
    pub fn new() -> ContainerMap {
        ContainerMap {
            containers: BTreeMap::new(),
            normalize_passes: 0,
        }
    }

    pub fn has_container<T: Component>(&self) -> bool {
        self.containers.contains_key(&type_id_of::<T>())
    }

    /// Takes ownership of `container`. Registering a container for an
    /// already occupied type id is a diagnosable no-op: the incoming
    /// container is dropped and the existing one kept.
    pub fn add_container(
        &mut self,
        container: Box<dyn ContainerBase>,
        component_type: ComponentType,
    ) {
        if self.containers.contains_key(&component_type) {
            error!(
                "attempting to add a pre-existing container for {}; dropping the new one",
                component_type
            );
            return;
        }
        self.containers.insert(component_type, container);
    }

    /// Container for `T`, created empty on first use.
    pub fn ensure_container<T: Component>(&mut self) -> &mut ComponentContainer<T> {
        let component_type = type_id_of::<T>();
        self.containers
            .entry(component_type)
            .or_insert_with(|| Box::new(ComponentContainer::<T>::new()))
            .as_any_mut()
            .downcast_mut::<ComponentContainer<T>>()
            .expect("container registered under a foreign type id")
    }

    pub fn container<T: Component>(&self) -> Option<&ComponentContainer<T>> {
        self.containers
            .get(&type_id_of::<T>())
            .and_then(|container| container.as_any().downcast_ref())
    }

    pub fn container_mut<T: Component>(&mut self) -> Option<&mut ComponentContainer<T>> {
        self.containers
            .get_mut(&type_id_of::<T>())
            .and_then(|container| container.as_any_mut().downcast_mut())
    }

    pub fn base_container(&self, component_type: ComponentType) -> Option<&dyn ContainerBase> {
        self.containers
            .get(&component_type)
            .map(|container| container.as_ref())
    }

    pub fn base_container_mut(
        &mut self,
        component_type: ComponentType,
    ) -> Option<&mut (dyn ContainerBase + '_)> {
        match self.containers.get_mut(&component_type) {
            Some(container) => Some(container.as_mut()),
            None => None,
        }
    }

    /// Stages a component for `entity`. Panics on structural misuse (entity
    /// `0`, or a static container for `T`); see `try_add_component`.
    pub fn add_component<T: Component>(&mut self, entity: u64, component: T) {
        if let Err(err) = self.try_add_component(entity, component) {
            error!(
                "cannot add {} component for entity {}: {}",
                T::name(),
                entity,
                err
            );
            panic!("cannot add component: {}", err);
        }
    }

    pub fn try_add_component<T: Component>(&mut self, entity: u64, component: T) -> CoreResult {
        if entity == 0 {
            return Err(ContainerError::InvalidSequence);
        }
        self.ensure_container::<T>().try_add(entity, component)
    }

    /// Stages a static (entity-less, broadcast) component and returns its
    /// insertion index. Panics if `T`'s container already holds entity rows;
    /// see `try_add_static_component`.
    pub fn add_static_component<T: Component>(&mut self, component: T) -> usize {
        match self.try_add_static_component(component) {
            Ok(index) => index,
            Err(err) => {
                error!("cannot add static {} component: {}", T::name(), err);
                panic!("cannot add static component: {}", err);
            }
        }
    }

    pub fn try_add_static_component<T: Component>(&mut self, component: T) -> CoreResult<usize> {
        self.ensure_container::<T>().try_add_static(component)
    }

    /// Stages removal of every component of every type tagged with `entity`.
    pub fn remove_entity(&mut self, entity: u64) {
        trace!("removing entity {} from all containers", entity);
        for container in self.containers.values_mut() {
            container.remove_sequence(entity);
        }
    }

    pub fn remove_all_components<T: Component>(&mut self, entity: u64) {
        if let Some(container) = self.container_mut::<T>() {
            container.remove_all(entity);
        }
    }

    pub fn remove_first_component<T: Component>(&mut self, entity: u64) {
        if let Some(container) = self.container_mut::<T>() {
            container.remove_first(entity);
        }
    }

    pub fn remove_last_component<T: Component>(&mut self, entity: u64) {
        if let Some(container) = self.container_mut::<T>() {
            container.remove_last(entity);
        }
    }

    pub fn remove_component_at<T: Component>(&mut self, entity: u64, index: usize) {
        if let Some(container) = self.container_mut::<T>() {
            container.remove_at(entity, index);
        }
    }

    /// Commits all staged mutations in every container. Call at a phase
    /// boundary; systems walked before the next call all observe the same
    /// data. Request `stable_sort` when relative order of multiple rows per
    /// entity matters (first/last removal, grouped multi-rows).
    pub fn renormalize(&mut self, stable_sort: bool) {
        self.normalize_passes += 1;
        log_mdc::insert("normalize_pass", self.normalize_passes.to_string());
        trace!("renormalize (stable_sort: {})", stable_sort);
        for container in self.containers.values_mut() {
            container.renormalize(stable_sort);
        }
    }

    /// Destroys all rows of every container immediately, keeping the
    /// containers themselves.
    pub fn clear(&mut self) {
        for container in self.containers.values_mut() {
            container.clear();
        }
    }

    /// Whole backing array of `T`'s container (static rows in insertion
    /// order, staged rows included), or `None` when absent or empty. Values
    /// may be edited freely until the next walk.
    pub fn static_components<T: Component>(&mut self) -> Option<&mut [Row<T>]> {
        let container = self.container_mut::<T>()?;
        if container.backing_len() == 0 {
            return None;
        }
        Some(container.rows_mut())
    }

    /// The static component at `index`, bounded by the sorted length: rows
    /// staged after the last renormalize are not yet addressable.
    pub fn static_component<T: Component>(&mut self, index: usize) -> Option<&mut T> {
        let container = self.container_mut::<T>()?;
        if index >= container.num_rows() {
            return None;
        }
        Some(&mut container.rows_mut()[index].value)
    }

    /// Walks every container in ascending type-id order invoking each row's
    /// `serialize` hook. Staged rows are included so pre-normalize snapshots
    /// are possible.
    pub fn serialize(&self, sink: &mut dyn Any) {
        for container in self.containers.values() {
            container.serialize_rows(sink);
        }
    }

    /// Runs `system` over every entity matching its component tuple, in
    /// ascending sequence order.
    pub fn walk_components<S: System>(&mut self, system: &mut S) {
        walk::walk_components(self, system);
    }

    /// Force-executes `system` against one entity. Returns false when the
    /// entity lacks a mandatory component.
    pub fn walk_entity<S: System>(&mut self, system: &mut S, entity: u64) -> bool {
        walk::walk_entity(self, system, entity)
    }
}
