use crate::component::Component;
use crate::container::ComponentContainer;
use crate::container_map::ContainerMap;
use crate::registry::type_id_of;
use crate::registry::ComponentType;
use crate::system::ComponentGroup;
use crate::system::System;
use crate::walk::RunSpan;

/// The tuple of component types a system walks over, wired for both
/// dispatch modes. Implemented for tuples of one through eight component
/// types; the types must be distinct (the walker rejects duplicates).
pub trait ComponentSet: 'static {
    /// Recurse-mode argument tuple: `Option<&T>` per type.
    type Refs<'a>;
    /// Group-mode argument tuple: `ComponentGroup<'a, T>` per type.
    type Groups<'a>;
    /// Typed container handles, resolved once per walk.
    type Columns<'a>: Copy;

    const LEN: usize;

    fn component_types() -> Vec<ComponentType>;

    fn ensure_containers(map: &mut ContainerMap);

    fn columns(map: &ContainerMap) -> Self::Columns<'_>;

    fn invoke_recurse<S>(
        system: &mut S,
        columns: Self::Columns<'_>,
        spans: &[RunSpan],
        cursors: &[usize],
        target: u64,
    ) where
        S: System<Components = Self>;

    fn invoke_group<S>(system: &mut S, columns: Self::Columns<'_>, spans: &[RunSpan], target: u64)
    where
        S: System<Components = Self>;
}

fn recurse_ref<'a, T: Component>(
    container: &'a ComponentContainer<T>,
    span: &RunSpan,
    cursor: usize,
) -> Option<&'a T> {
    match *span {
        RunSpan::Missing => None,
        RunSpan::Rows { start, .. } => Some(&container.rows()[start + cursor].value),
        RunSpan::Static { .. } => Some(&container.rows()[cursor].value),
    }
}

fn group_view<'a, T: Component>(
    container: &'a ComponentContainer<T>,
    span: &RunSpan,
) -> ComponentGroup<'a, T> {
    match *span {
        RunSpan::Missing => ComponentGroup::empty(),
        RunSpan::Rows { start, len } => ComponentGroup::new(&container.rows()[start..start + len]),
        RunSpan::Static { len } => ComponentGroup::new(&container.rows()[..len]),
    }
}

impl ComponentSet for () {
    type Refs<'a> = ();
    type Groups<'a> = ();
    type Columns<'a> = ();

    const LEN: usize = 0;

    fn component_types() -> Vec<ComponentType> {
        vec![]
    }

    fn ensure_containers(_map: &mut ContainerMap) {}

    fn columns(_map: &ContainerMap) -> Self::Columns<'_> {}

    fn invoke_recurse<S>(
        _system: &mut S,
        _columns: Self::Columns<'_>,
        _spans: &[RunSpan],
        _cursors: &[usize],
        _target: u64,
    ) where
        S: System<Components = Self>,
    {
    }

    fn invoke_group<S>(
        _system: &mut S,
        _columns: Self::Columns<'_>,
        _spans: &[RunSpan],
        _target: u64,
    ) where
        S: System<Components = Self>,
    {
    }
}

macro_rules! impl_component_set {
    ($(($ty:ident, $col:ident, $idx:tt)),+) => {
        impl<$($ty: Component,)+> ComponentSet for ($($ty,)+) {
            type Refs<'a> = ($(Option<&'a $ty>,)+);
            type Groups<'a> = ($(ComponentGroup<'a, $ty>,)+);
            type Columns<'a> = ($(&'a ComponentContainer<$ty>,)+);

            const LEN: usize = [$(stringify!($ty)),+].len();

            fn component_types() -> Vec<ComponentType> {
                vec![$(type_id_of::<$ty>(),)+]
            }

            fn ensure_containers(map: &mut ContainerMap) {
                $(map.ensure_container::<$ty>();)+
            }

            fn columns(map: &ContainerMap) -> Self::Columns<'_> {
                ($(map
                    .container::<$ty>()
                    .expect("containers are ensured before a walk"),)+)
            }

            fn invoke_recurse<S>(
                system: &mut S,
                columns: Self::Columns<'_>,
                spans: &[RunSpan],
                cursors: &[usize],
                target: u64,
            ) where
                S: System<Components = Self>,
            {
                let ($($col,)+) = columns;
                system.execute(
                    target,
                    ($(recurse_ref($col, &spans[$idx], cursors[$idx]),)+),
                );
            }

            fn invoke_group<S>(
                system: &mut S,
                columns: Self::Columns<'_>,
                spans: &[RunSpan],
                target: u64,
            ) where
                S: System<Components = Self>,
            {
                let ($($col,)+) = columns;
                system.group_execute(target, ($(group_view($col, &spans[$idx]),)+));
            }
        }
    };
}

impl_component_set!((A, a, 0));
impl_component_set!((A, a, 0), (B, b, 1));
impl_component_set!((A, a, 0), (B, b, 1), (C, c, 2));
impl_component_set!((A, a, 0), (B, b, 1), (C, c, 2), (D, d, 3));
impl_component_set!((A, a, 0), (B, b, 1), (C, c, 2), (D, d, 3), (E, e, 4));
impl_component_set!(
    (A, a, 0),
    (B, b, 1),
    (C, c, 2),
    (D, d, 3),
    (E, e, 4),
    (F, f, 5)
);
impl_component_set!(
    (A, a, 0),
    (B, b, 1),
    (C, c, 2),
    (D, d, 3),
    (E, e, 4),
    (F, f, 5),
    (G, g, 6)
);
impl_component_set!(
    (A, a, 0),
    (B, b, 1),
    (C, c, 2),
    (D, d, 3),
    (E, e, 4),
    (F, f, 5),
    (G, g, 6),
    (H, h, 7)
);
