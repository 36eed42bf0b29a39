use ctor::ctor;
use sequent_core::Component;
use sequent_core::ComponentGroup;
use sequent_core::ContainerMap;
use sequent_core::System;
use sequent_core::STATIC_SEQUENCE;

#[ctor]
fn init_logging() {
    log4rs::init_file("tests/log4rs.test.yaml", Default::default()).unwrap();
}

#[derive(Debug, Clone, PartialEq)]
struct LightDir(i32);

impl Component for LightDir {}

#[derive(Debug, Clone, PartialEq)]
struct Camera(i32);

impl Component for Camera {}

#[derive(Debug, Clone, PartialEq)]
struct Position(i32);

impl Component for Position {}

fn static_fixture() -> ContainerMap {
    let mut map = ContainerMap::new();
    for value in [1, 2] {
        map.add_static_component(LightDir(value));
    }
    for value in [10, 11, 12, 13, 14] {
        map.add_static_component(Camera(value));
    }
    map.renormalize(false);
    map
}

#[derive(Default)]
struct StaticProduct {
    visited: Vec<(u64, i32, i32)>,
}

impl System for StaticProduct {
    type Components = (LightDir, Camera);

    fn execute(
        &mut self,
        entity: u64,
        (light, camera): (Option<&LightDir>, Option<&Camera>),
    ) {
        self.visited.push((entity, light.unwrap().0, camera.unwrap().0));
    }
}

#[derive(Default)]
struct StaticGroups {
    visited: Vec<(u64, usize, usize)>,
}

impl System for StaticGroups {
    type Components = (LightDir, Camera);

    fn group_components(&self) -> bool {
        true
    }

    fn group_execute(
        &mut self,
        entity: u64,
        (lights, cameras): (ComponentGroup<LightDir>, ComponentGroup<Camera>),
    ) {
        self.visited.push((entity, lights.len(), cameras.len()));
    }
}

#[test]
fn static_only_recurse_walks_the_full_product_once() {
    let mut map = static_fixture();
    let mut system = StaticProduct::default();
    map.walk_components(&mut system);

    let mut expected = vec![];
    for light in [1, 2] {
        for camera in [10, 11, 12, 13, 14] {
            expected.push((STATIC_SEQUENCE, light, camera));
        }
    }
    assert_eq!(system.visited, expected);
}

#[test]
fn static_only_group_fires_once_with_full_groups() {
    let mut map = static_fixture();
    let mut system = StaticGroups::default();
    map.walk_components(&mut system);
    assert_eq!(system.visited, vec![(STATIC_SEQUENCE, 2, 5)]);
}

#[test]
fn static_rows_broadcast_to_every_matched_entity() {
    #[derive(Default)]
    struct Broadcast {
        visited: Vec<(u64, i32, i32)>,
    }

    impl System for Broadcast {
        type Components = (Position, Camera);

        fn execute(
            &mut self,
            entity: u64,
            (position, camera): (Option<&Position>, Option<&Camera>),
        ) {
            self.visited
                .push((entity, position.unwrap().0, camera.unwrap().0));
        }
    }

    let mut map = ContainerMap::new();
    map.add_component(3, Position(30));
    map.add_component(5, Position(50));
    map.add_static_component(Camera(100));
    map.add_static_component(Camera(101));
    map.renormalize(false);

    let mut system = Broadcast::default();
    map.walk_components(&mut system);
    assert_eq!(
        system.visited,
        vec![
            (3, 30, 100),
            (3, 30, 101),
            (5, 50, 100),
            (5, 50, 101),
        ]
    );
}

#[test]
fn group_mode_hands_the_full_static_array_to_each_entity() {
    #[derive(Default)]
    struct Broadcast {
        visited: Vec<(u64, usize)>,
    }

    impl System for Broadcast {
        type Components = (Position, Camera);

        fn group_components(&self) -> bool {
            true
        }

        fn group_execute(
            &mut self,
            entity: u64,
            (_, cameras): (ComponentGroup<Position>, ComponentGroup<Camera>),
        ) {
            self.visited.push((entity, cameras.len()));
        }
    }

    let mut map = ContainerMap::new();
    map.add_component(3, Position(30));
    map.add_component(5, Position(50));
    map.add_static_component(Camera(100));
    map.add_static_component(Camera(101));
    map.renormalize(false);

    let mut system = Broadcast::default();
    map.walk_components(&mut system);
    assert_eq!(system.visited, vec![(3, 2), (5, 2)]);
}

#[test]
fn static_insertion_indices_count_up() {
    let mut map = ContainerMap::new();
    assert_eq!(map.add_static_component(Camera(0)), 0);
    assert_eq!(map.add_static_component(Camera(1)), 1);
    assert_eq!(map.add_static_component(Camera(2)), 2);
}

#[test]
#[should_panic(expected = "cannot add component")]
fn entity_rows_cannot_join_a_static_container() {
    let mut map = ContainerMap::new();
    map.add_static_component(Camera(0));
    map.add_component(1, Camera(1));
}

#[test]
#[should_panic(expected = "cannot add static component")]
fn static_rows_cannot_join_a_populated_container() {
    let mut map = ContainerMap::new();
    map.add_component(1, Camera(1));
    map.add_static_component(Camera(0));
}

#[test]
fn static_components_expose_the_backing_rows() {
    let mut map = static_fixture();

    let rows = map.static_components::<Camera>().unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|row| row.sequence == STATIC_SEQUENCE));
    assert_eq!(rows[2].value, Camera(12));

    // Edits are allowed until the next renormalize.
    rows[2].value = Camera(99);
    assert_eq!(map.static_component::<Camera>(2), Some(&mut Camera(99)));

    assert!(map.static_components::<Position>().is_none());
}

#[test]
fn static_component_is_bounded_by_the_sorted_length() {
    let mut map = static_fixture();
    assert_eq!(map.static_component::<Camera>(4), Some(&mut Camera(14)));
    assert_eq!(map.static_component::<Camera>(5), None);

    // A row staged after the last renormalize is not yet addressable.
    let index = map.add_static_component(Camera(15));
    assert_eq!(index, 5);
    assert_eq!(map.static_component::<Camera>(5), None);
    map.renormalize(false);
    assert_eq!(map.static_component::<Camera>(5), Some(&mut Camera(15)));
}

#[test]
fn staged_static_rows_are_invisible_until_renormalize() {
    let mut map = ContainerMap::new();
    map.add_static_component(Camera(100));

    let container = map.container::<Camera>().unwrap();
    assert_eq!(container.num_rows(), 0);
    assert_eq!(container.lookup_index(STATIC_SEQUENCE), None);
    assert_eq!(container.get(STATIC_SEQUENCE), None);

    map.renormalize(false);
    let container = map.container::<Camera>().unwrap();
    assert_eq!(container.lookup_index(STATIC_SEQUENCE), Some(0));
    assert_eq!(container.get(STATIC_SEQUENCE), Some(&Camera(100)));
}

#[test]
fn lookup_on_a_static_container_always_hits_row_zero() {
    let mut map = static_fixture();
    map.renormalize(false);
    let container = map.container::<Camera>().unwrap();
    assert_eq!(container.lookup_index(42), Some(0));
    assert_eq!(container.lookup_index(STATIC_SEQUENCE), Some(0));
    assert!(container.is_static());
}

#[test]
fn walk_entity_reaches_static_columns_for_any_entity() {
    let mut map = ContainerMap::new();
    map.add_component(7, Position(70));
    map.add_static_component(Camera(100));
    map.renormalize(false);

    #[derive(Default)]
    struct Pair {
        visited: Vec<(u64, i32, i32)>,
    }

    impl System for Pair {
        type Components = (Position, Camera);

        fn execute(
            &mut self,
            entity: u64,
            (position, camera): (Option<&Position>, Option<&Camera>),
        ) {
            self.visited
                .push((entity, position.unwrap().0, camera.unwrap().0));
        }
    }

    let mut system = Pair::default();
    assert!(map.walk_entity(&mut system, 7));
    assert_eq!(system.visited, vec![(7, 70, 100)]);
    assert!(!map.walk_entity(&mut system, 8));
}
