use std::any::type_name;
use std::any::Any;

/// A component payload. Storage never inspects the value except through the
/// optional hooks below; every hook defaults to a no-op, so a plain
/// `impl Component for T {}` opts into none of them.
pub trait Component: 'static {
    /// Name used by diagnostics and by `ComponentType`'s `Display`.
    fn name() -> &'static str
    where
        Self: Sized,
    {
        type_name::<Self>()
    }

    /// Invoked during normalization the first time a freshly added row
    /// becomes part of the sorted active set.
    fn on_construct(&mut self, _sequence: u64) {}

    /// Invoked when a row is removed, whether by an explicit removal or by
    /// container teardown.
    fn on_destruct(&mut self, _sequence: u64) {}

    /// Invoked by the serialization walk for every stored row. Downcast the
    /// sink to the concrete collaborator driving the walk.
    fn serialize(&self, _sink: &mut dyn Any, _sequence: u64) {}
}
